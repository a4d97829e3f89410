//! Opcode byte layout.
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---------------+---+-----------+
//! |   operation   |src|   class   |   ALU and JMP classes
//! +-----------+-------+-----------+
//! |   mode    | size  |   class   |   LD, LDX, ST and STX classes
//! +-----------+-------+-----------+
//! ```
//!
//! rBPF keeps the eBPF class numbering but has no class 6, and the LD class
//! only carries the three double-slot loads ([`WideLoad`]). A branch at slot
//! `idx` lands on slot `idx + 1 + offset`.

use core::fmt;

pub const CLASS_MASK: u8 = 0x07;
pub const SRC_REG: u8 = 0x08;
pub const OP_MASK: u8 = 0xf0;
pub const SIZE_MASK: u8 = 0x18;
pub const MODE_MASK: u8 = 0xe0;
/// The only load/store mode rBPF executes: `[reg + offset]`.
pub const MODE_MEM: u8 = 0x60;

pub const LDDW: u8 = 0x18;
pub const LDDWD: u8 = 0xb8;
pub const LDDWR: u8 = 0xd8;
pub const JA: u8 = 0x05;
pub const CALL: u8 = 0x85;
pub const EXIT: u8 = 0x95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpcodeClass {
    Ld = 0,
    Ldx = 1,
    St = 2,
    Stx = 3,
    Alu32 = 4,
    Jmp = 5,
    Alu64 = 7,
}

impl OpcodeClass {
    const TABLE: [Option<Self>; 8] = [
        Some(Self::Ld),
        Some(Self::Ldx),
        Some(Self::St),
        Some(Self::Stx),
        Some(Self::Alu32),
        Some(Self::Jmp),
        None,
        Some(Self::Alu64),
    ];

    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        Self::TABLE[(opcode & CLASS_MASK) as usize]
    }
}

/// Where the second operand of an ALU or JMP instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The sign-extended `imm` field.
    Imm,
    /// The `src` register.
    Reg,
}

impl Operand {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Self {
        if opcode & SRC_REG == 0 { Self::Imm } else { Self::Reg }
    }
}

/// Declares an operation enum decoded from the upper nibble, along with its
/// mnemonic.
macro_rules! operation_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$doc:meta])* $variant:ident = $code:literal, $mnemonic:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$doc])* $variant = $code, )*
        }

        impl $name {
            #[inline]
            pub const fn from_opcode(opcode: u8) -> Option<Self> {
                match opcode & OP_MASK {
                    $( $code => Some(Self::$variant), )*
                    _ => None,
                }
            }

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Self::$variant => $mnemonic, )*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}

operation_table! {
    /// ALU operations, shared by the 32- and 64-bit classes.
    ///
    /// 0xd0 (byte swap) is not part of rBPF.
    AluOp {
        Add = 0x00, "add";
        Sub = 0x10, "sub";
        Mul = 0x20, "mul";
        /// Unsigned; a zero divisor aborts the run.
        Div = 0x30, "div";
        Or = 0x40, "or";
        And = 0x50, "and";
        Lsh = 0x60, "lsh";
        Rsh = 0x70, "rsh";
        /// Ignores its operand.
        Neg = 0x80, "neg";
        /// Unsigned; a zero divisor aborts the run.
        Mod = 0x90, "mod";
        Xor = 0xa0, "xor";
        Mov = 0xb0, "mov";
        Arsh = 0xc0, "arsh";
    }
}

impl AluOp {
    #[inline]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Neg)
    }
}

operation_table! {
    /// JMP class operations.
    ///
    /// Every comparison works on the full 64-bit registers. `Call` and `Exit`
    /// share the class but never branch.
    JmpOp {
        Ja = 0x00, "ja";
        Jeq = 0x10, "jeq";
        Jgt = 0x20, "jgt";
        Jge = 0x30, "jge";
        Jset = 0x40, "jset";
        Jne = 0x50, "jne";
        Jsgt = 0x60, "jsgt";
        Jsge = 0x70, "jsge";
        Call = 0x80, "call";
        Exit = 0x90, "exit";
        Jlt = 0xa0, "jlt";
        Jle = 0xb0, "jle";
        Jslt = 0xc0, "jslt";
        Jsle = 0xd0, "jsle";
    }
}

impl JmpOp {
    /// Whether this operation can move the program counter by its offset.
    #[inline]
    pub const fn is_branch(self) -> bool {
        !matches!(self, Self::Call | Self::Exit)
    }

    /// Branch condition. `Call` and `Exit` report `false`.
    #[inline]
    pub const fn taken(self, dst: u64, src: u64) -> bool {
        let (sdst, ssrc) = (dst as i64, src as i64);
        match self {
            Self::Ja => true,
            Self::Jeq => dst == src,
            Self::Jne => dst != src,
            Self::Jset => dst & src != 0,
            Self::Jgt => dst > src,
            Self::Jge => dst >= src,
            Self::Jlt => dst < src,
            Self::Jle => dst <= src,
            Self::Jsgt => sdst > ssrc,
            Self::Jsge => sdst >= ssrc,
            Self::Jslt => sdst < ssrc,
            Self::Jsle => sdst <= ssrc,
            Self::Call | Self::Exit => false,
        }
    }
}

/// Access width of LDX, ST and STX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemSize {
    Word = 0x00,
    Half = 0x08,
    Byte = 0x10,
    DWord = 0x18,
}

impl MemSize {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & SIZE_MASK {
            0x00 => Self::Word,
            0x08 => Self::Half,
            0x10 => Self::Byte,
            _ => Self::DWord,
        }
    }

    #[inline]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::DWord => 8,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Byte => "b",
            Self::Half => "h",
            Self::Word => "w",
            Self::DWord => "dw",
        }
    }
}

/// The double-slot loads.
///
/// The first slot holds the opcode, `dst` and the low 32 bits of the
/// constant. The second slot is never executed; only its `imm` field is read,
/// as the high 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WideLoad {
    /// `dst = imm64`
    Imm,
    /// `dst = &data[imm64]`
    Data,
    /// `dst = &rodata[imm64]`
    Rodata,
}

impl WideLoad {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            LDDW => Some(Self::Imm),
            LDDWD => Some(Self::Data),
            LDDWR => Some(Self::Rodata),
            _ => None,
        }
    }

    pub const fn opcode(self) -> u8 {
        match self {
            Self::Imm => LDDW,
            Self::Data => LDDWD,
            Self::Rodata => LDDWR,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Imm => "lddw",
            Self::Data => "lddwd",
            Self::Rodata => "lddwr",
        }
    }
}
