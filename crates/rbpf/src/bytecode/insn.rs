//! Instruction slots.
//!
//! ```text
//! byte    0        1          2..4       4..8
//!      +--------+---------+----------+----------+
//!      | opcode | src|dst |  offset  |   imm    |
//!      +--------+---------+----------+----------+
//!                 hi   lo    i16 LE     i32 LE
//! ```
//!
//! A wide load takes two slots (see [`WideInsn`]); every other instruction
//! takes one.

use core::fmt;

use super::opcode::{
    self, AluOp, JmpOp, MemSize, OpcodeClass, Operand, WideLoad, MODE_MASK, MODE_MEM, SRC_REG,
};
use super::registers::Register;

/// One 8-byte text slot.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct BpfInsn {
    pub opcode: u8,
    /// `src << 4 | dst`
    pub regs: u8,
    pub offset: i16,
    pub imm: i32,
}

/// Generates encoders from an operation and a class.
macro_rules! encoders {
    (alu_imm: $( $name:ident = $op:ident, $class:ident; )*) => {
        $(
            #[inline]
            pub const fn $name(dst: u8, imm: i32) -> Self {
                Self::new(AluOp::$op as u8 | OpcodeClass::$class as u8, dst, 0, 0, imm)
            }
        )*
    };
    (alu_reg: $( $name:ident = $op:ident, $class:ident; )*) => {
        $(
            #[inline]
            pub const fn $name(dst: u8, src: u8) -> Self {
                Self::new(AluOp::$op as u8 | SRC_REG | OpcodeClass::$class as u8, dst, src, 0, 0)
            }
        )*
    };
    (jmp_imm: $( $name:ident = $op:ident; )*) => {
        $(
            #[inline]
            pub const fn $name(dst: u8, imm: i32, offset: i16) -> Self {
                Self::new(JmpOp::$op as u8 | OpcodeClass::Jmp as u8, dst, 0, offset, imm)
            }
        )*
    };
    (jmp_reg: $( $name:ident = $op:ident; )*) => {
        $(
            #[inline]
            pub const fn $name(dst: u8, src: u8, offset: i16) -> Self {
                Self::new(JmpOp::$op as u8 | SRC_REG | OpcodeClass::Jmp as u8, dst, src, offset, 0)
            }
        )*
    };
}

impl BpfInsn {
    pub const SIZE: usize = 8;

    #[inline]
    pub const fn new(opcode: u8, dst: u8, src: u8, offset: i16, imm: i32) -> Self {
        Self {
            opcode,
            regs: (src << 4) | (dst & 0x0f),
            offset,
            imm,
        }
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        let [opcode, regs, o0, o1, i0, i1, i2, i3] = bytes;
        Self {
            opcode,
            regs,
            offset: i16::from_le_bytes([o0, o1]),
            imm: i32::from_le_bytes([i0, i1, i2, i3]),
        }
    }

    #[inline]
    pub const fn to_bytes(&self) -> [u8; 8] {
        let [o0, o1] = self.offset.to_le_bytes();
        let [i0, i1, i2, i3] = self.imm.to_le_bytes();
        [self.opcode, self.regs, o0, o1, i0, i1, i2, i3]
    }

    /// Raw `dst` field, possibly 11 to 15.
    #[inline]
    pub const fn dst_reg(&self) -> u8 {
        self.regs & 0x0f
    }

    /// Raw `src` field, possibly 11 to 15.
    #[inline]
    pub const fn src_reg(&self) -> u8 {
        self.regs >> 4
    }

    #[inline]
    pub fn dst(&self) -> Option<Register> {
        Register::from_raw(self.dst_reg())
    }

    #[inline]
    pub fn src(&self) -> Option<Register> {
        Register::from_raw(self.src_reg())
    }

    #[inline]
    pub const fn class(&self) -> Option<OpcodeClass> {
        OpcodeClass::from_opcode(self.opcode)
    }

    #[inline]
    pub const fn operand(&self) -> Operand {
        Operand::from_opcode(self.opcode)
    }

    /// First slot of a wide load.
    #[inline]
    pub const fn is_wide(&self) -> bool {
        WideLoad::from_opcode(self.opcode).is_some()
    }

    #[inline]
    pub const fn is_alu64(&self) -> bool {
        matches!(self.class(), Some(OpcodeClass::Alu64))
    }

    #[inline]
    pub const fn is_exit(&self) -> bool {
        self.opcode == opcode::EXIT
    }

    #[inline]
    pub const fn is_call(&self) -> bool {
        self.opcode == opcode::CALL
    }

    #[inline]
    pub const fn alu_op(&self) -> Option<AluOp> {
        match self.class() {
            Some(OpcodeClass::Alu32 | OpcodeClass::Alu64) => AluOp::from_opcode(self.opcode),
            _ => None,
        }
    }

    #[inline]
    pub const fn jmp_op(&self) -> Option<JmpOp> {
        match self.class() {
            Some(OpcodeClass::Jmp) => JmpOp::from_opcode(self.opcode),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_branch(&self) -> bool {
        match self.jmp_op() {
            Some(op) => op.is_branch(),
            None => false,
        }
    }

    /// Slot a taken branch at `idx` lands on. May be out of range.
    #[inline]
    pub const fn branch_target(&self, idx: usize) -> i64 {
        idx as i64 + 1 + self.offset as i64
    }

    /// Access width of an LDX, ST or STX in `[reg + offset]` mode.
    ///
    /// `None` for other classes and for any other addressing mode.
    #[inline]
    pub const fn mem_size(&self) -> Option<MemSize> {
        match self.class() {
            Some(OpcodeClass::Ldx | OpcodeClass::St | OpcodeClass::Stx)
                if self.opcode & MODE_MASK == MODE_MEM =>
            {
                Some(MemSize::from_opcode(self.opcode))
            }
            _ => None,
        }
    }

    #[inline]
    pub const fn exit() -> Self {
        Self::new(opcode::EXIT, 0, 0, 0, 0)
    }

    #[inline]
    pub const fn call(call_id: i32) -> Self {
        Self::new(opcode::CALL, 0, 0, 0, call_id)
    }

    #[inline]
    pub const fn ja(offset: i16) -> Self {
        Self::new(opcode::JA, 0, 0, offset, 0)
    }

    #[inline]
    pub const fn neg64(dst: u8) -> Self {
        Self::new(AluOp::Neg as u8 | OpcodeClass::Alu64 as u8, dst, 0, 0, 0)
    }

    encoders! { alu_imm:
        mov64_imm = Mov, Alu64;
        mov32_imm = Mov, Alu32;
        add64_imm = Add, Alu64;
        add32_imm = Add, Alu32;
        sub64_imm = Sub, Alu64;
        mul64_imm = Mul, Alu64;
        div64_imm = Div, Alu64;
        mod64_imm = Mod, Alu64;
        and64_imm = And, Alu64;
        or64_imm = Or, Alu64;
        xor64_imm = Xor, Alu64;
        lsh64_imm = Lsh, Alu64;
        rsh64_imm = Rsh, Alu64;
        arsh64_imm = Arsh, Alu64;
    }

    encoders! { alu_reg:
        mov64_reg = Mov, Alu64;
        add64_reg = Add, Alu64;
        div64_reg = Div, Alu64;
    }

    encoders! { jmp_imm:
        jeq_imm = Jeq;
        jne_imm = Jne;
        jgt_imm = Jgt;
        jslt_imm = Jslt;
    }

    encoders! { jmp_reg:
        jeq_reg = Jeq;
    }

    /// `dst = *(size *)(src + offset)`
    #[inline]
    pub const fn ldx(size: MemSize, dst: u8, src: u8, offset: i16) -> Self {
        Self::new(MODE_MEM | size as u8 | OpcodeClass::Ldx as u8, dst, src, offset, 0)
    }

    /// `*(size *)(dst + offset) = src`
    #[inline]
    pub const fn stx(size: MemSize, dst: u8, src: u8, offset: i16) -> Self {
        Self::new(MODE_MEM | size as u8 | OpcodeClass::Stx as u8, dst, src, offset, 0)
    }

    /// `*(size *)(dst + offset) = imm`
    #[inline]
    pub const fn st(size: MemSize, dst: u8, offset: i16, imm: i32) -> Self {
        Self::new(MODE_MEM | size as u8 | OpcodeClass::St as u8, dst, 0, offset, imm)
    }
}

impl fmt::Debug for BpfInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BpfInsn({:#04x} r{} r{} {:+} {:#x})",
            self.opcode,
            self.dst_reg(),
            self.src_reg(),
            self.offset,
            self.imm
        )
    }
}

/// `[rN+off]`
struct MemOperand(u8, i16);

impl fmt::Display for MemOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[r{}{:+}]", self.0, self.1)
    }
}

/// Second operand of an ALU or JMP instruction.
struct Source<'i>(&'i BpfInsn);

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.operand() {
            Operand::Imm => write!(f, "{}", self.0.imm),
            Operand::Reg => write!(f, "r{}", self.0.src_reg()),
        }
    }
}

impl fmt::Display for BpfInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dst, src) = (self.dst_reg(), self.src_reg());

        if let Some(wide) = WideLoad::from_opcode(self.opcode) {
            // low half only; see WideInsn for the full constant
            return write!(f, "{} r{}, {:#x}", wide.mnemonic(), dst, self.imm as u32);
        }
        if let Some(op) = self.alu_op() {
            let width = if self.is_alu64() { "" } else { "32" };
            return if op.is_unary() {
                write!(f, "{}{} r{}", op, width, dst)
            } else {
                write!(f, "{}{} r{}, {}", op, width, dst, Source(self))
            };
        }
        if let Some(op) = self.jmp_op() {
            return match op {
                JmpOp::Exit if self.is_exit() => f.write_str("exit"),
                JmpOp::Call if self.is_call() => write!(f, "call {:#x}", self.imm),
                JmpOp::Ja => write!(f, "ja {:+}", self.offset),
                op if op.is_branch() => {
                    write!(f, "{} r{}, {}, {:+}", op, dst, Source(self), self.offset)
                }
                _ => write!(f, "{}?? {:#04x}", op, self.opcode),
            };
        }
        if let Some(size) = self.mem_size() {
            let sfx = size.suffix();
            return match self.class() {
                Some(OpcodeClass::Ldx) => {
                    write!(f, "ldx{} r{}, {}", sfx, dst, MemOperand(src, self.offset))
                }
                Some(OpcodeClass::Stx) => {
                    write!(f, "stx{} {}, r{}", sfx, MemOperand(dst, self.offset), src)
                }
                _ => write!(f, "st{} {}, {}", sfx, MemOperand(dst, self.offset), self.imm),
            };
        }

        write!(f, ".insn {:#04x}, r{}, r{}, {}, {}", self.opcode, dst, src, self.offset, self.imm)
    }
}

/// Both slots of a wide load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideInsn {
    pub insn: BpfInsn,
    /// Only `imm` is meaningful: the high 32 bits of the constant.
    pub next: BpfInsn,
}

impl WideInsn {
    #[inline]
    pub const fn from_slots(insn: BpfInsn, next: BpfInsn) -> Self {
        Self { insn, next }
    }

    #[inline]
    pub const fn imm64(&self) -> u64 {
        ((self.next.imm as u32 as u64) << 32) | self.insn.imm as u32 as u64
    }

    #[inline]
    pub const fn new(kind: WideLoad, dst: u8, imm64: u64) -> Self {
        Self {
            insn: BpfInsn::new(kind.opcode(), dst, 0, 0, imm64 as i32),
            next: BpfInsn::new(0, 0, 0, 0, (imm64 >> 32) as i32),
        }
    }

    #[inline]
    pub const fn ld_dw_imm(dst: u8, imm64: u64) -> Self {
        Self::new(WideLoad::Imm, dst, imm64)
    }

    /// `dst` gets the address of `data[offset]`.
    #[inline]
    pub const fn ld_dw_data(dst: u8, offset: u64) -> Self {
        Self::new(WideLoad::Data, dst, offset)
    }

    /// `dst` gets the address of `rodata[offset]`.
    #[inline]
    pub const fn ld_dw_rodata(dst: u8, offset: u64) -> Self {
        Self::new(WideLoad::Rodata, dst, offset)
    }
}

impl fmt::Display for WideInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = WideLoad::from_opcode(self.insn.opcode).map_or("ld", WideLoad::mnemonic);
        write!(f, "{} r{}, {:#x}", mnemonic, self.insn.dst_reg(), self.imm64())
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn slot_is_eight_bytes() {
        assert_eq!(core::mem::size_of::<BpfInsn>(), BpfInsn::SIZE);
    }

    #[test]
    fn wire_encoding() {
        let insn = BpfInsn::new(0x15, 1, 2, -2, 0x0102_0304);
        let bytes = insn.to_bytes();
        assert_eq!(bytes, [0x15, 0x21, 0xfe, 0xff, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(BpfInsn::from_bytes(bytes), insn);
        assert_eq!(insn.dst_reg(), 1);
        assert_eq!(insn.src_reg(), 2);
    }

    #[test]
    fn encoders_match_known_opcodes() {
        assert_eq!(BpfInsn::mov64_imm(0, 0).opcode, 0xb7);
        assert_eq!(BpfInsn::mov64_reg(0, 1).opcode, 0xbf);
        assert_eq!(BpfInsn::mov32_imm(0, 0).opcode, 0xb4);
        assert_eq!(BpfInsn::div64_reg(0, 1).opcode, 0x3f);
        assert_eq!(BpfInsn::neg64(0).opcode, 0x87);
        assert_eq!(BpfInsn::jeq_reg(0, 1, 0).opcode, 0x1d);
        assert_eq!(BpfInsn::jslt_imm(0, 0, 0).opcode, 0xc5);
        assert_eq!(BpfInsn::ldx(MemSize::Word, 0, 1, 0).opcode, 0x61);
        assert_eq!(BpfInsn::st(MemSize::DWord, 0, 0, 0).opcode, 0x7a);
        assert_eq!(BpfInsn::stx(MemSize::Byte, 0, 1, 0).opcode, 0x73);
    }

    #[test]
    fn exit_and_call_do_not_branch() {
        assert!(BpfInsn::exit().is_exit());
        assert!(!BpfInsn::exit().is_branch());
        assert!(BpfInsn::call(0x10).is_call());
        assert!(!BpfInsn::call(0x10).is_branch());
        assert!(BpfInsn::ja(-1).is_branch());
    }

    #[test]
    fn branch_target_is_relative_to_next_slot() {
        assert_eq!(BpfInsn::ja(0).branch_target(3), 4);
        assert_eq!(BpfInsn::ja(-1).branch_target(3), 3);
        assert_eq!(BpfInsn::ja(-5).branch_target(3), -1);
    }

    #[test]
    fn memory_mode_is_required() {
        assert_eq!(BpfInsn::ldx(MemSize::Half, 0, 1, 0).mem_size(), Some(MemSize::Half));
        // 0x20 is ABS mode, which rBPF does not execute
        assert_eq!(BpfInsn::new(0x21, 0, 1, 0, 0).mem_size(), None);
        assert_eq!(BpfInsn::mov64_imm(0, 0).mem_size(), None);
    }

    #[test]
    fn disassembly() {
        let cases = [
            (BpfInsn::exit(), "exit"),
            (BpfInsn::call(0x10), "call 0x10"),
            (BpfInsn::mov64_imm(0, 42), "mov r0, 42"),
            (BpfInsn::add32_imm(2, -1), "add32 r2, -1"),
            (BpfInsn::add64_reg(2, 3), "add r2, r3"),
            (BpfInsn::neg64(3), "neg r3"),
            (BpfInsn::jeq_imm(1, 0, 2), "jeq r1, 0, +2"),
            (BpfInsn::jeq_reg(1, 4, -3), "jeq r1, r4, -3"),
            (BpfInsn::ja(-1), "ja -1"),
            (BpfInsn::ldx(MemSize::Word, 0, 1, 4), "ldxw r0, [r1+4]"),
            (BpfInsn::stx(MemSize::DWord, 10, 1, -8), "stxdw [r10-8], r1"),
            (BpfInsn::st(MemSize::Byte, 10, -1, 7), "stb [r10-1], 7"),
        ];
        for (insn, text) in cases {
            assert_eq!(format!("{}", insn), text);
        }
    }

    #[test]
    fn wide_loads_split_the_constant() {
        let wide = WideInsn::ld_dw_imm(0, 0x1234_5678_9abc_def0);
        assert!(wide.insn.is_wide());
        assert!(!wide.next.is_wide());
        assert_eq!(wide.insn.imm as u32, 0x9abc_def0);
        assert_eq!(wide.next.imm as u32, 0x1234_5678);
        assert_eq!(wide.imm64(), 0x1234_5678_9abc_def0);
        assert_eq!(format!("{}", wide), "lddw r0, 0x123456789abcdef0");

        let rodata = WideInsn::ld_dw_rodata(2, 16);
        assert_eq!(format!("{}", rodata), "lddwr r2, 0x10");
    }
}
