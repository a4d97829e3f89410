//! Registers.
//!
//! | Register | At entry            | Role                          |
//! |----------|---------------------|-------------------------------|
//! | r0       | 0                   | host call result, exit value  |
//! | r1       | context address     | first host call argument      |
//! | r2-r5    | 0                   | host call arguments           |
//! | r6-r9    | 0                   | scratch                       |
//! | r10      | top of the stack    | frame pointer, grows down     |

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
}

impl Register {
    pub const COUNT: usize = 11;

    const ALL: [Self; Self::COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
    ];

    /// Decode a 4-bit register field; 11 to 15 do not name a register.
    #[inline]
    pub const fn from_raw(value: u8) -> Option<Self> {
        if (value as usize) < Self::COUNT {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", *self as u8)
    }
}

/// The eleven registers of one run. Nothing carries over between runs.
#[derive(Clone)]
pub struct RegisterFile([u64; Register::COUNT]);

impl RegisterFile {
    #[inline]
    pub const fn for_entry(ctx_addr: u64, stack_top: u64) -> Self {
        let mut values = [0; Register::COUNT];
        values[Register::R1 as usize] = ctx_addr;
        values[Register::R10 as usize] = stack_top;
        Self(values)
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u64 {
        self.0[reg as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u64) {
        self.0[reg as usize] = value;
    }

    /// r1 to r5, in order.
    #[inline]
    pub fn call_args(&self) -> [u64; 5] {
        let [_, a1, a2, a3, a4, a5, ..] = self.0;
        [a1, a2, a3, a4, a5]
    }

    #[inline]
    pub fn return_value(&self) -> u64 {
        self.get(Register::R0)
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (reg, value) in Register::ALL.iter().zip(self.0) {
            map.entry(&format_args!("{}", reg), &format_args!("{:#018x}", value));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_eleven_registers_decode() {
        assert_eq!(Register::from_raw(0), Some(Register::R0));
        assert_eq!(Register::from_raw(10), Some(Register::R10));
        assert_eq!(Register::from_raw(11), None);
        assert_eq!(Register::from_raw(15), None);
    }

    #[test]
    fn entry_state_seeds_context_and_stack() {
        let mut regs = RegisterFile::for_entry(0xdead, 0xbeef);
        assert_eq!(regs.get(Register::R1), 0xdead);
        assert_eq!(regs.get(Register::R10), 0xbeef);
        assert_eq!(regs.return_value(), 0);

        regs.set(Register::R3, 7);
        assert_eq!(regs.call_args(), [0xdead, 0, 7, 0, 0]);
    }
}
