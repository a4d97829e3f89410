//! Program Execution
//!
//! A [`Vm`] binds one program image to a [`Runtime`](crate::Runtime) and runs
//! it on demand. Each run:
//!
//! 1. builds the memory map (extra regions, stack, rodata, data, context)
//! 2. checks the stack is mapped writable and seeds r1 and r10
//! 3. resets the branch budget
//! 4. interprets until `exit`, an error, or budget exhaustion
//!
//! There is a single engine: a `match` over the decoded instruction class.
//! Failures abort the run immediately and surface as a [`VmError`], whose
//! [`code`](VmError::code) is the negative result code hosts report.

mod interpreter;
mod vm;

use rbpf_abi::{
    RBPF_ILLEGAL_CALL, RBPF_ILLEGAL_DIV, RBPF_ILLEGAL_INSTRUCTION, RBPF_ILLEGAL_JUMP,
    RBPF_ILLEGAL_MEM, RBPF_ILLEGAL_REGISTER, RBPF_OUT_OF_BRANCHES,
};
use thiserror::Error;

pub use vm::Vm;

use crate::memory::{AccessDenied, RegionError};
use crate::verifier::VerifyError;

/// Why a run did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VmError {
    /// Opcode outside the instruction set.
    #[error("illegal instruction {opcode:#04x} at {pc}")]
    IllegalInstruction { pc: usize, opcode: u8 },

    /// Load or store no region grants.
    #[error("illegal memory access at {pc}: {access}")]
    IllegalMem { pc: usize, access: AccessDenied },

    /// Control left the program.
    #[error("jump at {pc} leaves the program")]
    IllegalJump { pc: usize },

    #[error("call at {pc} to unbound id {call_id:#x}")]
    IllegalCall { pc: usize, call_id: i32 },

    #[error("illegal register at {pc}")]
    IllegalRegister { pc: usize },

    /// The run took more branches than its budget.
    #[error("out of branches")]
    OutOfBranches,

    /// Division or modulo by zero.
    #[error("division by zero at {pc}")]
    IllegalDiv { pc: usize },

    /// The memory map could not be assembled.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// Preflight failed; the program never ran.
    #[error("preflight failed: {0}")]
    Verify(#[from] VerifyError),
}

impl VmError {
    /// The negative result code reported for this failure.
    pub const fn code(&self) -> i32 {
        match self {
            Self::IllegalInstruction { .. } => RBPF_ILLEGAL_INSTRUCTION,
            Self::IllegalMem { .. } | Self::Region(_) => RBPF_ILLEGAL_MEM,
            Self::IllegalJump { .. } => RBPF_ILLEGAL_JUMP,
            Self::IllegalCall { .. } => RBPF_ILLEGAL_CALL,
            Self::IllegalRegister { .. } => RBPF_ILLEGAL_REGISTER,
            Self::OutOfBranches => RBPF_OUT_OF_BRANCHES,
            Self::IllegalDiv { .. } => RBPF_ILLEGAL_DIV,
            Self::Verify(e) => e.code(),
        }
    }
}

/// Result of one run: r0 on success.
pub type VmResult = Result<i64, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_abi() {
        assert_eq!(VmError::OutOfBranches.code(), -8);
        assert_eq!(VmError::IllegalDiv { pc: 0 }.code(), -9);
        assert_eq!(
            VmError::IllegalMem {
                pc: 3,
                access: AccessDenied { addr: 0, len: 8 }
            }
            .code(),
            -2
        );
        assert_eq!(VmError::from(VerifyError::NoReturn).code(), -7);
    }
}
