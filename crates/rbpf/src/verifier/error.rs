//! Verification Errors

use rbpf_abi::{
    RBPF_ILLEGAL_CALL, RBPF_ILLEGAL_JUMP, RBPF_ILLEGAL_LEN, RBPF_ILLEGAL_REGISTER, RBPF_NO_RETURN,
};
use thiserror::Error;

/// Reasons a program fails preflight.
///
/// A program that fails preflight is never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Text section is empty or not a whole number of instructions.
    #[error("text section of {len} bytes is not a whole number of instructions")]
    IllegalLength { len: usize },

    /// Wide load in the last slot, missing its second half.
    #[error("wide load at {insn_idx} runs past the end of the text section")]
    TruncatedWideLoad { insn_idx: usize },

    /// Register index outside R0-R10.
    #[error("illegal register r{reg} at {insn_idx}")]
    IllegalRegister { insn_idx: usize, reg: u8 },

    /// Branch target outside the program.
    #[error("jump at {insn_idx} targets {target}, outside the program")]
    IllegalJump { insn_idx: usize, target: i64 },

    /// Call to an ID with no bound handler.
    #[error("call at {insn_idx} to unknown id {call_id:#x}")]
    IllegalCall { insn_idx: usize, call_id: i32 },

    /// Last instruction is not an exit.
    #[error("program does not end with an exit instruction")]
    NoReturn,
}

impl VerifyError {
    /// The negative result code reported for this failure.
    pub const fn code(&self) -> i32 {
        match self {
            Self::IllegalLength { .. } | Self::TruncatedWideLoad { .. } => RBPF_ILLEGAL_LEN,
            Self::IllegalRegister { .. } => RBPF_ILLEGAL_REGISTER,
            Self::IllegalJump { .. } => RBPF_ILLEGAL_JUMP,
            Self::IllegalCall { .. } => RBPF_ILLEGAL_CALL,
            Self::NoReturn => RBPF_NO_RETURN,
        }
    }

    /// Index of the offending instruction, if the failure has one.
    pub const fn insn_idx(&self) -> Option<usize> {
        match self {
            Self::TruncatedWideLoad { insn_idx }
            | Self::IllegalRegister { insn_idx, .. }
            | Self::IllegalJump { insn_idx, .. }
            | Self::IllegalCall { insn_idx, .. } => Some(*insn_idx),
            Self::IllegalLength { .. } | Self::NoReturn => None,
        }
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
