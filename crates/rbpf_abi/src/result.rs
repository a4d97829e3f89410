//! Result codes returned from the run entry point.
//!
//! Zero and positive values are successful script results; the negative
//! values below report why a program was rejected or aborted.

pub const RBPF_OK: i32 = 0;
pub const RBPF_ILLEGAL_INSTRUCTION: i32 = -1;
pub const RBPF_ILLEGAL_MEM: i32 = -2;
pub const RBPF_ILLEGAL_JUMP: i32 = -3;
pub const RBPF_ILLEGAL_CALL: i32 = -4;
pub const RBPF_ILLEGAL_LEN: i32 = -5;
pub const RBPF_ILLEGAL_REGISTER: i32 = -6;
pub const RBPF_NO_RETURN: i32 = -7;
pub const RBPF_OUT_OF_BRANCHES: i32 = -8;
pub const RBPF_ILLEGAL_DIV: i32 = -9;
