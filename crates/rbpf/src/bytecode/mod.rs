//! Instruction set and image format.
//!
//! rBPF bytecode is eBPF-shaped: eleven 64-bit registers and 8-byte
//! instruction slots. It adds two wide loads that resolve addresses inside
//! the image's data and rodata sections, and drops 32-bit jumps and byte
//! swaps.

pub mod insn;
pub mod opcode;
pub mod program;
pub mod registers;

pub use insn::{BpfInsn, WideInsn};
pub use opcode::{AluOp, JmpOp, MemSize, OpcodeClass, Operand, WideLoad};
pub use program::{ImageBuilder, ImageError, Line, Program, Text};
pub use registers::{Register, RegisterFile};
