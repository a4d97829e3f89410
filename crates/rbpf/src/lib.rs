//! rBPF: a bounded eBPF-style virtual machine for constrained devices
//!
//! Small, untrusted scripts (sensor logic, packet filters, CoAP handlers) are
//! shipped as flat images and run by an interpreter that checks every memory
//! access against a table of capability regions. Nothing the script does can
//! reach memory the host did not hand to it.
//!
//! # Architecture
//!
//! ```text
//!   image bytes ──► Program ──► Vm::setup ──► preflight ──► run loop
//!                                  │                          │
//!                            MemoryMap (stack,          CallTable ──► host fns
//!                            data, rodata, ctx,               │
//!                            extras)                       KvStore
//!                                                             │
//!                          HookRegistry ──► Vm::execute ... ◄─┘
//! ```
//!
//! # Modules
//!
//! - [`profile`] - Build-time resource envelopes
//! - [`bytecode`] - Instruction set, registers and program images
//! - [`memory`] - Capability regions and the checked address space
//! - [`verifier`] - One-time preflight validation
//! - [`execution`] - The VM instance and its run loop
//! - [`call`] - Host call dispatch table and built-in calls
//! - [`store`] - Fixed-capacity key/value store
//! - [`hook`] - Per-trigger hook chains
//!
//! # Quick Start
//!
//! ```ignore
//! use rbpf::bytecode::{BpfInsn, ImageBuilder, Program};
//! use rbpf::execution::Vm;
//! use rbpf::Runtime;
//!
//! let image = ImageBuilder::new()
//!     .insn(BpfInsn::mov64_imm(0, 42))
//!     .insn(BpfInsn::exit())
//!     .build()
//!     .expect("image fits");
//! let program = Program::parse(&image).expect("valid image");
//!
//! let runtime = Runtime::new();
//! let mut vm = Vm::new(program, &runtime);
//! assert_eq!(vm.execute(&mut []), Ok(42));
//! ```

#![no_std]

extern crate alloc;

#[cfg(all(feature = "host-profile", feature = "embedded-profile"))]
compile_error!(
    "Cannot enable both `host-profile` and `embedded-profile` features simultaneously. \
     Select exactly one profile at build time."
);

#[cfg(not(any(feature = "host-profile", feature = "embedded-profile")))]
compile_error!(
    "Must enable either `host-profile` or `embedded-profile` feature. \
     Use `--no-default-features --features host-profile` to build for hosts."
);

pub mod bytecode;
pub mod call;
pub mod execution;
pub mod hook;
pub mod memory;
pub mod profile;
pub mod store;
pub mod verifier;

mod runtime;

pub use runtime::Runtime;
