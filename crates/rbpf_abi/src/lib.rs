//! Wire-level ABI shared between the rBPF virtual machine and its hosts.
//!
//! Everything in here describes bytes and numbers that cross the boundary
//! between a compiled program image and the code that runs it: the image
//! header, the call ID namespace, result codes and flag words.

#![no_std]

mod call;
mod flags;
mod header;
mod result;

pub use call::*;
pub use flags::*;
pub use header::*;
pub use result::*;
