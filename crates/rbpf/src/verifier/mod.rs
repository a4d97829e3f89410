//! Preflight Verifier
//!
//! A single linear pass over the text section, run once per VM before the
//! first execution:
//!
//! ```text
//!   text ──► length check ──► per instruction:         ──► terminal exit
//!                              - registers < 11            (unless the VM
//!                              - wide loads skip a slot      allows running
//!                              - branch target in range      off the end)
//!                              - call ID bound in table
//! ```
//!
//! Call IDs are checked against the same [`CallTable`](crate::call::CallTable)
//! the engine dispatches through, so a program that verifies can never reach
//! an unbound call.

mod core;
mod error;

pub use self::core::Verifier;
pub use error::{VerifyError, VerifyResult};
