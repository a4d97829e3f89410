//! Preflight command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rbpf::bytecode::Program;
use rbpf::verifier::Verifier;

use super::read_file;
use crate::host;

/// Run preflight on an image against the host's call table.
pub fn verify_image(input: &Path, allow_no_return: bool) -> Result<()> {
    println!("{} {}", "Verifying:".cyan(), input.display());

    let image = read_file(input, "image")?;
    let program = Program::parse(&image).with_context(|| format!("Invalid image: {}", input.display()))?;
    let runtime = host::runtime(None);
    let text = program.text();

    println!("  {} {}", "Instructions:".green(), text.len());
    println!("  {} {}", "Bound calls:".green(), runtime.calls().bound().count());

    let verifier = Verifier::new(runtime.calls()).allow_no_return(allow_no_return);
    match verifier.verify(text) {
        Ok(()) => {
            println!("\n{} Preflight passed", "✓".green().bold());
            Ok(())
        }
        Err(e) => {
            println!("  {} {} (code {})", "✗".red(), e, e.code());
            if let Some(insn) = e.insn_idx().and_then(|idx| text.get(idx)) {
                println!("  {} {}", "At:".yellow(), insn);
            }
            anyhow::bail!("Preflight failed");
        }
    }
}
