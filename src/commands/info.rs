//! Image info command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rbpf::bytecode::{Line, Program};

use super::read_file;

/// Show the header, sections and disassembly of an image.
pub fn show_info(input: &Path) -> Result<()> {
    let image = read_file(input, "image")?;
    let program = Program::parse(&image).with_context(|| format!("Invalid image: {}", input.display()))?;
    let header = program.header();

    println!("{} {}\n", "Image Info:".cyan().bold(), input.display());

    println!("  {} {:#010x}", "Magic:".cyan(), header.magic.get());
    println!("  {} {}", "Version:".cyan(), header.version.get());
    println!("  {} 0x{:02x}", "Flags:".cyan(), header.flags.get());
    println!("  {} {}", "Functions:".cyan(), header.function_count.get());
    println!();
    println!("  {} {} bytes", "Data:".cyan(), program.data().len());
    println!("  {} {} bytes", "Rodata:".cyan(), program.rodata().len());

    let text = program.text();
    println!(
        "  {} {} bytes ({} instructions)",
        "Text:".cyan(),
        text.len_bytes(),
        text.len()
    );
    if !text.is_well_formed() {
        println!("  {} Text length is not a whole number of instructions", "!".yellow());
    }

    println!();
    println!("{}", "Disassembly".green());
    println!();
    for (idx, line) in text.listing() {
        match line {
            Line::Truncated(_) => println!("  {:4}: {}", idx, line.to_string().red()),
            _ => println!("  {:4}: {}", idx, line),
        }
    }

    Ok(())
}
