//! Run command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rbpf::bytecode::Program;
use rbpf::execution::Vm;

use super::{hex_string, read_file};
use crate::host;

pub struct RunOptions {
    pub budget: Option<u32>,
    pub allow_no_return: bool,
    pub store_capacity: Option<usize>,
    pub dump_store: bool,
    pub verbose: bool,
}

/// Execute an image once and report the result.
pub fn run_image(input: &Path, ctx_path: Option<&Path>, options: &RunOptions) -> Result<()> {
    let image = read_file(input, "image")?;
    let program = Program::parse(&image).with_context(|| format!("Invalid image: {}", input.display()))?;
    let mut ctx = match ctx_path {
        Some(path) => read_file(path, "context")?,
        None => Vec::new(),
    };

    let runtime = host::runtime(options.store_capacity);
    let mut vm = Vm::new(program, &runtime).allow_no_return(options.allow_no_return);
    if let Some(budget) = options.budget {
        vm = vm.branch_budget(budget);
    }

    println!("{} {}", "Running:".cyan(), input.display());
    let result = vm.execute(&mut ctx);

    if options.verbose {
        println!("  {} {}", "Branches left:".cyan(), vm.branches_remaining());
        if !ctx.is_empty() {
            println!("  {} {}", "Context:".cyan(), hex_string(&ctx));
        }
    }

    if options.dump_store {
        println!("  {}", "Global store:".cyan());
        runtime.store().for_each_global(|key, value| {
            println!("    {:#010x} = {}", key, value);
        });
        println!("  {}", "Local store:".cyan());
        vm.for_each_local(|key, value| {
            println!("    {:#010x} = {}", key, value);
        });
        println!(
            "  {} {}/{}",
            "Pool:".cyan(),
            runtime.store().in_use(),
            runtime.store().capacity()
        );
    }

    match result {
        Ok(r0) => {
            println!("  {} {}", "Result:".green(), r0);
            Ok(())
        }
        Err(e) => {
            println!("  {} {} (code {})", "✗".red(), e, e.code());
            anyhow::bail!("Program failed");
        }
    }
}
