//! Hook chain command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rbpf::bytecode::Program;
use rbpf::execution::Vm;
use rbpf::hook::{HookRegistry, HookTrigger};

use super::read_file;
use crate::config::Config;
use crate::host;

/// Install every configured hook, then fire `trigger` `rounds` times.
pub fn fire_hooks(config: &Config, trigger: &str, rounds: u32, ctx_path: Option<&Path>) -> Result<()> {
    let trigger: HookTrigger = trigger
        .parse()
        .with_context(|| format!("Invalid trigger: {}", trigger))?;
    if config.hooks.is_empty() {
        anyhow::bail!("No hooks configured; pass a config file with [[hooks]] entries");
    }

    let images = config
        .hooks
        .iter()
        .map(|hook| read_file(&hook.image, "hook image"))
        .collect::<Result<Vec<_>>>()?;
    let mut ctx = match ctx_path {
        Some(path) => read_file(path, "context")?,
        None => Vec::new(),
    };

    let runtime = host::runtime(config.store.capacity);
    let mut registry = HookRegistry::new();

    for (hook, image) in config.hooks.iter().zip(&images) {
        let program =
            Program::parse(image).with_context(|| format!("Invalid image: {}", hook.image.display()))?;
        let mut vm = Vm::new(program, &runtime).allow_no_return(config.vm.allow_no_return);
        if let Some(budget) = config.vm.branch_budget {
            vm = vm.branch_budget(budget);
        }
        let id = registry.install(hook.trigger()?, vm, hook.policy()?)?;
        println!(
            "  {} {} {} on {} ({})",
            "Installed".green(),
            id,
            hook.image.display(),
            hook.trigger,
            hook.policy
        );
    }

    println!("\n{} {} x{}", "Firing".cyan(), trigger, rounds);
    for round in 0..rounds {
        let run = registry.fire(trigger, &mut ctx);
        match run.result {
            Some(result) => println!("  round {}: {} hooks ran, last result {}", round, run.ran, result),
            None => println!("  round {}: no hooks", round),
        }
    }

    println!("\n{}", "Hooks".green());
    for t in HookTrigger::ALL {
        for info in registry.hooks(t) {
            println!(
                "  {} {:5} {:18} {} runs",
                info.id,
                t.to_string(),
                info.policy.to_string(),
                info.executions
            );
        }
    }

    println!("\n{}", "Global store".green());
    runtime.store().for_each_global(|key, value| {
        println!("  {:#010x} = {}", key, value);
    });

    Ok(())
}
