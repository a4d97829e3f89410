//! rBPF Host Runner
//!
//! Loads rBPF images from disk and runs them the way a device would: with
//! the library's built-in calls plus host-side time, formatting and timer
//! calls bound, and hook chains fired on demand.

mod commands;
mod config;
mod host;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "rbpf")]
#[command(version = "0.1.0")]
#[command(about = "Run and inspect rBPF program images", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header, sections and disassembly of an image
    Info {
        /// Program image (.rbpf)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run preflight against the host's call table
    Verify {
        /// Program image (.rbpf)
        #[arg(short, long)]
        input: PathBuf,

        /// Do not require a terminal exit instruction
        #[arg(long)]
        no_return: bool,
    },

    /// Execute an image once
    Run {
        /// Program image (.rbpf)
        #[arg(short, long)]
        input: PathBuf,

        /// File whose bytes become the context buffer
        #[arg(long)]
        ctx: Option<PathBuf>,

        /// Taken branches allowed per run
        #[arg(long)]
        budget: Option<u32>,

        /// Do not require a terminal exit instruction
        #[arg(long)]
        no_return: bool,

        /// Print the key/value store after the run
        #[arg(long)]
        dump_store: bool,
    },

    /// Install the configured hooks and fire a trigger
    Hooks {
        /// Trigger to fire (netif, sched)
        #[arg(short, long)]
        trigger: String,

        /// Number of times to fire
        #[arg(short, long, default_value_t = 1)]
        rounds: u32,

        /// File whose bytes become the context buffer
        #[arg(long)]
        ctx: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.verbose {
        println!("{}", "rbpf host runner v0.1.0".cyan().bold());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Info { input } => commands::info::show_info(&input),
        Commands::Verify { input, no_return } => {
            commands::verify::verify_image(&input, no_return || config.vm.allow_no_return)
        }
        Commands::Run {
            input,
            ctx,
            budget,
            no_return,
            dump_store,
        } => {
            let options = commands::run::RunOptions {
                budget: budget.or(config.vm.branch_budget),
                allow_no_return: no_return || config.vm.allow_no_return,
                store_capacity: config.store.capacity,
                dump_store,
                verbose: cli.verbose,
            };
            commands::run::run_image(&input, ctx.as_deref(), &options)
        }
        Commands::Hooks {
            trigger,
            rounds,
            ctx,
        } => commands::hooks::fire_hooks(&config, &trigger, rounds, ctx.as_deref()),
    }
}
