mod backend;
mod cli;
mod commands;
mod config;
mod handler;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Declaration file
    pub file: PathBuf,
    /// Directory holding `state.toml` and simulated bucket contents
    pub state_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let state_dir = match &cli.state_dir {
        Some(dir) => paths::expand(&dir.to_string_lossy()),
        None => paths::state_dir()?,
    };

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        file: cli.file,
        state_dir,
    };
    log::debug!(
        "Using {} with state in {} (verbosity {})",
        ctx.file.display(),
        ctx.state_dir.display(),
        ctx.verbose
    );

    match cli.command {
        Command::Validate => commands::plan::validate(&ctx),
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Apply(args) => commands::apply::apply(&ctx, args),
        Command::Destroy(args) => commands::apply::destroy(&ctx, args),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Invoke(args) => commands::invoke::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "strata", &mut io::stdout());
            Ok(())
        }
    }
}
