mod backend;
mod cli;
mod commands;
mod config;
mod factory;
mod progress;
mod stacks;
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
    pub config: Option<PathBuf>,
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

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli
            .config
            .map(|path| path.to_str().map_or_else(|| path.clone(), config::expand_path)),
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Preview(args) => commands::deploy::preview(&ctx, &args),
        Command::Up(args) => commands::deploy::up(&ctx, &args),
        Command::Names { template } => commands::names::run(&ctx, template),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stackforge", &mut io::stdout());
            Ok(())
        }
    }
}
