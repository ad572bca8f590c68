use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::stacks::StackTemplate;

#[derive(Parser)]
#[command(name = "stackforge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declare, preview and apply cloud resource stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stack config file (default: ~/.config/stackforge/stack.toml)
    #[arg(long, global = true, env = "STACKFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what `up` would change, without changing anything
    Preview(StackArgs),

    /// Preview, confirm and apply the stack
    Up(UpArgs),

    /// Print the identifiers the stack would request
    Names {
        /// Template to use instead of the configured one
        #[arg(long, value_enum)]
        template: Option<StackTemplate>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
pub struct StackArgs {
    /// Template to use instead of the configured one
    #[arg(long, value_enum)]
    pub template: Option<StackTemplate>,

    /// Only this resource and what it depends on (e.g. rg, app.web)
    #[arg(long)]
    pub target: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Make the simulated backend fail a kind tag or name (repeatable)
    #[arg(long = "fail", value_name = "KIND|NAME")]
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct UpArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Stop dispatching after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}
