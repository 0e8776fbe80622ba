use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::paths;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative infrastructure plans: resolve, order and apply resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Declaration file
    #[arg(short, long, global = true, env = paths::ENV_FILE, default_value = paths::DEFAULT_FILE)]
    pub file: PathBuf,

    /// State directory (defaults to $STRATA_STATE_DIR or ~/.local/state/strata)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check declarations for unknown kinds, dangling references and cycles
    Validate,

    /// Preview what apply would change
    Plan(PlanArgs),

    /// Make provisioned resources match the declarations
    Apply(ApplyArgs),

    /// Tear down recorded resources
    Destroy(ApplyArgs),

    /// Inspect or edit recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Run the record handler for a provisioned function
    Invoke(InvokeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Only plan these resources and their dependencies ("id", "kind" or "kind.id")
    #[arg(short, long)]
    pub target: Vec<String>,

    /// Plan a teardown instead
    #[arg(long)]
    pub destroy: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only touch these resources ("id", "kind" or "kind.id")
    #[arg(short, long)]
    pub target: Vec<String>,

    /// Number of parallel jobs (overrides [settings] jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Attempts per backend call for transient errors (overrides [settings.retry])
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded resources
    List,

    /// Show one recorded resource
    Show {
        /// Resource identifier
        id: String,
    },

    /// Forget a resource without destroying it
    Rm {
        /// Resource identifier
        id: String,
    },
}

#[derive(Args)]
pub struct InvokeArgs {
    /// Function resource identifier
    pub function: String,

    /// Event payload as JSON
    #[arg(short, long, default_value = "{}")]
    pub event: String,
}
