use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(version)]
#[command(about = "Declarative node configuration - classify, compile, converge", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Site configuration file (defaults to ./site.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show which role a node is assigned
    Classify(ClassifyArgs),

    /// Compile node catalogs from the site configuration
    Compile(CompileArgs),

    /// Compile a node and converge it through the reconciliation engine
    Apply(ApplyArgs),

    /// Resolve a key through the layered lookup data for a node
    Lookup(LookupArgs),

    /// Load and validate the site configuration
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct ClassifyArgs {
    /// Node to classify
    #[arg(short, long)]
    pub node: String,
}

#[derive(clap::Args)]
pub struct CompileArgs {
    /// Node to compile
    #[arg(short, long, conflicts_with = "all")]
    pub node: Option<String>,

    /// Compile every configured node (in parallel)
    #[arg(long)]
    pub all: bool,

    /// Evaluate a single unit instead of the node's full role
    #[arg(long, requires = "node", conflicts_with = "all")]
    pub unit: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Node to apply
    #[arg(short, long)]
    pub node: String,

    /// Don't converge anything, only show what would change
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(clap::Args)]
pub struct LookupArgs {
    /// Node whose data layers to search
    #[arg(short, long)]
    pub node: String,

    /// Key to resolve
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,
    /// JSON catalog
    Json,
}
