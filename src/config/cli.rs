use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tracker-import")]
#[command(about = "Incrementally import issues from an external issue tracker")]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "import.toml")]
    pub config: String,

    /// Kinds to import, overriding the configuration (e.g. labels,issues)
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Validate the configuration and show the plan without importing
    #[arg(long)]
    pub dry_run: bool,
}
