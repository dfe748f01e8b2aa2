//! Clap derive structures for the `retstat` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// retstat -- listing counts from RETS servers, as a time series
#[derive(Debug, Parser)]
#[command(
    name = "retstat",
    version,
    about = "Poll RETS servers for listing counts by status, type, and custom query",
    long_about = "Discovers each server's resources, classes, and status/type lookups once,\n\
        then periodically counts listings per lookup value and emits one JSON\n\
        event per server and cycle.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "RETSTAT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors and suppress non-event output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll every configured server until interrupted
    Run(RunArgs),

    /// Run a single stats cycle for every server and print the events
    Once(OnceArgs),

    /// Resolve metadata and print the discovered catalog
    #[command(alias = "cat")]
    Catalog(CatalogArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Append JSON lines to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct OnceArgs {
    /// Output format
    #[arg(long, short = 'f', default_value = "json")]
    pub format: EventFormat,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Output format
    #[arg(long, short = 'f', default_value = "table")]
    pub format: CatalogFormat,

    /// Only resolve the server with this code
    #[arg(long, short = 's')]
    pub server: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Output formats ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EventFormat {
    /// Pretty-printed JSON
    Json,
    /// One compact JSON object per line
    JsonLines,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CatalogFormat {
    /// Pretty table
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}
