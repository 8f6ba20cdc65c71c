//! # Command line
//!
//! `catalog-contract run` executes the suite and exits non-zero when any
//! scenario fails or errors, so it can gate a CI pipeline.

mod run;

pub use run::{execute_run, list_groups};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ConfigOverrides;

pub const DEFAULT_STUB_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Parser)]
#[command(name = "catalog-contract")]
#[command(about = "Contract checks for a product catalog REST API", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "CATALOG_CONFIG",
        help = "Config file (defaults to ./catalog-contract.toml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log at debug level")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run scenario groups against the service")]
    Run(RunArgs),

    #[command(about = "List groups and scenarios")]
    List,

    #[command(about = "Serve the offline catalog stub until Ctrl-C")]
    Stub {
        #[arg(long, default_value = DEFAULT_STUB_BIND, help = "Address to listen on")]
        bind: String,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(short, long = "group", help = "Only run groups whose name contains this (repeatable)")]
    pub groups: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Report format on stdout")]
    pub format: OutputFormat,

    #[arg(long, help = "Also write the JSON report to this file")]
    pub report: Option<PathBuf>,

    #[arg(long, help = "Service base URL (overrides config)")]
    pub base_url: Option<String>,

    #[arg(long, help = "Per-request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,

    #[arg(long, help = "Maximum scenario groups in flight")]
    pub max_concurrency: Option<usize>,

    #[arg(long, help = "Retries after a transport failure")]
    pub retries: Option<u32>,

    #[arg(long, help = "Budget for the whole run in milliseconds")]
    pub run_timeout_ms: Option<u64>,

    #[arg(long, conflicts_with = "base_url", help = "Run against the built-in offline stub")]
    pub stub: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            timeout_ms: self.timeout_ms,
            max_concurrency: self.max_concurrency,
            retry_count: self.retries,
            run_timeout_ms: self.run_timeout_ms,
        }
    }
}

/// Output format for run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
