//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::delta::UpdatePolicy;

/// StoryDelta - story-to-wiki delta planner
#[derive(Parser)]
#[command(
    name = "sd",
    about = "Plan wiki page updates from new story text",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan page creations and updates for a story file
    Plan {
        /// Story markdown file
        #[arg(short, long)]
        story: PathBuf,

        /// Vault root holding the existing pages
        #[arg(short, long, default_value = ".")]
        vault: PathBuf,

        /// Vault-relative folder for new pages (overrides config)
        #[arg(short, long)]
        folder: Option<String>,

        /// Update policy: safe_append or structured_merge (overrides config)
        #[arg(short, long)]
        policy: Option<UpdatePolicy>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Print a diff preview for every planned page
        #[arg(long)]
        diff: bool,

        /// Write the planned pages into the vault
        #[arg(long)]
        apply: bool,
    },

    /// Show how a story file is split into chunks
    Chunks {
        /// Story markdown file
        #[arg(short, long)]
        story: PathBuf,

        /// Maximum characters per chunk (overrides config)
        #[arg(short, long)]
        max_chars: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Preview the line diff between two files
    Diff {
        /// Previous version
        old: PathBuf,

        /// Next version
        new: PathBuf,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storydelta")
        .join("logs")
        .join("storydelta.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for plan/chunks commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
