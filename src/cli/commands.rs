use crate::process::{LogEntry, ServerDefinition, SupervisorState};
use crate::update::UpdateCheck;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// go-mcp-supervisor - keeps the go-mcp-server helper installed, current and running
#[derive(Parser, Debug)]
#[command(name = "go-mcp-supervisor")]
#[command(about = "Supervises the go-mcp-server helper binary")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of ~/.go-mcp-supervisor/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server and accept start/stop/restart/status/quit on stdin
    Run {
        /// Answer every prompt with its first choice
        #[arg(short, long)]
        yes: bool,
    },

    /// Compare the installed helper with the latest release
    CheckUpdate {
        /// Install an available update without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Print where the helper binary is installed
    Locate,

    /// Show the helper's output log
    Logs {
        /// Number of lines to show from the end
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },

    /// Print the effective configuration
    Config,
}

/// CLI command execution result
#[derive(Debug)]
pub enum CliResult {
    Success(String),
    Error(String),
}

impl std::fmt::Display for CliResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliResult::Success(msg) => write!(f, "{msg}"),
            CliResult::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl From<UpdateCheck> for CliResult {
    fn from(check: UpdateCheck) -> Self {
        match check {
            UpdateCheck::ToolMissing => {
                CliResult::Error("Tool is not installed; nothing to update".to_string())
            }
            UpdateCheck::Skipped => {
                CliResult::Success("Could not determine versions; update check skipped".to_string())
            }
            UpdateCheck::UpToDate(versions) => {
                CliResult::Success(format!("Up to date ({})", versions.short_local()))
            }
            UpdateCheck::Declined(versions) => CliResult::Success(format!(
                "Update available: {} -> {}",
                versions.short_local(),
                versions.short_remote()
            )),
            UpdateCheck::Updated(versions) => {
                CliResult::Success(format!("Updated to {}", versions.short_remote()))
            }
            UpdateCheck::UpdateFailed(error) => CliResult::Error(format!("Update failed: {error}")),
        }
    }
}

pub fn format_status(state: &SupervisorState) -> String {
    match state {
        SupervisorState::Running { pid, definition } => {
            format!("Server: running (pid {pid})\n{}", format_definition(definition))
        }
        SupervisorState::Stopping { pid, .. } => format!("Server: stopping (pid {pid})"),
        SupervisorState::Starting => "Server: starting".to_string(),
        SupervisorState::Stopped => "Server: stopped".to_string(),
    }
}

pub fn format_definition(definition: &ServerDefinition) -> String {
    match definition {
        ServerDefinition::Http { name, url } => format!("{name}: {url}"),
        ServerDefinition::Stdio {
            name,
            command,
            args,
        } => {
            if args.is_empty() {
                format!("{name}: stdio `{command}`")
            } else {
                format!("{name}: stdio `{command} {}`", args.join(" "))
            }
        }
    }
}

pub fn format_logs(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries".to_string();
    }

    entries
        .iter()
        .map(|entry| {
            format!(
                "{} [{}] {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.level,
                entry.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
