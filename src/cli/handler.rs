use crate::cli::commands::{CliResult, Commands, format_definition, format_logs, format_status};
use crate::config::GlobalConfig;
use crate::error::{Result, SupervisorError};
use crate::extension::{Extension, ServerCommand};
use crate::host::TerminalHost;
use crate::process::{OutputLog, StartOutcome, read_output_log};
use crate::tool::{PathLocator, ToolIdentity, ToolLocator};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const RUN_HELP: &str = "Commands: start, stop, restart, status, quit";

/// Executes one CLI invocation against a loaded configuration
pub struct CliHandler {
    pub config_path: PathBuf,
    pub config: GlobalConfig,
    pub verbose: bool,
}

impl CliHandler {
    pub fn new(config_path: PathBuf, config: GlobalConfig) -> Self {
        Self {
            config_path,
            config,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Main entry point for handling CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<CliResult> {
        match command {
            Commands::Run { yes } => self.run(yes).await,
            Commands::CheckUpdate { yes } => self.check_update(yes).await,
            Commands::Locate => self.locate().await,
            Commands::Logs { lines } => self.logs(lines).await,
            Commands::Config => self.show_config(),
        }
    }

    fn identity(&self) -> Result<ToolIdentity> {
        ToolIdentity::parse(&self.config.tool.source)
    }

    async fn locate(&self) -> Result<CliResult> {
        let identity = self.identity()?;
        let locator = PathLocator::new(identity.binary_name())
            .with_search_path(self.config.tool.search_path.clone().map(OsString::from));

        Ok(match locator.locate().await {
            Some(path) => CliResult::Success(path.display().to_string()),
            None => CliResult::Error(format!("{identity} is not installed")),
        })
    }

    async fn logs(&self, lines: Option<usize>) -> Result<CliResult> {
        let identity = self.identity()?;
        let path = OutputLog::path_for(identity.binary_name(), &self.config.get_log_dir());
        debug!("Reading output log {}", path.display());

        let entries = read_output_log(&path, lines).await?;
        Ok(CliResult::Success(format_logs(&entries)))
    }

    fn show_config(&self) -> Result<CliResult> {
        let content = toml::to_string_pretty(&self.config).map_err(|e| {
            SupervisorError::ConfigError(format!("Failed to serialize config: {e}"))
        })?;
        Ok(CliResult::Success(format!(
            "# {}\n{}",
            self.config_path.display(),
            content.trim_end()
        )))
    }

    async fn check_update(&self, assume_yes: bool) -> Result<CliResult> {
        let (host, _commands) = TerminalHost::spawn(assume_yes);
        let extension =
            Extension::from_config(self.config.clone(), self.config_path.clone(), Arc::new(host))
                .await?;

        Ok(extension.updates().check_for_updates().await.into())
    }

    /// Activate, then serve commands from stdin until quit, EOF or Ctrl-C
    async fn run(&self, assume_yes: bool) -> Result<CliResult> {
        let (host, mut commands) = TerminalHost::spawn(assume_yes);
        let extension =
            Extension::from_config(self.config.clone(), self.config_path.clone(), Arc::new(host))
                .await?;
        let mut changes = extension.on_definitions_changed();

        match extension.activate().await {
            StartOutcome::Started(definition) | StartOutcome::AlreadyRunning(definition) => {
                println!("{}", format_definition(&definition));
            }
            other => debug!("Activation did not start the server: {:?}", other),
        }
        println!("{RUN_HELP}");

        loop {
            tokio::select! {
                line = commands.recv() => {
                    let Some(line) = line else {
                        info!("Input closed, shutting down");
                        break;
                    };
                    match line.trim() {
                        "" => {}
                        "quit" | "exit" => break,
                        "status" => println!("{}", format_status(&extension.supervisor().state().await)),
                        other => match other.parse::<ServerCommand>() {
                            Ok(command) => {
                                // Failures reach the user through host notifications
                                let outcome = extension.execute(command).await;
                                debug!("{} -> {:?}", command, outcome);
                            }
                            Err(e) => println!("{e}. {RUN_HELP}"),
                        },
                    }
                }
                changed = changes.recv() => match changed {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let definitions = extension.provide_definitions().await;
                        if definitions.is_empty() {
                            println!("Server definition withdrawn");
                        }
                        for definition in &definitions {
                            println!("Server definition: {}", format_definition(definition));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        extension.deactivate().await;
        Ok(CliResult::Success("Supervisor stopped".to_string()))
    }
}
