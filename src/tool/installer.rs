use crate::error::{Result, SupervisorError};
use crate::host::{Host, PromptLevel};
use crate::logging::log_install_event;
use crate::process::{CommandOutput, CommandRunner};
use crate::tool::{ToolIdentity, Toolchain};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const INSTALL_CHOICE: &str = "Install";
pub const CANCEL_CHOICE: &str = "Cancel";

/// Result of an install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The user declined the prompt
    Cancelled,
    Failed(String),
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed)
    }
}

/// Installs or upgrades the helper binary
#[async_trait]
pub trait ToolInstaller: Send + Sync {
    /// Ask the user first, then install. Reports the result to the user.
    async fn install(&self) -> InstallOutcome;

    /// Install without asking or notifying; for callers that already have consent
    async fn install_unprompted(&self) -> InstallOutcome;
}

/// Installs through the toolchain's install subcommand
pub struct Installer {
    identity: ToolIdentity,
    toolchain: Toolchain,
    runner: Arc<dyn CommandRunner>,
    host: Arc<dyn Host>,
}

impl Installer {
    pub fn new(
        identity: ToolIdentity,
        toolchain: Toolchain,
        runner: Arc<dyn CommandRunner>,
        host: Arc<dyn Host>,
    ) -> Self {
        Self {
            identity,
            toolchain,
            runner,
            host,
        }
    }

    /// Run the install command; only a failed execution or non-zero exit is an error
    async fn run_install(&self) -> Result<CommandOutput> {
        let args = self.toolchain.install_args(self.identity.source());
        let output = self.runner.run(self.toolchain.program(), &args).await?;

        if !output.stderr.trim().is_empty() {
            warn!(
                "[Install] Encountered warnings/errors: {}",
                output.stderr.trim()
            );
        }

        if !output.success {
            let status = output
                .exit_code
                .map(|code| format!("exit code {code}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            let detail = output.stderr.trim();
            return Err(SupervisorError::InstallError(if detail.is_empty() {
                status
            } else {
                format!("{status}: {detail}")
            }));
        }

        Ok(output)
    }

    async fn install_and_classify(&self) -> InstallOutcome {
        let command = self.toolchain.describe_install(self.identity.source());
        info!("[Install] Installing {} via \"{}\"...", self.identity, command);
        log_install_event(self.identity.binary_name(), "started", &command);

        match self.run_install().await {
            Ok(output) => {
                if !output.stdout.trim().is_empty() {
                    info!("[Install] stdout: {}", output.stdout.trim());
                }
                info!("[Install] Successfully installed {}", self.identity);
                log_install_event(self.identity.binary_name(), "installed", &command);
                InstallOutcome::Installed
            }
            Err(e) => {
                error!("[Install] Failed to install {}: {}", self.identity, e);
                log_install_event(self.identity.binary_name(), "failed", &e.to_string());
                InstallOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ToolInstaller for Installer {
    async fn install(&self) -> InstallOutcome {
        let message = format!(
            "The required tool \"{}\" is not installed. Would you like to install it now via '{}'?",
            self.identity,
            self.toolchain.describe_install(self.identity.source())
        );

        let selection = self
            .host
            .prompt(PromptLevel::Warning, &message, &[INSTALL_CHOICE, CANCEL_CHOICE])
            .await;

        if selection.as_deref() != Some(INSTALL_CHOICE) {
            info!("[Install] Installation of {} declined", self.identity);
            return InstallOutcome::Cancelled;
        }

        let outcome = self.install_and_classify().await;
        match &outcome {
            InstallOutcome::Installed => {
                self.host
                    .show_info(&format!("Successfully installed {}.", self.identity));
            }
            InstallOutcome::Failed(_) => {
                self.host.show_error(&format!(
                    "Failed to install {}. Check the output log for details.",
                    self.identity
                ));
            }
            InstallOutcome::Cancelled => {}
        }
        outcome
    }

    async fn install_unprompted(&self) -> InstallOutcome {
        self.install_and_classify().await
    }
}
