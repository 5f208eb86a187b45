use crate::host::{Host, PromptLevel};
use crate::logging::log_update_event;
use crate::process::{LogLevel, OutputSink};
use crate::tool::{InstallOutcome, ToolIdentity, ToolInstaller, ToolLocator};
use crate::version::{LocalVersionResolver, RemoteVersionResolver, VersionInfo};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const UPDATE_NOW_CHOICE: &str = "Update Now";

/// How an update check ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// Nothing installed, nothing to compare
    ToolMissing,
    /// A version could not be determined
    Skipped,
    UpToDate(VersionInfo),
    Declined(VersionInfo),
    Updated(VersionInfo),
    UpdateFailed(String),
}

pub struct UpdateCoordinator {
    identity: ToolIdentity,
    locator: Arc<dyn ToolLocator>,
    installer: Arc<dyn ToolInstaller>,
    local: LocalVersionResolver,
    remote: RemoteVersionResolver,
    host: Arc<dyn Host>,
    output: Arc<dyn OutputSink>,
}

impl UpdateCoordinator {
    pub fn new(
        identity: ToolIdentity,
        locator: Arc<dyn ToolLocator>,
        installer: Arc<dyn ToolInstaller>,
        local: LocalVersionResolver,
        remote: RemoteVersionResolver,
        host: Arc<dyn Host>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            identity,
            locator,
            installer,
            local,
            remote,
            host,
            output,
        }
    }

    /// Compare installed and latest versions, offering an update when they differ.
    ///
    /// Missing tools and unknown versions end the check silently. A successful
    /// update never restarts a running server.
    pub async fn check_for_updates(&self) -> UpdateCheck {
        self.output
            .write(
                LogLevel::Info,
                "[UpdateCheck] Starting background check for new version...",
            )
            .await;

        let Some(path) = self.locator.locate().await else {
            self.output
                .write(LogLevel::Info, "[UpdateCheck] Tool not found. Skipping check.")
                .await;
            log_update_event(self.identity.binary_name(), "skipped", "tool not installed");
            return UpdateCheck::ToolMissing;
        };

        let (local, remote) = tokio::join!(
            self.local.local_version(&path),
            self.remote.remote_version()
        );

        let (Some(local), Some(remote)) = (local, remote) else {
            debug!("[UpdateCheck] Version information unavailable, skipping");
            log_update_event(self.identity.binary_name(), "skipped", "version unavailable");
            return UpdateCheck::Skipped;
        };

        let versions = VersionInfo::new(local, remote);
        if !versions.update_available() {
            self.output
                .write(LogLevel::Info, "[UpdateCheck] Tool is up to date.")
                .await;
            log_update_event(self.identity.binary_name(), "up_to_date", versions.short_local());
            return UpdateCheck::UpToDate(versions);
        }

        self.output
            .write(
                LogLevel::Info,
                &format!(
                    "[UpdateCheck] A new version ({}) is available.",
                    versions.short_remote()
                ),
            )
            .await;
        log_update_event(
            self.identity.binary_name(),
            "available",
            &format!("{} -> {}", versions.short_local(), versions.short_remote()),
        );

        let message = format!(
            "A new version ({}) of {} is available.",
            versions.short_remote(),
            self.identity
        );
        let selection = self
            .host
            .prompt(PromptLevel::Info, &message, &[UPDATE_NOW_CHOICE])
            .await;

        if selection.as_deref() != Some(UPDATE_NOW_CHOICE) {
            info!("[UpdateCheck] Update to {} declined", versions.short_remote());
            return UpdateCheck::Declined(versions);
        }

        match self.run_update().await {
            InstallOutcome::Installed => UpdateCheck::Updated(versions),
            InstallOutcome::Failed(error) => UpdateCheck::UpdateFailed(error),
            InstallOutcome::Cancelled => UpdateCheck::Declined(versions),
        }
    }

    /// Reinstall from the latest source inside a progress indicator
    pub async fn run_update(&self) -> InstallOutcome {
        let title = format!("Updating {}...", self.identity);
        self.host.progress_started(&title);
        self.output
            .write(LogLevel::Info, &format!("[Update] Installing {}...", self.identity.source()))
            .await;

        let outcome = self.installer.install_unprompted().await;

        match &outcome {
            InstallOutcome::Installed => {
                self.output
                    .write(
                        LogLevel::Info,
                        &format!("[Update] Successfully updated {}.", self.identity),
                    )
                    .await;
                log_update_event(self.identity.binary_name(), "updated", self.identity.source());
                self.host.show_info(&format!(
                    "{} has been updated. Please restart the server to use the new version.",
                    self.identity
                ));
            }
            InstallOutcome::Failed(error) => {
                warn!("[Update] Failed to update {}: {}", self.identity, error);
                self.output
                    .write(LogLevel::Error, &format!("[Update] Failed to update: {error}"))
                    .await;
                log_update_event(self.identity.binary_name(), "failed", error);
                self.host.show_error(&format!(
                    "Failed to update {}. Check the output log.",
                    self.identity
                ));
            }
            InstallOutcome::Cancelled => {}
        }

        self.host.progress_finished(&title);
        outcome
    }
}
