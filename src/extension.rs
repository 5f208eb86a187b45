use crate::config::{ConfigSource, FileConfigSource, GlobalConfig};
use crate::error::{Result, SupervisorError};
use crate::host::Host;
use crate::process::{
    CommandRunner, LogLevel, OutputLog, OutputSink, ServerDefinition, StartOutcome, StopOutcome,
    Supervisor, SupervisorComponents, SystemCommandRunner, TokioProcessSpawner,
};
use crate::tool::{Installer, PathLocator, ToolIdentity, ToolInstaller, ToolLocator, Toolchain};
use crate::update::{UpdateCheck, UpdateCoordinator};
use crate::version::{GitHubRepository, LocalVersionResolver, RemoteVersionResolver};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Name under which the server definition is published
pub const DEFAULT_SERVER_NAME: &str = "go-mcp-server";

/// How long deactivation waits for a graceful exit before killing
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Commands published to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Start,
    Stop,
    Restart,
}

impl ServerCommand {
    pub const ALL: [ServerCommand; 3] = [
        ServerCommand::Start,
        ServerCommand::Stop,
        ServerCommand::Restart,
    ];

    /// Fully qualified command id, e.g. `go-mcp-server.start`
    pub fn id(&self) -> String {
        format!("{DEFAULT_SERVER_NAME}.{self}")
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerCommand::Start => write!(f, "start"),
            ServerCommand::Stop => write!(f, "stop"),
            ServerCommand::Restart => write!(f, "restart"),
        }
    }
}

impl FromStr for ServerCommand {
    type Err = SupervisorError;

    /// Accepts the bare name or the fully qualified id
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let name = normalized
            .strip_prefix(&format!("{DEFAULT_SERVER_NAME}."))
            .unwrap_or(&normalized);

        match name {
            "start" => Ok(ServerCommand::Start),
            "stop" => Ok(ServerCommand::Stop),
            "restart" => Ok(ServerCommand::Restart),
            other => Err(SupervisorError::HostError(format!(
                "Unknown command '{other}'"
            ))),
        }
    }
}

/// What a dispatched command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Start(StartOutcome),
    Stop(StopOutcome),
}

struct UpdateTask {
    token: CancellationToken,
    handle: JoinHandle<Option<UpdateCheck>>,
}

/// Activation lifecycle around one supervised helper.
///
/// Owns the supervisor and the background update check, and is the surface
/// the host talks to: published commands, definition list, change signal.
pub struct Extension {
    config: GlobalConfig,
    supervisor: Supervisor,
    updates: Arc<UpdateCoordinator>,
    output: Arc<dyn OutputSink>,
    update_task: Mutex<Option<UpdateTask>>,
    shutdown_grace: Duration,
}

impl Extension {
    pub fn new(
        config: GlobalConfig,
        supervisor: Supervisor,
        updates: Arc<UpdateCoordinator>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            supervisor,
            updates,
            output,
            update_task: Mutex::new(None),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Wire the production collaborators.
    ///
    /// Server options are re-read from `config_path` on every start.
    pub async fn from_config(
        config: GlobalConfig,
        config_path: PathBuf,
        host: Arc<dyn Host>,
    ) -> Result<Self> {
        let identity = ToolIdentity::parse(&config.tool.source)?;
        let toolchain = Toolchain::parse(&config.tool.toolchain)?;
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());

        let locator: Arc<dyn ToolLocator> = Arc::new(
            PathLocator::new(identity.binary_name())
                .with_search_path(config.tool.search_path.clone().map(OsString::from)),
        );
        let installer: Arc<dyn ToolInstaller> = Arc::new(Installer::new(
            identity.clone(),
            toolchain.clone(),
            Arc::clone(&runner),
            Arc::clone(&host),
        ));
        let output: Arc<dyn OutputSink> =
            Arc::new(OutputLog::open(identity.binary_name(), &config.get_log_dir()).await?);
        let config_source: Arc<dyn ConfigSource> = Arc::new(FileConfigSource::new(config_path));

        let remote = RemoteVersionResolver::new(
            Arc::new(GitHubRepository::new(&config.update)?),
            config.update.excluded_tag_prefix.clone(),
        );
        let updates = Arc::new(UpdateCoordinator::new(
            identity.clone(),
            Arc::clone(&locator),
            Arc::clone(&installer),
            LocalVersionResolver::new(toolchain, runner),
            remote,
            Arc::clone(&host),
            Arc::clone(&output),
        ));

        let supervisor = Supervisor::new(SupervisorComponents {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            identity,
            locator,
            installer,
            spawner: Arc::new(TokioProcessSpawner::new()),
            config: config_source,
            host,
            output: Some(Arc::clone(&output)),
            stop_grace: DEFAULT_SHUTDOWN_GRACE,
        });

        Ok(Self::new(config, supervisor, updates, output))
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn updates(&self) -> &Arc<UpdateCoordinator> {
        &self.updates
    }

    /// Start the server, then check for updates in the background
    pub async fn activate(&self) -> StartOutcome {
        self.output
            .write(
                LogLevel::Info,
                &format!("[Lifecycle] Activating extension \"{DEFAULT_SERVER_NAME}\"..."),
            )
            .await;

        let outcome = self.supervisor.start().await;

        if self.config.update.check_on_activation {
            self.spawn_update_check().await;
        } else {
            debug!("Update check on activation is disabled");
        }

        outcome
    }

    async fn spawn_update_check(&self) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let updates = Arc::clone(&self.updates);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("[UpdateCheck] Cancelled");
                    None
                }
                result = updates.check_for_updates() => Some(result),
            }
        });

        let previous = self
            .update_task
            .lock()
            .await
            .replace(UpdateTask { token, handle });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Result of the activation update check; `None` if none ran or it was cancelled
    pub async fn wait_for_update_check(&self) -> Option<UpdateCheck> {
        let task = self.update_task.lock().await.take()?;
        task.handle.await.ok().flatten()
    }

    /// Cancel background work and bring the server down
    pub async fn deactivate(&self) {
        self.output
            .write(LogLevel::Info, "[Lifecycle] Deactivating extension...")
            .await;

        let task = self.update_task.lock().await.take();
        if let Some(task) = task {
            task.token.cancel();
            let _ = task.handle.await;
        }

        self.supervisor.shutdown(self.shutdown_grace).await;
        self.output.close().await;
        info!("Extension deactivated");
    }

    pub async fn execute(&self, command: ServerCommand) -> CommandOutcome {
        debug!("Executing command {}", command.id());
        match command {
            ServerCommand::Start => CommandOutcome::Start(self.supervisor.start().await),
            ServerCommand::Stop => CommandOutcome::Stop(self.supervisor.stop().await),
            ServerCommand::Restart => CommandOutcome::Start(self.supervisor.restart().await),
        }
    }

    /// Current server definitions: empty while stopped
    pub async fn provide_definitions(&self) -> Vec<ServerDefinition> {
        self.supervisor.definitions().await
    }

    pub fn on_definitions_changed(&self) -> broadcast::Receiver<()> {
        self.supervisor.subscribe()
    }
}
