use crate::config::ConfigSource;
use crate::host::Host;
use crate::logging::log_process_event;
use crate::process::definition::{ServerDefinition, TransportKind};
use crate::process::logging::{LogLevel, OutputSink, TracingSink};
use crate::process::ports::negotiate_port;
use crate::process::state_machine::{
    LifecycleEvent, SideEffect, SupervisorState, SupervisorStateMachine,
};
use crate::process::traits::{
    ChildStdio, LaunchSpec, ProcessControl, ProcessEvent, ProcessExit, ProcessSpawner,
    SpawnedProcess,
};
use crate::tool::{InstallOutcome, ToolIdentity, ToolInstaller, ToolLocator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Result of [`Supervisor::start`] and [`Supervisor::restart`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(ServerDefinition),
    AlreadyRunning(ServerDefinition),
    /// Another start or a stop is still in flight
    Busy,
    /// The tool is missing and the user declined to install it
    InstallCancelled,
    Failed(String),
}

impl StartOutcome {
    pub fn definition(&self) -> Option<&ServerDefinition> {
        match self {
            StartOutcome::Started(definition) | StartOutcome::AlreadyRunning(definition) => {
                Some(definition)
            }
            _ => None,
        }
    }
}

/// Result of [`Supervisor::stop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Termination signal delivered; the exit observer finishes the stop
    Signalled,
    AlreadyStopping,
    NotRunning,
    Failed(String),
}

/// Collaborators the supervisor is assembled from
pub struct SupervisorComponents {
    /// Name published in the server definition
    pub server_name: String,
    pub identity: ToolIdentity,
    pub locator: Arc<dyn ToolLocator>,
    pub installer: Arc<dyn ToolInstaller>,
    pub spawner: Arc<dyn ProcessSpawner>,
    pub config: Arc<dyn ConfigSource>,
    pub host: Arc<dyn Host>,
    /// Defaults to tracing only
    pub output: Option<Arc<dyn OutputSink>>,
    /// How long a stopped child gets to exit before it is killed
    pub stop_grace: Duration,
}

struct ChildHandle {
    pid: u32,
    control: Box<dyn ProcessControl>,
    exited: watch::Receiver<bool>,
    stdio: Option<ChildStdio>,
}

#[derive(Default)]
struct Runtime {
    machine: SupervisorStateMachine,
    child: Option<ChildHandle>,
}

struct SupervisorInner {
    server_name: String,
    identity: ToolIdentity,
    locator: Arc<dyn ToolLocator>,
    installer: Arc<dyn ToolInstaller>,
    spawner: Arc<dyn ProcessSpawner>,
    config: Arc<dyn ConfigSource>,
    host: Arc<dyn Host>,
    output: Arc<dyn OutputSink>,
    stop_grace: Duration,
    runtime: Mutex<Runtime>,
    changes: broadcast::Sender<()>,
}

/// Owns the one helper process and its published definition.
///
/// Cloning yields another handle to the same supervisor. The state lock is
/// never held across a prompt, an install or a spawn, so exit notifications
/// can interleave with an in-flight transition.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

impl Supervisor {
    pub fn new(components: SupervisorComponents) -> Self {
        let (changes, _) = broadcast::channel(16);
        let output = components
            .output
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn OutputSink>);

        Self {
            inner: Arc::new(SupervisorInner {
                server_name: components.server_name,
                identity: components.identity,
                locator: components.locator,
                installer: components.installer,
                spawner: components.spawner,
                config: components.config,
                host: components.host,
                output,
                stop_grace: components.stop_grace,
                runtime: Mutex::new(Runtime::default()),
                changes,
            }),
        }
    }

    pub async fn state(&self) -> SupervisorState {
        self.inner.runtime.lock().await.machine.state().clone()
    }

    /// Definitions for the host: empty when stopped, one entry while running
    pub async fn definitions(&self) -> Vec<ServerDefinition> {
        self.state().await.definition().cloned().into_iter().collect()
    }

    /// Fires (without payload) whenever the published definition changes
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.changes.subscribe()
    }

    /// Standard streams of a stdio-transport child; handed out once
    pub async fn take_stdio(&self) -> Option<ChildStdio> {
        let mut runtime = self.inner.runtime.lock().await;
        runtime.child.as_mut().and_then(|child| child.stdio.take())
    }

    /// Start the helper, installing it first if the user agrees
    pub async fn start(&self) -> StartOutcome {
        {
            let mut runtime = self.inner.runtime.lock().await;
            match runtime.machine.state().clone() {
                SupervisorState::Running { definition, .. } => {
                    drop(runtime);
                    self.inner.host.show_info("Server is already running.");
                    return StartOutcome::AlreadyRunning(definition);
                }
                SupervisorState::Starting | SupervisorState::Stopping { .. } => {
                    debug!("Start ignored, a transition is already in flight");
                    return StartOutcome::Busy;
                }
                SupervisorState::Stopped => {}
            }

            if let Err(e) = runtime.machine.apply_event(LifecycleEvent::StartRequested) {
                return StartOutcome::Failed(e.to_string());
            }
        }

        self.launch().await
    }

    /// Ask the helper to terminate gracefully
    pub async fn stop(&self) -> StopOutcome {
        let mut runtime = self.inner.runtime.lock().await;
        match runtime.machine.state().clone() {
            SupervisorState::Running { .. } => {}
            SupervisorState::Stopping { .. } => return StopOutcome::AlreadyStopping,
            SupervisorState::Stopped | SupervisorState::Starting => {
                drop(runtime);
                self.inner.host.show_info("Server is not running.");
                return StopOutcome::NotRunning;
            }
        }

        if let Err(e) = runtime.machine.apply_event(LifecycleEvent::StopRequested) {
            return StopOutcome::Failed(e.to_string());
        }

        info!("[Server] Stopping server...");
        let signalled = match runtime.child.as_ref() {
            Some(child) => child.control.terminate(),
            None => Err(crate::error::SupervisorError::ProcessError(
                "No process handle".to_string(),
            )),
        };

        match signalled {
            Ok(()) => {
                drop(runtime);
                self.inner.host.show_info("Server stopped.");
                StopOutcome::Signalled
            }
            Err(e) => {
                let error = e.to_string();
                if let Err(e) = runtime.machine.apply_event(LifecycleEvent::StopFailed {
                    error: error.clone(),
                }) {
                    error!("Failed to restore running state: {}", e);
                }
                drop(runtime);
                warn!("[Server] Failed to stop server: {}", error);
                self.inner.host.show_warning("Failed to stop the server.");
                StopOutcome::Failed(error)
            }
        }
    }

    /// Stop, wait until the old process has fully exited, then start again.
    ///
    /// A child that ignores the graceful signal is killed once the stop grace
    /// runs out; if even that does not end it, no new child is spawned.
    pub async fn restart(&self) -> StartOutcome {
        let exited = {
            let runtime = self.inner.runtime.lock().await;
            match runtime.machine.state() {
                SupervisorState::Running { .. } | SupervisorState::Stopping { .. } => {
                    runtime.child.as_ref().map(|child| child.exited.clone())
                }
                _ => None,
            }
        };

        let Some(mut exited) = exited else {
            return self.start().await;
        };

        info!("[Server] Restarting server...");
        if let StopOutcome::Failed(error) = self.stop().await {
            return StartOutcome::Failed(error);
        }

        if !self.await_exit_or_kill(&mut exited, self.inner.stop_grace).await {
            let message = format!("{} did not exit, not restarting.", self.inner.identity);
            self.inner.host.show_error(&message);
            return StartOutcome::Failed(message);
        }
        self.start().await
    }

    /// Wait up to `timeout` for the current child to exit; true when none is left
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        match self.exit_receiver().await {
            None => true,
            Some(mut exited) => wait_exited(&mut exited, timeout).await,
        }
    }

    /// Stop for good: graceful signal, then a forced kill after `grace`
    pub async fn shutdown(&self, grace: Duration) {
        let Some(mut exited) = self.exit_receiver().await else {
            return;
        };

        if matches!(self.state().await, SupervisorState::Running { .. }) {
            self.stop().await;
        }

        if !self.await_exit_or_kill(&mut exited, grace).await {
            warn!("[Server] Process still alive after being killed");
        }
    }

    async fn exit_receiver(&self) -> Option<watch::Receiver<bool>> {
        let runtime = self.inner.runtime.lock().await;
        runtime.child.as_ref().map(|child| child.exited.clone())
    }

    /// Give the child `grace` to go, then kill it and wait once more
    async fn await_exit_or_kill(&self, exited: &mut watch::Receiver<bool>, grace: Duration) -> bool {
        if wait_exited(exited, grace).await {
            return true;
        }

        warn!("[Server] Process did not exit within {:?}, killing it", grace);
        {
            let runtime = self.inner.runtime.lock().await;
            if let Some(child) = runtime.child.as_ref() {
                if let Err(e) = child.control.kill() {
                    warn!("[Server] Failed to kill process {}: {}", child.pid, e);
                }
            }
        }
        wait_exited(exited, grace).await
    }

    async fn launch(&self) -> StartOutcome {
        let inner = &self.inner;

        let program = match self.resolve_program().await {
            Ok(program) => program,
            Err(outcome) => {
                self.abort_start(format!("{outcome:?}")).await;
                return outcome;
            }
        };

        // One snapshot per start; never cached across transitions
        let options = match inner.config.server_options().await {
            Ok(options) => options,
            Err(e) => {
                let message = format!("Failed to read configuration: {e}");
                inner.host.show_error(&message);
                self.abort_start(message.clone()).await;
                return StartOutcome::Failed(message);
            }
        };

        let verbose_arg = format!("--verbose={}", options.verbose);
        let (spec, port) = if options.enable_streamable_http {
            let port = match negotiate_port(options.port) {
                Ok(port) => port,
                Err(e) => {
                    let message = e.to_string();
                    inner.host.show_error(&format!("Failed to start server: {message}"));
                    self.abort_start(message.clone()).await;
                    return StartOutcome::Failed(message);
                }
            };
            let spec = LaunchSpec {
                program: program.clone(),
                args: vec![format!("--port={port}"), verbose_arg],
                transport: TransportKind::Http,
            };
            (spec, Some(port))
        } else {
            let spec = LaunchSpec {
                program: program.clone(),
                args: vec![verbose_arg],
                transport: TransportKind::Stdio,
            };
            (spec, None)
        };

        inner
            .output
            .write(LogLevel::Info, &format!("[Server] Starting {}...", inner.identity))
            .await;

        let SpawnedProcess {
            pid,
            control,
            events,
            stdio,
        } = match inner.spawner.spawn(&spec).await {
            Ok(spawned) => spawned,
            Err(e) => {
                let message = e.to_string();
                error!("[Server] Failed to start server process: {}", message);
                inner
                    .output
                    .write(
                        LogLevel::Error,
                        &format!("[Server] Failed to start server process: {message}"),
                    )
                    .await;
                inner
                    .host
                    .show_error("Failed to start server. Check the output log.");
                self.abort_start(message.clone()).await;
                return StartOutcome::Failed(message);
            }
        };

        let definition = match port {
            Some(port) => ServerDefinition::http(&inner.server_name, port),
            None => ServerDefinition::stdio(
                &inner.server_name,
                program.to_string_lossy(),
                spec.args.clone(),
            ),
        };

        let (exited_tx, exited_rx) = watch::channel(false);
        {
            let mut runtime = inner.runtime.lock().await;
            let result = match runtime.machine.apply_event(LifecycleEvent::ProcessSpawned {
                pid,
                definition: definition.clone(),
            }) {
                Ok(result) => result,
                Err(e) => {
                    error!("[Server] Spawned process {} in unexpected state: {}", pid, e);
                    let _ = control.kill();
                    return StartOutcome::Failed(e.to_string());
                }
            };
            if result.side_effects.contains(&SideEffect::StoreHandle(pid)) {
                runtime.child = Some(ChildHandle {
                    pid,
                    control,
                    exited: exited_rx,
                    stdio,
                });
            }
        }

        tokio::spawn(SupervisorInner::observe_child(
            Arc::clone(inner),
            pid,
            events,
            exited_tx,
        ));

        let announcement = match &definition {
            ServerDefinition::Http { url, .. } => {
                format!("[Server] MCP serves Streamable HTTP at: {url}")
            }
            ServerDefinition::Stdio { .. } => "[Server] MCP serves over stdio".to_string(),
        };
        inner.output.write(LogLevel::Info, &announcement).await;
        log_process_event(&inner.server_name, "started", &definition.to_string());

        inner.notify_changed();
        StartOutcome::Started(definition)
    }

    /// Locate the binary, running the install prompt flow when it is missing
    async fn resolve_program(&self) -> Result<PathBuf, StartOutcome> {
        let inner = &self.inner;
        if let Some(path) = inner.locator.locate().await {
            return Ok(path);
        }

        match inner.installer.install().await {
            InstallOutcome::Installed => inner.locator.locate().await.ok_or_else(|| {
                let message = format!(
                    "{} was installed but could not be found on PATH.",
                    inner.identity
                );
                inner.host.show_error(&message);
                StartOutcome::Failed(message)
            }),
            InstallOutcome::Cancelled => Err(StartOutcome::InstallCancelled),
            InstallOutcome::Failed(message) => Err(StartOutcome::Failed(message)),
        }
    }

    async fn abort_start(&self, reason: String) {
        let mut runtime = self.inner.runtime.lock().await;
        if let Err(e) = runtime
            .machine
            .apply_event(LifecycleEvent::StartAborted { reason })
        {
            error!("Failed to abort start: {}", e);
        }
    }
}

/// The observer flips the flag only after the old state has been cleared
async fn wait_exited(exited: &mut watch::Receiver<bool>, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, exited.wait_for(|gone| *gone))
        .await
        .is_ok()
}

impl SupervisorInner {
    fn notify_changed(&self) {
        // No subscribers is fine
        let _ = self.changes.send(());
    }

    /// Drain the child's events; the exit at the end is authoritative
    async fn observe_child(
        inner: Arc<SupervisorInner>,
        pid: u32,
        mut events: mpsc::UnboundedReceiver<ProcessEvent>,
        exited_tx: watch::Sender<bool>,
    ) {
        let mut exit = ProcessExit::default();

        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Stdout(line) => inner.output.write(LogLevel::Stdout, &line).await,
                ProcessEvent::Stderr(line) => inner.output.write(LogLevel::Stderr, &line).await,
                ProcessEvent::Error(message) => {
                    inner
                        .output
                        .write(LogLevel::Error, &format!("[Server] {message}"))
                        .await;
                    inner
                        .host
                        .show_error("Server process reported an error. Check the output log.");
                }
                ProcessEvent::Exited(status) => {
                    exit = status;
                    break;
                }
            }
        }

        inner
            .output
            .write(
                LogLevel::Info,
                &format!("[Server] Process exited with {exit}."),
            )
            .await;
        inner.handle_exit(pid, exit).await;
        let _ = exited_tx.send(true);
    }

    async fn handle_exit(&self, pid: u32, exit: ProcessExit) {
        let result = {
            let mut runtime = self.runtime.lock().await;
            let result = match runtime
                .machine
                .apply_event(LifecycleEvent::ProcessExited { pid, exit })
            {
                Ok(result) => result,
                Err(e) => {
                    error!("Failed to record exit of process {}: {}", pid, e);
                    return;
                }
            };
            if result.side_effects.contains(&SideEffect::ClearHandle) {
                runtime.child = None;
            }
            result
        };

        if !result.changed {
            return;
        }

        log_process_event(&self.server_name, "exited", &exit.to_string());
        if matches!(result.old_state, SupervisorState::Running { .. }) {
            self.host.show_error(&format!(
                "{} exited unexpectedly ({exit}). Check the output log.",
                self.identity
            ));
        }

        if result.side_effects.contains(&SideEffect::DefinitionChanged) {
            self.notify_changed();
        }
    }
}
