use crate::error::{Result, SupervisorError};
use crate::process::definition::TransportKind;
use crate::process::traits::{
    ChildStdio, CommandOutput, CommandRunner, LaunchSpec, ProcessControl, ProcessEvent,
    ProcessExit, ProcessSpawner, SpawnedProcess,
};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Runs one-shot commands with `tokio::process`
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("Running command: {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SupervisorError::ProcessError(format!("Failed to run '{program}': {e}")))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Spawns the helper as a real OS process
///
/// HTTP children get piped stdout/stderr that are forwarded line by line as
/// events. Stdio children keep stdin/stdout for the host and discard stderr.
pub struct TokioProcessSpawner;

impl TokioProcessSpawner {
    pub fn new() -> Self {
        Self
    }

    /// Forward every line of `stream` as an event until EOF
    fn spawn_output_capture_task<T>(
        stream: T,
        events: mpsc::UnboundedSender<ProcessEvent>,
        is_stdout: bool,
    ) -> JoinHandle<()>
    where
        T: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut line = String::new();

            loop {
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let trimmed = line.trim_end();
                        if !trimmed.is_empty() {
                            let event = if is_stdout {
                                ProcessEvent::Stdout(trimmed.to_string())
                            } else {
                                ProcessEvent::Stderr(trimmed.to_string())
                            };
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        line.clear();
                    }
                    Err(e) => {
                        let _ = events.send(ProcessEvent::Error(format!(
                            "Failed to read process output: {e}"
                        )));
                        break;
                    }
                }
            }
        })
    }
}

impl Default for TokioProcessSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess> {
        debug!(
            "Spawning {} with args {:?} ({} transport)",
            spec.program.display(),
            spec.args,
            spec.transport
        );

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);

        match spec.transport {
            TransportKind::Http => {
                command.stdin(Stdio::null());
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
            }
            TransportKind::Stdio => {
                command.stdin(Stdio::piped());
                command.stdout(Stdio::piped());
                command.stderr(Stdio::null());
            }
        }

        let mut child = command.spawn().map_err(|e| {
            SupervisorError::ProcessError(format!(
                "Failed to spawn '{}': {e}",
                spec.program.display()
            ))
        })?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::ProcessError("Spawned process has no PID".to_string())
        })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut capture_tasks = Vec::new();

        let stdio = match spec.transport {
            TransportKind::Http => {
                if let Some(stdout) = child.stdout.take() {
                    capture_tasks.push(Self::spawn_output_capture_task(
                        stdout,
                        events_tx.clone(),
                        true,
                    ));
                }
                if let Some(stderr) = child.stderr.take() {
                    capture_tasks.push(Self::spawn_output_capture_task(
                        stderr,
                        events_tx.clone(),
                        false,
                    ));
                }
                None
            }
            TransportKind::Stdio => match (child.stdin.take(), child.stdout.take()) {
                (Some(stdin), Some(stdout)) => Some(ChildStdio {
                    stdin: Box::new(stdin),
                    stdout: Box::new(stdout),
                }),
                _ => None,
            },
        };

        // Exit is reported after the output readers drain so ordering holds
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => exit_from_status(status),
                Err(e) => {
                    error!("Failed to wait for process {}: {}", pid, e);
                    let _ = events_tx.send(ProcessEvent::Error(format!(
                        "Failed to wait for process exit: {e}"
                    )));
                    ProcessExit::default()
                }
            };
            for task in capture_tasks {
                let _ = task.await;
            }
            debug!("Process {} exited with {}", pid, exit);
            let _ = events_tx.send(ProcessEvent::Exited(exit));
        });

        Ok(SpawnedProcess {
            pid,
            control: Box::new(SignalControl { pid }),
            events: events_rx,
            stdio,
        })
    }
}

fn exit_from_status(status: ExitStatus) -> ProcessExit {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    ProcessExit {
        code: status.code(),
        signal,
    }
}

/// Delivers signals by PID
struct SignalControl {
    pid: u32,
}

impl SignalControl {
    fn with_process<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&sysinfo::Process) -> bool,
    {
        let pid = Pid::from_u32(self.pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid).ok_or_else(|| {
            SupervisorError::ProcessError(format!("Process {} is no longer running", self.pid))
        })?;

        if action(process) {
            Ok(())
        } else {
            Err(SupervisorError::ProcessError(format!(
                "Failed to signal process {}",
                self.pid
            )))
        }
    }
}

impl ProcessControl for SignalControl {
    fn terminate(&self) -> Result<()> {
        debug!("Sending SIGTERM to process {}", self.pid);
        // Platforms without SIGTERM fall back to a hard kill
        self.with_process(|process| {
            process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill())
        })
    }

    fn kill(&self) -> Result<()> {
        debug!("Force killing process {}", self.pid);
        self.with_process(|process| process.kill())
    }
}
