use crate::error::Result;
use crate::process::definition::TransportKind;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// Trait for one-shot external commands
///
/// Used for the toolchain install and version introspection commands, so
/// tests can script their output without a toolchain on the machine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for spawning the long-running helper process
///
/// The returned [`SpawnedProcess`] reports everything the child does through
/// its event channel; the supervisor never touches an OS handle directly.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess>;
}

/// Signals that can be delivered to a spawned child
pub trait ProcessControl: Send + Sync {
    /// Ask the process to shut down gracefully
    fn terminate(&self) -> Result<()>;

    /// Force the process down
    fn kill(&self) -> Result<()>;
}

/// What to launch and how to wire its standard streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub transport: TransportKind,
}

/// Handle to a freshly spawned child
pub struct SpawnedProcess {
    pub pid: u32,
    pub control: Box<dyn ProcessControl>,
    /// Ends with exactly one [`ProcessEvent::Exited`]
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
    /// Present for stdio transport only
    pub stdio: Option<ChildStdio>,
}

/// Standard streams of a stdio-transport child, handed to the host
pub struct ChildStdio {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
}

impl fmt::Debug for ChildStdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildStdio").finish_non_exhaustive()
    }
}

/// Events emitted by a running child, in the order the child produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Error(String),
    Exited(ProcessExit),
}

/// How a child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

impl ProcessExit {
    pub fn is_clean(&self) -> bool {
        self.code == Some(0)
    }
}
