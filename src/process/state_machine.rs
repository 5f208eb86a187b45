use crate::error::{Result, SupervisorError};
use crate::process::definition::ServerDefinition;
use crate::process::traits::ProcessExit;
use std::fmt;
use tracing::{debug, info};

/// Lifecycle state of the supervised helper
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SupervisorState {
    #[default]
    Stopped,
    Starting,
    Running {
        pid: u32,
        definition: ServerDefinition,
    },
    Stopping {
        pid: u32,
        definition: ServerDefinition,
    },
}

impl SupervisorState {
    pub fn pid(&self) -> Option<u32> {
        match self {
            SupervisorState::Running { pid, .. } | SupervisorState::Stopping { pid, .. } => {
                Some(*pid)
            }
            _ => None,
        }
    }

    /// Definition currently published to the host
    pub fn definition(&self) -> Option<&ServerDefinition> {
        match self {
            SupervisorState::Running { definition, .. }
            | SupervisorState::Stopping { definition, .. } => Some(definition),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SupervisorState::Running { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SupervisorState::Stopped)
    }

    fn name(&self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running { .. } => "running",
            SupervisorState::Stopping { .. } => "stopping",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Running { pid, definition } => {
                write!(f, "running (pid {pid}): {definition}")
            }
            SupervisorState::Stopping { pid, .. } => write!(f, "stopping (pid {pid})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Events that drive supervisor state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `start()` was invoked on a stopped supervisor
    StartRequested,
    /// Install declined or failed, configuration unreadable, or spawn failed
    StartAborted { reason: String },
    /// The child is up and its definition is ready to publish
    ProcessSpawned {
        pid: u32,
        definition: ServerDefinition,
    },
    /// `stop()` is about to signal the child
    StopRequested,
    /// The termination signal could not be delivered
    StopFailed { error: String },
    /// The exit observer saw the child terminate
    ProcessExited { pid: u32, exit: ProcessExit },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::StartRequested => write!(f, "Start requested"),
            LifecycleEvent::StartAborted { reason } => write!(f, "Start aborted: {reason}"),
            LifecycleEvent::ProcessSpawned { pid, .. } => {
                write!(f, "Process spawned with PID {pid}")
            }
            LifecycleEvent::StopRequested => write!(f, "Stop requested"),
            LifecycleEvent::StopFailed { error } => write!(f, "Stop failed: {error}"),
            LifecycleEvent::ProcessExited { pid, exit } => {
                write!(f, "Process {pid} exited with {exit}")
            }
        }
    }
}

/// Side effects the supervisor carries out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Keep the handle of the spawned child
    StoreHandle(u32),
    /// Drop the child handle
    ClearHandle,
    /// Fire the server-definition-changed signal
    DefinitionChanged,
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub changed: bool,
    pub old_state: SupervisorState,
    pub new_state: SupervisorState,
    pub side_effects: Vec<SideEffect>,
}

/// State machine for the single supervised process
#[derive(Debug, Default)]
pub struct SupervisorStateMachine {
    state: SupervisorState,
}

impl SupervisorStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Apply an event and return the transition result
    pub fn apply_event(&mut self, event: LifecycleEvent) -> Result<TransitionResult> {
        let old_state = self.state.clone();

        let Some(new_state) = self.determine_target_state(&event)? else {
            debug!("Ignoring '{}' in state {}", event, old_state.name());
            return Ok(TransitionResult {
                changed: false,
                new_state: old_state.clone(),
                old_state,
                side_effects: Vec::new(),
            });
        };

        let side_effects = Self::determine_side_effects(&event);
        self.state = new_state.clone();

        info!(
            "Supervisor transitioned from {} to {} due to event: {}",
            old_state.name(),
            new_state.name(),
            event
        );

        Ok(TransitionResult {
            changed: true,
            old_state,
            new_state,
            side_effects,
        })
    }

    /// `Ok(None)` means the event is valid but has nothing left to do
    fn determine_target_state(&self, event: &LifecycleEvent) -> Result<Option<SupervisorState>> {
        use LifecycleEvent::*;
        use SupervisorState::*;

        let target = match (&self.state, event) {
            (Stopped, StartRequested) => Starting,
            (Starting, StartAborted { .. }) => Stopped,
            (Starting, ProcessSpawned { pid, definition }) => Running {
                pid: *pid,
                definition: definition.clone(),
            },

            (Running { pid, definition }, StopRequested) => Stopping {
                pid: *pid,
                definition: definition.clone(),
            },
            (Stopping { pid, definition }, StopFailed { .. }) => Running {
                pid: *pid,
                definition: definition.clone(),
            },

            // The exit observer is authoritative for its own child, whatever is in flight
            (Running { pid, .. } | Stopping { pid, .. }, ProcessExited { pid: exited, .. })
                if pid == exited =>
            {
                Stopped
            }
            // Already cleared or a stale child: clearing twice is a no-op
            (_, ProcessExited { .. }) => return Ok(None),

            _ => {
                return Err(SupervisorError::ProcessError(format!(
                    "No valid state transition from {} for event: {}",
                    self.state.name(),
                    event
                )));
            }
        };

        Ok(Some(target))
    }

    fn determine_side_effects(event: &LifecycleEvent) -> Vec<SideEffect> {
        match event {
            LifecycleEvent::ProcessSpawned { pid, .. } => {
                vec![SideEffect::StoreHandle(*pid), SideEffect::DefinitionChanged]
            }
            LifecycleEvent::ProcessExited { .. } => {
                vec![SideEffect::ClearHandle, SideEffect::DefinitionChanged]
            }
            _ => Vec::new(),
        }
    }
}
