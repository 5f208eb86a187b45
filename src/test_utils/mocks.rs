use crate::config::{ConfigSource, ServerOptions};
use crate::error::{Result, SupervisorError};
use crate::host::{Host, PromptLevel};
use crate::process::{
    ChildStdio, LaunchSpec, LogLevel, OutputSink, ProcessControl, ProcessEvent, ProcessExit,
    ProcessSpawner, SpawnedProcess, TransportKind,
};
use crate::tool::{InstallOutcome, ToolInstaller, ToolLocator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Host that records every notification and answers prompts from a script
#[derive(Debug, Default)]
pub struct RecordingHost {
    infos: StdMutex<Vec<String>>,
    warnings: StdMutex<Vec<String>>,
    errors: StdMutex<Vec<String>>,
    prompts: StdMutex<Vec<String>>,
    progress: StdMutex<Vec<String>>,
    answers: StdMutex<VecDeque<Option<String>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next prompt; unanswered prompts are dismissed
    pub fn answer_next(&self, answer: Option<&str>) {
        self.answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// `started: <title>` / `finished: <title>` in call order
    pub fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    async fn prompt(&self, _level: PromptLevel, message: &str, _choices: &[&str]) -> Option<String> {
        self.prompts.lock().unwrap().push(message.to_string());
        self.answers.lock().unwrap().pop_front().flatten()
    }

    fn progress_started(&self, title: &str) {
        self.progress.lock().unwrap().push(format!("started: {title}"));
    }

    fn progress_finished(&self, title: &str) {
        self.progress.lock().unwrap().push(format!("finished: {title}"));
    }
}

/// Locator with a settable answer
#[derive(Debug, Default)]
pub struct FakeLocator {
    path: StdMutex<Option<PathBuf>>,
    lookups: AtomicUsize,
}

impl FakeLocator {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: StdMutex::new(path),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn set_path(&self, path: Option<PathBuf>) {
        *self.path.lock().unwrap() = path;
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolLocator for FakeLocator {
    async fn locate(&self) -> Option<PathBuf> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.path.lock().unwrap().clone()
    }
}

/// Installer returning a scripted outcome; a successful install makes the
/// locator find the binary
pub struct FakeInstaller {
    outcome: StdMutex<InstallOutcome>,
    locator: Arc<FakeLocator>,
    installed_path: PathBuf,
    prompted: AtomicUsize,
    unprompted: AtomicUsize,
}

impl FakeInstaller {
    pub fn new(locator: Arc<FakeLocator>, installed_path: PathBuf) -> Self {
        Self {
            outcome: StdMutex::new(InstallOutcome::Cancelled),
            locator,
            installed_path,
            prompted: AtomicUsize::new(0),
            unprompted: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: InstallOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn prompted_installs(&self) -> usize {
        self.prompted.load(Ordering::SeqCst)
    }

    pub fn unprompted_installs(&self) -> usize {
        self.unprompted.load(Ordering::SeqCst)
    }

    fn finish(&self) -> InstallOutcome {
        let outcome = self.outcome.lock().unwrap().clone();
        if outcome.is_installed() {
            self.locator.set_path(Some(self.installed_path.clone()));
        }
        outcome
    }
}

#[async_trait]
impl ToolInstaller for FakeInstaller {
    async fn install(&self) -> InstallOutcome {
        self.prompted.fetch_add(1, Ordering::SeqCst);
        self.finish()
    }

    async fn install_unprompted(&self) -> InstallOutcome {
        self.unprompted.fetch_add(1, Ordering::SeqCst);
        self.finish()
    }
}

/// Config source that counts reads and can be edited between starts
#[derive(Debug)]
pub struct CountingConfigSource {
    options: StdMutex<ServerOptions>,
    reads: AtomicUsize,
}

impl CountingConfigSource {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options: StdMutex::new(options),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, options: ServerOptions) {
        *self.options.lock().unwrap() = options;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for CountingConfigSource {
    async fn server_options(&self) -> Result<ServerOptions> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.options.lock().unwrap().clone())
    }
}

/// Sink that keeps every line in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: StdMutex<Vec<(LogLevel, String)>>,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn write(&self, level: LogLevel, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Test-side handle to a process spawned by [`FakeSpawner`]
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pid: u32,
    events: mpsc::UnboundedSender<ProcessEvent>,
    alive: Arc<AtomicBool>,
    terminations: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl FakeProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: ProcessEvent) {
        let _ = self.events.send(event);
    }

    /// Simulate the child exiting on its own
    pub fn exit(&self, code: i32) {
        self.finish(ProcessExit {
            code: Some(code),
            signal: None,
        });
    }

    fn finish(&self, exit: ProcessExit) {
        if self.alive.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(ProcessEvent::Exited(exit));
        }
    }
}

struct FakeControl {
    process: FakeProcess,
    fail_terminate: Arc<AtomicBool>,
    exit_on_terminate: Arc<AtomicBool>,
}

impl ProcessControl for FakeControl {
    fn terminate(&self) -> Result<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(SupervisorError::ProcessError(format!(
                "Failed to signal process {}: Operation not permitted",
                self.process.pid
            )));
        }
        self.process.terminations.fetch_add(1, Ordering::SeqCst);
        if self.exit_on_terminate.load(Ordering::SeqCst) {
            self.process.finish(ProcessExit {
                code: None,
                signal: Some(15),
            });
        }
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        self.process.kills.fetch_add(1, Ordering::SeqCst);
        self.process.finish(ProcessExit {
            code: None,
            signal: Some(9),
        });
        Ok(())
    }
}

/// Spawner whose children only exist in memory.
///
/// By default children ignore `terminate` until the test exits them;
/// `kill` always ends them.
pub struct FakeSpawner {
    launches: StdMutex<Vec<LaunchSpec>>,
    processes: StdMutex<Vec<FakeProcess>>,
    alive_at_spawn: StdMutex<Vec<usize>>,
    next_pid: AtomicU32,
    fail_spawn: AtomicBool,
    fail_terminate: Arc<AtomicBool>,
    exit_on_terminate: Arc<AtomicBool>,
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            launches: StdMutex::new(Vec::new()),
            processes: StdMutex::new(Vec::new()),
            alive_at_spawn: StdMutex::new(Vec::new()),
            next_pid: AtomicU32::new(4000),
            fail_spawn: AtomicBool::new(false),
            fail_terminate: Arc::new(AtomicBool::new(false)),
            exit_on_terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    pub fn set_exit_on_terminate(&self, exit: bool) {
        self.exit_on_terminate.store(exit, Ordering::SeqCst);
    }

    /// Every spawn attempt, including failed ones
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    /// The `index`-th successfully spawned process
    pub fn process(&self, index: usize) -> FakeProcess {
        self.processes.lock().unwrap()[index].clone()
    }

    /// How many earlier children were still alive at each successful spawn
    pub fn alive_at_spawn(&self) -> Vec<usize> {
        self.alive_at_spawn.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessSpawner for FakeSpawner {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess> {
        self.launches.lock().unwrap().push(spec.clone());

        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(SupervisorError::ProcessError(format!(
                "Failed to spawn '{}': No such file or directory",
                spec.program.display()
            )));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let process = FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            events: events_tx,
            alive: Arc::new(AtomicBool::new(true)),
            terminations: Arc::new(AtomicUsize::new(0)),
            kills: Arc::new(AtomicUsize::new(0)),
        };

        {
            let mut processes = self.processes.lock().unwrap();
            let alive = processes.iter().filter(|p| p.is_alive()).count();
            self.alive_at_spawn.lock().unwrap().push(alive);
            processes.push(process.clone());
        }

        let stdio = match spec.transport {
            TransportKind::Stdio => {
                let (ours, _theirs) = tokio::io::duplex(1024);
                let (stdout, stdin) = tokio::io::split(ours);
                Some(ChildStdio {
                    stdin: Box::new(stdin),
                    stdout: Box::new(stdout),
                })
            }
            TransportKind::Http => None,
        };

        Ok(SpawnedProcess {
            pid: process.pid,
            control: Box::new(FakeControl {
                process: process.clone(),
                fail_terminate: Arc::clone(&self.fail_terminate),
                exit_on_terminate: Arc::clone(&self.exit_on_terminate),
            }),
            events: events_rx,
            stdio,
        })
    }
}
