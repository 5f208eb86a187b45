use crate::config::{ServerOptions, ToolConfig};
use crate::process::{OutputSink, Supervisor, SupervisorComponents};
use crate::test_utils::mocks::*;
use crate::tool::{ToolIdentity, ToolInstaller};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where fakes pretend the helper binary lives
pub const FAKE_TOOL_PATH: &str = "/opt/go/bin/mcpgo";

pub fn fake_identity() -> ToolIdentity {
    ToolIdentity::parse(&ToolConfig::default().source).unwrap()
}

/// A supervisor wired to in-memory fakes, with handles to each of them
pub struct SupervisorHarness {
    pub supervisor: Supervisor,
    pub host: Arc<RecordingHost>,
    pub locator: Arc<FakeLocator>,
    pub installer: Arc<FakeInstaller>,
    pub spawner: Arc<FakeSpawner>,
    pub config: Arc<CountingConfigSource>,
    pub sink: Arc<RecordingSink>,
}

impl SupervisorHarness {
    pub fn new(options: ServerOptions, tool_installed: bool) -> Self {
        Self::build(options, tool_installed, Arc::new(RecordingHost::new()), None)
    }

    /// Same as [`SupervisorHarness::new`] but starting goes through `installer`
    pub fn with_installer(
        options: ServerOptions,
        tool_installed: bool,
        installer: Arc<dyn ToolInstaller>,
        host: Arc<RecordingHost>,
    ) -> Self {
        Self::build(options, tool_installed, host, Some(installer))
    }

    fn build(
        options: ServerOptions,
        tool_installed: bool,
        host: Arc<RecordingHost>,
        installer_override: Option<Arc<dyn ToolInstaller>>,
    ) -> Self {
        let tool_path = PathBuf::from(FAKE_TOOL_PATH);
        let locator = Arc::new(FakeLocator::new(tool_installed.then(|| tool_path.clone())));
        let installer = Arc::new(FakeInstaller::new(Arc::clone(&locator), tool_path));
        let spawner = Arc::new(FakeSpawner::new());
        let config = Arc::new(CountingConfigSource::new(options));
        let sink = Arc::new(RecordingSink::new());

        let supervisor = Supervisor::new(SupervisorComponents {
            server_name: "go-mcp-server".to_string(),
            identity: fake_identity(),
            locator: locator.clone(),
            installer: installer_override
                .unwrap_or_else(|| installer.clone() as Arc<dyn ToolInstaller>),
            spawner: spawner.clone(),
            config: config.clone(),
            host: host.clone(),
            output: Some(sink.clone() as Arc<dyn OutputSink>),
            stop_grace: Duration::from_millis(500),
        });

        Self {
            supervisor,
            host,
            locator,
            installer,
            spawner,
            config,
            sink,
        }
    }
}

/// Poll `condition` until it holds; panics after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
