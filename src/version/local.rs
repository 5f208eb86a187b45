use crate::error::{Result, SupervisorError};
use crate::process::CommandRunner;
use crate::tool::Toolchain;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct BuildInfo {
    #[serde(rename = "Main")]
    main: MainModule,
}

#[derive(Debug, Deserialize)]
struct MainModule {
    #[serde(rename = "Version")]
    version: String,
}

/// Reads the version embedded in the installed binary
pub struct LocalVersionResolver {
    toolchain: Toolchain,
    runner: Arc<dyn CommandRunner>,
}

impl LocalVersionResolver {
    pub fn new(toolchain: Toolchain, runner: Arc<dyn CommandRunner>) -> Self {
        Self { toolchain, runner }
    }

    /// Commit-ish version of the binary at `path`, `None` on any failure
    pub async fn local_version(&self, path: &Path) -> Option<String> {
        match self.try_local_version(path).await {
            Ok(version) => {
                debug!("[UpdateCheck] Local version of {}: {}", path.display(), version);
                Some(version)
            }
            Err(e) => {
                warn!("[UpdateCheck] Failed to get local version: {}", e);
                None
            }
        }
    }

    async fn try_local_version(&self, path: &Path) -> Result<String> {
        let args = self.toolchain.version_args(path);
        let output = self.runner.run(self.toolchain.program(), &args).await?;

        if !output.success {
            return Err(SupervisorError::VersionError(format!(
                "version introspection exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        parse_build_version(&output.stdout)
    }
}

/// Extract `Main.Version` from build info JSON and keep the part after the last hyphen
///
/// Pseudo-versions like `v0.0.0-20250101120000-abcdef123456` reduce to their
/// commit tail; plain tags are returned whole.
pub fn parse_build_version(json: &str) -> Result<String> {
    let info: BuildInfo = serde_json::from_str(json)?;
    let tail = info
        .main
        .version
        .rsplit('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if tail.is_empty() {
        return Err(SupervisorError::VersionError(
            "binary carries no embedded version".to_string(),
        ));
    }

    Ok(tail)
}
