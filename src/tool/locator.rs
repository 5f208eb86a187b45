use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{info, warn};

/// Finds the helper executable.
///
/// A missing tool is an expected outcome, reported as `None`.
#[async_trait]
pub trait ToolLocator: Send + Sync {
    async fn locate(&self) -> Option<PathBuf>;
}

/// Looks the binary up on PATH the way the platform shell would
/// (`which` on Unix, `where` with PATHEXT on Windows)
pub struct PathLocator {
    binary_name: String,
    search_path: Option<OsString>,
}

impl PathLocator {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            search_path: None,
        }
    }

    /// Search these directories instead of `$PATH`
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    fn lookup(binary_name: &str, search_path: Option<&OsString>) -> which::Result<PathBuf> {
        match search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(binary_name, Some(paths), cwd)
            }
            None => which::which(binary_name),
        }
    }
}

#[async_trait]
impl ToolLocator for PathLocator {
    async fn locate(&self) -> Option<PathBuf> {
        let binary_name = self.binary_name.clone();
        let search_path = self.search_path.clone();

        let lookup = tokio::task::spawn_blocking(move || {
            Self::lookup(&binary_name, search_path.as_ref())
        })
        .await;

        match lookup {
            Ok(Ok(path)) => {
                info!("[Check] Found required tool {} at {}", self.binary_name, path.display());
                Some(path)
            }
            Ok(Err(_)) => {
                info!("[Check] Tool not found: {}", self.binary_name);
                None
            }
            Err(e) => {
                warn!("[Check] Lookup for {} did not complete: {}", self.binary_name, e);
                None
            }
        }
    }
}
