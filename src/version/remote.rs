use crate::config::UpdateConfig;
use crate::error::{Result, SupervisorError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("go-mcp-supervisor/", env!("CARGO_PKG_VERSION"));

/// A tag and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTag {
    pub name: String,
    pub commit: String,
}

/// Read-only view of the helper's source repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Commit id at the tip of the default branch
    async fn tip_commit(&self) -> Result<String>;

    async fn tags(&self) -> Result<Vec<RemoteTag>>;
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct TagInfo {
    name: String,
    commit: CommitRef,
}

/// GitHub REST API client for one repository, unauthenticated
pub struct GitHubRepository {
    client: Client,
    api_base: String,
    repository: String,
    branch: String,
}

impl GitHubRepository {
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            branch: config.default_branch.clone(),
        })
    }

    pub fn branch_url(&self) -> String {
        format!(
            "{}/repos/{}/branches/{}",
            self.api_base, self.repository, self.branch
        )
    }

    pub fn tags_url(&self) -> String {
        format!("{}/repos/{}/tags", self.api_base, self.repository)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RemoteRepository for GitHubRepository {
    async fn tip_commit(&self) -> Result<String> {
        let info: BranchInfo = self.get_json(&self.branch_url()).await?;
        Ok(info.commit.sha)
    }

    async fn tags(&self) -> Result<Vec<RemoteTag>> {
        let tags: Vec<TagInfo> = self.get_json(&self.tags_url()).await?;
        Ok(tags
            .into_iter()
            .map(|tag| RemoteTag {
                name: tag.name,
                commit: tag.commit.sha,
            })
            .collect())
    }
}

/// Determines the latest published version of the helper
pub struct RemoteVersionResolver {
    repository: Arc<dyn RemoteRepository>,
    excluded_tag_prefix: String,
}

impl RemoteVersionResolver {
    pub fn new(repository: Arc<dyn RemoteRepository>, excluded_tag_prefix: impl Into<String>) -> Self {
        Self {
            repository,
            excluded_tag_prefix: excluded_tag_prefix.into(),
        }
    }

    /// Latest version token, `None` on any network or parse failure
    pub async fn remote_version(&self) -> Option<String> {
        match self.try_remote_version().await {
            Ok(version) => {
                debug!("[UpdateCheck] Remote version: {}", version);
                Some(version)
            }
            Err(e) => {
                warn!("[UpdateCheck] Failed to get remote version: {}", e);
                None
            }
        }
    }

    async fn try_remote_version(&self) -> Result<String> {
        let tip = self.repository.tip_commit().await?;
        if tip.trim().is_empty() {
            return Err(SupervisorError::VersionError(
                "default branch reported no tip commit".to_string(),
            ));
        }

        let tags = self.repository.tags().await?;
        Ok(resolve_version(&tip, &tags, &self.excluded_tag_prefix))
    }
}

/// Pick the version for `tip`: a clean semver tag on the tip commit, else the commit id itself
pub fn resolve_version(tip: &str, tags: &[RemoteTag], excluded_tag_prefix: &str) -> String {
    tags.iter()
        .filter(|tag| excluded_tag_prefix.is_empty() || !tag.name.starts_with(excluded_tag_prefix))
        .filter(|tag| tag.commit == tip)
        .find_map(|tag| clean_version(&tag.name))
        .unwrap_or_else(|| tip.to_string())
}

/// Normalize a tag like `v1.2.3` or `=1.2.3` to `1.2.3`; `None` when it is not semver.
///
/// Any run of leading `=`/`v` is dropped, lowercase `v` only.
pub fn clean_version(tag: &str) -> Option<String> {
    let trimmed = tag.trim().trim_start_matches(['=', 'v']);
    semver::Version::parse(trimmed)
        .ok()
        .map(|version| version.to_string())
}
