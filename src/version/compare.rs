/// Number of leading characters that decide whether two versions match
pub const SHORT_VERSION_LEN: usize = 7;

/// First [`SHORT_VERSION_LEN`] characters of a version or commit id
pub fn short_version(version: &str) -> &str {
    match version.char_indices().nth(SHORT_VERSION_LEN) {
        Some((end, _)) => &version[..end],
        None => version,
    }
}

/// Lenient equality over the shortened identifiers.
///
/// No ordering is established: a local build that is ahead of the remote
/// still reports as "not up to date" when the prefixes differ.
pub fn is_up_to_date(local: &str, remote: &str) -> bool {
    short_version(local) == short_version(remote)
}

/// Local and remote version of the helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub local: String,
    pub remote: String,
}

impl VersionInfo {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn update_available(&self) -> bool {
        !is_up_to_date(&self.local, &self.remote)
    }

    pub fn short_local(&self) -> &str {
        short_version(&self.local)
    }

    pub fn short_remote(&self) -> &str {
        short_version(&self.remote)
    }
}
