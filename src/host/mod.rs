pub mod terminal;

pub use terminal::*;

use async_trait::async_trait;
use std::fmt;

/// Severity of a prompt shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLevel {
    Info,
    Warning,
}

impl fmt::Display for PromptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptLevel::Info => write!(f, "INFO"),
            PromptLevel::Warning => write!(f, "WARNING"),
        }
    }
}

/// The user-facing side of the embedding application.
///
/// Notifications are fire-and-forget. `prompt` suspends until the user picks
/// one of `choices` (returned verbatim) or dismisses it (`None`).
#[async_trait]
pub trait Host: Send + Sync {
    fn show_info(&self, message: &str);

    fn show_warning(&self, message: &str);

    fn show_error(&self, message: &str);

    async fn prompt(&self, level: PromptLevel, message: &str, choices: &[&str]) -> Option<String>;

    /// A long running operation titled `title` has begun
    fn progress_started(&self, title: &str);

    fn progress_finished(&self, title: &str);
}
