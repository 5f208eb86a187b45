pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod logging;
pub mod process;
pub mod tool;
pub mod update;
pub mod version;

#[cfg(test)]
pub mod test_utils;

pub use error::{Result, SupervisorError};
