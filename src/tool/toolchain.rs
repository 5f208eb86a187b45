use crate::error::{Result, SupervisorError};
use std::path::Path;

/// The external toolchain used to install and introspect the helper
/// (`go` by default, or any command prefix such as `env GOFLAGS=-mod=mod go`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    program: String,
    base_args: Vec<String>,
}

impl Toolchain {
    /// Parse a command string with shell quoting rules
    pub fn parse(command_str: &str) -> Result<Self> {
        let parts = shlex::split(command_str).ok_or_else(|| {
            SupervisorError::ConfigError(format!("Failed to parse toolchain command '{command_str}'"))
        })?;

        let (program, base_args) = parts.split_first().ok_or_else(|| {
            SupervisorError::ConfigError("Empty toolchain command".to_string())
        })?;

        Ok(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `<toolchain> install <source>`
    pub fn install_args(&self, source: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("install".to_string());
        args.push(source.to_string());
        args
    }

    /// `<toolchain> version -m -json <binary>`
    pub fn version_args(&self, binary: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(["version", "-m", "-json"].map(String::from));
        args.push(binary.to_string_lossy().into_owned());
        args
    }

    /// Human readable install command line
    pub fn describe_install(&self, source: &str) -> String {
        std::iter::once(self.program.clone())
            .chain(self.install_args(source))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            base_args: Vec::new(),
        }
    }
}
