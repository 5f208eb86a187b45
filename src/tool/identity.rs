use crate::error::{Result, SupervisorError};
use std::fmt;

/// The installable artifact: `<module-path>@<qualifier>` and the binary it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolIdentity {
    source: String,
    module_path: String,
    qualifier: String,
    binary_name: String,
}

impl ToolIdentity {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let (module_path, qualifier) = source.rsplit_once('@').ok_or_else(|| {
            SupervisorError::ConfigError(format!(
                "Tool source '{source}' is missing an '@<version>' qualifier"
            ))
        })?;

        let binary_name = module_path
            .rsplit('/')
            .next()
            .unwrap_or(module_path)
            .to_string();

        if module_path.is_empty() || qualifier.is_empty() || binary_name.is_empty() {
            return Err(SupervisorError::ConfigError(format!(
                "Tool source '{source}' is not a valid module reference"
            )));
        }

        Ok(Self {
            source: source.to_string(),
            module_path: module_path.to_string(),
            qualifier: qualifier.to_string(),
            binary_name,
        })
    }

    /// Full identifier passed to the install command
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Executable name looked up on PATH
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }
}

impl fmt::Display for ToolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary_name)
    }
}
