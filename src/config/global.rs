use crate::error::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = ".go-mcp-supervisor";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerOptions,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Options read at the start of every start transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOptions {
    #[serde(default)]
    pub enable_streamable_http: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_tool_source")]
    pub source: String, // e.g. "github.com/owner/repo/cmd/tool@latest"
    #[serde(default = "default_toolchain")]
    pub toolchain: String, // split with shell rules, first word is the program
    pub search_path: Option<String>, // If None, uses $PATH
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_check_on_activation")]
    pub check_on_activation: bool,
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_excluded_tag_prefix")]
    pub excluded_tag_prefix: String,
    #[serde(default = "default_update_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
    pub file_path: Option<String>, // If None, uses default ~/.go-mcp-supervisor/logs/
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            enable_streamable_http: false,
            port: default_port(),
            verbose: false,
        }
    }
}

impl ServerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(SupervisorError::ConfigError(
                "Server port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            source: default_tool_source(),
            toolchain: default_toolchain(),
            search_path: None,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_on_activation: default_check_on_activation(),
            repository: default_repository(),
            default_branch: default_branch(),
            api_base: default_api_base(),
            excluded_tag_prefix: default_excluded_tag_prefix(),
            timeout_secs: default_update_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: default_file_enabled(),
            file_path: None,
        }
    }
}

impl GlobalConfig {
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            SupervisorError::ConfigError(format!("Failed to serialize config: {e}"))
        })?;

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;

        if self.update.timeout_secs == 0 {
            return Err(SupervisorError::ConfigError(
                "Update timeout must be greater than 0".to_string(),
            ));
        }

        if !self.tool.source.contains('@') {
            return Err(SupervisorError::ConfigError(format!(
                "Tool source '{}' must be of the form <module-path>@<version>",
                self.tool.source
            )));
        }

        if shlex::split(&self.tool.toolchain).is_none_or(|parts| parts.is_empty()) {
            return Err(SupervisorError::ConfigError(format!(
                "Invalid toolchain command: '{}'",
                self.tool.toolchain
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(SupervisorError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn get_log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => {
                let config_dir =
                    get_config_dir().unwrap_or_else(|_| PathBuf::from(CONFIG_DIR_NAME));
                config_dir.join("logs")
            }
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| {
            SupervisorError::ConfigError("Could not determine home directory".to_string())
        })?;

    Ok(PathBuf::from(home_dir).join(CONFIG_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

// Default value functions for serde
fn default_port() -> u16 {
    8555
}
fn default_tool_source() -> String {
    "github.com/xieyuschen/go-mcp-server/mcpgo@latest".to_string()
}
fn default_toolchain() -> String {
    "go".to_string()
}
fn default_check_on_activation() -> bool {
    true
}
fn default_repository() -> String {
    "xieyuschen/go-mcp-server".to_string()
}
fn default_branch() -> String {
    "master".to_string()
}
fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_excluded_tag_prefix() -> String {
    "vscext".to_string() // release tags of the editor extension itself
}
fn default_update_timeout() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_file_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_default() {
        let config = GlobalConfig::default();

        assert!(!config.server.enable_streamable_http);
        assert_eq!(config.server.port, 8555);
        assert!(!config.server.verbose);
        assert_eq!(
            config.tool.source,
            "github.com/xieyuschen/go-mcp-server/mcpgo@latest"
        );
        assert_eq!(config.tool.toolchain, "go");
        assert!(config.update.check_on_activation);
        assert_eq!(config.update.excluded_tag_prefix, "vscext");
        assert_eq!(config.update.timeout_secs, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_global_config_serialization() {
        let config = GlobalConfig::default();

        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[tool]"));
        assert!(toml_str.contains("[update]"));
        assert!(toml_str.contains("[logging]"));

        let deserialized: GlobalConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server, deserialized.server);
        assert_eq!(config.update.repository, deserialized.update.repository);
    }

    #[tokio::test]
    async fn test_load_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = GlobalConfig::load_from_path(&config_path).await.unwrap();
        assert_eq!(config.server.port, 8555);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = GlobalConfig::default();
        config.server.enable_streamable_http = true;
        config.server.port = 9000;
        config.update.excluded_tag_prefix = "ext-".to_string();

        config.save_to_path(&config_path).await.unwrap();

        let loaded = GlobalConfig::load_from_path(&config_path).await.unwrap();
        assert!(loaded.server.enable_streamable_http);
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.update.excluded_tag_prefix, "ext-");
    }

    #[tokio::test]
    async fn test_partial_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let partial_config = r#"
[server]
verbose = true

[update]
check_on_activation = false
"#;
        tokio::fs::write(&config_path, partial_config).await.unwrap();

        let config = GlobalConfig::load_from_path(&config_path).await.unwrap();
        assert!(config.server.verbose);
        assert!(!config.update.check_on_activation);

        // Unspecified values fall back to defaults
        assert_eq!(config.server.port, 8555);
        assert_eq!(config.update.default_branch, "master");
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[server]\nport = 0\n")
            .await
            .unwrap();

        let result = GlobalConfig::load_from_path(&config_path).await;
        assert!(matches!(result, Err(SupervisorError::ConfigError(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = GlobalConfig::default();
        assert!(config.validate().is_ok());

        config.tool.source = "github.com/owner/repo".to_string();
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.update.timeout_secs = 0;
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "INFO".to_string();
        assert!(config.validate().is_ok());

        config = GlobalConfig::default();
        config.tool.toolchain = "   ".to_string();
        assert!(config.validate().is_err());
    }
}
