use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Install error: {0}")]
    InstallError(String),

    #[error("Version error: {0}")]
    VersionError(String),

    #[error("Host error: {0}")]
    HostError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

impl From<toml::de::Error> for SupervisorError {
    fn from(error: toml::de::Error) -> Self {
        SupervisorError::ConfigError(error.to_string())
    }
}

impl SupervisorError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SupervisorError::ProcessError(_) => "PROCESS_ERROR",
            SupervisorError::ConfigError(_) => "CONFIG_ERROR",
            SupervisorError::InstallError(_) => "INSTALL_ERROR",
            SupervisorError::VersionError(_) => "VERSION_ERROR",
            SupervisorError::HostError(_) => "HOST_ERROR",
            SupervisorError::IoError(_) => "IO_ERROR",
            SupervisorError::JsonError(_) => "JSON_ERROR",
            SupervisorError::HttpError(_) => "HTTP_ERROR",
            SupervisorError::TimeoutError(_) => "TIMEOUT_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
