use crate::config::GlobalConfig;
use crate::error::{Result, SupervisorError};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

/// File name of the supervisor's own diagnostic log
pub const SUPERVISOR_LOG_NAME: &str = "supervisor";

/// Initialize the logging system for a specific component
fn init_component_logging(
    config: &GlobalConfig,
    component: &str,
    log_to_stderr: bool,
) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_component_logging_internal(config, component, log_to_stderr);
    });

    init_result
}

/// Internal logging initialization (only called once)
fn init_component_logging_internal(
    config: &GlobalConfig,
    component: &str,
    log_to_stderr: bool,
) -> Result<()> {
    let log_level = config.logging.level.to_lowercase();

    let log_dir = if config.logging.file_enabled {
        let log_dir = match &config.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => crate::config::global::get_config_dir()?.join("logs"),
        };

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            SupervisorError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;

        Some(log_dir)
    } else {
        None
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| {
            SupervisorError::ConfigError(format!("Invalid log level '{log_level}': {e}"))
        })?;

    let registry = Registry::default().with(filter);

    // stdout belongs to the terminal host, diagnostics go to stderr
    let stderr_layer = log_to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    let file_layer = log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::never(dir, format!("{component}.log"));
        fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    if file_layer.is_none() && stderr_layer.is_none() {
        return Err(SupervisorError::ConfigError(
            "File logging must be enabled when console logging is off".to_string(),
        ));
    }

    registry
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| SupervisorError::ConfigError(format!("Failed to install logger: {e}")))?;

    info!("{} logging initialized with level: {}", component, log_level);
    if let Some(dir) = &log_dir {
        info!("Log file: {}", dir.join(format!("{component}.log")).display());
    }

    Ok(())
}

/// Logging for the long-running `run` command
pub fn init_supervisor_logging(config: &GlobalConfig, console: bool) -> Result<()> {
    init_component_logging(config, SUPERVISOR_LOG_NAME, console)?;
    debug!("Supervisor logging initialized");
    Ok(())
}

/// Logging for one-shot CLI commands; quieter unless debug was asked for
pub fn init_cli_logging(config: &GlobalConfig, verbose: bool) -> Result<()> {
    let mut cli_config = config.clone();

    if verbose {
        cli_config.logging.level = "debug".to_string();
    } else if !matches!(
        cli_config.logging.level.to_lowercase().as_str(),
        "debug" | "trace"
    ) {
        cli_config.logging.level = "warn".to_string();
    }

    init_component_logging(&cli_config, "cli", true)?;
    debug!("CLI logging initialized");
    Ok(())
}

/// Log a structured message for supervised process operations
pub fn log_process_event(process_name: &str, event: &str, details: &str) {
    info!(target: "process", process = process_name, event = event, details = details);
}

/// Log a structured message for install operations
pub fn log_install_event(tool: &str, event: &str, details: &str) {
    info!(target: "install", tool = tool, event = event, details = details);
}

/// Log a structured message for update checks
pub fn log_update_event(tool: &str, event: &str, details: &str) {
    info!(target: "update", tool = tool, event = event, details = details);
}
