use clap::Parser;
use go_mcp_supervisor::cli::{CliArgs, CliHandler, CliResult, Commands};
use go_mcp_supervisor::config::{GlobalConfig, default_config_path};
use go_mcp_supervisor::logging;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path().unwrap_or_else(|e| {
            eprintln!("Warning: {e}, falling back to ./config.toml");
            PathBuf::from("config.toml")
        }),
    };

    // Load global configuration, falling back to defaults
    let global_config = match GlobalConfig::load_from_path(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load configuration from {}: {e}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    };

    let logging_result = match args.command {
        Commands::Run { .. } => logging::init_supervisor_logging(&global_config, args.verbose),
        _ => logging::init_cli_logging(&global_config, args.verbose),
    };
    if let Err(e) = logging_result {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    let handler = CliHandler::new(config_path, global_config).with_verbose(args.verbose);

    let result = match handler.handle_command(args.command).await {
        Ok(result) => result,
        Err(e) => CliResult::Error(format!("Failed to execute command: {e}")),
    };

    match result {
        CliResult::Success(msg) => {
            println!("{msg}");
            process::exit(0);
        }
        CliResult::Error(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}
