#![allow(dead_code)]

use assert_cmd::Command;
use async_trait::async_trait;
use go_mcp_supervisor::host::{Host, PromptLevel};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Isolated home, tool directory and config file for one test
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub home_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let home_dir = temp_dir.path().join("home");
        let bin_dir = temp_dir.path().join("bin");
        let log_dir = temp_dir.path().join("logs");
        std::fs::create_dir_all(&home_dir).unwrap();
        std::fs::create_dir_all(&bin_dir).unwrap();

        let config_path = temp_dir.path().join("config.toml");
        let env = Self {
            temp_dir,
            home_dir,
            bin_dir,
            log_dir,
            config_path,
        };
        env.write_config("");
        env
    }

    /// Write a config whose tool and log paths point into the environment,
    /// followed by `extra` TOML
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            r#"[tool]
search_path = "{}"

[update]
check_on_activation = false

[logging]
file_path = "{}"
{extra}
"#,
            self.bin_dir.display(),
            self.log_dir.display()
        );
        std::fs::write(&self.config_path, content).unwrap();
    }

    /// Install an executable shell script named `name` into the tool directory
    #[cfg(unix)]
    pub fn install_script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.bin_dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("go-mcp-supervisor").unwrap();
        cmd.env("HOME", &self.home_dir)
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Host that records notifications; prompts are dismissed unless accepting
#[derive(Default)]
pub struct TestHost {
    pub accept_prompts: bool,
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl TestHost {
    /// Answers every prompt with its first choice
    pub fn accepting() -> Self {
        Self {
            accept_prompts: true,
            ..Self::default()
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for TestHost {
    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    async fn prompt(&self, _level: PromptLevel, message: &str, choices: &[&str]) -> Option<String> {
        self.prompts.lock().unwrap().push(message.to_string());
        if self.accept_prompts {
            choices.first().map(|choice| choice.to_string())
        } else {
            None
        }
    }

    fn progress_started(&self, _title: &str) {}

    fn progress_finished(&self, _title: &str) {}
}
