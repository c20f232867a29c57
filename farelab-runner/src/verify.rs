//! Environment checks behind `farelab verify`.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use farelab_core::data::{CredentialOrigin, CredentialStatus, CredentialStore};

use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub checks: Vec<Check>,
}

impl VerifyReport {
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Run every check. Never fails; problems are reported as checks.
pub fn verify(config: &PipelineConfig, config_path: &Path, store: &CredentialStore) -> VerifyReport {
    let mut checks = Vec::new();

    let missing = config.layout().missing_dirs();
    checks.push(if missing.is_empty() {
        Check::new("stage directories", CheckStatus::Pass, "all data stage directories exist")
    } else {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        Check::new(
            "stage directories",
            CheckStatus::Warn,
            format!("missing {} (created on first use)", names.join(", ")),
        )
    });

    checks.push(if config_path.is_file() {
        Check::new("config file", CheckStatus::Pass, format!("using {}", config_path.display()))
    } else {
        Check::new(
            "config file",
            CheckStatus::Warn,
            format!("{} not found, using defaults", config_path.display()),
        )
    });

    checks.push(match store.check() {
        CredentialStatus::Present { username, origin } => {
            let from = match origin {
                CredentialOrigin::Environment => "environment".to_string(),
                CredentialOrigin::KeyFile(p) => p.display().to_string(),
            };
            Check::new(
                "kaggle credentials",
                CheckStatus::Pass,
                format!("user '{username}' from {from}"),
            )
        }
        CredentialStatus::Missing { expected_path } => Check::new(
            "kaggle credentials",
            CheckStatus::Fail,
            format!(
                "no credentials at {}; run `farelab setup` to install kaggle.json",
                expected_path.display()
            ),
        ),
        CredentialStatus::Malformed { path, reason } => Check::new(
            "kaggle credentials",
            CheckStatus::Fail,
            format!(
                "{} is malformed ({reason}); run `farelab setup` with a fresh kaggle.json",
                path.display()
            ),
        ),
    });

    let raw = config.raw_path();
    checks.push(match std::fs::metadata(&raw) {
        Ok(m) if m.len() > 0 => Check::new(
            "raw dataset",
            CheckStatus::Pass,
            format!("{} ({:.2} MB)", raw.display(), m.len() as f64 / 1_048_576.0),
        ),
        Ok(_) => Check::new(
            "raw dataset",
            CheckStatus::Fail,
            format!("{} is empty; delete it and run `farelab download`", raw.display()),
        ),
        Err(_) => Check::new(
            "raw dataset",
            CheckStatus::Warn,
            format!("{} not downloaded yet; run `farelab download`", raw.display()),
        ),
    });

    VerifyReport { checks }
}
