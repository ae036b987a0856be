//! Environment health checks behind the `doctor` command.

use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::gateway::{NoteTool, ObsidianCli};
use crate::store::{normalize_workspace, MappingStore, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            CheckStatus::Pass => "✓",
            CheckStatus::Warn => "!",
            CheckStatus::Fail => "✗",
        };
        write!(f, "{} {:<14} {}", mark, self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    fn push(&mut self, check: Check) {
        self.checks.push(check);
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            writeln!(f, "{}", check)?;
        }
        Ok(())
    }
}

/// Check everything a `notify` call for `workspace` depends on.
pub async fn run_doctor(config: &Config, workspace: &Path) -> DoctorReport {
    let mut report = DoctorReport::default();

    let source = match &config.source {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    };
    report.push(Check::new("config", CheckStatus::Pass, source));

    let store = match MappingStore::open(config.state_file()) {
        Ok(store) => {
            let check = if config.state_file().exists() {
                Check::new("state file", CheckStatus::Pass, config.state_file().display().to_string())
            } else {
                Check::new(
                    "state file",
                    CheckStatus::Warn,
                    format!("{} (not created yet)", config.state_file().display()),
                )
            };
            report.push(check);
            Some(store)
        }
        Err(e) => {
            report.push(Check::new(
                "state file",
                CheckStatus::Fail,
                format!("{}: {}", config.state_file().display(), e),
            ));
            None
        }
    };

    let vault = match (&store, normalize_workspace(workspace)) {
        (_, Err(e)) => {
            report.push(Check::new("workspace", CheckStatus::Fail, e.to_string()));
            None
        }
        (None, Ok(_)) => None,
        (Some(store), Ok(normalized)) => match store.resolve(&normalized) {
            Ok(Resolution::Mapped(vault)) => {
                report.push(Check::new(
                    "workspace",
                    CheckStatus::Pass,
                    format!("{} -> {}", normalized.display(), vault.display()),
                ));
                Some(vault)
            }
            Ok(Resolution::NotMapped) => {
                report.push(Check::new(
                    "workspace",
                    CheckStatus::Fail,
                    format!("{} has no vault; run set-vault first", normalized.display()),
                ));
                None
            }
            Err(e) => {
                report.push(Check::new("workspace", CheckStatus::Fail, e.to_string()));
                None
            }
        },
    };

    if let Some(vault) = &vault {
        if vault.is_dir() {
            report.push(Check::new("vault", CheckStatus::Pass, vault.display().to_string()));
        } else {
            report.push(Check::new(
                "vault",
                CheckStatus::Fail,
                format!("{} is not a directory", vault.display()),
            ));
        }
    }

    let tool_dir = vault
        .as_deref()
        .filter(|v| v.is_dir())
        .unwrap_or(workspace);
    let tool_check = match ObsidianCli::new(&config.tool.binary, tool_dir, config.tool_timeout()) {
        Ok(cli) => match cli.run("version", &[]).await {
            Ok(out) => Check::new(
                "note tool",
                CheckStatus::Pass,
                format!("{} {}", config.tool.binary, out.text().lines().next().unwrap_or("")),
            ),
            Err(e) => Check::new("note tool", CheckStatus::Fail, e.to_string()),
        },
        Err(e) => Check::new("note tool", CheckStatus::Fail, e.to_string()),
    };
    report.push(tool_check);

    if let Some(store) = &store {
        let threshold = store.audit_threshold();
        let detail = if threshold == 0 {
            "automatic audits disabled".to_string()
        } else {
            format!("every {} recorded runs", threshold)
        };
        report.push(Check::new("audit cadence", CheckStatus::Pass, detail));
    }

    for check in &report.checks {
        match check.status {
            CheckStatus::Fail => log::debug!("doctor: {} failed: {}", check.name, check.detail),
            _ => log::debug!("doctor: {} ok", check.name),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(temp: &TempDir, binary: &str) -> Config {
        let mut config = Config::default();
        config.memory.state_file = temp.path().join("state.json");
        config.tool.binary = binary.to_string();
        config
    }

    fn status(report: &DoctorReport, name: &str) -> Option<CheckStatus> {
        report.checks.iter().find(|c| c.name == name).map(|c| c.status)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_healthy_setup_passes() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("repo");
        let vault = temp.path().join("vault");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::create_dir_all(&vault).unwrap();
        let config = config(&temp, "echo");
        let mut store = MappingStore::open(config.state_file()).unwrap();
        store.set(&workspace, &vault).unwrap();

        let report = run_doctor(&config, &workspace).await;
        assert!(report.passed(), "{}", report);
        assert_eq!(status(&report, "vault"), Some(CheckStatus::Pass));
        assert!(report.to_string().contains("every 5 recorded runs"));
    }

    #[tokio::test]
    async fn test_unmapped_workspace_fails() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, "definitely-not-a-real-binary-xyz");
        let report = run_doctor(&config, temp.path()).await;

        assert!(!report.passed());
        assert_eq!(status(&report, "workspace"), Some(CheckStatus::Fail));
        assert_eq!(status(&report, "note tool"), Some(CheckStatus::Fail));
        assert_eq!(status(&report, "vault"), None);
    }

    #[tokio::test]
    async fn test_missing_vault_dir_fails() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, "definitely-not-a-real-binary-xyz");
        let mut store = MappingStore::open(config.state_file()).unwrap();
        store.set(temp.path(), &temp.path().join("gone")).unwrap();

        let report = run_doctor(&config, temp.path()).await;
        assert_eq!(status(&report, "workspace"), Some(CheckStatus::Pass));
        assert_eq!(status(&report, "vault"), Some(CheckStatus::Fail));
    }
}
