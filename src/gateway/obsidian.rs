//! Obsidian CLI subprocess runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{NoteTool, ToolOutput};
use crate::error::{MemoryError, Result};

/// Commands that change the vault; skipped in dry-run mode.
const MUTATING_COMMANDS: &[&str] = &["create", "append"];

/// Longest argument echoed verbatim in logs and error messages
const MAX_ECHO_ARG: usize = 80;

/// Runs the Obsidian CLI inside a vault directory.
#[derive(Debug, Clone)]
pub struct ObsidianCli {
    binary: String,
    vault_root: PathBuf,
    timeout: Duration,
    dry_run: bool,
}

impl ObsidianCli {
    /// Fails if the vault is not an existing directory.
    pub fn new(binary: &str, vault_root: &Path, timeout: Duration) -> Result<Self> {
        if !vault_root.is_dir() {
            return Err(MemoryError::Config(format!(
                "Vault path does not exist or is not a directory: {}",
                vault_root.display()
            )));
        }
        Ok(Self {
            binary: binary.to_string(),
            vault_root: vault_root.to_path_buf(),
            timeout,
            dry_run: false,
        })
    }

    /// Print mutating commands instead of running them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    fn printable(&self, command: &str, args: &[String]) -> String {
        let mut parts = vec![self.binary.clone(), command.to_string()];
        for arg in args {
            if arg.chars().count() > MAX_ECHO_ARG {
                let head: String = arg.chars().take(MAX_ECHO_ARG).collect();
                parts.push(format!("{}...", head.replace('\n', "\\n")));
            } else {
                parts.push(arg.replace('\n', "\\n"));
            }
        }
        parts.join(" ")
    }
}

impl NoteTool for ObsidianCli {
    async fn run(&self, command: &str, args: &[String]) -> Result<ToolOutput> {
        let printable = self.printable(command, args);

        if self.dry_run && MUTATING_COMMANDS.contains(&command) {
            log::info!("[dry-run] {}", printable);
            return Ok(ToolOutput {
                stdout: format!("[dry-run] {}", printable),
                stderr: String::new(),
                exit_code: Some(0),
            });
        }

        log::debug!("Running: {}", printable);
        let mut cmd = Command::new(&self.binary);
        cmd.arg(command)
            .args(args)
            .current_dir(&self.vault_root)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(MemoryError::tool(
                    printable,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MemoryError::tool(
                    printable,
                    format!(
                        "Could not find '{}' CLI in PATH. Enable/register Obsidian CLI first.",
                        self.binary
                    ),
                ));
            }
            Ok(Err(e)) => return Err(MemoryError::tool(printable, e.to_string())),
            Ok(Ok(output)) => output,
        };

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        if !output.status.success() {
            let code = result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(MemoryError::tool(
                printable,
                format!("exit {}: {}", code, result.stderr.trim()),
            ));
        }

        Ok(result)
    }

    fn note_exists(&self, path: &str) -> bool {
        self.vault_root.join(path).is_file()
    }
}
