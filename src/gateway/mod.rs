//! Gateway to the external note tool.
//!
//! Every interaction with the vault goes through [`NoteTool::run`], which takes
//! the command and its arguments as a discrete vector. Higher-level helpers
//! (`create`, `append`, `read`, `search`) are built on top of it.

mod obsidian;
#[cfg(test)]
pub(crate) mod fake;

pub use obsidian::ObsidianCli;

use crate::error::Result;

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    /// Stdout without surrounding whitespace.
    pub fn text(&self) -> &str {
        self.stdout.trim()
    }
}

/// Format a `key=value` argument.
pub fn kv(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}

/// The command contract of the note tool.
///
/// `run` fails with `ToolInvocation` on a non-zero exit or timeout. No retries
/// happen at this layer.
#[allow(async_fn_in_trait)]
pub trait NoteTool {
    async fn run(&self, command: &str, args: &[String]) -> Result<ToolOutput>;

    /// Whether a note exists at a vault-relative path.
    fn note_exists(&self, path: &str) -> bool;

    /// Create a note. Never overwrites an existing note.
    async fn create(&self, path: &str, content: &str) -> Result<String> {
        let out = self
            .run("create", &[kv("path", path), kv("content", content), "silent".to_string()])
            .await?;
        Ok(out.text().to_string())
    }

    async fn append(&self, path: &str, content: &str) -> Result<String> {
        let out = self
            .run("append", &[kv("path", path), kv("content", content)])
            .await?;
        Ok(out.text().to_string())
    }

    async fn read(&self, path: &str) -> Result<String> {
        let out = self.run("read", &[kv("path", path)]).await?;
        Ok(out.stdout)
    }

    async fn search(&self, query: &str) -> Result<String> {
        let out = self.run("search", &[kv("query", query)]).await?;
        Ok(out.text().to_string())
    }
}

impl<T: NoteTool> NoteTool for &T {
    async fn run(&self, command: &str, args: &[String]) -> Result<ToolOutput> {
        (**self).run(command, args).await
    }

    fn note_exists(&self, path: &str) -> bool {
        (**self).note_exists(path)
    }
}
