use thiserror::Error;

/// Main error type for obsidian-memory
#[derive(Error, Debug)]
pub enum MemoryError {
    /// No knowledge base is mapped for the workspace
    #[error("No saved vault for workspace: {0}. Run `obsidian-memory set-vault --vault-path <absolute path>` first.")]
    NotMapped(String),

    /// External note tool failed, timed out, or could not be started
    #[error("Obsidian CLI failed for `{command}`: {stderr}")]
    ToolInvocation { command: String, stderr: String },

    /// Notify payload did not carry the fields we need
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MemoryError {
    pub fn tool(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        MemoryError::ToolInvocation {
            command: command.into(),
            stderr: stderr.into(),
        }
    }
}

/// Convenient Result type using MemoryError
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_tool_error_carries_command_and_stderr() {
        let err = MemoryError::tool("obsidian create path=a.md", "vault locked");
        let msg = err.to_string();
        assert!(msg.contains("obsidian create"));
        assert!(msg.contains("vault locked"));
    }

    #[test]
    fn test_not_mapped_suggests_set_vault() {
        let err = MemoryError::NotMapped("/repo/a".to_string());
        assert!(err.to_string().contains("set-vault"));
        assert!(err.to_string().contains("/repo/a"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MemoryError = io_err.into();
        assert!(matches!(err, MemoryError::Io(_)));
    }
}
