use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "OBSIDIAN_MEMORY_CONFIG";
/// Environment variable overriding `memory.state_file`
pub const STATE_ENV: &str = "OBSIDIAN_MEMORY_STATE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Where the configuration came from (not read from the file)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Persistence and note layout
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// JSON state file holding workspace mappings and audit counters
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Vault folder under which every project gets its own sub-folder
    #[serde(default = "default_project_root")]
    pub project_root: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            project_root: default_project_root(),
        }
    }
}

/// External note tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Limits applied when turning hook payloads into run notes
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_prompt_limit")]
    pub prompt_limit: usize,
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            prompt_limit: default_prompt_limit(),
            summary_limit: default_summary_limit(),
        }
    }
}

fn default_state_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("obsidian-memory"))
        .unwrap_or_else(|| PathBuf::from(".obsidian-memory"))
        .join("state.json")
}

fn default_project_root() -> String {
    "Project Memory".to_string()
}

fn default_binary() -> String {
    "obsidian".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_prompt_limit() -> usize {
    3000
}

fn default_summary_limit() -> usize {
    500
}

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for the config file in this order:
    /// 1. Path specified in OBSIDIAN_MEMORY_CONFIG (must exist)
    /// 2. ./config.toml in current directory (optional)
    ///
    /// Without a config file the built-in defaults apply, so hooks work out of the box.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let local = PathBuf::from("config.toml");
                if local.is_file() {
                    Self::from_file(&local)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(state) = std::env::var(STATE_ENV) {
            if !state.trim().is_empty() {
                config.memory.state_file = PathBuf::from(state);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a specific config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.tool.binary.trim().is_empty() {
            anyhow::bail!("tool.binary must not be empty");
        }

        if self.tool.timeout_secs == 0 {
            anyhow::bail!("tool.timeout_secs must be greater than 0");
        }

        let root = self.memory.project_root.trim();
        if root.is_empty() || root.starts_with('/') || root.split('/').any(|seg| seg == "..") {
            anyhow::bail!(
                "memory.project_root must be a relative vault folder without '..': {}",
                self.memory.project_root
            );
        }

        if self.notify.prompt_limit < 16 || self.notify.summary_limit < 16 {
            anyhow::bail!("notify.prompt_limit and notify.summary_limit must be at least 16");
        }

        Ok(())
    }

    /// Get the state file path
    pub fn state_file(&self) -> &Path {
        &self.memory.state_file
    }

    /// Subprocess timeout for the note tool
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool.timeout_secs)
    }
}
