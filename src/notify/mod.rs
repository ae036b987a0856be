//! Turning agent hook payloads into recorded runs.
//!
//! Hooks must never break the calling agent, so nothing in here returns an
//! error: every failure is folded into a [`NotifyOutcome`] that the caller logs.

mod payload;
mod text;

pub use payload::{normalize, Normalized, PayloadSource, RunRequest, SourceHints};
pub use text::{slug_to_title, truncate};

use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{NoteTool, ObsidianCli};
use crate::pipeline::record_run;
use crate::project::ProjectIdentity;
use crate::record::RunRecord;
use crate::store::{MappingStore, Resolution};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Recorded { note_path: String, audit_triggered: bool },
    Skipped(String),
    Warned(String),
}

impl fmt::Display for NotifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyOutcome::Recorded {
                note_path,
                audit_triggered,
            } => {
                write!(f, "Recorded run note: {}", note_path)?;
                if *audit_triggered {
                    write!(f, " (graph audit ran)")?;
                }
                Ok(())
            }
            NotifyOutcome::Skipped(reason) => write!(f, "notify skipped: {}", reason),
            NotifyOutcome::Warned(reason) => write!(f, "notify warning: {}", reason),
        }
    }
}

/// Handle one payload against the configured state file and note tool.
pub async fn handle(raw: &str, hints: &SourceHints, config: &Config) -> NotifyOutcome {
    let mut store = match MappingStore::open(config.state_file()) {
        Ok(store) => store,
        Err(e) => return NotifyOutcome::Warned(format!("could not load state: {}", e)),
    };
    handle_with(raw, hints, config, &mut store, |vault| {
        ObsidianCli::new(&config.tool.binary, vault, config.tool_timeout())
    })
    .await
}

/// Handle one payload with an explicit store and tool factory.
///
/// The factory is only called once the workspace resolves to a vault.
pub async fn handle_with<T, F>(
    raw: &str,
    hints: &SourceHints,
    config: &Config,
    store: &mut MappingStore,
    tool_for: F,
) -> NotifyOutcome
where
    T: NoteTool,
    F: FnOnce(&Path) -> Result<T>,
{
    let request = match normalize(raw, hints, &config.notify) {
        Normalized::Request(request) => request,
        Normalized::Skip(reason) => return NotifyOutcome::Skipped(reason),
    };

    let vault = match store.resolve(&request.workspace) {
        Ok(Resolution::Mapped(vault)) => vault,
        Ok(Resolution::NotMapped) => {
            return NotifyOutcome::Skipped(format!(
                "no vault mapped for workspace {}",
                request.workspace.display()
            ))
        }
        Err(e) => return NotifyOutcome::Warned(e.to_string()),
    };

    let tool = match tool_for(&vault) {
        Ok(tool) => tool,
        Err(e) => return NotifyOutcome::Warned(e.to_string()),
    };

    let project = match ProjectIdentity::claim(&request.project_name, store) {
        Ok(project) => project,
        Err(e) => return NotifyOutcome::Warned(e.to_string()),
    };

    let mut record = RunRecord::new(project, &request.title);
    record.prompt = request.prompt;
    record.summary = request.summary;
    record.actions = Some(request.actions);
    record.tags = request.tags;

    let project_root = config.memory.project_root.clone();
    match record_run(store, &tool, &project_root, &record).await {
        Ok(run) if run.outcome.is_partial() => {
            let reasons: Vec<String> = run.outcome.warnings.iter().map(|w| w.to_string()).collect();
            NotifyOutcome::Warned(format!(
                "recorded {} with {}",
                run.outcome.note_path,
                reasons.join("; ")
            ))
        }
        Ok(run) => NotifyOutcome::Recorded {
            note_path: run.outcome.note_path,
            audit_triggered: run.audit_triggered,
        },
        Err(e) => NotifyOutcome::Warned(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::gateway::fake::MemoryTool;
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        workspace: std::path::PathBuf,
        store: MappingStore,
    }

    fn mapped() -> Fixture {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("exporter");
        let vault = temp.path().join("vault");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::create_dir_all(&vault).unwrap();
        let mut store = MappingStore::open(temp.path().join("state.json")).unwrap();
        store.set(&workspace, &vault).unwrap();
        Fixture {
            _temp: temp,
            workspace,
            store,
        }
    }

    fn codex_payload(cwd: &Path) -> String {
        json!({
            "type": "agent-turn-complete",
            "turn-id": "12345",
            "cwd": cwd,
            "input-messages": ["Fix exporter progress display"],
            "last-assistant-message": "Progress now counts frames."
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_records_mapped_workspace() {
        let mut fx = mapped();
        let tool = MemoryTool::new();
        let outcome = handle_with(
            &codex_payload(&fx.workspace),
            &SourceHints::default(),
            &Config::default(),
            &mut fx.store,
            |_| Ok(&tool),
        )
        .await;

        let (note_path, audit_triggered) = match outcome {
            NotifyOutcome::Recorded { note_path, audit_triggered } => (note_path, audit_triggered),
            other => panic!("expected a recorded run, got {:?}", other),
        };
        assert!(!audit_triggered);
        assert!(note_path.starts_with("Project Memory/exporter/Runs/"));
        let note = tool.note(&note_path).unwrap();
        assert!(note.contains("## Prompt\nFix exporter progress display"));
        assert!(note.contains("## Summary\nProgress now counts frames."));
        assert!(note.contains("Auto-captured from Codex notify hook on 'agent-turn-complete'."));
        let run_log = tool.note("Project Memory/exporter/Run Log.md").unwrap();
        assert!(run_log.contains("Progress now counts frames. #codex #auto-log"));
        assert_eq!(fx.store.run_count("exporter"), 1);
    }

    #[tokio::test]
    async fn test_unmapped_workspace_skips_without_tool() {
        let temp = TempDir::new().unwrap();
        let mut store = MappingStore::open(temp.path().join("state.json")).unwrap();
        let called = Cell::new(false);
        let outcome = handle_with(
            &codex_payload(&temp.path().join("elsewhere")),
            &SourceHints::default(),
            &Config::default(),
            &mut store,
            |_| {
                called.set(true);
                Ok(MemoryTool::new())
            },
        )
        .await;

        assert!(matches!(outcome, NotifyOutcome::Skipped(ref r) if r.contains("no vault mapped")));
        assert!(!called.get());
    }

    #[tokio::test]
    async fn test_missing_workspace_creates_nothing() {
        let mut fx = mapped();
        let tool = MemoryTool::new();
        let outcome = handle_with(
            r#"{"type": "agent-turn-complete", "last-assistant-message": "done"}"#,
            &SourceHints::default(),
            &Config::default(),
            &mut fx.store,
            |_| Ok(&tool),
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Skipped(_)));
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_is_warning() {
        let mut fx = mapped();
        let tool = MemoryTool::new();
        tool.fail_on("create", "Runs/");
        let outcome = handle_with(
            &codex_payload(&fx.workspace),
            &SourceHints::default(),
            &Config::default(),
            &mut fx.store,
            |_| Ok(&tool),
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Warned(ref r) if r.contains("injected failure")));
    }

    #[tokio::test]
    async fn test_tool_factory_failure_is_warning() {
        let mut fx = mapped();
        let outcome = handle_with(
            &codex_payload(&fx.workspace),
            &SourceHints::default(),
            &Config::default(),
            &mut fx.store,
            |_| Err::<MemoryTool, _>(MemoryError::Config("vault is gone".to_string())),
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Warned(ref r) if r.contains("vault is gone")));
    }

    #[tokio::test]
    async fn test_partial_write_is_warning_but_note_kept() {
        let mut fx = mapped();
        let tool = MemoryTool::new();
        tool.fail_on("append", "Run Log.md");
        let outcome = handle_with(
            &codex_payload(&fx.workspace),
            &SourceHints::default(),
            &Config::default(),
            &mut fx.store,
            |_| Ok(&tool),
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Warned(ref r) if r.contains("partial write")));
        assert!(tool.note_paths().iter().any(|p| p.contains("/Runs/")));
    }

    #[tokio::test]
    async fn test_subdirectory_resolves_to_parent_mapping() {
        let mut fx = mapped();
        let nested = fx.workspace.join("src");
        std::fs::create_dir_all(&nested).unwrap();
        let tool = MemoryTool::new();
        let hints = SourceHints {
            project: Some("Exporter".to_string()),
            ..Default::default()
        };
        let outcome = handle_with(
            &codex_payload(&nested),
            &hints,
            &Config::default(),
            &mut fx.store,
            |_| Ok(&tool),
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Recorded { ref note_path, .. }
            if note_path.starts_with("Project Memory/exporter/")));
        assert!(tool.note("Project Memory/exporter/Exporter Home.md").is_some());
    }

    #[tokio::test]
    async fn test_handle_with_unreadable_state_warns() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");
        std::fs::write(&state, "{ not json").unwrap();
        let mut config = Config::default();
        config.memory.state_file = state;
        let outcome = handle("{}", &SourceHints::default(), &config).await;
        assert!(matches!(outcome, NotifyOutcome::Warned(ref r) if r.contains("could not load state")));
    }
}
