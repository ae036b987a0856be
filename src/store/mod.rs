//! Persisted workspace → vault mappings, audit counters and the project registry.
//!
//! Everything lives in one JSON document. The store is loaded once per
//! invocation and every mutation is written back through a temp file that is
//! renamed over the target, so concurrent readers never see a torn file.
//! Keys this version does not know about survive a load/save cycle.

mod paths;

pub use paths::{normalize_workspace, workspace_key};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};

/// Default number of recorded runs between two audits
pub const DEFAULT_AUDIT_THRESHOLD: u32 = 5;

/// One workspace bound to one knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMapping {
    /// Case-folded normalized workspace path (the map key).
    #[serde(skip)]
    pub workspace_key: String,
    /// Normalized workspace path as the user spelled its case.
    pub workspace_path: PathBuf,
    pub knowledge_base_root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Older state files stored the vault path as a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Full(WorkspaceMapping),
    Legacy(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditState {
    #[serde(default = "default_threshold")]
    runs_threshold: u32,
    #[serde(default)]
    counters: BTreeMap<String, u32>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for AuditState {
    fn default() -> Self {
        Self {
            runs_threshold: DEFAULT_AUDIT_THRESHOLD,
            counters: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

fn default_threshold() -> u32 {
    DEFAULT_AUDIT_THRESHOLD
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default, alias = "workspace_vaults")]
    workspaces: BTreeMap<String, StoredEntry>,
    #[serde(default)]
    audit: AuditState,
    /// project slug → first display name seen for it
    #[serde(default)]
    projects: BTreeMap<String, String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Result of looking up a workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Mapped(PathBuf),
    NotMapped,
}

/// Handle over the state file.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    state: StoreState,
}

impl MappingStore {
    /// Load the store. A missing or blank file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => StoreState::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(MemoryError::Io(e)),
        };

        let mut store = Self { path, state };
        store.upgrade_legacy_entries();
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind `workspace` to `knowledge_base_root`, replacing any previous binding.
    pub fn set(&mut self, workspace: &Path, knowledge_base_root: &Path) -> Result<WorkspaceMapping> {
        let normalized = normalize_workspace(workspace)?;
        let key = workspace_key(&normalized);
        let now = Utc::now();

        let created_at = match self.state.workspaces.get(&key) {
            Some(StoredEntry::Full(existing)) => existing.created_at,
            _ => now,
        };

        let mapping = WorkspaceMapping {
            workspace_key: key.clone(),
            workspace_path: normalized,
            knowledge_base_root: knowledge_base_root.to_path_buf(),
            created_at,
            updated_at: now,
            extra: Map::new(),
        };
        self.state
            .workspaces
            .insert(key, StoredEntry::Full(mapping.clone()));
        self.save()?;

        log::info!(
            "Mapped workspace {} -> {}",
            mapping.workspace_path.display(),
            mapping.knowledge_base_root.display()
        );
        Ok(mapping)
    }

    /// Find the knowledge base for `workspace`, checking the nearest mapped ancestor.
    pub fn resolve(&self, workspace: &Path) -> Result<Resolution> {
        let normalized = normalize_workspace(workspace)?;
        for candidate in normalized.ancestors() {
            let key = workspace_key(candidate);
            if let Some(StoredEntry::Full(mapping)) = self.state.workspaces.get(&key) {
                return Ok(Resolution::Mapped(mapping.knowledge_base_root.clone()));
            }
        }
        Ok(Resolution::NotMapped)
    }

    /// Like [`resolve`](Self::resolve) but an unmapped workspace is an error.
    pub fn require(&self, workspace: &Path) -> Result<PathBuf> {
        match self.resolve(workspace)? {
            Resolution::Mapped(root) => Ok(root),
            Resolution::NotMapped => Err(MemoryError::NotMapped(workspace.display().to_string())),
        }
    }

    /// All mappings ordered by key.
    pub fn list(&self) -> Vec<WorkspaceMapping> {
        self.state
            .workspaces
            .values()
            .filter_map(|entry| match entry {
                StoredEntry::Full(mapping) => Some(mapping.clone()),
                StoredEntry::Legacy(_) => None,
            })
            .collect()
    }

    /// Canonical display name for `slug`, registering `name` if the slug is new.
    pub fn register_project(&mut self, slug: &str, name: &str) -> Result<String> {
        if let Some(existing) = self.state.projects.get(slug) {
            return Ok(existing.clone());
        }
        self.state.projects.insert(slug.to_string(), name.to_string());
        self.save()?;
        Ok(name.to_string())
    }

    pub fn audit_threshold(&self) -> u32 {
        self.state.audit.runs_threshold
    }

    pub fn run_count(&self, slug: &str) -> u32 {
        self.state.audit.counters.get(slug).copied().unwrap_or(0)
    }

    pub(crate) fn set_audit_threshold(&mut self, runs: u32) -> Result<()> {
        self.state.audit.runs_threshold = runs;
        self.save()
    }

    /// Bump the counter in memory; the caller decides when to save.
    pub(crate) fn increment_run_count(&mut self, slug: &str) -> u32 {
        let counter = self.state.audit.counters.entry(slug.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub(crate) fn reset_run_count(&mut self, slug: &str) {
        self.state.audit.counters.insert(slug.to_string(), 0);
    }

    /// Write the whole document atomically (temp file in the same dir + rename).
    pub fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut body = serde_json::to_string_pretty(&self.state)?;
        body.push('\n');

        let mut temp_file = tempfile::NamedTempFile::new_in(&parent)?;
        temp_file.write_all(body.as_bytes())?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| MemoryError::Io(e.error))?;
        Ok(())
    }

    fn upgrade_legacy_entries(&mut self) {
        let now = Utc::now();
        for (key, entry) in self.state.workspaces.iter_mut() {
            match entry {
                StoredEntry::Full(mapping) => mapping.workspace_key = key.clone(),
                StoredEntry::Legacy(root) => {
                    *entry = StoredEntry::Full(WorkspaceMapping {
                        workspace_key: key.clone(),
                        workspace_path: PathBuf::from(key.as_str()),
                        knowledge_base_root: PathBuf::from(root.as_str()),
                        created_at: now,
                        updated_at: now,
                        extra: Map::new(),
                    });
                }
            }
        }

        // re-key anything written by older versions without case folding
        let stale: Vec<String> = self
            .state
            .workspaces
            .keys()
            .filter(|k| k.to_lowercase() != **k)
            .cloned()
            .collect();
        for key in stale {
            if let Some(StoredEntry::Full(mut mapping)) = self.state.workspaces.remove(&key) {
                mapping.workspace_key = key.to_lowercase();
                self.state
                    .workspaces
                    .entry(mapping.workspace_key.clone())
                    .or_insert(StoredEntry::Full(mapping));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    fn store_in(temp: &TempDir) -> MappingStore {
        MappingStore::open(temp.path().join("state").join("state.json")).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(store.list().is_empty());
        assert_eq!(store.audit_threshold(), DEFAULT_AUDIT_THRESHOLD);
        assert_eq!(store.resolve(Path::new("/repo/a")).unwrap(), Resolution::NotMapped);
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "  \n").unwrap();
        let store = MappingStore::open(&path).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_set_then_resolve_equivalent_forms() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.set(Path::new("/repo/a"), Path::new("/vault1")).unwrap();

        for form in ["/repo/a", "/repo/a/", "/repo/./a", "/repo/x/../a", "/REPO/A/"] {
            assert_eq!(
                store.resolve(Path::new(form)).unwrap(),
                Resolution::Mapped(PathBuf::from("/vault1")),
                "form {}",
                form
            );
        }
    }

    #[test]
    fn test_nested_directory_uses_nearest_ancestor() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.set(Path::new("/repo/a"), Path::new("/vault1")).unwrap();
        store.set(Path::new("/repo/a/sub"), Path::new("/vault2")).unwrap();

        assert_eq!(
            store.resolve(Path::new("/repo/a/src/deep")).unwrap(),
            Resolution::Mapped(PathBuf::from("/vault1"))
        );
        assert_eq!(
            store.resolve(Path::new("/repo/a/sub/x")).unwrap(),
            Resolution::Mapped(PathBuf::from("/vault2"))
        );
        assert_eq!(store.resolve(Path::new("/repo/b")).unwrap(), Resolution::NotMapped);
        assert!(matches!(
            store.require(Path::new("/repo/b")),
            Err(MemoryError::NotMapped(_))
        ));
    }

    #[test]
    fn test_set_overwrites_and_keeps_created_at() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        let first = store.set(Path::new("/repo/a"), Path::new("/vault1")).unwrap();
        let second = store.set(Path::new("/repo/a/"), Path::new("/vault2")).unwrap();

        assert_eq!(store.list().len(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(
            store.resolve(Path::new("/repo/a")).unwrap(),
            Resolution::Mapped(PathBuf::from("/vault2"))
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        {
            let mut store = MappingStore::open(&path).unwrap();
            store.set(Path::new("/repo/a"), Path::new("/vault1")).unwrap();
            store.increment_run_count("demo");
            store.save().unwrap();
        }
        let store = MappingStore::open(&path).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].workspace_key, workspace_key(&normalize_workspace(Path::new("/repo/a")).unwrap()));
        assert_eq!(store.run_count("demo"), 1);
        // no temp files left behind
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(
            &path,
            r#"{
  "future_setting": {"enabled": true},
  "audit": {"runs_threshold": 3, "counters": {}, "mode": "strict"},
  "workspaces": {}
}"#,
        )
        .unwrap();

        let mut store = MappingStore::open(&path).unwrap();
        assert_eq!(store.audit_threshold(), 3);
        store.set(Path::new("/repo/a"), Path::new("/vault1")).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["future_setting"]["enabled"], Value::Bool(true));
        assert_eq!(raw["audit"]["mode"], Value::String("strict".to_string()));
    }

    #[test]
    fn test_legacy_string_entries_are_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault_config.json");
        fs::write(
            &path,
            r#"{"default_vault_path": "/vault0", "workspace_vaults": {"/Repo/Legacy": "/vault0"}}"#,
        )
        .unwrap();

        let store = MappingStore::open(&path).unwrap();
        assert_eq!(
            store.resolve(Path::new("/repo/legacy")).unwrap(),
            Resolution::Mapped(PathBuf::from("/vault0"))
        );
    }

    #[test]
    fn test_register_project_keeps_first_name() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        assert_eq!(store.register_project("my-app", "My App").unwrap(), "My App");
        assert_eq!(store.register_project("my-app", "my_app").unwrap(), "My App");
    }

    #[test]
    fn test_counters() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        assert_eq!(store.increment_run_count("p"), 1);
        assert_eq!(store.increment_run_count("p"), 2);
        store.reset_run_count("p");
        assert_eq!(store.run_count("p"), 0);
        store.set_audit_threshold(0).unwrap();
        assert_eq!(store.audit_threshold(), 0);
    }
}
