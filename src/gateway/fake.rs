//! In-memory note tool for unit tests.
//!
//! Interprets the command vocabulary against a map of notes and records every
//! call. Individual commands can be made to fail.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::{NoteTool, ToolOutput};
use crate::error::{MemoryError, Result};

#[derive(Debug, Default)]
pub(crate) struct MemoryTool {
    notes: RefCell<BTreeMap<String, String>>,
    calls: RefCell<Vec<Vec<String>>>,
    /// (command, substring of the `path=` argument; empty matches any)
    failures: RefCell<Vec<(String, String)>>,
}

impl MemoryTool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_on(&self, command: &str, path_contains: &str) {
        self.failures
            .borrow_mut()
            .push((command.to_string(), path_contains.to_string()));
    }

    pub(crate) fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    pub(crate) fn insert(&self, path: &str, content: &str) {
        self.notes
            .borrow_mut()
            .insert(path.to_string(), content.to_string());
    }

    pub(crate) fn note(&self, path: &str) -> Option<String> {
        self.notes.borrow().get(path).cloned()
    }

    pub(crate) fn note_paths(&self) -> Vec<String> {
        self.notes.borrow().keys().cloned().collect()
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c[0].clone()).collect()
    }
}

fn arg<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{}=", key);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn ok(stdout: impl Into<String>) -> Result<ToolOutput> {
    Ok(ToolOutput {
        stdout: stdout.into(),
        stderr: String::new(),
        exit_code: Some(0),
    })
}

impl NoteTool for MemoryTool {
    async fn run(&self, command: &str, args: &[String]) -> Result<ToolOutput> {
        let mut call = vec![command.to_string()];
        call.extend(args.iter().cloned());
        self.calls.borrow_mut().push(call);

        let path = arg(args, "path").unwrap_or("").to_string();
        let should_fail = self
            .failures
            .borrow()
            .iter()
            .any(|(cmd, needle)| cmd == command && path.contains(needle.as_str()));
        if should_fail {
            return Err(MemoryError::tool(command, "injected failure"));
        }

        let mut notes = self.notes.borrow_mut();
        match command {
            "create" => {
                if !notes.contains_key(&path) {
                    notes.insert(path.clone(), arg(args, "content").unwrap_or("").to_string());
                }
                ok(format!("Created {}", path))
            }
            "append" => {
                let content = arg(args, "content").unwrap_or("");
                let entry = notes.entry(path).or_default();
                if !entry.is_empty() && !entry.ends_with('\n') {
                    entry.push('\n');
                }
                entry.push_str(content);
                ok("")
            }
            "read" => match notes.get(&path) {
                Some(body) => ok(body.clone()),
                None => Err(MemoryError::tool("read", format!("note not found: {}", path))),
            },
            "search" => {
                let query = arg(args, "query").unwrap_or("").to_lowercase();
                let hits: Vec<&str> = notes
                    .iter()
                    .filter(|(_, body)| body.to_lowercase().contains(&query))
                    .map(|(p, _)| p.as_str())
                    .collect();
                ok(hits.join("\n"))
            }
            "unresolved" => ok("3"),
            "orphans" | "deadends" => ok(""),
            "backlinks" => ok("4"),
            other => Err(MemoryError::tool(other, "unknown command")),
        }
    }

    fn note_exists(&self, path: &str) -> bool {
        self.notes.borrow().contains_key(path)
    }
}
