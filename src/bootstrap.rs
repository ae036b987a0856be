//! Idempotent scaffolding of a project's anchor notes.
//!
//! Each anchor is handled on its own: missing notes are created from the seed
//! template, existing notes are left alone except for appending cross-links
//! they lack. There is no lock; two concurrent runs converge because `create`
//! never overwrites and links are only appended when absent.

use chrono::Local;

use crate::error::Result;
use crate::gateway::NoteTool;
use crate::project::links::{missing_links, wikilink};
use crate::project::templates::seed_note;
use crate::project::{AnchorNote, NotePaths, ProjectIdentity};

/// What bootstrapping did to one anchor note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorStatus {
    Created,
    LinksAppended(usize),
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct AnchorEntry {
    pub anchor: AnchorNote,
    pub path: String,
    pub status: AnchorStatus,
}

/// The project's anchor notes after bootstrapping.
#[derive(Debug, Clone)]
pub struct AnchorNoteSet {
    pub paths: NotePaths,
    pub entries: Vec<AnchorEntry>,
}

impl AnchorNoteSet {
    pub fn created(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == AnchorStatus::Created)
            .count()
    }
}

pub struct Bootstrapper<'a, T: NoteTool> {
    tool: &'a T,
    project_root: &'a str,
}

impl<'a, T: NoteTool> Bootstrapper<'a, T> {
    pub fn new(tool: &'a T, project_root: &'a str) -> Self {
        Self { tool, project_root }
    }

    /// Ensure every anchor note exists and links to every other anchor.
    pub async fn bootstrap(&self, project: &ProjectIdentity) -> Result<AnchorNoteSet> {
        let paths = NotePaths::new(project, self.project_root);
        let now = Local::now().fixed_offset();
        let mut entries = Vec::with_capacity(AnchorNote::ALL.len());

        for anchor in AnchorNote::ALL {
            let path = paths.anchor(anchor).to_string();

            let status = if !self.tool.note_exists(&path) {
                let content = seed_note(anchor, project, &paths, &now);
                self.tool.create(&path, &content).await?;
                AnchorStatus::Created
            } else {
                let body = self.tool.read(&path).await?;
                let wanted: Vec<&str> = anchor.others().map(|a| paths.link_target(a)).collect();
                let missing = missing_links(&body, &wanted);
                if missing.is_empty() {
                    AnchorStatus::Unchanged
                } else {
                    let links: Vec<String> = missing.iter().map(|t| wikilink(t)).collect();
                    self.tool
                        .append(&path, &format!("\nRelated: {}", links.join(" · ")))
                        .await?;
                    AnchorStatus::LinksAppended(missing.len())
                }
            };

            log::debug!("bootstrap {}: {:?}", path, status);
            entries.push(AnchorEntry { anchor, path, status });
        }

        Ok(AnchorNoteSet { paths, entries })
    }
}
