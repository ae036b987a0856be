use std::fmt;

use super::{index_line, render_run_note, RunRecord};
use crate::error::{MemoryError, Result};
use crate::gateway::NoteTool;
use crate::project::links::wikilink;
use crate::project::NotePaths;

/// Upper bound on `-N` suffixes tried when a run note path is taken
const MAX_COLLISION_SUFFIX: usize = 100;

/// The run note exists but a follow-up index write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWarning {
    /// Anchor note that did not receive its line
    pub target: String,
    pub reason: String,
}

impl fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partial write: could not update {}: {}", self.target, self.reason)
    }
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub note_path: String,
    pub warnings: Vec<RecordWarning>,
}

impl RecordOutcome {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct RunRecorder<'a, T: NoteTool> {
    tool: &'a T,
    project_root: &'a str,
}

impl<'a, T: NoteTool> RunRecorder<'a, T> {
    pub fn new(tool: &'a T, project_root: &'a str) -> Self {
        Self { tool, project_root }
    }

    /// Write the run note and index it.
    ///
    /// Failing to create the note is an error. Failing to index it afterwards is
    /// reported as a warning; the note stays.
    pub async fn record(&self, record: &RunRecord) -> Result<RecordOutcome> {
        if record.title.trim().is_empty() {
            return Err(MemoryError::InvalidInput("run title must not be empty".to_string()));
        }

        let paths = NotePaths::new(&record.project, self.project_root);
        let (note_path, stem) = self.free_note_path(&paths, &record.base_stem())?;

        let body = render_run_note(record, &paths);
        self.tool.create(&note_path, &body).await?;
        log::info!("Created run note {}", note_path);

        let mut warnings = Vec::new();
        let mut appends = vec![(paths.run_log.clone(), index_line(&stem, record))];
        if let Some(decisions) = record.decisions.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            appends.push((paths.decisions.clone(), format!("- {}: {}", wikilink(&stem), decisions)));
        }
        if let Some(questions) = record.questions.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            appends.push((paths.questions.clone(), format!("- {}: {}", wikilink(&stem), questions)));
        }

        for (target, line) in appends {
            if let Err(e) = self.tool.append(&target, &line).await {
                let warning = RecordWarning {
                    target,
                    reason: e.to_string(),
                };
                log::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        Ok(RecordOutcome { note_path, warnings })
    }

    fn free_note_path(&self, paths: &NotePaths, base: &str) -> Result<(String, String)> {
        for n in 1..=MAX_COLLISION_SUFFIX {
            let stem = if n == 1 {
                base.to_string()
            } else {
                format!("{}-{}", base, n)
            };
            let path = format!("{}/{}.md", paths.runs_dir, stem);
            if !self.tool.note_exists(&path) {
                return Ok((path, stem));
            }
        }
        Err(MemoryError::InvalidInput(format!(
            "too many run notes named {} in {}",
            base, paths.runs_dir
        )))
    }
}
