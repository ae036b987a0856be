//! Graph-hygiene audits and the per-project cadence that triggers them.
//!
//! Every recorded run bumps the project's counter. Once the counter reaches the
//! configured threshold the counter is reset and persisted first, then the
//! audit runs; a failing audit therefore still counts as done.

use std::fmt;

use crate::error::Result;
use crate::gateway::{kv, NoteTool};
use crate::project::{NotePaths, ProjectIdentity};
use crate::store::MappingStore;

/// One audit command and what it printed.
#[derive(Debug, Clone)]
pub struct AuditSection {
    pub command: String,
    pub output: std::result::Result<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub sections: Vec<AuditSection>,
}

impl AuditReport {
    pub fn failures(&self) -> usize {
        self.sections.iter().filter(|s| s.output.is_err()).count()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "## {}", section.command)?;
            match &section.output {
                Ok(text) => writeln!(f, "{}", text)?,
                Err(reason) => writeln!(f, "(failed: {})", reason)?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The audit command sequence for a project.
fn audit_commands(paths: &NotePaths) -> Vec<(&'static str, Vec<String>)> {
    vec![
        ("unresolved", vec!["counts".to_string(), "verbose".to_string()]),
        ("orphans", Vec::new()),
        ("deadends", Vec::new()),
        ("backlinks", vec![kv("path", &paths.home), "counts".to_string()]),
    ]
}

/// Run every audit command.
///
/// With `strict`, the first failure is returned as an error; otherwise failures
/// are recorded in the report and the sequence continues.
pub async fn run_audit<T: NoteTool>(tool: &T, paths: &NotePaths, strict: bool) -> Result<AuditReport> {
    let mut report = AuditReport::default();
    for (command, args) in audit_commands(paths) {
        let output = match tool.run(command, &args).await {
            Ok(out) => Ok(out.text().to_string()),
            Err(e) if strict => return Err(e),
            Err(e) => {
                log::warn!("audit {} failed: {}", command, e);
                Err(e.to_string())
            }
        };
        report.sections.push(AuditSection {
            command: command.to_string(),
            output,
        });
    }
    Ok(report)
}

/// Persist a new audit threshold. `0` disables automatic audits.
pub fn set_audit_frequency(store: &mut MappingStore, runs: u32) -> Result<()> {
    store.set_audit_threshold(runs)?;
    if runs == 0 {
        log::info!("Automatic audits disabled");
    } else {
        log::info!("Automatic audit every {} recorded runs", runs);
    }
    Ok(())
}

/// Decides after each recorded run whether an audit is due.
pub struct AuditCadence<'a, T: NoteTool> {
    store: &'a mut MappingStore,
    tool: &'a T,
    project_root: &'a str,
}

impl<'a, T: NoteTool> AuditCadence<'a, T> {
    pub fn new(store: &'a mut MappingStore, tool: &'a T, project_root: &'a str) -> Self {
        Self {
            store,
            tool,
            project_root,
        }
    }

    /// Count a run; returns whether an audit was triggered.
    pub async fn after_run(&mut self, project: &ProjectIdentity) -> Result<bool> {
        let count = self.store.increment_run_count(&project.slug);
        let threshold = self.store.audit_threshold();

        if threshold == 0 || count < threshold {
            self.store.save()?;
            log::debug!("{}: {} run(s) since last audit (threshold {})", project.slug, count, threshold);
            return Ok(false);
        }

        self.store.reset_run_count(&project.slug);
        self.store.save()?;

        log::info!("{}: {} runs recorded, running graph audit", project.slug, count);
        let paths = NotePaths::new(project, self.project_root);
        let report = run_audit(self.tool, &paths, false).await?;
        if report.failures() > 0 {
            log::warn!(
                "{}: audit finished with {} failed check(s); counter reset anyway",
                project.slug,
                report.failures()
            );
        } else {
            for section in &report.sections {
                if let Ok(text) = &section.output {
                    log::info!("audit {}: {}", section.command, text.lines().next().unwrap_or(""));
                }
            }
        }
        Ok(true)
    }

    /// Audit right away; any failing command is an error. Resets the counter on success.
    pub async fn audit_now(&mut self, project: &ProjectIdentity) -> Result<AuditReport> {
        let paths = NotePaths::new(project, self.project_root);
        let report = run_audit(self.tool, &paths, true).await?;
        self.store.reset_run_count(&project.slug);
        self.store.save()?;
        Ok(report)
    }
}
