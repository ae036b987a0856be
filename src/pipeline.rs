//! The record pipeline shared by `record-run` and `notify`:
//! bootstrap the anchors, write the run note, then let the cadence decide on an audit.

use crate::audit::AuditCadence;
use crate::bootstrap::{AnchorNoteSet, Bootstrapper};
use crate::error::Result;
use crate::gateway::NoteTool;
use crate::record::{RecordOutcome, RunRecord, RunRecorder};
use crate::store::MappingStore;

#[derive(Debug)]
pub struct RecordedRun {
    pub anchors: AnchorNoteSet,
    pub outcome: RecordOutcome,
    pub audit_triggered: bool,
}

/// Record one run.
///
/// Bootstrap and note creation failures are errors. Once the note exists, a
/// failing counter update or audit is only logged.
pub async fn record_run<T: NoteTool>(
    store: &mut MappingStore,
    tool: &T,
    project_root: &str,
    record: &RunRecord,
) -> Result<RecordedRun> {
    let anchors = Bootstrapper::new(tool, project_root)
        .bootstrap(&record.project)
        .await?;
    if anchors.created() > 0 {
        log::info!("Created {} anchor note(s) for {}", anchors.created(), record.project.name);
    }

    let outcome = RunRecorder::new(tool, project_root).record(record).await?;

    let audit_triggered = match AuditCadence::new(store, tool, project_root)
        .after_run(&record.project)
        .await
    {
        Ok(triggered) => triggered,
        Err(e) => {
            log::warn!("Run recorded but audit bookkeeping failed: {}", e);
            false
        }
    };

    Ok(RecordedRun {
        anchors,
        outcome,
        audit_triggered,
    })
}
