//! Run notes: one immutable note per recorded agent run.

mod recorder;

pub use recorder::{RecordOutcome, RecordWarning, RunRecorder};

use chrono::{DateTime, FixedOffset, Local};
use std::collections::HashSet;

use crate::project::links::wikilink;
use crate::project::templates::build_frontmatter;
use crate::project::{slugify, AnchorNote, NotePaths, ProjectIdentity};

/// Structured input for one run note.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub project: ProjectIdentity,
    pub title: String,
    pub timestamp: DateTime<FixedOffset>,
    pub prompt: Option<String>,
    pub summary: Option<String>,
    pub actions: Option<String>,
    pub decisions: Option<String>,
    pub questions: Option<String>,
    pub tags: Vec<String>,
}

impl RunRecord {
    /// A record stamped with the current local time and no optional fields.
    pub fn new(project: ProjectIdentity, title: &str) -> Self {
        Self {
            project,
            title: title.trim().to_string(),
            timestamp: Local::now().fixed_offset(),
            prompt: None,
            summary: None,
            actions: None,
            decisions: None,
            questions: None,
            tags: Vec::new(),
        }
    }

    /// User tags, normalized.
    pub fn normalized_tags(&self) -> Vec<String> {
        normalize_tags(&self.tags)
    }

    /// Tags written to the note frontmatter: user tags, project slug, `run`.
    pub fn note_tags(&self) -> Vec<String> {
        let mut all = self.tags.clone();
        all.push(self.project.slug.clone());
        all.push("run".to_string());
        normalize_tags(&all)
    }

    /// File stem without collision suffix: `YYYY-MM-DD-HHMM-<title slug>`.
    pub fn base_stem(&self) -> String {
        let slug = match slugify(&self.title) {
            s if s.is_empty() => "run".to_string(),
            s => s,
        };
        format!("{}-{}", self.timestamp.format("%Y-%m-%d-%H%M"), slug)
    }
}

/// Trimmed value, or `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Trim, lowercase, collapse inner whitespace to `-`, drop a leading `#`,
/// drop empties, de-duplicate keeping first occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in tags {
        let tag = raw
            .trim()
            .trim_start_matches('#')
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}

/// Split a comma-separated tag list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Note body. Optional sections appear only when their field is present.
pub fn render_run_note(record: &RunRecord, paths: &NotePaths) -> String {
    let tags = record.note_tags();
    let frontmatter = build_frontmatter(
        "run",
        &record.project.name,
        &tags,
        &[("title", record.title.as_str())],
        &record.timestamp,
    );

    let link = |a: AnchorNote| wikilink(paths.link_target(a));
    let mut lines = vec![
        frontmatter,
        String::new(),
        format!("# {}", record.title),
        String::new(),
        format!("Parent note: {}", link(AnchorNote::Home)),
        format!("MOC: {}", link(AnchorNote::Moc)),
        format!("Run log: {}", link(AnchorNote::RunLog)),
        format!("Decision register: {}", link(AnchorNote::Decisions)),
        format!("Question log: {}", link(AnchorNote::OpenQuestions)),
    ];

    let sections = [
        ("Prompt", present(&record.prompt)),
        ("Summary", present(&record.summary)),
        ("Actions Taken", present(&record.actions)),
        ("Decisions", present(&record.decisions)),
        ("Open Questions", present(&record.questions)),
    ];
    for (heading, value) in sections {
        if let Some(text) = value {
            lines.push(String::new());
            lines.push(format!("## {}", heading));
            lines.push(text.to_string());
        }
    }

    lines.join("\n")
}

/// `- [[stem]]: <summary or title> #tag ...`
pub fn index_line(stem: &str, record: &RunRecord) -> String {
    let text = present(&record.summary).unwrap_or(record.title.as_str());
    let mut line = format!("- {}: {}", wikilink(stem), single_line(text));
    for tag in record.normalized_tags() {
        line.push_str(" #");
        line.push_str(&tag);
    }
    line
}
