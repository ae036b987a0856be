//! Frontmatter and seed bodies for anchor notes.

use chrono::{DateTime, FixedOffset, SecondsFormat};

use super::links::wikilink;
use super::{note_stem, AnchorNote, NotePaths, ProjectIdentity};

/// Double-quoted YAML scalar.
pub fn escape_yaml(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// YAML frontmatter block shared by every note we write.
pub fn build_frontmatter(
    note_type: &str,
    project: &str,
    tags: &[String],
    extra: &[(&str, &str)],
    now: &DateTime<FixedOffset>,
) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, false);
    let mut lines = vec![
        "---".to_string(),
        format!("type: {}", escape_yaml(note_type)),
        format!("project: {}", escape_yaml(project)),
        format!("created: {}", escape_yaml(&stamp)),
        format!("updated: {}", escape_yaml(&stamp)),
    ];
    if !tags.is_empty() {
        lines.push("tags:".to_string());
        for tag in tags {
            lines.push(format!("  - {}", escape_yaml(tag)));
        }
    }
    for (key, value) in extra {
        lines.push(format!("{}: {}", key, escape_yaml(value)));
    }
    lines.push("---".to_string());
    lines.join("\n")
}

/// Initial body of an anchor note. Links to every other anchor.
pub fn seed_note(
    anchor: AnchorNote,
    project: &ProjectIdentity,
    paths: &NotePaths,
    now: &DateTime<FixedOffset>,
) -> String {
    let link = |a: AnchorNote| wikilink(paths.link_target(a));
    let title = note_stem(paths.anchor(anchor));
    let (note_type, tag) = match anchor {
        AnchorNote::Home => ("project-home", "project-home"),
        AnchorNote::Moc => ("moc", "moc"),
        AnchorNote::RunLog => ("run-log", "runs"),
        AnchorNote::Decisions => ("decisions", "decisions"),
        AnchorNote::OpenQuestions => ("open-questions", "questions"),
    };
    let frontmatter = build_frontmatter(
        note_type,
        &project.name,
        &[tag.to_string(), project.slug.clone()],
        &[],
        now,
    );

    let body: Vec<String> = match anchor {
        AnchorNote::Home => vec![
            format!(
                "Primary hub for {}, {}, {}, and {}.",
                link(AnchorNote::Moc),
                link(AnchorNote::RunLog),
                link(AnchorNote::Decisions),
                link(AnchorNote::OpenQuestions)
            ),
            String::new(),
            "## Active Focus".to_string(),
            "- [ ] Add first execution summary".to_string(),
            String::new(),
            "## Knowledge Map".to_string(),
            format!("- {}", link(AnchorNote::Moc)),
            format!("- {}", link(AnchorNote::Decisions)),
            format!("- {}", link(AnchorNote::OpenQuestions)),
            format!("- {}", link(AnchorNote::RunLog)),
            String::new(),
            "## Retrieval Cues".to_string(),
            "- Add stable keywords for high-value searches.".to_string(),
        ],
        AnchorNote::Moc => vec![
            format!("Parent note: {}", link(AnchorNote::Home)),
            String::new(),
            "## Core Topics".to_string(),
            "- [[Architecture]]".to_string(),
            "- [[Roadmap]]".to_string(),
            "- [[Debugging Notes]]".to_string(),
            "- [[Release Notes]]".to_string(),
            String::new(),
            "## Working Sets".to_string(),
            format!("- {}", link(AnchorNote::Decisions)),
            format!("- {}", link(AnchorNote::OpenQuestions)),
            format!("- {}", link(AnchorNote::RunLog)),
        ],
        AnchorNote::RunLog => vec![
            format!("Parent note: {}", link(AnchorNote::Home)),
            related_line(anchor, paths),
            String::new(),
            "## Entries".to_string(),
        ],
        AnchorNote::Decisions => vec![
            format!("Parent note: {}", link(AnchorNote::Home)),
            related_line(anchor, paths),
            String::new(),
            "## Decision Register".to_string(),
            "- Record irreversible or expensive choices and rationale.".to_string(),
        ],
        AnchorNote::OpenQuestions => vec![
            format!("Parent note: {}", link(AnchorNote::Home)),
            related_line(anchor, paths),
            String::new(),
            "## Open Questions".to_string(),
            "- Track unknowns that block confident execution.".to_string(),
        ],
    };

    format!("{}\n\n# {}\n\n{}", frontmatter, title, body.join("\n"))
}

/// `Related: [[A]] · [[B]]` for the anchors other than `anchor` and Home.
fn related_line(anchor: AnchorNote, paths: &NotePaths) -> String {
    let links: Vec<String> = anchor
        .others()
        .filter(|a| *a != AnchorNote::Home)
        .map(|a| wikilink(paths.link_target(a)))
        .collect();
    format!("Related: {}", links.join(" · "))
}
