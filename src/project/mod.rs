//! Project identity and the vault layout of a project's notes.
//!
//! A project lives under `<project_root>/<slug>/` in the vault with five anchor
//! notes (Home, MOC, Run Log, Decisions, Open Questions) and a `Runs/` folder.

pub mod links;
pub mod templates;

use crate::error::Result;
use crate::store::MappingStore;

/// Lowercase, runs of anything but `[a-z0-9]` collapsed to a single `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// A project as named by the user plus its slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub name: String,
    pub slug: String,
}

impl ProjectIdentity {
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        let slug = match slugify(&name) {
            s if s.is_empty() => "project".to_string(),
            s => s,
        };
        Self { name, slug }
    }

    /// Identity as registered in the store.
    ///
    /// Names that slugify to an existing project reuse that project's display
    /// name so its anchor notes keep resolving.
    pub fn claim(name: &str, store: &mut MappingStore) -> Result<Self> {
        let requested = Self::new(name);
        let registered = store.register_project(&requested.slug, &requested.name)?;
        if registered != requested.name {
            log::warn!(
                "Project name '{}' collides with existing project '{}' (slug '{}'); using '{}'",
                requested.name,
                registered,
                requested.slug,
                registered
            );
        }
        Ok(Self {
            name: registered,
            slug: requested.slug,
        })
    }
}

/// The five notes every project has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorNote {
    Home,
    Moc,
    RunLog,
    Decisions,
    OpenQuestions,
}

impl AnchorNote {
    /// Creation order used by the bootstrapper.
    pub const ALL: [AnchorNote; 5] = [
        AnchorNote::Home,
        AnchorNote::Moc,
        AnchorNote::RunLog,
        AnchorNote::Decisions,
        AnchorNote::OpenQuestions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AnchorNote::Home => "Home",
            AnchorNote::Moc => "MOC",
            AnchorNote::RunLog => "Run Log",
            AnchorNote::Decisions => "Decisions",
            AnchorNote::OpenQuestions => "Open Questions",
        }
    }

    /// Every anchor except `self`, in creation order.
    pub fn others(self) -> impl Iterator<Item = AnchorNote> {
        Self::ALL.into_iter().filter(move |a| *a != self)
    }
}

/// Vault-relative paths (always `/`-separated) of a project's notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePaths {
    pub project_dir: String,
    pub home: String,
    pub moc: String,
    pub run_log: String,
    pub decisions: String,
    pub questions: String,
    pub runs_dir: String,
}

impl NotePaths {
    pub fn new(project: &ProjectIdentity, project_root: &str) -> Self {
        let project_dir = format!("{}/{}", project_root.trim_end_matches('/'), project.slug);
        let home_name = match format!("{} Home", project.name).trim() {
            "Home" => "Project Home".to_string(),
            other => other.to_string(),
        };
        Self {
            home: format!("{}/{}.md", project_dir, home_name),
            moc: format!("{}/MOC.md", project_dir),
            run_log: format!("{}/Run Log.md", project_dir),
            decisions: format!("{}/Decisions.md", project_dir),
            questions: format!("{}/Open Questions.md", project_dir),
            runs_dir: format!("{}/Runs", project_dir),
            project_dir,
        }
    }

    pub fn anchor(&self, anchor: AnchorNote) -> &str {
        match anchor {
            AnchorNote::Home => &self.home,
            AnchorNote::Moc => &self.moc,
            AnchorNote::RunLog => &self.run_log,
            AnchorNote::Decisions => &self.decisions,
            AnchorNote::OpenQuestions => &self.questions,
        }
    }

    /// Wikilink target (file stem) of an anchor note.
    pub fn link_target(&self, anchor: AnchorNote) -> &str {
        note_stem(self.anchor(anchor))
    }
}

/// File name of a vault path without directories or the `.md` extension.
pub fn note_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}
