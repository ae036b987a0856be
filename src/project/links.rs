//! Wikilink parsing (regex-based).

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn wikilink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // [[target]], [[target|alias]], [[target#heading]], ![[embed]]
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]|#]+)(?:#[^\[\]|]*)?(?:\|[^\[\]]*)?\]\]").expect("Invalid regex pattern"))
}

/// Format a wikilink to a note stem.
pub fn wikilink(target: &str) -> String {
    format!("[[{}]]", target)
}

/// Link targets in `content`, reduced to the note stem
/// (`[[Folder/Note.md|alias]]` → `Note`).
pub fn extract_link_targets(content: &str) -> Vec<String> {
    wikilink_regex()
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .map(|m| {
            let target = m.as_str().trim();
            let stem = target.rsplit('/').next().unwrap_or(target);
            stem.strip_suffix(".md").unwrap_or(stem).to_string()
        })
        .filter(|stem| !stem.is_empty())
        .collect()
}

/// Targets from `wanted` that `content` does not link to yet.
///
/// Obsidian resolves links case-insensitively, so comparison is too.
pub fn missing_links<'a>(content: &str, wanted: &[&'a str]) -> Vec<&'a str> {
    let present: HashSet<String> = extract_link_targets(content)
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();
    wanted
        .iter()
        .copied()
        .filter(|w| !present.contains(&w.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_and_decorated_links() {
        let content = "See [[MOC]], [[Project Memory/demo/Run Log.md|runs]] and [[Decisions#2026]]. ![[Open Questions]]";
        let targets = extract_link_targets(content);
        assert_eq!(targets, vec!["MOC", "Run Log", "Decisions", "Open Questions"]);
    }

    #[test]
    fn test_extract_no_links() {
        assert!(extract_link_targets("No links [here] or [[ ]] there").is_empty());
        assert!(extract_link_targets("plain text").is_empty());
    }

    #[test]
    fn test_missing_links_case_insensitive() {
        let content = "Parent note: [[demo home]]\n- [[MOC]]";
        let missing = missing_links(content, &["Demo Home", "MOC", "Run Log"]);
        assert_eq!(missing, vec!["Run Log"]);
    }

    #[test]
    fn test_wikilink_format() {
        assert_eq!(wikilink("Run Log"), "[[Run Log]]");
    }
}
