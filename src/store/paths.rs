//! Workspace path normalization.

use std::path::{Component, Path, PathBuf};
use crate::error::Result;

/// Normalize a workspace path so equivalent spellings share one key.
///
/// - a leading `~` expands to the home directory
/// - relative paths are joined onto the current directory
/// - `.` segments are dropped and `..` segments pop their parent
/// - the longest existing prefix is canonicalized (symlinks), the rest is kept
/// - trailing separators disappear because the path is rebuilt from components
pub fn normalize_workspace(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let lexical = lexical_normalize(&absolute);
    Ok(canonicalize_existing_prefix(&lexical))
}

/// Case-folded key for a normalized path.
pub fn workspace_key(normalized: &Path) -> String {
    normalized.to_string_lossy().to_lowercase()
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // never pops past the root
                if out.parent().is_some() {
                    out.pop();
                }
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut remainder: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for segment in remainder.iter().rev() {
                out.push(segment);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    #[test]
    fn test_trailing_and_dot_segments_collapse() {
        let a = normalize_workspace(Path::new("/repo/a")).unwrap();
        assert_eq!(normalize_workspace(Path::new("/repo/a/")).unwrap(), a);
        assert_eq!(normalize_workspace(Path::new("/repo/./a//")).unwrap(), a);
        assert_eq!(normalize_workspace(Path::new("/repo/b/../a")).unwrap(), a);
    }

    #[test]
    fn test_parent_never_escapes_root() {
        let p = normalize_workspace(Path::new("/../../repo")).unwrap();
        assert_eq!(workspace_key(&p), workspace_key(&normalize_workspace(Path::new("/repo")).unwrap()));
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let upper = normalize_workspace(Path::new("/Repo/A")).unwrap();
        let lower = normalize_workspace(Path::new("/repo/a")).unwrap();
        assert_eq!(workspace_key(&upper), workspace_key(&lower));
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let p = normalize_workspace(Path::new("some/relative/dir")).unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("some/relative/dir"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_resolves_to_target() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let via_link = normalize_workspace(&link.join("sub")).unwrap();
        let via_real = normalize_workspace(&real.join("sub")).unwrap();
        assert_eq!(via_link, via_real);
    }
}
