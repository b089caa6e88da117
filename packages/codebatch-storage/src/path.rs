//! C1: path canonicalizer. Normalizes, validates, and detects escape of
//! user-supplied paths; computes case-insensitive collision keys.
//!
//! Never touches the filesystem unless `root` is supplied for absolute-path
//! verification.

use crate::error::{Result, StorageError};
use std::path::Path;

const RESERVED_BASENAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Canonicalize a user-supplied path. `root`, if given, is used only to
/// verify that joining the canonical path to it does not escape `root` on
/// the real filesystem; a non-escape failure there (path too long, a
/// dangling symlink, permission denied) is not proof of an escape and is
/// deliberately not treated as one.
pub fn canonicalize(path: &str, root: Option<&Path>) -> Result<String> {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    let mut stack: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            if stack.pop().is_none() {
                return Err(StorageError::PathEscape(path.to_string()));
            }
            continue;
        }
        validate_segment(path, segment)?;
        stack.push(segment);
    }

    if stack.is_empty() {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
            reason: "empty after normalization".to_string(),
        });
    }

    let canonical = stack.join("/");

    if let Some(root) = root {
        let joined = root.join(&canonical);
        match joined.canonicalize() {
            Ok(resolved) => {
                let root_resolved = root
                    .canonicalize()
                    .unwrap_or_else(|_| root.to_path_buf());
                if !resolved.starts_with(&root_resolved) {
                    return Err(StorageError::PathEscape(path.to_string()));
                }
            }
            Err(_) => {
                // Cannot prove an escape occurred (file may simply not
                // exist yet, permission denied, dangling symlink, path too
                // long): leniently accept rather than block.
            }
        }
    }

    Ok(canonical)
}

fn validate_segment(original: &str, segment: &str) -> Result<()> {
    if segment.chars().any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c)) {
        return Err(StorageError::InvalidPath {
            path: original.to_string(),
            reason: format!("segment contains forbidden characters: {segment}"),
        });
    }
    let basename = segment.split('.').next().unwrap_or(segment);
    if RESERVED_BASENAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(basename))
    {
        return Err(StorageError::InvalidPath {
            path: original.to_string(),
            reason: format!("reserved basename: {segment}"),
        });
    }
    Ok(())
}

/// The lowercase form of a canonical path, used only for collision
/// detection and secondary key uniqueness. Original casing is preserved
/// separately wherever `path` is stored.
pub fn path_key(canonical: &str) -> String {
    canonical.to_lowercase()
}

/// All unordered pairs of paths that share a `path_key`.
pub fn detect_case_collisions(paths: &[String]) -> Vec<(String, String)> {
    use std::collections::HashMap;
    let mut by_key: HashMap<String, Vec<&String>> = HashMap::new();
    for p in paths {
        by_key.entry(path_key(p)).or_default().push(p);
    }
    let mut collisions = Vec::new();
    for group in by_key.values() {
        if group.len() < 2 {
            continue;
        }
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                collisions.push((group[i].clone(), group[j].clone()));
            }
        }
    }
    collisions.sort();
    collisions
}
