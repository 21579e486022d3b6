//! Numbered screenshot sequence handling.
//!
//! Sequence files follow the exact grammar `screenshot-<n>-<w>x<h>.png`
//! defined in `storeforge-spec`; anything else in the directory is invisible
//! to numbering.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use storeforge_spec::{parse_screenshot_filename, StageError};

/// Existing sequence entries sorted by index.
pub fn list_existing(dir: &Path) -> Result<Vec<(usize, PathBuf)>, StageError> {
    let mut entries: Vec<(usize, PathBuf)> = Vec::new();
    if !dir.is_dir() {
        return Ok(entries);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Some((index, _)) = parse_screenshot_filename(name) {
            entries.push((index, path));
        }
    }
    entries.sort_by_key(|(index, _)| *index);
    Ok(entries)
}

/// The next free 1-based index after the existing entries.
pub fn next_index(existing: &[(usize, PathBuf)]) -> usize {
    existing.last().map(|(index, _)| index + 1).unwrap_or(1)
}

/// Deletes all numbered sequence files, keeping any path in `preserve`
/// (sources that happen to live inside the sequence directory).
///
/// Returns how many files were removed.
pub fn clear_numbered(dir: &Path, preserve: &[PathBuf]) -> Result<usize, StageError> {
    let keep: HashSet<&PathBuf> = preserve.iter().collect();
    let mut removed = 0;
    for (_, path) in list_existing(dir)? {
        if keep.contains(&path) {
            continue;
        }
        fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_list_existing_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "screenshot-3-1280x800.png");
        touch(dir.path(), "screenshot-1-1280x800.png");
        touch(dir.path(), "popup-preview-620x760.png");
        touch(dir.path(), "notes.txt");

        let existing = list_existing(dir.path()).unwrap();
        let indices: Vec<usize> = existing.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(next_index(&existing), 4);
    }

    #[test]
    fn test_next_index_on_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_index(&list_existing(dir.path()).unwrap()), 1);
    }

    #[test]
    fn test_clear_numbered_preserves_sources() {
        let dir = tempfile::tempdir().unwrap();
        let kept = touch(dir.path(), "screenshot-1-640x400.png");
        touch(dir.path(), "screenshot-2-640x400.png");
        let unrelated = touch(dir.path(), "cover.png");

        let removed = clear_numbered(dir.path(), std::slice::from_ref(&kept)).unwrap();
        assert_eq!(removed, 1);
        assert!(kept.is_file());
        assert!(unrelated.is_file());
        assert!(!dir.path().join("screenshot-2-640x400.png").exists());
    }
}
