//! Extension packager.
//!
//! Builds the store upload archive from a fixed whitelist of source
//! directories plus the manifest, excluding platform noise. The archive is
//! reproducible: entries are sorted, timestamps pinned to the DOS epoch, and
//! permissions normalized, so an unchanged source tree zips to identical
//! bytes.

use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use storeforge_spec::StageError;

/// Top-level directories considered extension source.
pub const SOURCE_DIR_WHITELIST: [&str; 12] = [
    "_locales",
    "assets",
    "background",
    "content",
    "icons",
    "lib",
    "options",
    "popup",
    "scripts",
    "src",
    "styles",
    "vendor",
];

/// Globs excluded from every archive.
pub const DEFAULT_EXCLUDES: [&str; 11] = [
    ".git/**",
    ".github/**",
    "release/**",
    "node_modules/**",
    "__pycache__/**",
    "*.pyc",
    "*.pyo",
    ".DS_Store",
    "**/.DS_Store",
    "Thumbs.db",
    "**/Thumbs.db",
];

const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// What a packaging run produced.
#[derive(Debug)]
pub struct PackageOutcome {
    /// Archive-relative file list, sorted.
    pub files: Vec<String>,
    pub zip_path: PathBuf,
    /// BLAKE3 of the archive bytes; absent on dry runs.
    pub hash: Option<String>,
}

/// Builds (or dry-runs) the store archive.
pub fn build_package(
    root: &Path,
    manifest_rel: &str,
    out_rel: &str,
    extras: &[String],
    extra_excludes: &[String],
    dry_run: bool,
) -> Result<PackageOutcome, StageError> {
    if !root.is_dir() {
        return Err(StageError::RootNotADirectory(root.to_path_buf()));
    }
    let manifest_path = root.join(manifest_rel);
    if !manifest_path.is_file() {
        return Err(StageError::ManifestMissing(manifest_path));
    }
    // A syntactically broken manifest must never reach the store.
    let manifest_text = std::fs::read_to_string(&manifest_path)?;
    serde_json::from_str::<serde_json::Value>(&manifest_text)
        .map_err(|e| StageError::ManifestInvalid(e.to_string()))?;

    let excludes = compile_excludes(extra_excludes);
    let mut selected: Vec<String> = Vec::new();

    add_file(root, &manifest_path, &excludes, &mut selected);

    for dir in SOURCE_DIR_WHITELIST {
        let dir_path = root.join(dir);
        if !dir_path.is_dir() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&dir_path)
            .sort_by_file_name()
            .into_iter()
            .flatten()
        {
            if entry.file_type().is_file() {
                add_file(root, entry.path(), &excludes, &mut selected);
            }
        }
    }

    let mut missing_extras: Vec<String> = Vec::new();
    for extra in extras {
        let resolved = expand_input_path(extra, root);
        if resolved.is_empty() {
            missing_extras.push(extra.clone());
            continue;
        }
        for path in resolved {
            add_file(root, &path, &excludes, &mut selected);
        }
    }
    if !missing_extras.is_empty() {
        return Err(StageError::MissingExtraPaths(missing_extras));
    }

    selected.sort();
    selected.dedup();

    let zip_path = root.join(out_rel);
    if dry_run {
        return Ok(PackageOutcome {
            files: selected,
            zip_path,
            hash: None,
        });
    }

    write_archive(root, &zip_path, &selected)?;
    let hash = blake3::hash(&std::fs::read(&zip_path)?).to_hex().to_string();

    Ok(PackageOutcome {
        files: selected,
        zip_path,
        hash: Some(hash),
    })
}

fn compile_excludes(extra: &[String]) -> Vec<glob::Pattern> {
    DEFAULT_EXCLUDES
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().cloned())
        .filter_map(|pattern| glob::Pattern::new(&pattern).ok())
        .collect()
}

fn is_excluded(rel: &str, excludes: &[glob::Pattern]) -> bool {
    excludes.iter().any(|pattern| pattern.matches(rel))
}

fn add_file(root: &Path, path: &Path, excludes: &[glob::Pattern], selected: &mut Vec<String>) {
    if !path.is_file() {
        return;
    }
    if let Some(rel) = posix_rel(path, root) {
        if !is_excluded(&rel, excludes) {
            selected.push(rel);
        }
    }
}

/// Archive-relative path with forward slashes.
fn posix_rel(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Resolves one `--extra` entry: a glob, a file, or a directory.
fn expand_input_path(expr: &str, root: &Path) -> Vec<PathBuf> {
    if expr.contains(&WILDCARD_CHARS[..]) {
        let full = root.join(expr);
        return glob::glob(&full.to_string_lossy())
            .map(|paths| {
                paths
                    .flatten()
                    .filter(|path| path.is_file())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
    }

    let candidate = root.join(expr);
    if candidate.is_file() {
        return vec![candidate];
    }
    if candidate.is_dir() {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&candidate)
            .sort_by_file_name()
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        return files;
    }
    Vec::new()
}

fn write_archive(root: &Path, zip_path: &Path, rel_files: &[String]) -> Result<(), StageError> {
    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    // Fixed timestamp and permissions keep the archive byte-stable.
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for rel in rel_files {
        writer
            .start_file(rel.clone(), options)
            .map_err(zip_to_stage_error)?;
        let bytes = std::fs::read(root.join(rel))?;
        writer.write_all(&bytes)?;
    }
    writer.finish().map_err(zip_to_stage_error)?;
    Ok(())
}

fn zip_to_stage_error(error: zip::result::ZipError) -> StageError {
    match error {
        zip::result::ZipError::Io(e) => StageError::Io(e),
        other => StageError::Io(std::io::Error::new(std::io::ErrorKind::Other, other)),
    }
}

/// Run the package command.
pub fn run(
    root: &str,
    manifest_rel: &str,
    out_rel: &str,
    extras: &[String],
    excludes: &[String],
    dry_run: bool,
) -> Result<ExitCode> {
    let outcome = build_package(
        Path::new(root),
        manifest_rel,
        out_rel,
        extras,
        excludes,
        dry_run,
    )?;

    if dry_run {
        println!(
            "{} selected {} file(s):",
            "dry-run".yellow(),
            outcome.files.len()
        );
        for rel in &outcome.files {
            println!("  - {rel}");
        }
    } else {
        println!("{} packaged {} file(s)", "ok".green(), outcome.files.len());
        println!("{} zip: {}", "ok".green(), outcome.zip_path.display());
        if let Some(hash) = &outcome.hash {
            println!("{} blake3: {}", "ok".green(), hash);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold(root: &Path) {
        std::fs::write(
            root.join("manifest.json"),
            r#"{"manifest_version": 3, "name": "X", "version": "1.0"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("popup")).unwrap();
        std::fs::write(root.join("popup/popup.html"), "<html></html>").unwrap();
        std::fs::write(root.join("popup/popup.js"), "console.log(1);").unwrap();
        std::fs::create_dir_all(root.join("icons")).unwrap();
        std::fs::write(root.join("icons/icon16.png"), b"png").unwrap();
        // Noise that must never be packaged.
        std::fs::write(root.join("popup/.DS_Store"), b"noise").unwrap();
        std::fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        std::fs::write(root.join("node_modules/dep/index.js"), b"x").unwrap();
        std::fs::write(root.join("README.md"), "# readme").unwrap();
    }

    #[test]
    fn test_selects_whitelisted_dirs_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let outcome = build_package(
            dir.path(),
            "manifest.json",
            "release/chrome-webstore.zip",
            &[],
            &[],
            true,
        )
        .unwrap();

        assert_eq!(
            outcome.files,
            vec![
                "icons/icon16.png",
                "manifest.json",
                "popup/popup.html",
                "popup/popup.js"
            ]
        );
    }

    #[test]
    fn test_extra_adds_non_whitelisted_file() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let outcome = build_package(
            dir.path(),
            "manifest.json",
            "release/chrome-webstore.zip",
            &["README.md".to_string()],
            &[],
            true,
        )
        .unwrap();
        assert!(outcome.files.contains(&"README.md".to_string()));
    }

    #[test]
    fn test_missing_extra_fails() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let err = build_package(
            dir.path(),
            "manifest.json",
            "release/chrome-webstore.zip",
            &["no-such-file.txt".to_string()],
            &[],
            true,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::MissingExtraPaths(_)));
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_package(
            dir.path(),
            "manifest.json",
            "release/out.zip",
            &[],
            &[],
            true,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::ManifestMissing(_)));
    }

    #[test]
    fn test_manifest_only_archive_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version": 3, "name": "X", "version": "1.0"}"#,
        )
        .unwrap();

        let outcome = build_package(
            dir.path(),
            "manifest.json",
            "release/chrome-webstore.zip",
            &[],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(outcome.files, vec!["manifest.json"]);
        assert!(outcome.zip_path.is_file());
    }

    #[test]
    fn test_archive_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let first = build_package(
            dir.path(),
            "manifest.json",
            "release/a.zip",
            &[],
            &[],
            false,
        )
        .unwrap();
        let second = build_package(
            dir.path(),
            "manifest.json",
            "release/b.zip",
            &[],
            &[],
            false,
        )
        .unwrap();

        assert_eq!(first.files, second.files);
        assert_eq!(first.hash, second.hash);
        assert_eq!(
            std::fs::read(&first.zip_path).unwrap(),
            std::fs::read(&second.zip_path).unwrap()
        );
    }

    #[test]
    fn test_invalid_manifest_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.json"), "{ not json").unwrap();
        let err = build_package(
            dir.path(),
            "manifest.json",
            "release/out.zip",
            &[],
            &[],
            true,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::ManifestInvalid(_)));
    }
}
