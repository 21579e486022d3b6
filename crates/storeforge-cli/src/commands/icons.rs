//! Icon bootstrap command.
//!
//! Ensures the runtime icons (16/48/128) exist and the manifest maps to
//! them. This is the one place the pipeline writes into the extension root,
//! and the write is gated on a computed patch: read manifest, compare, write
//! only when something is actually missing.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use storeforge_assets::icon_render::{palette_from_name, write_icon};
use storeforge_spec::manifest::{self, runtime_icon_path, IconPatch, RUNTIME_ICON_SIZES};
use storeforge_spec::{Manifest, StageError};

/// What an icon bootstrap pass did (or would do under dry-run).
#[derive(Debug)]
pub struct IconBootstrapOutcome {
    pub changed: bool,
    pub logs: Vec<String>,
}

/// Ensures runtime icons and manifest wiring, optionally as a dry run.
pub fn ensure_icons(
    root: &Path,
    manifest_rel: &str,
    dry_run: bool,
) -> Result<IconBootstrapOutcome, StageError> {
    let manifest_path = root.join(manifest_rel);
    let mut value = manifest::load_value(&manifest_path)?;
    let typed = Manifest::load(&manifest_path)?;

    let patch = IconPatch::compute(&value);
    let files_ok = RUNTIME_ICON_SIZES
        .iter()
        .all(|size| root.join(runtime_icon_path(*size)).is_file());

    let mut logs = Vec::new();
    if patch.is_empty() && files_ok {
        logs.push("extension icons already configured".to_string());
        return Ok(IconBootstrapOutcome {
            changed: false,
            logs,
        });
    }

    let base = palette_from_name(typed.display_name());
    let icons_dir = root.join("icons");
    if !icons_dir.is_dir() {
        logs.push(format!("create directory: {}", icons_dir.display()));
        if !dry_run {
            std::fs::create_dir_all(&icons_dir)?;
        }
    }

    for size in RUNTIME_ICON_SIZES {
        let icon_path = root.join(runtime_icon_path(size));
        if !icon_path.is_file() {
            logs.push(format!("generate icon: {}", icon_path.display()));
            if !dry_run {
                write_icon(&icon_path, size, base)?;
            }
        }
    }

    if !patch.is_empty() {
        logs.push("update manifest icon mappings".to_string());
        if !dry_run {
            patch.apply(&mut value);
            manifest::save_value(&manifest_path, &value)?;
        }
    }

    logs.push(if dry_run {
        "icon bootstrap planned".to_string()
    } else {
        "icon bootstrap completed".to_string()
    });
    Ok(IconBootstrapOutcome {
        changed: true,
        logs,
    })
}

/// Run the icons command.
pub fn run(root: &str, manifest_rel: &str, dry_run: bool) -> Result<ExitCode> {
    let root = Path::new(root);
    if !root.is_dir() {
        eprintln!(
            "{} root is not a directory: {}",
            "error:".red(),
            root.display()
        );
        return Ok(ExitCode::from(1));
    }

    let outcome = ensure_icons(root, manifest_rel, dry_run)?;
    for line in &outcome.logs {
        println!("  {} {}", "->".green(), line);
    }
    println!(
        "{} changed: {}",
        "ok".green(),
        if outcome.changed { 1 } else { 0 }
    );
    Ok(ExitCode::SUCCESS)
}
