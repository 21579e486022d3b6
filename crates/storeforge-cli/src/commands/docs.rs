//! Listing draft command.
//!
//! Writes a data-driven Chrome Web Store listing draft from the manifest:
//! summary fields, a single-purpose statement, feature bullets, permission
//! rationale, host-pattern review, and a risky remote-code scan. Fixed
//! fragments only, no free-form prose generation.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use storeforge_spec::{Manifest, StageError};

const SCAN_SUFFIXES: [&str; 7] = ["js", "mjs", "cjs", "ts", "tsx", "jsx", "html"];
const EXCLUDED_DIRS: [&str; 4] = [".git", "node_modules", "release", "__pycache__"];

const PERMISSION_HINTS: [(&str, &str); 5] = [
    (
        "storage",
        "Used to store extension settings/cache in `chrome.storage` for core functionality only, without transmitting personal data.",
    ),
    (
        "activeTab",
        "Used to access the active tab only after user action, to run page-specific features.",
    ),
    (
        "scripting",
        "Used to inject/execute extension scripts on permitted pages for declared page-enhancement features.",
    ),
    (
        "tabs",
        "Used to read/manage tab state to support extension page interaction features.",
    ),
    (
        "alarms",
        "Used to schedule background tasks (for example cache refresh), without collecting personal user data.",
    ),
];

const BROAD_HOST_PATTERNS: [&str; 4] = ["<all_urls>", "http://*/*", "https://*/*", "*://*/*"];

const RISKY_REMOTE_CODE_PATTERNS: [(&str, &str); 6] = [
    ("eval(", "Uses eval()"),
    ("new Function(", "Uses new Function()"),
    ("WebAssembly.compileStreaming(", "Uses WebAssembly.compileStreaming()"),
    ("WebAssembly.instantiateStreaming(", "Uses WebAssembly.instantiateStreaming()"),
    ("import(\"http", "Dynamic import from remote URL"),
    ("import('http", "Dynamic import from remote URL"),
];

fn permission_hint(permission: &str) -> String {
    for (name, hint) in PERMISSION_HINTS {
        if name == permission {
            return hint.to_string();
        }
    }
    format!("Used only for the declared `{permission}` extension features.")
}

fn scan_risky_patterns(root: &Path) -> Vec<(String, String)> {
    let mut findings = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() == 1
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| EXCLUDED_DIRS.contains(&name))
                    .unwrap_or(false))
        })
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let suffix_ok = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SCAN_SUFFIXES.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !suffix_ok {
            continue;
        }
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(_) => continue,
        };
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        for (needle, label) in RISKY_REMOTE_CODE_PATTERNS {
            if content.contains(needle) {
                let finding = (rel.clone(), label.to_string());
                if !findings.contains(&finding) {
                    findings.push(finding);
                }
            }
        }
    }
    findings
}

/// Writes the listing draft and returns its path.
pub fn write_listing(
    root: &Path,
    manifest_rel: &str,
    out_rel: &str,
    features: &[String],
    single_purpose: Option<&str>,
    permission_audit_rel: &str,
    privacy_policy_rel: &str,
) -> Result<PathBuf, StageError> {
    let manifest = Manifest::load(&root.join(manifest_rel))?;
    let name = manifest.display_name().to_string();
    let description = manifest.description.clone().unwrap_or_default();
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%SZ");

    let purpose = single_purpose
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            if description.trim().is_empty() {
                format!("{name} provides one focused browsing capability.")
            } else {
                description.trim().to_string()
            }
        });

    let bullets: Vec<String> = if features.is_empty() {
        if description.trim().is_empty() {
            vec![format!("{name} core functionality")]
        } else {
            vec![description.trim().to_string()]
        }
    } else {
        features.to_vec()
    };

    let mut lines: Vec<String> = vec![
        format!("# Chrome Web Store Listing Draft: {name}"),
        String::new(),
        format!("Generated at: `{timestamp}`"),
        String::new(),
        "## Manifest Summary".to_string(),
        String::new(),
        format!("- Name: `{}`", manifest.name),
        format!("- Version: `{}`", manifest.version),
        format!("- Manifest version: `{}`", manifest.manifest_version),
        String::new(),
        "## Single Purpose".to_string(),
        String::new(),
        purpose,
        String::new(),
        "## Features".to_string(),
        String::new(),
    ];
    for bullet in &bullets {
        lines.push(format!("- {bullet}"));
    }

    lines.extend([
        String::new(),
        "## Permission Rationale".to_string(),
        String::new(),
        "| Permission | Scope | Rationale |".to_string(),
        "|---|---|---|".to_string(),
    ]);
    for (scope, list) in [
        ("required", &manifest.permissions),
        ("optional", &manifest.optional_permissions),
    ] {
        for permission in list {
            lines.push(format!(
                "| `{permission}` | {scope} | {} |",
                permission_hint(permission)
            ));
        }
    }
    if manifest.permissions.is_empty() && manifest.optional_permissions.is_empty() {
        lines.push("| (none) | - | No permissions requested. |".to_string());
    }

    lines.extend([String::new(), "## Host Access".to_string(), String::new()]);
    let host_patterns = manifest.declared_host_patterns();
    if host_patterns.is_empty() {
        lines.push("- No host access requested.".to_string());
    } else {
        for pattern in &host_patterns {
            if BROAD_HOST_PATTERNS.contains(&pattern.as_str()) {
                lines.push(format!(
                    "- `{pattern}` (broad host access; expect extra review scrutiny)"
                ));
            } else {
                lines.push(format!("- `{pattern}`"));
            }
        }
    }

    lines.extend([String::new(), "## Remote Code Review".to_string(), String::new()]);
    let risky = scan_risky_patterns(root);
    if risky.is_empty() {
        lines.push("- No risky remote-code patterns detected.".to_string());
    } else {
        for (file, label) in &risky {
            lines.push(format!("- `{file}`: {label}"));
        }
    }

    lines.extend([
        String::new(),
        "## Review Pointers".to_string(),
        String::new(),
        format!("- Privacy policy: `{privacy_policy_rel}`"),
        format!("- Permission audit: `{permission_audit_rel}`"),
        String::new(),
    ]);

    let out_path = root.join(out_rel);
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out_path, lines.join("\n"))?;
    Ok(out_path)
}

/// Run the docs command.
pub fn run(
    root: &str,
    manifest_rel: &str,
    out_rel: &str,
    features: &[String],
    single_purpose: Option<&str>,
) -> Result<ExitCode> {
    let out_path = write_listing(
        Path::new(root),
        manifest_rel,
        out_rel,
        features,
        single_purpose,
        "release/permission-audit.md",
        "privacy-policy.md",
    )?;
    println!("{} listing draft written: {}", "ok".green(), out_path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold(root: &Path) {
        std::fs::write(
            root.join("manifest.json"),
            r#"{
                "manifest_version": 3,
                "name": "Tab Tidy",
                "version": "1.0",
                "description": "Groups and prunes your open tabs.",
                "permissions": ["storage", "unusualPermission"],
                "host_permissions": ["<all_urls>"]
            }"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/risky.js"), "const f = eval(\"1\");").unwrap();
    }

    #[test]
    fn test_listing_sections() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let path = write_listing(
            dir.path(),
            "manifest.json",
            "release/cws-listing.md",
            &[],
            None,
            "release/permission-audit.md",
            "privacy-policy.md",
        )
        .unwrap();

        let listing = std::fs::read_to_string(&path).unwrap();
        assert!(listing.contains("# Chrome Web Store Listing Draft: Tab Tidy"));
        assert!(listing.contains("Groups and prunes your open tabs."));
        assert!(listing.contains("| `storage` | required |"));
        // Unknown permission falls back to the generic rationale.
        assert!(listing.contains("`unusualPermission` extension features"));
        assert!(listing.contains("broad host access"));
        assert!(listing.contains("`src/risky.js`: Uses eval()"));
    }

    #[test]
    fn test_explicit_features_and_purpose() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let path = write_listing(
            dir.path(),
            "manifest.json",
            "release/cws-listing.md",
            &["One-click tab grouping".to_string()],
            Some("Organize tabs into groups."),
            "release/permission-audit.md",
            "privacy-policy.md",
        )
        .unwrap();

        let listing = std::fs::read_to_string(&path).unwrap();
        assert!(listing.contains("Organize tabs into groups."));
        assert!(listing.contains("- One-click tab grouping"));
    }

    #[test]
    fn test_clean_source_reports_no_risky_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version": 3, "name": "X", "version": "1.0"}"#,
        )
        .unwrap();

        let path = write_listing(
            dir.path(),
            "manifest.json",
            "release/cws-listing.md",
            &[],
            None,
            "release/permission-audit.md",
            "privacy-policy.md",
        )
        .unwrap();
        let listing = std::fs::read_to_string(&path).unwrap();
        assert!(listing.contains("No risky remote-code patterns detected."));
        assert!(listing.contains("No permissions requested."));
    }
}
