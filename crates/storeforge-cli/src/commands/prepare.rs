//! Baseline prep command.
//!
//! Ensures the publish prerequisites exist before the heavier stages run: a
//! root privacy policy (the store listing links to it) and release-output
//! ignore entries. Existing user content is never rewritten, only appended.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use regex::Regex;
use std::path::Path;
use std::process::ExitCode;

use storeforge_spec::{Manifest, StageError};

const GITIGNORE_LINES: [&str; 3] = ["release/", "node_modules/", ".DS_Store"];

/// What a prep pass changed (or would change under dry-run).
#[derive(Debug)]
pub struct PrepareOutcome {
    pub changed: usize,
    pub logs: Vec<String>,
}

fn slugify(value: &str) -> String {
    let re = Regex::new(r"[^a-z0-9]+").expect("invalid regex pattern");
    let slug = re
        .replace_all(&value.to_ascii_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        "chrome-extension".to_string()
    } else {
        slug
    }
}

fn privacy_policy_template(extension_name: &str) -> String {
    let today = Utc::now().format("%Y-%m-%d");
    let slug = slugify(extension_name);
    format!(
        "# Privacy Policy\n\n\
         Last updated: {today}\n\n\
         This Privacy Policy describes how **{extension_name}** handles data.\n\n\
         ## Data Collection\n\n\
         - This extension does not collect personal information.\n\
         - Extension data is stored locally in the browser (for example via `chrome.storage`).\n\n\
         ## Data Sharing\n\n\
         - No personal data is sold, shared, or transferred to third parties.\n\
         - Network requests, if any, are used only to provide core extension functionality.\n\n\
         ## Permissions Use\n\n\
         - Permissions requested in `manifest.json` are used only for the declared extension features.\n\n\
         ## Data Retention\n\n\
         - Locally stored data remains on the user's device until the user clears browser data or removes the extension.\n\n\
         ## Contact\n\n\
         If you have questions about this policy, contact: `support@{slug}.local`.\n"
    )
}

/// Ensures the baseline files, optionally as a dry run.
pub fn prepare(root: &Path, dry_run: bool) -> Result<PrepareOutcome, StageError> {
    let mut changed = 0;
    let mut logs = Vec::new();

    let policy_path = root.join("privacy-policy.md");
    if policy_path.is_file() {
        logs.push(format!("privacy policy exists: {}", policy_path.display()));
    } else {
        let name = Manifest::load(&root.join("manifest.json"))
            .map(|manifest| manifest.display_name().to_string())
            .unwrap_or_else(|_| "Chrome Extension".to_string());
        changed += 1;
        if dry_run {
            logs.push(format!("would create: {}", policy_path.display()));
        } else {
            std::fs::write(&policy_path, privacy_policy_template(&name))?;
            logs.push(format!("created: {}", policy_path.display()));
        }
    }

    let gitignore_path = root.join(".gitignore");
    let original = if gitignore_path.is_file() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };
    let existing: Vec<&str> = original.lines().map(str::trim).collect();
    let missing: Vec<&str> = GITIGNORE_LINES
        .iter()
        .filter(|line| !existing.contains(*line))
        .copied()
        .collect();

    if missing.is_empty() {
        logs.push(format!(
            ".gitignore already contains required entries: {}",
            gitignore_path.display()
        ));
    } else {
        changed += 1;
        if dry_run {
            logs.push(format!(
                "would update: {} (+{})",
                gitignore_path.display(),
                missing.join(", ")
            ));
        } else {
            let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
            if lines.last().map(|l| !l.trim().is_empty()).unwrap_or(false) {
                lines.push(String::new());
            }
            lines.extend(missing.iter().map(|l| l.to_string()));
            let content = format!("{}\n", lines.join("\n").trim_end_matches('\n'));
            std::fs::write(&gitignore_path, content)?;
            logs.push(format!(
                "updated: {} (+{})",
                gitignore_path.display(),
                missing.join(", ")
            ));
        }
    }

    Ok(PrepareOutcome { changed, logs })
}

/// Run the prepare command.
pub fn run(root: &str, dry_run: bool) -> Result<ExitCode> {
    let root = Path::new(root);
    if !root.is_dir() {
        eprintln!(
            "{} root is not a directory: {}",
            "error:".red(),
            root.display()
        );
        return Ok(ExitCode::from(1));
    }

    let outcome = prepare(root, dry_run)?;
    for line in &outcome.logs {
        println!("  {} {}", "->".green(), line);
    }
    if dry_run {
        println!("{} planned changes: {}", "ok".green(), outcome.changed);
    } else {
        println!("{} changed files: {}", "ok".green(), outcome.changed);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Tab Tidy!"), "tab-tidy");
        assert_eq!(slugify("   "), "chrome-extension");
    }

    #[test]
    fn test_creates_policy_and_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version": 3, "name": "Tab Tidy", "version": "1.0"}"#,
        )
        .unwrap();

        let outcome = prepare(dir.path(), false).unwrap();
        assert_eq!(outcome.changed, 2);

        let policy = std::fs::read_to_string(dir.path().join("privacy-policy.md")).unwrap();
        assert!(policy.contains("**Tab Tidy**"));
        assert!(policy.contains("support@tab-tidy.local"));

        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains("release/"));
    }

    #[test]
    fn test_appends_only_missing_gitignore_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("privacy-policy.md"), "existing").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "release/\ncustom/\n").unwrap();

        let outcome = prepare(dir.path(), false).unwrap();
        assert_eq!(outcome.changed, 1);

        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains("custom/"));
        assert!(gitignore.contains("node_modules/"));
        assert_eq!(gitignore.matches("release/").count(), 1);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = prepare(dir.path(), true).unwrap();
        assert_eq!(outcome.changed, 2);
        assert!(!dir.path().join("privacy-policy.md").exists());
        assert!(!dir.path().join(".gitignore").exists());
    }

    #[test]
    fn test_idempotent_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        prepare(dir.path(), false).unwrap();
        let second = prepare(dir.path(), false).unwrap();
        assert_eq!(second.changed, 0);
    }
}
