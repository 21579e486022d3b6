//! Permission audit command.
//!
//! Statically cross-references declared manifest permissions against source
//! usage. Static text matching cannot prove absence of use, so everything
//! this audit flags (unused permissions, undeclared API usage, uncovered
//! remote URLs) is a candidate for review, never a gate: the pipeline
//! records the findings and moves on.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

use storeforge_spec::{Manifest, StageError};

const SCAN_SUFFIXES: [&str; 8] = ["js", "mjs", "cjs", "ts", "tsx", "jsx", "html", "json"];
const EXCLUDED_DIRS: [&str; 4] = [".git", "node_modules", "release", "__pycache__"];

/// Fixed permission -> usage-signature map. Unlisted permissions fall back
/// to `chrome.<lowerCamelName>`.
const PERMISSION_ALIASES: [(&str, &[&str]); 24] = [
    ("activeTab", &["chrome.tabs", "chrome.scripting"]),
    ("alarms", &["chrome.alarms"]),
    ("bookmarks", &["chrome.bookmarks"]),
    ("commands", &["chrome.commands"]),
    ("contextMenus", &["chrome.contextMenus"]),
    ("cookies", &["chrome.cookies"]),
    ("declarativeNetRequest", &["chrome.declarativeNetRequest"]),
    (
        "declarativeNetRequestWithHostAccess",
        &["chrome.declarativeNetRequest"],
    ),
    ("downloads", &["chrome.downloads"]),
    ("history", &["chrome.history"]),
    ("identity", &["chrome.identity"]),
    ("idle", &["chrome.idle"]),
    ("management", &["chrome.management"]),
    (
        "nativeMessaging",
        &["chrome.runtime.connectNative", "chrome.runtime.sendNativeMessage"],
    ),
    ("notifications", &["chrome.notifications"]),
    ("offscreen", &["chrome.offscreen"]),
    ("permissions", &["chrome.permissions"]),
    ("scripting", &["chrome.scripting"]),
    ("sidePanel", &["chrome.sidePanel"]),
    ("storage", &["chrome.storage"]),
    ("tabs", &["chrome.tabs"]),
    ("topSites", &["chrome.topSites"]),
    ("webNavigation", &["chrome.webNavigation"]),
    ("webRequest", &["chrome.webRequest"]),
];

/// `chrome.*` namespaces that require no manifest permission; API hits on
/// these never count as undeclared usage.
const NO_PERMISSION_APIS: [&str; 6] = ["action", "devtools", "extension", "i18n", "runtime", "windows"];

static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static API_REGEX: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| {
        Regex::new(r"https?://[A-Za-z0-9._~:/?#\[\]@!$&'()*+,;=%-]+").expect("invalid regex pattern")
    })
}

fn api_regex() -> &'static Regex {
    API_REGEX
        .get_or_init(|| Regex::new(r"\bchrome\.([a-zA-Z]+)").expect("invalid regex pattern"))
}

/// One source line backing a finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub file: String,
    pub line: usize,
    pub text: String,
}

/// The audit result sets.
#[derive(Debug)]
pub struct AuditOutcome {
    /// Declared permissions with zero usage evidence.
    pub unused: Vec<String>,
    /// `chrome.*` namespaces used without a covering declared permission.
    pub undeclared: Vec<String>,
    /// Remote URLs in source not covered by any declared host pattern.
    pub uncovered_urls: Vec<String>,
    pub report_path: PathBuf,
}

fn permission_aliases(permission: &str) -> Vec<String> {
    for (name, aliases) in PERMISSION_ALIASES {
        if name == permission {
            return aliases.iter().map(|s| s.to_string()).collect();
        }
    }
    let mut chars = permission.chars();
    let lowered = match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    };
    vec![format!("chrome.{lowered}")]
}

/// The reverse lookup: which declared permission covers an API namespace.
fn namespace_covered(namespace: &str, declared: &[String]) -> bool {
    let token = format!("chrome.{namespace}");
    declared.iter().any(|permission| {
        permission_aliases(permission)
            .iter()
            .any(|alias| alias == &token || alias.starts_with(&format!("{token}.")))
    })
}

fn scan_source_files(root: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = Vec::new();
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
        let path = entry.path();
        let suffix_ok = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SCAN_SUFFIXES.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !suffix_ok {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if rel == "manifest.json" {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(path) {
            files.push((rel, content));
        }
    }
    files
}

fn collect_permission_evidence(
    files: &[(String, String)],
    permission: &str,
) -> Vec<Evidence> {
    let aliases = permission_aliases(permission);
    let mut evidence = Vec::new();
    for (file, content) in files {
        for (line_idx, line) in content.lines().enumerate() {
            if aliases.iter().any(|alias| line.contains(alias.as_str())) {
                evidence.push(Evidence {
                    file: file.clone(),
                    line: line_idx + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    evidence
}

fn collect_api_usage(files: &[(String, String)]) -> BTreeMap<String, Evidence> {
    let mut first_use: BTreeMap<String, Evidence> = BTreeMap::new();
    for (file, content) in files {
        for (line_idx, line) in content.lines().enumerate() {
            for caps in api_regex().captures_iter(line) {
                let namespace = caps[1].to_string();
                first_use.entry(namespace).or_insert_with(|| Evidence {
                    file: file.clone(),
                    line: line_idx + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    first_use
}

fn collect_urls(files: &[(String, String)]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for (_, content) in files {
        for line in content.lines() {
            for matched in url_regex().find_iter(line) {
                let url = matched.as_str().to_string();
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
    }
    urls.sort();
    urls
}

/// Whether a host permission pattern covers a URL.
fn match_host_pattern(url: &str, pattern: &str) -> bool {
    if pattern == "<all_urls>" {
        return true;
    }
    if let Some(tail) = pattern.strip_prefix("*://") {
        return matches_glob(url, &format!("http://{tail}"))
            || matches_glob(url, &format!("https://{tail}"));
    }
    matches_glob(url, pattern)
}

fn matches_glob(value: &str, pattern: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(value))
        .unwrap_or(false)
}

/// Runs the permission audit and writes the markdown report.
pub fn run_audit(
    root: &Path,
    manifest_rel: &str,
    out_rel: &str,
    max_evidence: usize,
) -> Result<AuditOutcome, StageError> {
    if !root.is_dir() {
        return Err(StageError::RootNotADirectory(root.to_path_buf()));
    }
    let manifest = Manifest::load(&root.join(manifest_rel))?;
    let files = scan_source_files(root);
    let max_evidence = max_evidence.max(1);

    let declared: Vec<String> = manifest
        .permissions
        .iter()
        .chain(manifest.optional_permissions.iter())
        .cloned()
        .collect();

    let evidence: BTreeMap<String, Vec<Evidence>> = declared
        .iter()
        .map(|permission| {
            (
                permission.clone(),
                collect_permission_evidence(&files, permission),
            )
        })
        .collect();

    let unused: Vec<String> = manifest
        .permissions
        .iter()
        .filter(|permission| {
            evidence
                .get(*permission)
                .map(|list| list.is_empty())
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    let api_usage = collect_api_usage(&files);
    let undeclared: Vec<String> = api_usage
        .keys()
        .filter(|namespace| {
            !NO_PERMISSION_APIS.contains(&namespace.as_str())
                && !namespace_covered(namespace, &declared)
        })
        .cloned()
        .collect();

    let host_patterns = manifest.declared_host_patterns();
    let urls = collect_urls(&files);
    let uncovered_urls: Vec<String> = if host_patterns.is_empty() {
        Vec::new()
    } else {
        urls.iter()
            .filter(|url| {
                !host_patterns
                    .iter()
                    .any(|pattern| match_host_pattern(url, pattern))
            })
            .cloned()
            .collect()
    };

    let report = render_report(
        &manifest,
        &evidence,
        &api_usage,
        &unused,
        &undeclared,
        &host_patterns,
        &urls,
        &uncovered_urls,
        max_evidence,
    );

    let report_path = root.join(out_rel);
    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&report_path, report)?;

    Ok(AuditOutcome {
        unused,
        undeclared,
        uncovered_urls,
        report_path,
    })
}

#[allow(clippy::too_many_arguments)]
fn render_report(
    manifest: &Manifest,
    evidence: &BTreeMap<String, Vec<Evidence>>,
    api_usage: &BTreeMap<String, Evidence>,
    unused: &[String],
    undeclared: &[String],
    host_patterns: &[String],
    urls: &[String],
    uncovered_urls: &[String],
    max_evidence: usize,
) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%SZ");
    let mut lines: Vec<String> = vec![
        "# Permission Audit Report".to_string(),
        String::new(),
        format!("Generated at: `{timestamp}`"),
        String::new(),
        "## Manifest Summary".to_string(),
        String::new(),
        format!("- Name: `{}`", manifest.name),
        format!("- Version: `{}`", manifest.version),
        format!("- Manifest version: `{}`", manifest.manifest_version),
        String::new(),
        "## Declared Permissions".to_string(),
        String::new(),
        "| Permission | Scope | Evidence Count | Status |".to_string(),
        "|---|---|---:|---|".to_string(),
    ];

    for (scope, list) in [
        ("required", &manifest.permissions),
        ("optional", &manifest.optional_permissions),
    ] {
        for permission in list {
            let count = evidence.get(permission).map(|e| e.len()).unwrap_or(0);
            let status = if count > 0 { "OK" } else { "CHECK" };
            lines.push(format!("| `{permission}` | {scope} | {count} | {status} |"));
        }
    }

    lines.extend([String::new(), "## Permission Evidence Details".to_string(), String::new()]);
    for permission in manifest
        .permissions
        .iter()
        .chain(manifest.optional_permissions.iter())
    {
        lines.push(format!("### `{permission}`"));
        let list = evidence.get(permission).cloned().unwrap_or_default();
        if list.is_empty() {
            lines.push(
                "- No direct API evidence found. Review whether this permission is still needed."
                    .to_string(),
            );
            lines.push(String::new());
            continue;
        }
        for item in list.iter().take(max_evidence) {
            lines.push(format!("- `{}:{}`: `{}`", item.file, item.line, item.text));
        }
        if list.len() > max_evidence {
            lines.push(format!("- ... and {} more", list.len() - max_evidence));
        }
        lines.push(String::new());
    }

    lines.extend(["## Undeclared API Usage".to_string(), String::new()]);
    if undeclared.is_empty() {
        lines.push("- None".to_string());
    } else {
        for namespace in undeclared {
            if let Some(first) = api_usage.get(namespace) {
                lines.push(format!(
                    "- `chrome.{namespace}` used at `{}:{}` with no covering permission",
                    first.file, first.line
                ));
            }
        }
    }

    lines.extend([
        String::new(),
        "## Host Permission Review".to_string(),
        String::new(),
        "### Declared Host Permissions".to_string(),
    ]);
    if host_patterns.is_empty() {
        lines.push("- None".to_string());
    } else {
        for pattern in host_patterns {
            lines.push(format!("- `{pattern}`"));
        }
    }

    lines.extend([String::new(), "### Detected Remote URLs in Source".to_string()]);
    if urls.is_empty() {
        lines.push("- None".to_string());
    } else {
        for url in urls {
            lines.push(format!("- `{url}`"));
        }
    }

    lines.extend([String::new(), "### Uncovered URLs".to_string()]);
    if uncovered_urls.is_empty() {
        lines.push("- None".to_string());
    } else {
        for url in uncovered_urls {
            lines.push(format!("- `{url}`"));
        }
    }

    lines.extend([String::new(), "## Recommendations".to_string(), String::new()]);
    if unused.is_empty() {
        lines.push("- Required permissions have direct code evidence.".to_string());
    } else {
        lines.push(
            "- Review and remove permissions with no direct evidence, or add explicit rationale."
                .to_string(),
        );
    }
    if undeclared.is_empty() && uncovered_urls.is_empty() {
        lines.push("- Declared permissions cover detected API and URL usage.".to_string());
    } else {
        lines.push(
            "- Declare the missing permissions/hosts for flagged usage, or remove dead code."
                .to_string(),
        );
    }
    lines.push(String::new());

    lines.join("\n")
}

/// Run the audit command.
pub fn run(
    root: &str,
    manifest_rel: &str,
    out_rel: &str,
    max_evidence: usize,
    fail_on_missing: bool,
) -> Result<ExitCode> {
    let outcome = run_audit(Path::new(root), manifest_rel, out_rel, max_evidence)?;

    println!(
        "{} permission audit report written: {}",
        "ok".green(),
        outcome.report_path.display()
    );
    println!("{} unused permissions: {}", "ok".green(), outcome.unused.len());
    println!(
        "{} undeclared API namespaces: {}",
        "ok".green(),
        outcome.undeclared.len()
    );
    println!(
        "{} uncovered URLs: {}",
        "ok".green(),
        outcome.uncovered_urls.len()
    );

    if fail_on_missing
        && (!outcome.unused.is_empty()
            || !outcome.undeclared.is_empty()
            || !outcome.uncovered_urls.is_empty())
    {
        eprintln!(
            "{} audit findings present and --fail-on-missing was set",
            "error:".red()
        );
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
