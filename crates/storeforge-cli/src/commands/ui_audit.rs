//! Popup UI audit command.
//!
//! Store screenshots come out of the popup, and a popup that collapses to
//! its UA default width photographs badly. This audit statically checks the
//! popup's CSS width wiring, guards against media-query width resets, and
//! verifies the runtime icons are present, correctly sized, and not the
//! untouched bootstrap placeholders.

use anyhow::Result;
use colored::Colorize;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

use storeforge_assets::icon_render::{palette_from_name, render_png_bytes};
use storeforge_assets::probe;
use storeforge_spec::manifest::RUNTIME_ICON_SIZES;
use storeforge_spec::{Manifest, StageError};

/// Severity of one audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingLevel {
    Ok,
    Warn,
    Fail,
}

impl FindingLevel {
    fn label(&self) -> &'static str {
        match self {
            FindingLevel::Ok => "OK",
            FindingLevel::Warn => "WARN",
            FindingLevel::Fail => "FAIL",
        }
    }
}

/// One audit finding.
#[derive(Debug, Clone)]
pub struct Finding {
    pub level: FindingLevel,
    pub code: &'static str,
    pub message: String,
}

/// The audit result plus where the report landed.
#[derive(Debug)]
pub struct UiAuditOutcome {
    pub findings: Vec<Finding>,
    pub report_path: PathBuf,
}

impl UiAuditOutcome {
    pub fn fail_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.level == FindingLevel::Fail)
            .count()
    }
}

static LINK_REGEX: OnceLock<Regex> = OnceLock::new();
static HREF_REGEX: OnceLock<Regex> = OnceLock::new();
static STYLE_REGEX: OnceLock<Regex> = OnceLock::new();
static CSS_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
static MEDIA_RESET_REGEX: OnceLock<Regex> = OnceLock::new();
static OVERFLOW_REGEX: OnceLock<Regex> = OnceLock::new();
static SCROLLBAR_WIDTH_REGEX: OnceLock<Regex> = OnceLock::new();

fn link_regex() -> &'static Regex {
    LINK_REGEX.get_or_init(|| Regex::new(r"(?i)<link[^>]*>").expect("invalid regex pattern"))
}

fn href_regex() -> &'static Regex {
    HREF_REGEX
        .get_or_init(|| Regex::new(r#"(?i)href=["']([^"']+)["']"#).expect("invalid regex pattern"))
}

fn style_regex() -> &'static Regex {
    STYLE_REGEX.get_or_init(|| {
        Regex::new(r"(?is)<style[^>]*>(.*?)</style>").expect("invalid regex pattern")
    })
}

fn css_block_regex() -> &'static Regex {
    CSS_BLOCK_REGEX
        .get_or_init(|| Regex::new(r"(?s)([^{}]+)\{([^{}]*)\}").expect("invalid regex pattern"))
}

fn media_reset_regex() -> &'static Regex {
    MEDIA_RESET_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)@media\s*\(\s*max-width\s*:\s*\d+px\s*\)\s*\{[\s\S]*?(html|body)[^{]*\{[^}]*width\s*:\s*100%",
        )
        .expect("invalid regex pattern")
    })
}

fn overflow_regex() -> &'static Regex {
    OVERFLOW_REGEX
        .get_or_init(|| Regex::new(r"(?i)overflow-y\s*:\s*auto").expect("invalid regex pattern"))
}

fn scrollbar_width_regex() -> &'static Regex {
    SCROLLBAR_WIDTH_REGEX
        .get_or_init(|| Regex::new(r"(?i)scrollbar-width\s*:").expect("invalid regex pattern"))
}

/// Linked stylesheet paths (local only) and concatenated inline CSS.
fn extract_stylesheets(popup_html: &str, popup_path: &Path) -> (Vec<PathBuf>, String) {
    let mut css_files = Vec::new();
    for token in link_regex().find_iter(popup_html) {
        let tag = token.as_str();
        if !tag.to_ascii_lowercase().contains("stylesheet") {
            continue;
        }
        let href = match href_regex().captures(tag) {
            Some(caps) => caps[1].trim().to_string(),
            None => continue,
        };
        if href.is_empty()
            || href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with("//")
            || href.starts_with("data:")
        {
            continue;
        }
        let base = popup_path.parent().unwrap_or(Path::new("."));
        css_files.push(base.join(href));
    }

    let inline = style_regex()
        .captures_iter(popup_html)
        .map(|caps| caps[1].to_string())
        .collect::<Vec<_>>()
        .join("\n");
    (css_files, inline)
}

fn extract_px_values(declarations: &str, prop: &str) -> Vec<u32> {
    let pattern = format!(r"(?i){}\s*:\s*(\d+)px", regex::escape(prop));
    let re = Regex::new(&pattern).expect("invalid regex pattern");
    re.captures_iter(declarations)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Width and min-width declarations on html/body selectors.
fn collect_popup_widths(css_text: &str) -> Vec<u32> {
    let mut widths = Vec::new();
    for caps in css_block_regex().captures_iter(css_text) {
        let selectors = caps[1].trim().to_string();
        let declarations = caps[2].to_string();
        let tokens: Vec<&str> = selectors.split(',').map(str::trim).collect();
        let targets_html_or_body = tokens.iter().any(|token| {
            *token == "html"
                || *token == "body"
                || token.ends_with(" html")
                || token.ends_with(" body")
        });
        if targets_html_or_body {
            widths.extend(extract_px_values(&declarations, "width"));
            widths.extend(extract_px_values(&declarations, "min-width"));
        }
    }
    widths
}

fn verify_icons(root: &Path, manifest: &Manifest, findings: &mut Vec<Finding>) {
    if manifest.icons.is_empty() {
        findings.push(Finding {
            level: FindingLevel::Fail,
            code: "icons_map",
            message: "manifest.icons missing or empty".to_string(),
        });
        return;
    }

    let mut icon_paths: Vec<(u32, PathBuf)> = Vec::new();
    for size in RUNTIME_ICON_SIZES {
        let key = size.to_string();
        let value = match manifest.icons.get(&key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                findings.push(Finding {
                    level: FindingLevel::Fail,
                    code: "icon_missing",
                    message: format!("manifest.icons.{key} missing"),
                });
                continue;
            }
        };
        let icon_path = root.join(value);
        if !icon_path.is_file() {
            findings.push(Finding {
                level: FindingLevel::Fail,
                code: "icon_file",
                message: format!("icon file not found: {}", icon_path.display()),
            });
            continue;
        }
        match probe::dimensions(&icon_path) {
            Ok((width, height)) if width == size && height == size => {
                icon_paths.push((size, icon_path));
            }
            Ok((width, height)) => {
                findings.push(Finding {
                    level: FindingLevel::Fail,
                    code: "icon_size",
                    message: format!(
                        "{} is {width}x{height}; expected {size}x{size}",
                        icon_path.display()
                    ),
                });
            }
            Err(e) => {
                findings.push(Finding {
                    level: FindingLevel::Fail,
                    code: "icon_read",
                    message: e.to_string(),
                });
            }
        }
    }

    // Guardrail: an untouched bootstrap placeholder must not ship as the
    // publish icon.
    if icon_paths.len() == RUNTIME_ICON_SIZES.len() {
        let base = palette_from_name(manifest.display_name());
        let mut matches = 0;
        for (size, path) in &icon_paths {
            let expected = match render_png_bytes(*size, base) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if std::fs::read(path).map(|bytes| bytes == expected).unwrap_or(false) {
                matches += 1;
            }
        }
        if matches == RUNTIME_ICON_SIZES.len() {
            findings.push(Finding {
                level: FindingLevel::Fail,
                code: "icon_fallback",
                message:
                    "icons match the auto-generated fallback style; provide a custom brand icon before publish"
                        .to_string(),
            });
        }
    }
}

fn write_report(
    out_path: &Path,
    findings: &[Finding],
    popup_path: &Path,
    min_popup_width: u32,
) -> Result<(), StageError> {
    let fail_count = findings.iter().filter(|f| f.level == FindingLevel::Fail).count();
    let warn_count = findings.iter().filter(|f| f.level == FindingLevel::Warn).count();
    let ok_count = findings.iter().filter(|f| f.level == FindingLevel::Ok).count();

    let mut lines = vec![
        "# Popup UI Audit".to_string(),
        String::new(),
        format!("- Popup file: `{}`", popup_path.display()),
        format!("- Required minimum popup width: `{min_popup_width}px`"),
        format!(
            "- Result: `{}`",
            if fail_count == 0 { "PASS" } else { "FAIL" }
        ),
        String::new(),
        "## Findings".to_string(),
        String::new(),
    ];
    for finding in findings {
        lines.push(format!(
            "- `{}` `{}`: {}",
            finding.level.label(),
            finding.code,
            finding.message
        ));
    }
    lines.extend([
        String::new(),
        "## Summary".to_string(),
        String::new(),
        format!("- FAIL: {fail_count}"),
        format!("- WARN: {warn_count}"),
        format!("- OK: {ok_count}"),
        String::new(),
    ]);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, lines.join("\n"))?;
    Ok(())
}

/// Runs the popup UI audit and writes the report.
pub fn run_ui_audit(
    root: &Path,
    manifest_rel: &str,
    out_rel: &str,
    min_popup_width: u32,
) -> Result<UiAuditOutcome, StageError> {
    let manifest = Manifest::load(&root.join(manifest_rel))?;

    let popup_rel = manifest
        .action
        .as_ref()
        .and_then(|action| action.default_popup.clone())
        .filter(|value| !value.is_empty())
        .ok_or(StageError::PopupMissing)?;
    let popup_path = root.join(&popup_rel);
    if !popup_path.is_file() {
        return Err(StageError::PopupFileMissing(popup_path));
    }
    let popup_html = std::fs::read_to_string(&popup_path)?;

    let mut findings: Vec<Finding> = Vec::new();
    let (css_files, inline_css) = extract_stylesheets(&popup_html, &popup_path);
    let report_path = root.join(out_rel);

    if css_files.is_empty() && inline_css.trim().is_empty() {
        findings.push(Finding {
            level: FindingLevel::Fail,
            code: "css_missing",
            message: "popup has no stylesheet or inline style".to_string(),
        });
        write_report(&report_path, &findings, &popup_path, min_popup_width)?;
        return Ok(UiAuditOutcome {
            findings,
            report_path,
        });
    }

    let mut css_parts: Vec<String> = Vec::new();
    for css_path in &css_files {
        if !css_path.is_file() {
            findings.push(Finding {
                level: FindingLevel::Fail,
                code: "css_file_missing",
                message: format!("stylesheet missing: {}", css_path.display()),
            });
            continue;
        }
        css_parts.push(std::fs::read_to_string(css_path)?);
    }
    if !inline_css.trim().is_empty() {
        css_parts.push(inline_css);
    }
    let css_text = css_parts.join("\n");

    let widths = collect_popup_widths(&css_text);
    if widths.is_empty() {
        findings.push(Finding {
            level: FindingLevel::Fail,
            code: "popup_width_missing",
            message: "popup CSS does not define explicit width/min-width on html/body".to_string(),
        });
    } else {
        let resolved = *widths.iter().max().expect("non-empty widths");
        if resolved < min_popup_width {
            findings.push(Finding {
                level: FindingLevel::Fail,
                code: "popup_width_too_small",
                message: format!(
                    "popup width is {resolved}px; required >= {min_popup_width}px"
                ),
            });
        } else {
            findings.push(Finding {
                level: FindingLevel::Ok,
                code: "popup_width",
                message: format!("popup width {resolved}px meets requirement"),
            });
        }
    }

    if media_reset_regex().is_match(&css_text) {
        findings.push(Finding {
            level: FindingLevel::Fail,
            code: "popup_media_reset",
            message:
                "media query resets html/body width to 100%, which can collapse popup width in Chrome"
                    .to_string(),
        });
    } else {
        findings.push(Finding {
            level: FindingLevel::Ok,
            code: "popup_media_reset",
            message: "no popup width reset media query detected".to_string(),
        });
    }

    if overflow_regex().is_match(&css_text) {
        let has_scrollbar_style =
            css_text.contains("::-webkit-scrollbar") || scrollbar_width_regex().is_match(&css_text);
        findings.push(if has_scrollbar_style {
            Finding {
                level: FindingLevel::Ok,
                code: "scrollbar_style",
                message: "custom scrollbar style detected".to_string(),
            }
        } else {
            Finding {
                level: FindingLevel::Warn,
                code: "scrollbar_style",
                message: "scrollable container detected without explicit scrollbar style"
                    .to_string(),
            }
        });
    }

    verify_icons(root, &manifest, &mut findings);

    write_report(&report_path, &findings, &popup_path, min_popup_width)?;
    Ok(UiAuditOutcome {
        findings,
        report_path,
    })
}

/// Run the ui-audit command.
pub fn run(root: &str, manifest_rel: &str, out_rel: &str, min_popup_width: u32) -> Result<ExitCode> {
    if min_popup_width < 320 {
        eprintln!("{} --min-popup-width must be >= 320", "error:".red());
        return Ok(ExitCode::from(1));
    }

    let outcome = run_ui_audit(Path::new(root), manifest_rel, out_rel, min_popup_width)?;
    if outcome.fail_count() > 0 {
        eprintln!(
            "{} popup UI audit failed: {}",
            "error:".red(),
            outcome.report_path.display()
        );
        return Ok(ExitCode::from(1));
    }
    println!(
        "{} popup UI audit passed: {}",
        "ok".green(),
        outcome.report_path.display()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeforge_assets::icon_render::write_icon;

    fn scaffold(root: &Path, css: &str) {
        std::fs::write(
            root.join("manifest.json"),
            r#"{
                "manifest_version": 3,
                "name": "Tab Tidy",
                "version": "1.0",
                "icons": {"16": "icons/icon16.png", "48": "icons/icon48.png", "128": "icons/icon128.png"},
                "action": {"default_popup": "popup/popup.html"}
            }"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("popup")).unwrap();
        std::fs::write(
            root.join("popup/popup.html"),
            r#"<html><head><link rel="stylesheet" href="popup.css"></head><body></body></html>"#,
        )
        .unwrap();
        std::fs::write(root.join("popup/popup.css"), css).unwrap();
        std::fs::create_dir_all(root.join("icons")).unwrap();
        // Real-sized icons that differ from the bootstrap placeholder.
        for size in RUNTIME_ICON_SIZES {
            write_icon(
                &root.join(format!("icons/icon{size}.png")),
                size,
                (200, 10, 10),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_wide_popup_passes() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "html, body { width: 640px; }");

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert_eq!(outcome.fail_count(), 0, "{:?}", outcome.findings);
        assert!(outcome.report_path.is_file());

        let report = std::fs::read_to_string(&outcome.report_path).unwrap();
        assert!(report.contains("- Result: `PASS`"));
        assert!(report.contains("popup width 640px meets requirement"));
    }

    #[test]
    fn test_narrow_popup_fails() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "body { width: 320px; }");

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.code == "popup_width_too_small" && f.level == FindingLevel::Fail));
    }

    #[test]
    fn test_missing_width_fails() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), ".container { width: 640px; }");

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.code == "popup_width_missing"));
    }

    #[test]
    fn test_media_reset_flagged() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(
            dir.path(),
            "html { width: 640px; }\n@media (max-width: 600px) { body { width: 100%; } }",
        );

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.code == "popup_media_reset" && f.level == FindingLevel::Fail));
    }

    #[test]
    fn test_placeholder_icons_flagged() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "html { width: 640px; }");
        // Overwrite with exactly the bootstrap renders for this name.
        let base = palette_from_name("Tab Tidy");
        for size in RUNTIME_ICON_SIZES {
            write_icon(
                &dir.path().join(format!("icons/icon{size}.png")),
                size,
                base,
            )
            .unwrap();
        }

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome.findings.iter().any(|f| f.code == "icon_fallback"));
    }

    #[test]
    fn test_missing_popup_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version": 3, "name": "X", "version": "1.0"}"#,
        )
        .unwrap();

        let err = run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560)
            .unwrap_err();
        assert!(matches!(err, StageError::PopupMissing));
    }

    #[test]
    fn test_no_css_fails_with_report() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "body { width: 640px; }");
        std::fs::write(
            dir.path().join("popup/popup.html"),
            "<html><body>no styles</body></html>",
        )
        .unwrap();

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome.findings.iter().any(|f| f.code == "css_missing"));
        assert!(outcome.report_path.is_file());
    }

    #[test]
    fn test_wrong_icon_dimensions_fail() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "html { width: 640px; }");
        // icon48 rendered at the wrong size.
        write_icon(&dir.path().join("icons/icon48.png"), 32, (200, 10, 10)).unwrap();

        let outcome =
            run_ui_audit(dir.path(), "manifest.json", "release/popup-ui-audit.md", 560).unwrap();
        assert!(outcome.findings.iter().any(|f| f.code == "icon_size"));
    }
}
