//! Full release pipeline orchestrator.
//!
//! Runs the fixed stage sequence (icon bootstrap, dev checks, UI audit,
//! baseline prep, permission audit, packaging, asset generation, asset
//! validation, listing docs, summary) with per-stage skip flags. A failed
//! required stage aborts the remaining sequence; the summary stage always
//! runs if reached and records every attempted stage with its disposition
//! and, for failures, the fixed remediation.

use anyhow::Result;
use colored::Colorize;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::OnceLock;

use storeforge_assets::{generate, validate_tree, GenerateConfig, Overrides, ScreenshotPolicy};
use storeforge_spec::report::ArtifactEntry;
use storeforge_spec::{Manifest, PipelineReport, Stage, StageError};

use crate::capture::{self, CaptureConfig};
use crate::commands::{audit, docs, icons, package, prepare, ui_audit};

const JS_SUFFIXES: [&str; 3] = ["js", "mjs", "cjs"];
const EXCLUDED_DIRS: [&str; 4] = [".git", "node_modules", "release", "__pycache__"];

/// One pipeline invocation's configuration. Field defaults mirror the CLI
/// flag defaults.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub root: PathBuf,
    pub manifest: String,

    pub skip_icon_bootstrap: bool,
    pub skip_dev_checks: bool,
    pub skip_js_check: bool,
    pub skip_ui_audit: bool,
    pub skip_prepare: bool,
    pub skip_audit: bool,
    pub skip_package: bool,
    pub skip_assets: bool,
    pub skip_docs: bool,

    pub inputs: Vec<PathBuf>,
    pub icon_source: Option<PathBuf>,
    pub small_promo_source: Option<PathBuf>,
    pub marquee_source: Option<PathBuf>,
    pub include_marquee: bool,
    pub allow_icon_fallback: bool,
    pub screenshot_size: (u32, u32),
    pub max_screenshots: usize,
    pub overwrite_screenshots: bool,

    pub capture_screenshots: bool,
    /// Auto-enable capture when no inputs were supplied.
    pub auto_capture: bool,
    pub capture_cmd: String,
    pub capture_urls: Vec<String>,

    pub min_popup_width: u32,
    pub node_bin: String,

    pub zip_out: String,
    pub permission_audit_out: String,
    pub ui_audit_out: String,
    pub listing_out: String,
    pub assets_root: String,
    pub summary_out: String,
}

impl PipelineOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: "manifest.json".to_string(),
            skip_icon_bootstrap: false,
            skip_dev_checks: false,
            skip_js_check: false,
            skip_ui_audit: false,
            skip_prepare: false,
            skip_audit: false,
            skip_package: false,
            skip_assets: false,
            skip_docs: false,
            inputs: Vec::new(),
            icon_source: None,
            small_promo_source: None,
            marquee_source: None,
            include_marquee: false,
            allow_icon_fallback: false,
            screenshot_size: storeforge_spec::DEFAULT_SCREENSHOT_SIZE,
            max_screenshots: storeforge_spec::MAX_SCREENSHOTS,
            overwrite_screenshots: false,
            capture_screenshots: false,
            auto_capture: true,
            capture_cmd: capture::DEFAULT_CAPTURE_COMMAND.to_string(),
            capture_urls: Vec::new(),
            min_popup_width: 560,
            node_bin: "node".to_string(),
            zip_out: "release/chrome-webstore.zip".to_string(),
            permission_audit_out: "release/permission-audit.md".to_string(),
            ui_audit_out: "release/popup-ui-audit.md".to_string(),
            listing_out: "release/cws-listing.md".to_string(),
            assets_root: "release/store-assets".to_string(),
            summary_out: "release/full-release-summary.md".to_string(),
        }
    }

    fn is_skipped(&self, stage: Stage) -> bool {
        match stage {
            Stage::IconBootstrap => self.skip_icon_bootstrap,
            Stage::DevChecks => self.skip_dev_checks,
            Stage::UiAudit => self.skip_ui_audit,
            Stage::BaselinePrep => self.skip_prepare,
            Stage::PermissionAudit => self.skip_audit,
            Stage::Package => self.skip_package,
            Stage::AssetGenerate | Stage::AssetValidate => self.skip_assets,
            Stage::ListingDocs => self.skip_docs,
            Stage::Summary => false,
        }
    }
}

/// A passed stage's result line and artifacts.
struct StagePass {
    message: String,
    artifacts: Vec<PathBuf>,
}

/// Checks the run preconditions that must hold before any stage starts.
fn preflight(opts: &PipelineOptions) -> Result<(), String> {
    if !opts.root.is_dir() {
        return Err(format!("root is not a directory: {}", opts.root.display()));
    }
    if !opts.root.join(&opts.manifest).is_file() {
        return Err(format!(
            "manifest not found: {}",
            opts.root.join(&opts.manifest).display()
        ));
    }
    if opts.min_popup_width < 320 {
        return Err("--min-popup-width must be >= 320".to_string());
    }
    Ok(())
}

/// Runs the full pipeline.
pub fn run(opts: &PipelineOptions) -> Result<ExitCode> {
    if let Err(message) = preflight(opts) {
        eprintln!("{} {}", "error:".red(), message);
        return Ok(ExitCode::from(1));
    }
    let report = execute(opts)?;
    Ok(if report.ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Executes the stage sequence and writes the summary; `preflight` must have
/// passed. Returns the run report (the explicit accumulator every stage
/// outcome lands in).
pub fn execute(opts: &PipelineOptions) -> Result<PipelineReport> {
    let mut report = PipelineReport::new();

    for stage in Stage::ORDER {
        if stage == Stage::Summary {
            break;
        }
        if opts.is_skipped(stage) {
            println!("{} {}", "[SKIP]".yellow(), stage);
            report.record_skipped(stage);
            continue;
        }

        println!("{} {}", "[STEP]".cyan(), stage);
        match execute_stage(stage, opts) {
            Ok(pass) => {
                println!("  {} {}", "ok".green(), pass.message);
                report.record_ok(stage, pass.message, pass.artifacts);
            }
            Err(error) => {
                eprintln!("  {} {}", "!!".red(), error);
                eprintln!("  {} {}", "fix:".yellow(), error.remediation());
                report.record_failed(stage, &error);
                break;
            }
        }
    }

    // The summary always runs once reached, pass or fail.
    let summary_path = opts.root.join(&opts.summary_out);
    report.record_ok(
        Stage::Summary,
        format!("summary: {}", opts.summary_out),
        vec![PathBuf::from(&opts.summary_out)],
    );
    let markdown = report.to_markdown(&artifact_entries(opts));
    if let Some(parent) = summary_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&summary_path, markdown)?;
    println!(
        "{} pipeline summary: {}",
        "ok".green(),
        summary_path.display()
    );

    Ok(report)
}

fn artifact_entries(opts: &PipelineOptions) -> Vec<ArtifactEntry> {
    let entry = |label: &str, rel: &str, is_dir: bool| {
        let path = opts.root.join(rel);
        ArtifactEntry {
            label: label.to_string(),
            path: PathBuf::from(rel),
            exists: if is_dir { path.is_dir() } else { path.is_file() },
        }
    };
    vec![
        entry("ZIP", &opts.zip_out, false),
        entry("Permission audit", &opts.permission_audit_out, false),
        entry("Popup UI audit", &opts.ui_audit_out, false),
        entry("Listing draft", &opts.listing_out, false),
        entry("Store assets root", &opts.assets_root, true),
    ]
}

fn execute_stage(stage: Stage, opts: &PipelineOptions) -> Result<StagePass, StageError> {
    match stage {
        Stage::IconBootstrap => run_icon_bootstrap(opts),
        Stage::DevChecks => run_dev_checks(opts),
        Stage::UiAudit => run_ui_audit_stage(opts),
        Stage::BaselinePrep => run_baseline_prep(opts),
        Stage::PermissionAudit => run_permission_audit(opts),
        Stage::Package => run_package(opts),
        Stage::AssetGenerate => run_asset_generate(opts),
        Stage::AssetValidate => run_asset_validate(opts),
        Stage::ListingDocs => run_listing_docs(opts),
        Stage::Summary => unreachable!("summary is handled by the run loop"),
    }
}

fn run_icon_bootstrap(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let outcome = icons::ensure_icons(&opts.root, &opts.manifest, false)?;
    Ok(StagePass {
        message: outcome.logs.join("; "),
        artifacts: Vec::new(),
    })
}

static MODULE_REGEX: OnceLock<Regex> = OnceLock::new();

fn module_regex() -> &'static Regex {
    MODULE_REGEX
        .get_or_init(|| Regex::new(r"(?m)^\s*(import|export)\s").expect("invalid regex pattern"))
}

fn list_js_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
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
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| JS_SUFFIXES.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn run_dev_checks(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let manifest_path = opts.root.join(&opts.manifest);
    let manifest = Manifest::load(&manifest_path)?;
    if manifest.manifest_version == 0 || manifest.name.is_empty() || manifest.version.is_empty() {
        return Err(StageError::ManifestInvalid(
            "manifest must declare manifest_version, name, and version".to_string(),
        ));
    }

    // References the manifest names must resolve inside the root, or the
    // store build is dead on arrival.
    if let Some(background) = &manifest.background {
        for script in background
            .service_worker
            .iter()
            .chain(background.scripts.iter())
        {
            if !opts.root.join(script).is_file() {
                return Err(StageError::ManifestInvalid(format!(
                    "background script not found: {script}"
                )));
            }
        }
    }
    if let Some(locale) = &manifest.default_locale {
        let messages = opts
            .root
            .join("_locales")
            .join(locale)
            .join("messages.json");
        if !messages.is_file() {
            return Err(StageError::ManifestInvalid(format!(
                "default_locale '{locale}' has no {}",
                messages.display()
            )));
        }
    }

    let js_files = list_js_files(&opts.root);
    if opts.skip_js_check {
        return Ok(StagePass {
            message: "manifest JSON valid; JS syntax check skipped".to_string(),
            artifacts: Vec::new(),
        });
    }
    if js_files.is_empty() {
        return Ok(StagePass {
            message: "manifest JSON valid; no JS files found for syntax check".to_string(),
            artifacts: Vec::new(),
        });
    }

    if which::which(&opts.node_bin).is_err() {
        return Err(StageError::NodeUnavailable);
    }

    for file in &js_files {
        let content = std::fs::read_to_string(file)?;
        let mut cmd = Command::new(&opts.node_bin);
        if module_regex().is_match(&content) {
            cmd.arg("--experimental-default-type=module");
        }
        cmd.arg("--check").arg(file);

        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            let rel = file
                .strip_prefix(&opts.root)
                .unwrap_or(file)
                .to_string_lossy()
                .replace('\\', "/");
            return Err(StageError::JsSyntax { file: rel, detail });
        }
    }

    Ok(StagePass {
        message: format!(
            "manifest JSON valid; JS syntax check passed: {} file(s)",
            js_files.len()
        ),
        artifacts: Vec::new(),
    })
}

fn run_ui_audit_stage(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let outcome = ui_audit::run_ui_audit(
        &opts.root,
        &opts.manifest,
        &opts.ui_audit_out,
        opts.min_popup_width,
    )?;
    let failures = outcome.fail_count();
    if failures > 0 {
        return Err(StageError::UiAuditFailed { failures });
    }
    Ok(StagePass {
        message: format!("popup UI audit passed: {}", opts.ui_audit_out),
        artifacts: vec![PathBuf::from(&opts.ui_audit_out)],
    })
}

fn run_baseline_prep(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let outcome = prepare::prepare(&opts.root, false)?;
    Ok(StagePass {
        message: format!("baseline files ready ({} changed)", outcome.changed),
        artifacts: Vec::new(),
    })
}

fn run_permission_audit(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let outcome = audit::run_audit(&opts.root, &opts.manifest, &opts.permission_audit_out, 5)?;
    // Advisory stage: findings are surfaced, never fatal.
    Ok(StagePass {
        message: format!(
            "permission audit written ({} unused, {} undeclared, {} uncovered URLs)",
            outcome.unused.len(),
            outcome.undeclared.len(),
            outcome.uncovered_urls.len()
        ),
        artifacts: vec![PathBuf::from(&opts.permission_audit_out)],
    })
}

fn run_package(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let outcome = package::build_package(
        &opts.root,
        &opts.manifest,
        &opts.zip_out,
        &[],
        &[],
        false,
    )?;
    let hash = outcome.hash.as_deref().unwrap_or("-");
    Ok(StagePass {
        message: format!(
            "packaged {} file(s) into {} (blake3 {})",
            outcome.files.len(),
            opts.zip_out,
            &hash[..hash.len().min(16)]
        ),
        artifacts: vec![PathBuf::from(&opts.zip_out)],
    })
}

/// Resolves the asset-stage input set, invoking the capture collaborator
/// when configured and necessary.
fn resolve_asset_inputs(opts: &PipelineOptions) -> Result<(Vec<PathBuf>, Vec<String>), StageError> {
    let assets_root = opts.root.join(&opts.assets_root);
    let mut logs = Vec::new();
    let mut capture_required = opts.capture_screenshots;

    if opts.inputs.is_empty() && opts.auto_capture && !capture_required {
        logs.push("no --inputs provided; enabling screenshot auto-capture".to_string());
        capture_required = true;
    }

    if capture_required {
        let config = CaptureConfig {
            command: opts.capture_cmd.clone(),
            size: opts.screenshot_size,
            max: opts.max_screenshots,
            urls: opts.capture_urls.clone(),
            ..CaptureConfig::new(&opts.root, &assets_root)
        };
        let result = capture::run_capture(&config)?;
        logs.push(format!(
            "captured {} screenshot(s) in {:.1}s",
            result.captured.len(),
            result.duration.as_secs_f64()
        ));
    }

    let mut inputs = opts.inputs.clone();
    if inputs.is_empty() {
        inputs = capture::collect_screenshots(&assets_root);
    }
    if inputs.is_empty() {
        return Err(StageError::NoImageInputs);
    }
    Ok((inputs, logs))
}

fn run_asset_generate(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let (inputs, mut logs) = resolve_asset_inputs(opts)?;

    // Without an explicit icon source, offer the manifest's declared icons
    // (largest first) so screenshot-only input sets still resolve.
    let mut icon_source = opts.icon_source.clone();
    if icon_source.is_none() {
        let manifest = Manifest::load(&opts.root.join(&opts.manifest))?;
        if let Some(candidate) = manifest.icon_candidates(&opts.root).into_iter().next() {
            logs.push(format!("icon source from manifest: {}", candidate.display()));
            icon_source = Some(candidate);
        }
    }

    let config = GenerateConfig {
        out_root: opts.root.join(&opts.assets_root),
        inputs,
        overrides: Overrides {
            icon: icon_source,
            small_promo: opts.small_promo_source.clone(),
            marquee: opts.marquee_source.clone(),
            allow_icon_fallback: opts.allow_icon_fallback,
        },
        screenshot_size: opts.screenshot_size,
        max_screenshots: opts.max_screenshots,
        include_marquee: opts.include_marquee,
        policy: if opts.overwrite_screenshots {
            ScreenshotPolicy::Overwrite
        } else {
            ScreenshotPolicy::Append
        },
    };

    let summary = generate(&config)?;
    logs.extend(summary.warnings.clone());

    let artifacts: Vec<PathBuf> = summary
        .written
        .iter()
        .map(|path| {
            path.strip_prefix(&opts.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone())
        })
        .collect();

    let mut message = format!(
        "generated {} asset file(s) (+{} screenshot(s), total {})",
        summary.written.len(),
        summary.screenshots_added,
        summary.screenshots_kept + summary.screenshots_added
    );
    if !logs.is_empty() {
        message = format!("{message}; {}", logs.join("; "));
    }
    Ok(StagePass { message, artifacts })
}

fn run_asset_validate(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    let assets_root = opts.root.join(&opts.assets_root);
    let report = validate_tree(&assets_root);

    for note in &report.notes {
        println!("  {} {}", "note:".yellow(), note);
    }
    if !report.ok {
        for check in report.checks.iter().filter(|check| !check.passed) {
            eprintln!("  {} {}: {}", "!!".red(), check.label, check.message);
        }
        return Err(StageError::AssetValidationFailed {
            errors: report.error_count(),
        });
    }

    Ok(StagePass {
        message: format!(
            "store asset validation passed ({} check(s))",
            report.checks.len()
        ),
        artifacts: Vec::new(),
    })
}

fn run_listing_docs(opts: &PipelineOptions) -> Result<StagePass, StageError> {
    docs::write_listing(
        &opts.root,
        &opts.manifest,
        &opts.listing_out,
        &[],
        None,
        &opts.permission_audit_out,
        "privacy-policy.md",
    )?;
    Ok(StagePass {
        message: format!("listing draft written: {}", opts.listing_out),
        artifacts: vec![PathBuf::from(&opts.listing_out)],
    })
}
