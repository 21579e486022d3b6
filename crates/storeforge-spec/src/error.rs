//! Stage error taxonomy.
//!
//! Every failure a stage can report is a variant here, carrying enough
//! context for the message and mapping to a fixed remediation string. The
//! orchestrator converts these into stage dispositions; they never escape a
//! run as a panic.

use std::path::PathBuf;
use thiserror::Error;

/// Failure classes, ordered by how a run reacts to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Ambiguous or missing required input; the run aborts immediately.
    Config,
    /// A collaborator tool or library the stage depends on is unavailable or
    /// failed; the run aborts unless the stage was skipped.
    ExternalTool,
    /// A post-hoc check found mismatches; already-written files stay on
    /// disk, the release is marked not-ready.
    Validation,
    /// Review candidates that are surfaced but never block the run.
    Advisory,
}

/// A stage-level failure with a fixed remediation.
#[derive(Debug, Error)]
pub enum StageError {
    // Configuration
    #[error("root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error("manifest not found: {0}")]
    ManifestMissing(PathBuf),

    #[error("invalid manifest JSON: {0}")]
    ManifestInvalid(String),

    #[error("screenshot budget must be between 1 and 5, got {0}")]
    InvalidScreenshotBudget(usize),

    #[error("source image not found: {0}")]
    SourceImageMissing(PathBuf),

    #[error("icon source is ambiguous between {}", format_paths(.0))]
    AmbiguousIconSource(Vec<PathBuf>),

    #[error("icon source looks like a screenshot by filename: {0}")]
    IconLooksLikeScreenshot(PathBuf),

    #[error("unable to infer an icon source from {inputs} input image(s)")]
    IconSourceUnresolved { inputs: usize },

    #[error("no screenshot sources available")]
    NoScreenshotSources,

    #[error("no image inputs available for asset generation after screenshot capture attempt")]
    NoImageInputs,

    #[error("marquee output requested but no marquee source could be resolved")]
    MarqueeSourceMissing,

    #[error("extra package paths matched nothing: {}", .0.join(", "))]
    MissingExtraPaths(Vec<String>),

    #[error("manifest.action.default_popup is missing; cannot audit popup UI")]
    PopupMissing,

    #[error("popup file not found: {0}")]
    PopupFileMissing(PathBuf),

    // External tools
    #[error("screenshot capture tool not found: {tool}")]
    CaptureToolUnavailable { tool: String },

    #[error("screenshot capture failed ({tool}): {detail}")]
    CaptureFailed { tool: String, detail: String },

    #[error("screenshot capture timed out after {seconds}s ({tool})")]
    CaptureTimeout { tool: String, seconds: u64 },

    #[error("node executable not found for JS syntax checks")]
    NodeUnavailable,

    #[error("unreadable image {path}: {detail}")]
    ImageRead { path: PathBuf, detail: String },

    #[error("failed to encode image {path}: {detail}")]
    ImageEncode { path: PathBuf, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Validation
    #[error("JS syntax check failed: {file}\n{detail}")]
    JsSyntax { file: String, detail: String },

    #[error("store asset validation failed with {errors} error(s)")]
    AssetValidationFailed { errors: usize },

    #[error("popup UI audit failed with {failures} finding(s)")]
    UiAuditFailed { failures: usize },

    // Advisory
    #[error("permission audit flagged {unused} unused and {uncovered} uncovered item(s)")]
    PermissionFindings { unused: usize, uncovered: usize },
}

impl StageError {
    /// The taxonomy class this failure belongs to.
    pub fn class(&self) -> FailureClass {
        match self {
            StageError::RootNotADirectory(_)
            | StageError::ManifestMissing(_)
            | StageError::ManifestInvalid(_)
            | StageError::InvalidScreenshotBudget(_)
            | StageError::SourceImageMissing(_)
            | StageError::AmbiguousIconSource(_)
            | StageError::IconLooksLikeScreenshot(_)
            | StageError::IconSourceUnresolved { .. }
            | StageError::NoScreenshotSources
            | StageError::NoImageInputs
            | StageError::MarqueeSourceMissing
            | StageError::MissingExtraPaths(_)
            | StageError::PopupMissing
            | StageError::PopupFileMissing(_) => FailureClass::Config,

            StageError::CaptureToolUnavailable { .. }
            | StageError::CaptureFailed { .. }
            | StageError::CaptureTimeout { .. }
            | StageError::NodeUnavailable
            | StageError::ImageRead { .. }
            | StageError::ImageEncode { .. }
            | StageError::Io(_) => FailureClass::ExternalTool,

            StageError::JsSyntax { .. }
            | StageError::AssetValidationFailed { .. }
            | StageError::UiAuditFailed { .. } => FailureClass::Validation,

            StageError::PermissionFindings { .. } => FailureClass::Advisory,
        }
    }

    /// The fixed cause-to-fix lookup: what the user should do about this
    /// failure. Rendered into the release summary next to the failed stage.
    pub fn remediation(&self) -> &'static str {
        match self {
            StageError::RootNotADirectory(_) => "pass --root pointing at the extension directory",
            StageError::ManifestMissing(_) => {
                "create manifest.json at the extension root, or pass --manifest"
            }
            StageError::ManifestInvalid(_) => "fix the manifest JSON syntax and re-run",
            StageError::InvalidScreenshotBudget(_) => {
                "pass --max-screenshots with a value between 1 and 5"
            }
            StageError::SourceImageMissing(_) => "check the source image path and re-run",
            StageError::AmbiguousIconSource(_) => {
                "pass --icon-source with a dedicated icon or logo image"
            }
            StageError::IconLooksLikeScreenshot(_) => {
                "pass --icon-source with a dedicated icon/logo, or rename the source file"
            }
            StageError::IconSourceUnresolved { inputs } => {
                if *inputs <= 1 {
                    "pass --icon-source, or add --allow-icon-fallback to use the sole input"
                } else {
                    "pass --icon-source with a dedicated icon or logo image"
                }
            }
            StageError::NoScreenshotSources | StageError::NoImageInputs => {
                "provide --inputs, or verify the screenshot capture tool setup"
            }
            StageError::MarqueeSourceMissing => {
                "pass --marquee-source, or drop --include-marquee"
            }
            StageError::MissingExtraPaths(_) => "fix the --extra paths or remove them",
            StageError::PopupMissing | StageError::PopupFileMissing(_) => {
                "wire action.default_popup to an existing HTML file, or skip the UI audit"
            }
            StageError::CaptureToolUnavailable { .. } => {
                "install the capture tool on PATH (or pass --capture-cmd / explicit --inputs)"
            }
            StageError::CaptureFailed { .. } | StageError::CaptureTimeout { .. } => {
                "re-run with the capture tool fixed, or pass explicit --inputs"
            }
            StageError::NodeUnavailable => "install node, or pass --skip-js-check",
            StageError::ImageRead { .. } => "replace the corrupt source image and re-run",
            StageError::ImageEncode { .. } => "check free disk space and output permissions",
            StageError::Io(_) => "check filesystem permissions and paths, then re-run",
            StageError::JsSyntax { .. } => "fix the reported JS syntax error and re-run",
            StageError::AssetValidationFailed { .. } => {
                "regenerate the flagged assets (see the validation report) before submitting"
            }
            StageError::UiAuditFailed { .. } => {
                "address the findings in the popup UI audit report"
            }
            StageError::PermissionFindings { .. } => {
                "review the permission audit report; remove or justify the flagged entries"
            }
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}
