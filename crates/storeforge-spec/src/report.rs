//! Pipeline stages and the run report.
//!
//! A run threads a [`PipelineReport`] accumulator through each stage call;
//! nothing about a run lives in ambient state. The report is rendered once
//! as the human-readable release summary and is never re-read as pipeline
//! state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StageError;

/// The fixed stage order of a full release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    IconBootstrap,
    DevChecks,
    UiAudit,
    BaselinePrep,
    PermissionAudit,
    Package,
    AssetGenerate,
    AssetValidate,
    ListingDocs,
    Summary,
}

impl Stage {
    /// Stages in execution order.
    pub const ORDER: [Stage; 10] = [
        Stage::IconBootstrap,
        Stage::DevChecks,
        Stage::UiAudit,
        Stage::BaselinePrep,
        Stage::PermissionAudit,
        Stage::Package,
        Stage::AssetGenerate,
        Stage::AssetValidate,
        Stage::ListingDocs,
        Stage::Summary,
    ];

    /// Stable stage name used in flags, logs, and the summary.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::IconBootstrap => "icon-bootstrap",
            Stage::DevChecks => "dev-checks",
            Stage::UiAudit => "ui-audit",
            Stage::BaselinePrep => "baseline-prep",
            Stage::PermissionAudit => "permission-audit",
            Stage::Package => "package",
            Stage::AssetGenerate => "asset-generate",
            Stage::AssetValidate => "asset-validate",
            Stage::ListingDocs => "listing-docs",
            Stage::Summary => "summary",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Disposition of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Skipped,
    Failed,
}

/// Record of one attempted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    /// Human-readable result line.
    pub message: String,
    /// Artifact paths this stage produced (relative to the extension root).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
    /// Fixed remediation, present only on failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// An artifact line for the summary header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub label: String,
    pub path: PathBuf,
    pub exists: bool,
}

/// Accumulated record of one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub outcomes: Vec<StageOutcome>,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a passed stage.
    pub fn record_ok(
        &mut self,
        stage: Stage,
        message: impl Into<String>,
        artifacts: Vec<PathBuf>,
    ) {
        self.outcomes.push(StageOutcome {
            stage,
            status: StageStatus::Ok,
            message: message.into(),
            artifacts,
            remediation: None,
        });
    }

    /// Records an explicitly-skipped stage.
    pub fn record_skipped(&mut self, stage: Stage) {
        self.outcomes.push(StageOutcome {
            stage,
            status: StageStatus::Skipped,
            message: "skipped by configuration".to_string(),
            artifacts: Vec::new(),
            remediation: None,
        });
    }

    /// Records a failed stage together with its fixed remediation.
    pub fn record_failed(&mut self, stage: Stage, error: &StageError) {
        self.outcomes.push(StageOutcome {
            stage,
            status: StageStatus::Failed,
            message: error.to_string(),
            artifacts: Vec::new(),
            remediation: Some(error.remediation().to_string()),
        });
    }

    /// True when no attempted stage failed.
    pub fn ok(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| outcome.status != StageStatus::Failed)
    }

    /// The first failed stage, if any.
    pub fn first_failure(&self) -> Option<&StageOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.status == StageStatus::Failed)
    }

    /// Renders the release summary document.
    pub fn to_markdown(&self, artifacts: &[ArtifactEntry]) -> String {
        let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%SZ");
        let mut lines: Vec<String> = vec![
            "# Full Release Pipeline Summary".to_string(),
            String::new(),
            format!("Generated at: `{generated_at}`"),
            format!(
                "Result: `{}`",
                if self.ok() { "PASS" } else { "FAIL" }
            ),
            String::new(),
            "## Artifacts".to_string(),
            String::new(),
        ];
        for entry in artifacts {
            lines.push(format!(
                "- {}: `{}` ({})",
                entry.label,
                entry.path.display(),
                if entry.exists { "exists" } else { "missing" }
            ));
        }
        lines.push(String::new());
        lines.push("## Stages".to_string());
        lines.push(String::new());
        for outcome in &self.outcomes {
            let status = match outcome.status {
                StageStatus::Ok => "ok",
                StageStatus::Skipped => "skipped",
                StageStatus::Failed => "failed",
            };
            lines.push(format!("- `{}`: `{}`", outcome.stage, status));
            if outcome.status != StageStatus::Skipped && !outcome.message.is_empty() {
                lines.push(format!("  - {}", outcome.message.replace('\n', " ")));
            }
            for artifact in &outcome.artifacts {
                lines.push(format!("  - artifact: `{}`", artifact.display()));
            }
            if let Some(remediation) = &outcome.remediation {
                lines.push(format!("  - fix: {remediation}"));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_covers_every_stage_once() {
        assert_eq!(Stage::ORDER.len(), 10);
        assert_eq!(Stage::ORDER[0], Stage::IconBootstrap);
        assert_eq!(Stage::ORDER[9], Stage::Summary);
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(
                Stage::ORDER.iter().position(|s| s == stage),
                Some(i),
                "{stage} appears more than once"
            );
        }
    }

    #[test]
    fn test_report_ok_tracking() {
        let mut report = PipelineReport::new();
        report.record_ok(Stage::Package, "packaged 3 file(s)", vec![]);
        report.record_skipped(Stage::ListingDocs);
        assert!(report.ok());

        report.record_failed(
            Stage::AssetGenerate,
            &StageError::NoScreenshotSources,
        );
        assert!(!report.ok());
        let failure = report.first_failure().unwrap();
        assert_eq!(failure.stage, Stage::AssetGenerate);
        assert!(failure.remediation.is_some());
    }

    #[test]
    fn test_markdown_lists_dispositions_and_fix() {
        let mut report = PipelineReport::new();
        report.record_ok(
            Stage::Package,
            "packaged 3 file(s)",
            vec![PathBuf::from("release/chrome-webstore.zip")],
        );
        report.record_failed(Stage::AssetGenerate, &StageError::NoScreenshotSources);

        let markdown = report.to_markdown(&[ArtifactEntry {
            label: "ZIP".to_string(),
            path: PathBuf::from("release/chrome-webstore.zip"),
            exists: true,
        }]);

        assert!(markdown.contains("Result: `FAIL`"));
        assert!(markdown.contains("- `package`: `ok`"));
        assert!(markdown.contains("- `asset-generate`: `failed`"));
        assert!(markdown.contains("  - fix: provide --inputs"));
        assert!(markdown.contains("release/chrome-webstore.zip` (exists)"));
    }

    #[test]
    fn test_stage_serde_names() {
        let json = serde_json::to_string(&Stage::AssetGenerate).unwrap();
        assert_eq!(json, "\"asset-generate\"");
    }
}
