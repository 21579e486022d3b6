//! Store asset validation.
//!
//! Re-opens whatever exists on disk and checks it against the same contract
//! table the generator used. Read-only and idempotent: it can run directly
//! after generation or standalone against a hand-edited tree, and two runs on
//! an unmodified tree produce identical reports.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use storeforge_spec::asset_spec::{has_image_suffix, is_allowed_screenshot_size};
use storeforge_spec::{AssetSpec, FIXED_ASSETS, MAX_SCREENSHOTS, MIN_SCREENSHOTS, SCREENSHOT_SIZES};

use crate::probe;

/// One pass/fail line in the validation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCheck {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub passed: bool,
    pub message: String,
}

/// The structured validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    pub ok: bool,
    pub checks: Vec<AssetCheck>,
    /// Non-blocking observations (legacy filenames, optional assets).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl AssetReport {
    fn pass(&mut self, label: &str, path: Option<PathBuf>, message: impl Into<String>) {
        self.checks.push(AssetCheck {
            label: label.to_string(),
            path,
            passed: true,
            message: message.into(),
        });
    }

    fn fail(&mut self, label: &str, path: Option<PathBuf>, message: impl Into<String>) {
        self.checks.push(AssetCheck {
            label: label.to_string(),
            path,
            passed: false,
            message: message.into(),
        });
    }

    /// Number of failed checks.
    pub fn error_count(&self) -> usize {
        self.checks.iter().filter(|check| !check.passed).count()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Validates the store-assets tree rooted at `root`.
///
/// Never mutates anything; every problem becomes a failed check rather than
/// an error return.
pub fn validate_tree(root: &Path) -> AssetReport {
    let mut report = AssetReport::default();

    if !root.is_dir() {
        report.fail(
            "asset root",
            Some(root.to_path_buf()),
            format!("root directory not found: {}", root.display()),
        );
        report.ok = false;
        return report;
    }

    for asset in &FIXED_ASSETS {
        check_fixed_asset(root, asset, &mut report);
    }
    check_screenshots(&root.join("screenshots"), &mut report);

    report.ok = report.error_count() == 0;
    report
}

fn check_fixed_asset(root: &Path, asset: &AssetSpec, report: &mut AssetReport) {
    let found = find_named_image(root, asset.stems);

    if let Some(path) = &found {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.eq_ignore_ascii_case(asset.stems[asset.stems.len() - 1]) && asset.stems.len() > 1 {
            report.notes.push(format!(
                "legacy {} filename detected; prefer {}",
                asset.label, asset.name
            ));
        }
    }

    let path = match found {
        Some(path) => path,
        None => {
            if asset.required {
                report.fail(asset.label, None, "missing");
            } else {
                report
                    .notes
                    .push(format!("{} is optional and not provided", asset.label));
            }
            return;
        }
    };

    // The store icon must be a real PNG, not merely named one.
    if asset.name == storeforge_spec::ICON_NAME {
        match probe::is_png(&path) {
            Ok(true) => {}
            Ok(false) => {
                report.fail(
                    asset.label,
                    Some(path),
                    "store icon must be PNG".to_string(),
                );
                return;
            }
            Err(e) => {
                report.fail(asset.label, Some(path), e.to_string());
                return;
            }
        }
    }

    match probe::dimensions(&path) {
        Ok(size) if size == asset.size() => {
            report.pass(
                asset.label,
                Some(path),
                format!("{}x{}", size.0, size.1),
            );
        }
        Ok(size) => {
            report.fail(
                asset.label,
                Some(path),
                format!(
                    "expected {}x{}, got {}x{}",
                    asset.width, asset.height, size.0, size.1
                ),
            );
        }
        Err(e) => {
            report.fail(asset.label, Some(path), e.to_string());
        }
    }
}

fn check_screenshots(dir: &Path, report: &mut AssetReport) {
    let screenshots = collect_image_files(dir);
    let count = screenshots.len();

    if !(MIN_SCREENSHOTS..=MAX_SCREENSHOTS).contains(&count) {
        report.fail(
            "screenshots",
            Some(dir.to_path_buf()),
            format!(
                "expected {}-{} images, found {}",
                MIN_SCREENSHOTS, MAX_SCREENSHOTS, count
            ),
        );
        return;
    }

    let mut all_ok = true;
    for shot in &screenshots {
        match probe::dimensions(shot) {
            Ok(size) if is_allowed_screenshot_size(size) => {}
            Ok(size) => {
                all_ok = false;
                report.fail(
                    "screenshot size",
                    Some(shot.clone()),
                    format!(
                        "{}x{} is not one of {}",
                        size.0,
                        size.1,
                        SCREENSHOT_SIZES
                            .iter()
                            .map(|(w, h)| format!("{w}x{h}"))
                            .collect::<Vec<_>>()
                            .join(" or ")
                    ),
                );
            }
            Err(e) => {
                all_ok = false;
                report.fail("screenshot", Some(shot.clone()), e.to_string());
            }
        }
    }
    if all_ok {
        report.pass(
            "screenshots",
            Some(dir.to_path_buf()),
            format!("{count} image(s)"),
        );
    }
}

/// First file under `root` whose stem matches one of `stems`
/// (case-insensitive) with an accepted image suffix; stems are tried in
/// preference order.
fn find_named_image(root: &Path, stems: &[&str]) -> Option<PathBuf> {
    let entries: Vec<PathBuf> = match fs::read_dir(root) {
        Ok(read) => read
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_suffix(path))
            .collect(),
        Err(_) => return None,
    };
    for stem in stems {
        if let Some(found) = entries.iter().find(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.eq_ignore_ascii_case(stem))
                .unwrap_or(false)
        }) {
            return Some(found.clone());
        }
    }
    None
}

fn collect_image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read) => read
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_suffix(path))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::{write_rgba, PngConfig};
    use image::RgbaImage;

    fn write_image(path: &Path, size: (u32, u32)) {
        write_rgba(&RgbaImage::new(size.0, size.1), path, &PngConfig::default()).unwrap();
    }

    fn valid_tree(root: &Path) {
        fs::create_dir_all(root.join("screenshots")).unwrap();
        write_image(&root.join("icon-128x128.png"), (128, 128));
        write_image(&root.join("small-promo-440x280.png"), (440, 280));
        write_image(
            &root.join("screenshots/screenshot-1-1280x800.png"),
            (1280, 800),
        );
    }

    #[test]
    fn test_valid_tree_passes() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());

        let report = validate_tree(dir.path());
        assert!(report.ok, "{report:?}");
        assert_eq!(report.error_count(), 0);
        // Marquee absence is a note, not an error.
        assert!(report
            .notes
            .iter()
            .any(|note| note.contains("marquee promo is optional")));
    }

    #[test]
    fn test_missing_icon_fails() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        fs::remove_file(dir.path().join("icon-128x128.png")).unwrap();

        let report = validate_tree(dir.path());
        assert!(!report.ok);
        assert!(report
            .checks
            .iter()
            .any(|check| check.label == "store icon" && !check.passed));
    }

    #[test]
    fn test_wrong_dimensions_fail() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        write_image(&dir.path().join("small-promo-440x280.png"), (440, 300));

        let report = validate_tree(dir.path());
        assert!(!report.ok);
        let check = report
            .checks
            .iter()
            .find(|c| c.label == "small promo")
            .unwrap();
        assert!(check.message.contains("expected 440x280, got 440x300"));
    }

    #[test]
    fn test_icon_must_be_real_png() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        fs::write(dir.path().join("icon-128x128.png"), b"not a png").unwrap();

        let report = validate_tree(dir.path());
        assert!(!report.ok);
        let check = report
            .checks
            .iter()
            .find(|c| c.label == "store icon")
            .unwrap();
        assert!(check.message.contains("must be PNG"));
    }

    #[test]
    fn test_legacy_stem_accepted_with_note() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        fs::rename(
            dir.path().join("icon-128x128.png"),
            dir.path().join("icon-128.png"),
        )
        .unwrap();

        let report = validate_tree(dir.path());
        assert!(report.ok, "{report:?}");
        assert!(report
            .notes
            .iter()
            .any(|note| note.contains("legacy store icon filename")));
    }

    #[test]
    fn test_screenshot_count_bounds() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        fs::remove_file(dir.path().join("screenshots/screenshot-1-1280x800.png")).unwrap();

        let report = validate_tree(dir.path());
        assert!(!report.ok);
        assert!(report
            .checks
            .iter()
            .any(|check| check.label == "screenshots" && check.message.contains("found 0")));
    }

    #[test]
    fn test_screenshot_size_must_be_allowed() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());
        write_image(
            &dir.path().join("screenshots/screenshot-2-1280x800.png"),
            (1920, 1080),
        );

        let report = validate_tree(dir.path());
        assert!(!report.ok);
        assert!(report
            .checks
            .iter()
            .any(|check| check.label == "screenshot size"));
    }

    #[test]
    fn test_idempotent_reports() {
        let dir = tempfile::tempdir().unwrap();
        valid_tree(dir.path());

        let first = validate_tree(dir.path());
        let second = validate_tree(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate_tree(&dir.path().join("absent"));
        assert!(!report.ok);
        assert_eq!(report.checks.len(), 1);
    }
}
