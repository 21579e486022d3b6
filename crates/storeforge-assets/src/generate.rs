//! Store asset generation.
//!
//! Consumes classified sources and writes every required (and requested
//! optional) output under the store-assets root. The whole plan (icon
//! choice, screenshot slots, marquee requirement) is resolved before the
//! first file is written, so a configuration failure never leaves partial
//! assets behind.

use std::fs;
use std::path::{Path, PathBuf};

use storeforge_spec::{
    asset_spec, screenshot_filename, StageError, ICON_NAME, ICON_SIZE, MARQUEE_NAME, MARQUEE_SIZE,
    MAX_SCREENSHOTS, SMALL_PROMO_NAME, SMALL_PROMO_SIZE,
};

use crate::classify::{classify, Overrides};
use crate::sequence;
use crate::transform::cover_resize;

/// What to do with an already-populated screenshot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenshotPolicy {
    /// Continue numbering after the existing files (default).
    #[default]
    Append,
    /// Delete the existing numbered files and renumber from 1.
    Overwrite,
}

/// One generation run's configuration.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Store-assets output root (`release/store-assets` in the pipeline).
    pub out_root: PathBuf,
    /// Candidate source images, in order.
    pub inputs: Vec<PathBuf>,
    pub overrides: Overrides,
    pub screenshot_size: (u32, u32),
    pub max_screenshots: usize,
    pub include_marquee: bool,
    pub policy: ScreenshotPolicy,
}

impl GenerateConfig {
    pub fn new(out_root: impl Into<PathBuf>) -> Self {
        Self {
            out_root: out_root.into(),
            inputs: Vec::new(),
            overrides: Overrides::default(),
            screenshot_size: storeforge_spec::DEFAULT_SCREENSHOT_SIZE,
            max_screenshots: MAX_SCREENSHOTS,
            include_marquee: false,
            policy: ScreenshotPolicy::default(),
        }
    }
}

/// What a generation run produced.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub icon_source: PathBuf,
    pub icon_via_fallback: bool,
    /// Every file written, in write order.
    pub written: Vec<PathBuf>,
    pub screenshots_added: usize,
    /// Pre-existing sequence files kept in place (append mode).
    pub screenshots_kept: usize,
    pub marquee_written: bool,
    pub warnings: Vec<String>,
}

/// Runs asset generation against `config`.
pub fn generate(config: &GenerateConfig) -> Result<GenerateSummary, StageError> {
    if config.max_screenshots < 1 || config.max_screenshots > MAX_SCREENSHOTS {
        return Err(StageError::InvalidScreenshotBudget(config.max_screenshots));
    }

    // Resolve the full plan before touching the filesystem.
    let classification = classify(&config.inputs, &config.overrides)?;
    let small_promo = classification
        .small_promo
        .clone()
        .ok_or(StageError::NoImageInputs)?;
    let marquee = if config.include_marquee {
        Some(
            classification
                .marquee
                .clone()
                .ok_or(StageError::MarqueeSourceMissing)?,
        )
    } else {
        None
    };

    let shots_dir = config.out_root.join("screenshots");
    let existing = match config.policy {
        ScreenshotPolicy::Append => sequence::list_existing(&shots_dir)?,
        ScreenshotPolicy::Overwrite => Vec::new(),
    };
    let existing_paths: Vec<PathBuf> = existing
        .iter()
        .map(|(_, path)| canonical(path))
        .collect();

    let candidates: Vec<PathBuf> = classification
        .screenshots
        .iter()
        .filter(|path| !existing_paths.contains(&canonical(path)))
        .cloned()
        .collect();
    let available = config.max_screenshots.saturating_sub(existing.len());
    let sources: Vec<PathBuf> = candidates.into_iter().take(available).collect();

    let mut warnings = Vec::new();
    if sources.is_empty() {
        if existing.is_empty() {
            return Err(StageError::NoScreenshotSources);
        }
        warnings
            .push("no new screenshot sources appended; keeping existing screenshots as-is".into());
    }

    // Plan resolved; now write.
    fs::create_dir_all(&config.out_root)?;
    fs::create_dir_all(&shots_dir)?;
    clean_root_outputs(&config.out_root)?;
    if config.policy == ScreenshotPolicy::Overwrite {
        sequence::clear_numbered(&shots_dir, &config.inputs)?;
    }

    let mut written = Vec::new();

    let icon_out = config.out_root.join(ICON_NAME);
    cover_resize(&classification.icon, &icon_out, ICON_SIZE)?;
    written.push(icon_out);

    let promo_out = config.out_root.join(SMALL_PROMO_NAME);
    cover_resize(&small_promo, &promo_out, SMALL_PROMO_SIZE)?;
    written.push(promo_out);

    let marquee_written = if let Some(source) = &marquee {
        let out = config.out_root.join(MARQUEE_NAME);
        cover_resize(source, &out, MARQUEE_SIZE)?;
        written.push(out);
        true
    } else {
        false
    };

    let next = sequence::next_index(&existing);
    for (offset, source) in sources.iter().enumerate() {
        let out = shots_dir.join(screenshot_filename(next + offset, config.screenshot_size));
        cover_resize(source, &out, config.screenshot_size)?;
        written.push(out);
    }

    Ok(GenerateSummary {
        icon_source: classification.icon,
        icon_via_fallback: classification.icon_via_fallback,
        written,
        screenshots_added: sources.len(),
        screenshots_kept: existing.len(),
        marquee_written,
        warnings,
    })
}

/// Removes stale root-level outputs, current and legacy names alike, so an
/// old file can never pass validation after a rerun.
fn clean_root_outputs(root: &Path) -> Result<(), StageError> {
    for name in asset_spec::root_output_names() {
        let candidate = root.join(name);
        if candidate.is_file() {
            fs::remove_file(&candidate)?;
        }
    }
    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::{write_rgba, PngConfig};
    use crate::probe;
    use image::{Rgba, RgbaImage};

    fn write_image(dir: &Path, name: &str, size: (u32, u32)) -> PathBuf {
        let path = dir.join(name);
        let image = RgbaImage::from_fn(size.0, size.1, |x, y| {
            Rgba([(x % 200) as u8, (y % 200) as u8, 90, 255])
        });
        write_rgba(&image, &path, &PngConfig::default()).unwrap();
        path
    }

    fn base_config(dir: &Path) -> GenerateConfig {
        let mut config = GenerateConfig::new(dir.join("store-assets"));
        config.inputs = vec![
            write_image(dir, "icon_source.png", (2000, 2000)),
            write_image(dir, "shot1.png", (1920, 1080)),
            write_image(dir, "shot2.png", (1920, 1080)),
        ];
        config
    }

    #[test]
    fn test_generates_required_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());

        let summary = generate(&config).unwrap();
        assert!(summary.icon_source.ends_with("icon_source.png"));
        assert_eq!(summary.screenshots_added, 2);
        assert!(!summary.marquee_written);

        let root = &config.out_root;
        assert_eq!(probe::dimensions(&root.join(ICON_NAME)).unwrap(), (128, 128));
        assert_eq!(
            probe::dimensions(&root.join(SMALL_PROMO_NAME)).unwrap(),
            (440, 280)
        );
        assert!(!root.join(MARQUEE_NAME).exists());
        assert!(root
            .join("screenshots/screenshot-1-1280x800.png")
            .is_file());
        assert!(root
            .join("screenshots/screenshot-2-1280x800.png")
            .is_file());
    }

    #[test]
    fn test_marquee_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.include_marquee = true;

        let summary = generate(&config).unwrap();
        assert!(summary.marquee_written);
        assert_eq!(
            probe::dimensions(&config.out_root.join(MARQUEE_NAME)).unwrap(),
            (1400, 560)
        );
    }

    #[test]
    fn test_append_continues_numbering_and_keeps_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        generate(&config).unwrap();

        let first = config
            .out_root
            .join("screenshots/screenshot-1-1280x800.png");
        let first_bytes = fs::read(&first).unwrap();

        // Second run with one new source appends as screenshot-3.
        config.inputs = vec![
            write_image(dir.path(), "logo.png", (512, 512)),
            write_image(dir.path(), "shot3.png", (1920, 1080)),
        ];
        let summary = generate(&config).unwrap();
        assert_eq!(summary.screenshots_kept, 2);
        assert_eq!(summary.screenshots_added, 1);

        assert_eq!(fs::read(&first).unwrap(), first_bytes);
        assert!(config
            .out_root
            .join("screenshots/screenshot-3-1280x800.png")
            .is_file());
    }

    #[test]
    fn test_append_respects_slot_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.max_screenshots = 3;
        generate(&config).unwrap(); // 2 screenshots exist

        config.inputs = vec![
            write_image(dir.path(), "logo.png", (512, 512)),
            write_image(dir.path(), "shot3.png", (1920, 1080)),
            write_image(dir.path(), "shot4.png", (1920, 1080)),
        ];
        let summary = generate(&config).unwrap();
        // Only one slot left out of 3.
        assert_eq!(summary.screenshots_added, 1);
        assert!(config
            .out_root
            .join("screenshots/screenshot-3-1280x800.png")
            .is_file());
        assert!(!config
            .out_root
            .join("screenshots/screenshot-4-1280x800.png")
            .exists());
    }

    #[test]
    fn test_overwrite_renumbers_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        generate(&config).unwrap();

        config.policy = ScreenshotPolicy::Overwrite;
        config.inputs = vec![
            write_image(dir.path(), "logo.png", (512, 512)),
            write_image(dir.path(), "replacement.png", (1920, 1080)),
        ];
        let summary = generate(&config).unwrap();
        assert_eq!(summary.screenshots_added, 1);
        assert_eq!(summary.screenshots_kept, 0);

        let shots_dir = config.out_root.join("screenshots");
        let survivors = sequence::list_existing(&shots_dir).unwrap();
        let indices: Vec<usize> = survivors.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1]);
    }

    #[test]
    fn test_append_with_no_new_sources_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.max_screenshots = 2;
        generate(&config).unwrap(); // fills both slots

        // Icon-only rerun: nothing left to append, sequence non-empty.
        config.inputs = vec![write_image(dir.path(), "logo.png", (512, 512))];
        config.overrides.allow_icon_fallback = true;
        let summary = generate(&config).unwrap();
        assert_eq!(summary.screenshots_added, 0);
        assert_eq!(summary.screenshots_kept, 2);
        assert!(!summary.warnings.is_empty());
    }

    #[test]
    fn test_no_sources_and_empty_sequence_fails() {
        let dir = tempfile::tempdir().unwrap();
        let icon = write_image(dir.path(), "icon.png", (512, 512));
        let promo = write_image(dir.path(), "promo.png", (900, 600));
        let config = GenerateConfig {
            inputs: Vec::new(),
            overrides: Overrides {
                icon: Some(icon),
                small_promo: Some(promo),
                ..Default::default()
            },
            ..GenerateConfig::new(dir.path().join("store-assets"))
        };

        assert!(matches!(
            generate(&config),
            Err(StageError::NoScreenshotSources)
        ));
        // Nothing was written.
        assert!(!config.out_root.join(ICON_NAME).exists());
    }

    #[test]
    fn test_ambiguous_icon_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GenerateConfig::new(dir.path().join("store-assets"));
        config.inputs = vec![
            write_image(dir.path(), "icon-a.png", (512, 512)),
            write_image(dir.path(), "logo-b.png", (512, 512)),
        ];

        assert!(matches!(
            generate(&config),
            Err(StageError::AmbiguousIconSource(_))
        ));
        assert!(!config.out_root.exists());
    }

    #[test]
    fn test_budget_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.max_screenshots = 0;
        assert!(matches!(
            generate(&config),
            Err(StageError::InvalidScreenshotBudget(0))
        ));
        config.max_screenshots = 6;
        assert!(matches!(
            generate(&config),
            Err(StageError::InvalidScreenshotBudget(6))
        ));
    }

    #[test]
    fn test_stale_legacy_outputs_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        fs::create_dir_all(&config.out_root).unwrap();
        fs::write(config.out_root.join("icon-128.png"), b"stale").unwrap();
        fs::write(config.out_root.join("marquee.png"), b"stale").unwrap();

        generate(&config).unwrap();
        assert!(!config.out_root.join("icon-128.png").exists());
        assert!(!config.out_root.join("marquee.png").exists());
    }
}
