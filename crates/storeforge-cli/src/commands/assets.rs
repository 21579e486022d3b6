//! Standalone asset generation command.
//!
//! Runs the generator against an explicit input list without the rest of the
//! pipeline (and without touching the extension manifest).

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use storeforge_assets::{generate, GenerateConfig, Overrides, ScreenshotPolicy};

#[allow(clippy::too_many_arguments)]
pub fn run(
    inputs: &[PathBuf],
    out_root: &str,
    screenshot_size: (u32, u32),
    max_screenshots: usize,
    include_marquee: bool,
    icon_source: Option<PathBuf>,
    small_promo_source: Option<PathBuf>,
    marquee_source: Option<PathBuf>,
    allow_icon_fallback: bool,
    overwrite_screenshots: bool,
) -> Result<ExitCode> {
    let config = GenerateConfig {
        out_root: PathBuf::from(out_root),
        inputs: inputs.to_vec(),
        overrides: Overrides {
            icon: icon_source,
            small_promo: small_promo_source,
            marquee: marquee_source,
            allow_icon_fallback,
        },
        screenshot_size,
        max_screenshots,
        include_marquee,
        policy: if overwrite_screenshots {
            ScreenshotPolicy::Overwrite
        } else {
            ScreenshotPolicy::Append
        },
    };

    let summary = generate(&config)?;

    for warning in &summary.warnings {
        eprintln!("{} {}", "warn:".yellow(), warning);
    }
    if summary.icon_via_fallback {
        eprintln!(
            "{} icon derived from the sole input due to --allow-icon-fallback",
            "warn:".yellow()
        );
    }

    println!("{} generated assets in: {}", "ok".green(), config.out_root.display());
    println!(
        "{} icon source: {}",
        "ok".green(),
        summary
            .icon_source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| summary.icon_source.display().to_string())
    );
    if summary.marquee_written {
        println!("{} marquee: {} (1400x560)", "ok".green(), storeforge_spec::MARQUEE_NAME);
    }
    println!(
        "{} screenshots: +{} (total {}/{}) @ {}x{}",
        "ok".green(),
        summary.screenshots_added,
        summary.screenshots_kept + summary.screenshots_added,
        max_screenshots,
        screenshot_size.0,
        screenshot_size.1
    );
    Ok(ExitCode::SUCCESS)
}
