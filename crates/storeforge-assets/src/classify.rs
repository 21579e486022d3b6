//! Source image classification.
//!
//! Assigns each candidate input a role: icon, small promo, marquee, or
//! screenshot. Explicit overrides always win. Icon selection is heuristic
//! (filename tokens, then aspect-ratio proximity to square) and fails closed:
//! a wrong icon is a store-listing-visible defect, so any ambiguity demands
//! an explicit `--icon-source` instead of a guess.

use std::path::{Path, PathBuf};

use storeforge_spec::StageError;

use crate::probe;

/// Filename tokens that mark an icon/logo-like source.
pub const ICON_KEYWORDS: [&str; 5] = ["icon", "logo", "favicon", "appicon", "brand"];

/// Filename tokens that mark a screenshot-like source.
pub const SCREENSHOT_KEYWORDS: [&str; 6] = [
    "screenshot",
    "screen-shot",
    "screen_shot",
    "capture",
    "screen",
    "shot",
];

/// How far from 1:1 an aspect ratio may be and still count as near-square.
const SQUARE_TOLERANCE: f64 = 0.2;

/// Explicit per-role source overrides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub icon: Option<PathBuf>,
    pub small_promo: Option<PathBuf>,
    pub marquee: Option<PathBuf>,
    /// Permit using the sole input as icon source when nothing icon-like is
    /// detected.
    pub allow_icon_fallback: bool,
}

/// The resolved role assignment for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub icon: PathBuf,
    /// True when the icon came from the single-input fallback rather than a
    /// confident heuristic or an override.
    pub icon_via_fallback: bool,
    pub small_promo: Option<PathBuf>,
    pub marquee: Option<PathBuf>,
    /// Screenshot-eligible sources in input order, not yet truncated to the
    /// slot budget (the generator owns that, it depends on append state).
    pub screenshots: Vec<PathBuf>,
}

fn normalized_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
        .replace('_', "-")
}

/// Whether the filename carries an icon/logo-like token.
pub fn has_icon_keyword(path: &Path) -> bool {
    let stem = normalized_stem(path);
    ICON_KEYWORDS.iter().any(|keyword| stem.contains(keyword))
}

/// Whether the filename carries a screenshot-like token.
pub fn has_screenshot_keyword(path: &Path) -> bool {
    let stem = normalized_stem(path);
    SCREENSHOT_KEYWORDS
        .iter()
        .any(|keyword| stem.contains(keyword))
}

#[derive(Debug, Clone)]
struct Scored {
    delta: f64,
    min_side: u32,
    index: usize,
    path: PathBuf,
}

/// Ranks a candidate set and returns the unique best entry.
///
/// Order: squareness delta ascending, then larger min side, then input
/// order. An exact tie on (delta, min side) between the top two is
/// ambiguous.
fn pick_unique_best(mut set: Vec<Scored>) -> Result<Scored, StageError> {
    set.sort_by(|a, b| {
        a.delta
            .partial_cmp(&b.delta)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.min_side.cmp(&a.min_side))
            .then(a.index.cmp(&b.index))
    });
    if set.len() > 1 && set[0].delta == set[1].delta && set[0].min_side == set[1].min_side {
        return Err(StageError::AmbiguousIconSource(vec![
            set[0].path.clone(),
            set[1].path.clone(),
        ]));
    }
    Ok(set.remove(0))
}

/// Selects the icon source from the inputs, or fails closed.
fn pick_icon_source(
    inputs: &[PathBuf],
    allow_icon_fallback: bool,
) -> Result<(PathBuf, bool), StageError> {
    let mut by_keyword: Vec<Scored> = Vec::new();
    let mut by_shape: Vec<Scored> = Vec::new();

    for (index, path) in inputs.iter().enumerate() {
        let (width, height) = probe::dimensions(path)?;
        let delta = (width as f64 / height as f64 - 1.0).abs();
        let scored = Scored {
            delta,
            min_side: width.min(height),
            index,
            path: path.clone(),
        };
        if has_icon_keyword(path) {
            by_keyword.push(scored.clone());
        }
        if delta <= SQUARE_TOLERANCE {
            by_shape.push(scored);
        }
    }

    let keyword_best = if by_keyword.is_empty() {
        None
    } else {
        Some(pick_unique_best(by_keyword)?)
    };
    let shape_best = if by_shape.is_empty() {
        None
    } else {
        Some(pick_unique_best(by_shape)?)
    };

    match (keyword_best, shape_best) {
        // Filename and shape agree, or only the filename heuristic fired.
        (Some(keyword), Some(shape)) if keyword.path == shape.path => Ok((keyword.path, false)),
        (Some(keyword), None) => Ok((keyword.path, false)),
        // Filename heuristic and shape heuristic point at different images:
        // fail closed rather than guess a precedence order.
        (Some(keyword), Some(shape)) => Err(StageError::AmbiguousIconSource(vec![
            keyword.path,
            shape.path,
        ])),
        (None, Some(shape)) => {
            if has_screenshot_keyword(&shape.path) {
                Err(StageError::IconLooksLikeScreenshot(shape.path))
            } else {
                Ok((shape.path, false))
            }
        }
        (None, None) => {
            if inputs.len() == 1 && allow_icon_fallback {
                Ok((inputs[0].clone(), true))
            } else {
                Err(StageError::IconSourceUnresolved {
                    inputs: inputs.len(),
                })
            }
        }
    }
}

/// Assigns roles to the candidate inputs.
///
/// Roles are derived fresh on every call; nothing is cached between runs.
pub fn classify(inputs: &[PathBuf], overrides: &Overrides) -> Result<Classification, StageError> {
    for path in inputs
        .iter()
        .chain(overrides.icon.iter())
        .chain(overrides.small_promo.iter())
        .chain(overrides.marquee.iter())
    {
        if !path.is_file() {
            return Err(StageError::SourceImageMissing(path.clone()));
        }
    }

    let (icon, icon_via_fallback) = match &overrides.icon {
        Some(path) => (path.clone(), false),
        None => {
            if inputs.is_empty() {
                return Err(StageError::IconSourceUnresolved { inputs: 0 });
            }
            pick_icon_source(inputs, overrides.allow_icon_fallback)?
        }
    };

    let first = inputs.first().cloned();
    let small_promo = overrides.small_promo.clone().or_else(|| first.clone());
    let marquee = overrides.marquee.clone().or(first);

    // Screenshot role: everything not claimed by another role, in input
    // order. A sole input doubles as its own screenshot source.
    let assigned: Vec<&PathBuf> = std::iter::once(&icon)
        .chain(overrides.small_promo.iter())
        .chain(overrides.marquee.iter())
        .collect();
    let mut screenshots: Vec<PathBuf> = if inputs.len() > 1 {
        inputs
            .iter()
            .filter(|p| !assigned.contains(p))
            .cloned()
            .collect()
    } else {
        inputs.to_vec()
    };
    if screenshots.is_empty() {
        screenshots = inputs.to_vec();
    }

    Ok(Classification {
        icon,
        icon_via_fallback,
        small_promo,
        marquee,
        screenshots,
    })
}
