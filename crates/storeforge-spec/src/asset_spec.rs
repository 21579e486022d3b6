//! Canonical Chrome Web Store listing-asset contract.
//!
//! Exact output filenames, pixel dimensions, and count bounds. Both the
//! generator and the validator read this table; neither carries its own copy.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Store icon output filename.
pub const ICON_NAME: &str = "icon-128x128.png";
/// Small promo tile output filename.
pub const SMALL_PROMO_NAME: &str = "small-promo-440x280.png";
/// Optional marquee tile output filename.
pub const MARQUEE_NAME: &str = "marquee-1400x560.png";

/// Exact store icon dimensions.
pub const ICON_SIZE: (u32, u32) = (128, 128);
/// Exact small promo tile dimensions.
pub const SMALL_PROMO_SIZE: (u32, u32) = (440, 280);
/// Exact marquee tile dimensions.
pub const MARQUEE_SIZE: (u32, u32) = (1400, 560);

/// The two screenshot dimension pairs the store accepts.
pub const SCREENSHOT_SIZES: [(u32, u32); 2] = [(1280, 800), (640, 400)];
/// Screenshot size used when none is requested.
pub const DEFAULT_SCREENSHOT_SIZE: (u32, u32) = (1280, 800);
/// A listing must carry at least this many screenshots.
pub const MIN_SCREENSHOTS: usize = 1;
/// A listing may carry at most this many screenshots.
pub const MAX_SCREENSHOTS: usize = 5;

/// Image suffixes accepted as sources and as validator inputs.
pub const ALLOWED_IMAGE_SUFFIXES: [&str; 3] = ["png", "jpg", "jpeg"];

/// One fixed-size output in the listing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSpec {
    /// Canonical output filename under the store-assets root.
    pub name: &'static str,
    /// Validator label for report lines.
    pub label: &'static str,
    /// Exact output width in pixels.
    pub width: u32,
    /// Exact output height in pixels.
    pub height: u32,
    /// Whether a listing is invalid without this output.
    pub required: bool,
    /// Legacy filename stems the validator still accepts (preferred stem
    /// first).
    pub stems: &'static [&'static str],
}

impl AssetSpec {
    /// Exact `(width, height)` for this asset.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The fixed-size outputs (screenshots are governed separately by
/// [`SCREENSHOT_SIZES`] and the count bounds).
pub const FIXED_ASSETS: [AssetSpec; 3] = [
    AssetSpec {
        name: ICON_NAME,
        label: "store icon",
        width: 128,
        height: 128,
        required: true,
        stems: &["icon-128x128", "icon-128"],
    },
    AssetSpec {
        name: SMALL_PROMO_NAME,
        label: "small promo",
        width: 440,
        height: 280,
        required: true,
        stems: &["small-promo-440x280", "small-promo"],
    },
    AssetSpec {
        name: MARQUEE_NAME,
        label: "marquee promo",
        width: 1400,
        height: 560,
        required: false,
        stems: &["marquee-1400x560", "marquee"],
    },
];

/// Every root-level output name, current and legacy, cleared before a
/// generation run so stale files cannot pass validation by accident.
pub fn root_output_names() -> Vec<String> {
    let mut names = Vec::new();
    for asset in &FIXED_ASSETS {
        for stem in asset.stems {
            names.push(format!("{stem}.png"));
        }
    }
    names
}

static SCREENSHOT_FILE_REGEX: OnceLock<Regex> = OnceLock::new();

fn screenshot_file_regex() -> &'static Regex {
    SCREENSHOT_FILE_REGEX.get_or_init(|| {
        Regex::new(r"^screenshot-(\d+)-(\d+)x(\d+)\.png$").expect("invalid regex pattern")
    })
}

/// Builds the canonical screenshot filename for a 1-based sequence index.
pub fn screenshot_filename(index: usize, size: (u32, u32)) -> String {
    format!("screenshot-{}-{}x{}.png", index, size.0, size.1)
}

/// Parses `screenshot-<n>-<w>x<h>.png` into `(index, (w, h))`.
///
/// Returns `None` for any other filename, including casing or suffix
/// variants; the sequence grammar is exact.
pub fn parse_screenshot_filename(name: &str) -> Option<(usize, (u32, u32))> {
    let caps = screenshot_file_regex().captures(name)?;
    let index = caps[1].parse().ok()?;
    let width = caps[2].parse().ok()?;
    let height = caps[3].parse().ok()?;
    Some((index, (width, height)))
}

/// Parses a `WIDTHxHEIGHT` size token such as `1280x800`.
///
/// Usable directly as a clap value parser.
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let token = value.trim().to_ascii_lowercase().replace(' ', "");
    let (w_str, h_str) = token
        .split_once('x')
        .ok_or_else(|| "size must be WIDTHxHEIGHT, e.g. 1280x800".to_string())?;
    let width: u32 = w_str
        .parse()
        .map_err(|_| "size must use integers, e.g. 1280x800".to_string())?;
    let height: u32 = h_str
        .parse()
        .map_err(|_| "size must use integers, e.g. 1280x800".to_string())?;
    if width == 0 || height == 0 {
        return Err("width/height must be > 0".to_string());
    }
    Ok((width, height))
}

/// Whether a path carries an accepted image suffix (png/jpg/jpeg).
pub fn has_image_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            ALLOWED_IMAGE_SUFFIXES.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Whether `size` is one of the accepted screenshot dimension pairs.
pub fn is_allowed_screenshot_size(size: (u32, u32)) -> bool {
    SCREENSHOT_SIZES.contains(&size)
}
