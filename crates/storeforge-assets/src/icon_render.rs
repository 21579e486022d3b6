//! Bootstrap icon renderer.
//!
//! Produces the deterministic placeholder icons the icon-bootstrap stage
//! installs when an extension ships none: a radial badge with bracket marks,
//! tinted by a palette seeded from the extension name. Same name and size
//! always render to byte-identical PNG data, which is what lets the UI audit
//! recognize a placeholder that was never replaced with real branding.

use image::{Rgba, RgbaImage};
use std::path::Path;

use storeforge_spec::StageError;

use crate::png::{write_rgba, write_rgba_to_writer, PngConfig};

/// Base tint derived from the extension name.
pub fn palette_from_name(name: &str) -> (u8, u8, u8) {
    let seed: u32 = name.chars().map(|c| c as u32).sum();
    let r = 16 + (seed.wrapping_mul(31)) % 50;
    let g = 90 + (seed.wrapping_mul(17)) % 80;
    let b = 170 + (seed.wrapping_mul(13)) % 70;
    (r as u8, g as u8, b as u8)
}

/// Renders one square badge icon.
pub fn render_icon(size: u32, base: (u8, u8, u8)) -> RgbaImage {
    let center = (size.saturating_sub(1)) as f64 / 2.0;
    let radius = size as f64 * 0.47;
    let (base_r, base_g, base_b) = (base.0 as f64, base.1 as f64, base.2 as f64);
    let fsize = size as f64;

    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f64 - center;
        let dy = y as f64 - center;
        let dist = dx.hypot(dy);

        let bg = 240.0 - (y as f64 / (fsize - 1.0).max(1.0)) * 20.0;
        let mut r = bg;
        let mut g = bg + 4.0;
        let mut b = 248.0;

        if dist <= radius {
            let t = (dist / radius).min(1.0);
            r = base_r + 36.0 * t;
            g = base_g + 24.0 * t;
            b = base_b + 18.0 * t;

            // White bracket-like marks (visual cue for identifier/token).
            if (fsize * 0.16..=fsize * 0.27).contains(&dist) && dx.abs() > fsize * 0.08 {
                r = 245.0;
                g = 249.0;
                b = 255.0;
            }
            if (fsize * 0.32..=fsize * 0.39).contains(&dist) && dy.abs() < fsize * 0.04 {
                r = 245.0;
                g = 249.0;
                b = 255.0;
            }
        }

        Rgba([clamp(r), clamp(g), clamp(b), 255])
    })
}

fn clamp(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Renders and writes one icon to disk.
pub fn write_icon(path: &Path, size: u32, base: (u8, u8, u8)) -> Result<(), StageError> {
    write_rgba(&render_icon(size, base), path, &PngConfig::default())
}

/// Renders one icon to encoded PNG bytes, for placeholder comparison.
pub fn render_png_bytes(size: u32, base: (u8, u8, u8)) -> Result<Vec<u8>, StageError> {
    let mut data = Vec::new();
    write_rgba_to_writer(&render_icon(size, base), &mut data, &PngConfig::default()).map_err(
        |detail| StageError::ImageEncode {
            path: Path::new("<memory>").to_path_buf(),
            detail,
        },
    )?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_stable_and_bounded() {
        let a = palette_from_name("Tab Tidy");
        let b = palette_from_name("Tab Tidy");
        assert_eq!(a, b);
        assert!((16..66).contains(&a.0));
        assert!((90..170).contains(&a.1));
        assert!((170..240).contains(&a.2));

        let other = palette_from_name("Another Extension");
        assert_ne!(a, other);
    }

    #[test]
    fn test_render_deterministic_bytes() {
        let base = palette_from_name("Tab Tidy");
        let first = render_png_bytes(48, base).unwrap();
        let second = render_png_bytes(48, base).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_sizes() {
        let base = palette_from_name("X");
        for size in [16u32, 48, 128] {
            let icon = render_icon(size, base);
            assert_eq!(icon.dimensions(), (size, size));
        }
    }

    #[test]
    fn test_written_icon_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon48.png");
        write_icon(&path, 48, palette_from_name("Tab Tidy")).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (48, 48));
        assert_eq!(
            decoded.as_raw(),
            render_icon(48, palette_from_name("Tab Tidy")).as_raw()
        );
    }
}
