//! Dimension transformer: cover-resize a source image to exact pixels.
//!
//! The crop-then-scale policy: crop the larger dimension symmetrically about
//! the center until the source matches the target aspect ratio, then resample
//! to the exact target size. Output dimensions are always exact; aspect
//! mismatch alone can never fail.

use image::imageops::FilterType;
use std::path::Path;

use storeforge_spec::StageError;

use crate::png::{write_rgba, PngConfig};

/// The centered crop rectangle `(x, y, w, h)` that matches the target aspect
/// ratio inside a `source_w x source_h` image.
pub fn center_crop_rect(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let (sw, sh) = source;
    let (tw, th) = target;
    // Cross-multiplied aspect comparison avoids float error.
    let lhs = sw as u64 * th as u64;
    let rhs = sh as u64 * tw as u64;

    if lhs > rhs {
        // Source is wider than the target aspect: crop width.
        let crop_w = ((rhs / th as u64) as u32).max(1);
        let x = (sw - crop_w) / 2;
        (x, 0, crop_w, sh)
    } else if lhs < rhs {
        // Source is taller: crop height.
        let crop_h = ((lhs / tw as u64) as u32).max(1);
        let y = (sh - crop_h) / 2;
        (0, y, sw, crop_h)
    } else {
        (0, 0, sw, sh)
    }
}

/// Resize `src` to exactly `target` pixels and write PNG to `out`.
///
/// Same source and target always produce byte-identical output: the crop is
/// integer arithmetic, Lanczos3 resampling is deterministic, and the PNG
/// encoder runs with fixed settings.
pub fn cover_resize(src: &Path, out: &Path, target: (u32, u32)) -> Result<(), StageError> {
    let decoded = image::open(src).map_err(|e| StageError::ImageRead {
        path: src.to_path_buf(),
        detail: e.to_string(),
    })?;

    let (x, y, w, h) = center_crop_rect((decoded.width(), decoded.height()), target);
    let cropped = decoded.crop_imm(x, y, w, h);
    let resized = cropped.resize_exact(target.0, target.1, FilterType::Lanczos3);

    write_rgba(&resized.to_rgba8(), out, &PngConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::{write_rgba, PngConfig};
    use crate::probe;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, name: &str, size: (u32, u32)) -> PathBuf {
        let path = dir.join(name);
        let image = RgbaImage::from_fn(size.0, size.1, |x, y| {
            Rgba([(x % 251) as u8, (y % 241) as u8, 60, 255])
        });
        write_rgba(&image, &path, &PngConfig::default()).unwrap();
        path
    }

    #[test]
    fn test_crop_rect_wider_source() {
        // 2000x1000 to 1x1 aspect: crop width to 1000, centered.
        assert_eq!(center_crop_rect((2000, 1000), (128, 128)), (500, 0, 1000, 1000));
    }

    #[test]
    fn test_crop_rect_taller_source() {
        // 800x1200 to 440x280 aspect: crop height.
        let (x, y, w, h) = center_crop_rect((800, 1200), (440, 280));
        assert_eq!((x, w), (0, 800));
        assert_eq!(h, 800 * 280 / 440);
        assert_eq!(y, (1200 - h) / 2);
    }

    #[test]
    fn test_crop_rect_matching_aspect() {
        assert_eq!(center_crop_rect((2560, 1600), (1280, 800)), (0, 0, 2560, 1600));
    }

    #[test]
    fn test_exact_output_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), "src.png", (2000, 2000));

        for target in [(128, 128), (440, 280), (1400, 560), (1280, 800), (640, 400)] {
            let out = dir.path().join(format!("out-{}x{}.png", target.0, target.1));
            cover_resize(&src, &out, target).unwrap();
            assert_eq!(probe::dimensions(&out).unwrap(), target);
        }
    }

    #[test]
    fn test_upscale_small_source_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), "tiny.png", (30, 20));
        let out = dir.path().join("up.png");
        cover_resize(&src, &out, (1280, 800)).unwrap();
        assert_eq!(probe::dimensions(&out).unwrap(), (1280, 800));
    }

    #[test]
    fn test_deterministic_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), "src.png", (900, 600));
        let out1 = dir.path().join("a.png");
        let out2 = dir.path().join("b.png");

        cover_resize(&src, &out1, (440, 280)).unwrap();
        cover_resize(&src, &out2, (440, 280)).unwrap();

        assert_eq!(
            std::fs::read(&out1).unwrap(),
            std::fs::read(&out2).unwrap()
        );
    }

    #[test]
    fn test_unreadable_source_is_image_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("corrupt.png");
        std::fs::write(&src, b"not a png at all").unwrap();
        let out = dir.path().join("out.png");

        assert!(matches!(
            cover_resize(&src, &out, (128, 128)),
            Err(StageError::ImageRead { .. })
        ));
    }
}
