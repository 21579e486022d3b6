//! Image inspection helpers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use storeforge_spec::StageError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Pixel dimensions of an image file (PNG or JPEG) without a full decode.
pub fn dimensions(path: &Path) -> Result<(u32, u32), StageError> {
    image::image_dimensions(path).map_err(|e| StageError::ImageRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Whether the file starts with the PNG signature. The store icon must be a
/// real PNG regardless of its filename.
pub fn is_png(path: &Path) -> Result<bool, StageError> {
    let mut header = [0u8; 8];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;
    Ok(read == 8 && header == PNG_SIGNATURE)
}
