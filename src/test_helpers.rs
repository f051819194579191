//! Shared test utilities for the bannerframe test suite.
//!
//! Provides synthetic bitmaps, photo construction, and on-disk fixtures so
//! tests don't depend on checked-in image files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let p = photo("beach.jpg", gradient(800, 600));
//! let tmp = write_png_fixtures(&[("a.png", solid(4, 4, [255, 0, 0, 255]))]);
//! ```

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use crate::types::{Photo, PhotoId};

// =========================================================================
// Bitmaps
// =========================================================================

/// A single-color bitmap.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Opaque bitmap whose red channel ramps left to right and green top to
/// bottom. Every row and column differs, so transforms are visible.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(2).saturating_sub(1).max(1)).min(255) as u8;
        let g = (y * 255 / height.max(2).saturating_sub(1).max(1)).min(255) as u8;
        Rgba([r, g, 128, 255])
    })
}

// =========================================================================
// Photos
// =========================================================================

/// A photo with an identity derived from its name and size.
pub fn photo(name: &str, bitmap: RgbaImage) -> Photo {
    photo_at(name, 0, bitmap)
}

/// Like [`photo`], at a given position in the set.
pub fn photo_at(name: &str, index: usize, bitmap: RgbaImage) -> Photo {
    let size = bitmap.as_raw().len() as u64;
    Photo {
        id: PhotoId::from_file(name, size, 0),
        name: name.to_string(),
        index,
        bitmap,
    }
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Write bitmaps as PNG files into a fresh temp directory.
pub fn write_png_fixtures(files: &[(&str, RgbaImage)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, bitmap) in files {
        let path = tmp.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        bitmap.save(&path).unwrap();
    }
    tmp
}
