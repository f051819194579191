//! Pure Rust codec backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Identify | `image::image_dimensions` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` on flattened RGB8 |
//! | Encode PNG | `image::codecs::png::PngEncoder` on RGBA8 |
//! | Fallback encode | `DynamicImage::write_to` with default encoder settings |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite RGBA over opaque white, dropping alpha (JPEG has none).
fn flatten_on_white(bitmap: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((bitmap.width() * bitmap.height() * 3) as usize);
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        let a = a as u32;
        for c in [r, g, b] {
            rgb.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
        }
    }
    rgb
}

fn image_format(format: OutputFormat) -> ImageFormat {
    match format {
        OutputFormat::Jpeg => ImageFormat::Jpeg,
        OutputFormat::Png => ImageFormat::Png,
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::DecodeFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, path: &Path) -> Result<RgbaImage, BackendError> {
        let img = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::DecodeFailed(format!("Failed to decode {}: {}", path.display(), e))
            })?;
        Ok(img.to_rgba8())
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackendError::DecodeFailed(format!("Failed to decode image data: {}", e)))?;
        Ok(img.to_rgba8())
    }

    fn encode(
        &self,
        bitmap: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut out = Vec::new();
        let (w, h) = bitmap.dimensions();
        match format {
            OutputFormat::Jpeg => {
                // The jpeg encoder rejects quality 0
                let q = (quality.fraction() * 100.0).round().clamp(1.0, 100.0) as u8;
                JpegEncoder::new_with_quality(&mut out, q)
                    .write_image(&flatten_on_white(bitmap), w, h, image::ExtendedColorType::Rgb8)
                    .map_err(|e| BackendError::EncodeFailed(format!("JPEG encode failed: {}", e)))?;
            }
            OutputFormat::Png => {
                PngEncoder::new(&mut out)
                    .write_image(bitmap.as_raw(), w, h, image::ExtendedColorType::Rgba8)
                    .map_err(|e| BackendError::EncodeFailed(format!("PNG encode failed: {}", e)))?;
            }
        }
        Ok(out)
    }

    fn encode_fallback(
        &self,
        bitmap: &RgbaImage,
        format: OutputFormat,
        _quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let img = match format {
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(
                image::RgbImage::from_raw(bitmap.width(), bitmap.height(), flatten_on_white(bitmap))
                    .ok_or_else(|| BackendError::EncodeFailed("bad RGB buffer".into()))?,
            ),
            OutputFormat::Png => DynamicImage::ImageRgba8(bitmap.clone()),
        };
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image_format(format))
            .map_err(|e| BackendError::EncodeFailed(format!("Fallback encode failed: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, solid};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn png_roundtrip_keeps_alpha() {
        let backend = RustBackend::new();
        let img = solid(6, 4, [10, 20, 30, 0]);
        let bytes = backend.encode(&img, OutputFormat::Png, Quality::default()).unwrap();
        let decoded = backend.decode_bytes(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_encode_flattens_transparency_to_white() {
        let backend = RustBackend::new();
        let img = solid(16, 16, [0, 0, 0, 0]);
        let bytes = backend.encode(&img, OutputFormat::Jpeg, Quality::new(90)).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = backend.decode_bytes(&bytes).unwrap();
        assert!(decoded.get_pixel(8, 8).0[0] > 250);
    }

    #[test]
    fn jpeg_quality_zero_is_accepted() {
        let backend = RustBackend::new();
        let bytes = backend
            .encode(&gradient(32, 32), OutputFormat::Jpeg, Quality::new(0))
            .unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn fallback_encode_produces_decodable_output() {
        let backend = RustBackend::new();
        for format in [OutputFormat::Jpeg, OutputFormat::Png] {
            let bytes = backend
                .encode_fallback(&gradient(20, 10), format, Quality::default())
                .unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), image_format(format));
            assert_eq!(backend.decode_bytes(&bytes).unwrap().dimensions(), (20, 10));
        }
    }

    #[test]
    fn decode_file_and_identify() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        gradient(40, 30).save(&path).unwrap();

        let backend = RustBackend::new();
        assert_eq!(
            backend.identify(&path).unwrap(),
            Dimensions {
                width: 40,
                height: 30
            }
        );
        assert_eq!(backend.decode(&path).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn decode_nonexistent_file_errors() {
        let backend = RustBackend::new();
        assert!(backend.decode(Path::new("/nonexistent/image.jpg")).is_err());
    }

    #[test]
    fn decode_garbage_bytes_errors() {
        let backend = RustBackend::new();
        assert!(matches!(
            backend.decode_bytes(b"not an image"),
            Err(BackendError::DecodeFailed(_))
        ));
    }

    #[test]
    fn flatten_blends_partial_alpha() {
        let img = solid(1, 1, [0, 0, 0, 128]);
        let rgb = flatten_on_white(&img);
        // 255 * 127/255 ≈ 127
        assert_eq!(rgb, vec![127, 127, 127]);
    }
}
