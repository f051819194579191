//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the byte-level work around the
//! compositor: decoding photos and banners, and encoding rendered outputs.
//! The compositor itself only ever sees decoded bitmaps.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on the `image` crate.
//! Tests use the recording `MockBackend` below.

use super::params::{OutputFormat, Quality};
use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codec backends.
///
/// Encoding has two paths. [`encode`](Self::encode) is the tuned,
/// format-specific encoder; [`encode_fallback`](Self::encode_fallback) is a
/// plainer path the export driver tries once when the first one fails.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode an image file to RGBA8.
    fn decode(&self, path: &Path) -> Result<RgbaImage, BackendError>;

    /// Decode an in-memory encoded image to RGBA8.
    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError>;

    /// Encode a rendered output.
    fn encode(
        &self,
        bitmap: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Secondary encode path, tried when [`encode`](Self::encode) fails.
    fn encode_fallback(
        &self,
        bitmap: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        self.encode(bitmap, format, quality)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock backend that serves canned bitmaps and records operations.
    /// Uses Mutex (not RefCell) so it is Sync.
    #[derive(Default)]
    pub struct MockBackend {
        pub images: Mutex<HashMap<PathBuf, RgbaImage>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Number of upcoming `encode` calls that fail.
        pub failing_encodes: Mutex<usize>,
        /// Number of upcoming `encode_fallback` calls that fail.
        pub failing_fallbacks: Mutex<usize>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Decode(String),
        DecodeBytes(usize),
        Encode {
            width: u32,
            height: u32,
            format: OutputFormat,
            quality: u32,
        },
        EncodeFallback {
            width: u32,
            height: u32,
            format: OutputFormat,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_images(images: Vec<(&str, RgbaImage)>) -> Self {
            let backend = Self::new();
            {
                let mut map = backend.images.lock().unwrap();
                for (path, img) in images {
                    map.insert(PathBuf::from(path), img);
                }
            }
            backend
        }

        pub fn fail_encodes(self, n: usize) -> Self {
            *self.failing_encodes.lock().unwrap() = n;
            self
        }

        pub fn fail_fallbacks(self, n: usize) -> Self {
            *self.failing_fallbacks.lock().unwrap() = n;
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn take_failure(counter: &Mutex<usize>) -> bool {
            let mut n = counter.lock().unwrap();
            if *n > 0 {
                *n -= 1;
                true
            } else {
                false
            }
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            self.images
                .lock()
                .unwrap()
                .get(path)
                .map(|img| Dimensions {
                    width: img.width(),
                    height: img.height(),
                })
                .ok_or_else(|| BackendError::DecodeFailed("No mock image".to_string()))
        }

        fn decode(&self, path: &Path) -> Result<RgbaImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(path.to_string_lossy().to_string()));
            self.images
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| BackendError::DecodeFailed(format!("No mock image for {}", path.display())))
        }

        fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::DecodeBytes(bytes.len()));
            // Mock payloads are "WxH" so tests can round-trip overlays
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BackendError::DecodeFailed(e.to_string()))?;
            let (w, h) = text
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
                .ok_or_else(|| BackendError::DecodeFailed(format!("bad mock payload {text}")))?;
            Ok(RgbaImage::new(w, h))
        }

        fn encode(
            &self,
            bitmap: &RgbaImage,
            format: OutputFormat,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width: bitmap.width(),
                height: bitmap.height(),
                format,
                quality: quality.value(),
            });
            if Self::take_failure(&self.failing_encodes) {
                return Err(BackendError::EncodeFailed("mock encode failure".into()));
            }
            Ok(format!("{}x{}", bitmap.width(), bitmap.height()).into_bytes())
        }

        fn encode_fallback(
            &self,
            bitmap: &RgbaImage,
            format: OutputFormat,
            _quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::EncodeFallback {
                    width: bitmap.width(),
                    height: bitmap.height(),
                    format,
                });
            if Self::take_failure(&self.failing_fallbacks) {
                return Err(BackendError::EncodeFailed("mock fallback failure".into()));
            }
            Ok(format!("{}x{}", bitmap.width(), bitmap.height()).into_bytes())
        }
    }

    #[test]
    fn mock_decodes_registered_images() {
        let backend = MockBackend::with_images(vec![("/photos/a.jpg", RgbaImage::new(8, 6))]);

        let img = backend.decode(Path::new("/photos/a.jpg")).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert!(backend.decode(Path::new("/photos/missing.jpg")).is_err());

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Decode(p) if p == "/photos/a.jpg"));
    }

    #[test]
    fn mock_encode_failures_are_consumed_in_order() {
        let backend = MockBackend::new().fail_encodes(1);
        let img = RgbaImage::new(4, 4);

        assert!(backend.encode(&img, OutputFormat::Png, Quality::default()).is_err());
        assert_eq!(
            backend.encode(&img, OutputFormat::Png, Quality::default()).unwrap(),
            b"4x4"
        );
    }

    #[test]
    fn mock_decode_bytes_parses_dimensions() {
        let backend = MockBackend::new();
        let img = backend.decode_bytes(b"1080x120").unwrap();
        assert_eq!(img.dimensions(), (1080, 120));
        assert!(backend.decode_bytes(b"garbage").is_err());
    }
}
