//! Header and footer banners and their persistence.
//!
//! Each slot is stored as one entry in the state directory, named after its
//! key (`overlay_header`, `overlay_footer`), holding a self-contained
//! `data:<mime>;base64,<payload>` URL of the original encoded file. Entries
//! survive across runs and are independent of the photo set.
//!
//! ## Resolution
//!
//! ```text
//! stored entry decodes  → use it
//! no entry / unreadable → load <assets_dir>/header001.png (or footer001.png)
//!                         and store it as the new entry
//! default fails         → status notice, slot stays empty
//! ```
//!
//! A missing banner is never fatal: composition proceeds without it.

use crate::imaging::{BackendError, ImageBackend, OUTPUT_WIDTH, overlay_height};
use crate::types::Status;
use base64::{Engine as _, engine::general_purpose};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Overlay image invalid: {0}")]
    Backend(#[from] BackendError),
    #[error("Stored overlay is not a data URL: {0}")]
    MalformedEntry(String),
    #[error("Stored overlay payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Overlay would be {height} px tall on the output (max {max})", max = MAX_OVERLAY_HEIGHT)]
    TooTall { height: u32 },
}

/// Tallest banner accepted, in output pixels.
pub const MAX_OVERLAY_HEIGHT: u32 = 10 * OUTPUT_WIDTH;

/// Decode banner bytes, rejecting images too tall to lay out.
fn decode_banner(bytes: &[u8], backend: &impl ImageBackend) -> Result<RgbaImage, OverlayError> {
    let bitmap = backend.decode_bytes(bytes)?;
    let height = overlay_height(bitmap.width(), bitmap.height());
    if height > MAX_OVERLAY_HEIGHT {
        return Err(OverlayError::TooTall { height });
    }
    Ok(bitmap)
}

/// Which banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlaySlot {
    Header,
    Footer,
}

impl OverlaySlot {
    pub const ALL: [OverlaySlot; 2] = [OverlaySlot::Header, OverlaySlot::Footer];

    /// Storage key of this slot's entry.
    pub fn key(self) -> &'static str {
        match self {
            Self::Header => "overlay_header",
            Self::Footer => "overlay_footer",
        }
    }

    /// File name of the built-in banner, relative to the assets directory.
    pub fn default_asset(self) -> &'static str {
        match self {
            Self::Header => "header001.png",
            Self::Footer => "footer001.png",
        }
    }
}

impl fmt::Display for OverlaySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Footer => f.write_str("footer"),
        }
    }
}

/// Where an active overlay came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlaySource {
    Stored,
    DefaultAsset(PathBuf),
    File(PathBuf),
}

/// A decoded banner.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub slot: OverlaySlot,
    pub bitmap: RgbaImage,
    pub source: OverlaySource,
}

impl Overlay {
    /// Intrinsic width / height.
    pub fn aspect_ratio(&self) -> f64 {
        self.bitmap.width() as f64 / self.bitmap.height().max(1) as f64
    }

    /// Height the banner occupies on the 1080-wide canvas.
    pub fn output_height(&self) -> u32 {
        overlay_height(self.bitmap.width(), self.bitmap.height())
    }

    pub fn output_size(&self) -> (u32, u32) {
        (OUTPUT_WIDTH, self.output_height())
    }
}

/// Build a `data:` URL for an encoded image.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Split a `data:` URL into its mime type and decoded payload.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), OverlayError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| OverlayError::MalformedEntry("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| OverlayError::MalformedEntry("missing payload separator".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| OverlayError::MalformedEntry(format!("not base64-encoded: {meta}")))?;
    Ok((mime.to_string(), general_purpose::STANDARD.decode(payload)?))
}

/// Mime type of encoded image bytes, by content sniffing.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Key-value storage for overlay entries in the state directory.
#[derive(Debug, Clone)]
pub struct OverlayStore {
    dir: PathBuf,
}

impl OverlayStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_dir.into(),
        }
    }

    fn entry_path(&self, slot: OverlaySlot) -> PathBuf {
        self.dir.join(slot.key())
    }

    /// Raw entry text, or `None` if the slot has never been stored.
    pub fn load_entry(&self, slot: OverlaySlot) -> Result<Option<String>, OverlayError> {
        match fs::read_to_string(self.entry_path(slot)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store encoded image bytes as the slot's entry.
    pub fn store_bytes(&self, slot: OverlaySlot, bytes: &[u8]) -> Result<(), OverlayError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.entry_path(slot),
            encode_data_url(sniff_mime(bytes), bytes),
        )?;
        Ok(())
    }

    pub fn remove(&self, slot: OverlaySlot) -> Result<(), OverlayError> {
        match fs::remove_file(self.entry_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode the stored entry, if any.
    pub fn load(
        &self,
        slot: OverlaySlot,
        backend: &impl ImageBackend,
    ) -> Result<Option<Overlay>, OverlayError> {
        let Some(entry) = self.load_entry(slot)? else {
            return Ok(None);
        };
        let (_, bytes) = decode_data_url(&entry)?;
        let bitmap = decode_banner(&bytes, backend)?;
        Ok(Some(Overlay {
            slot,
            bitmap,
            source: OverlaySource::Stored,
        }))
    }

    /// Resolve the active overlay for a slot (see the [module docs](self)).
    pub fn resolve(
        &self,
        slot: OverlaySlot,
        assets_dir: &Path,
        backend: &impl ImageBackend,
        statuses: &mut Vec<Status>,
    ) -> Option<Overlay> {
        match self.load(slot, backend) {
            Ok(Some(overlay)) => return Some(overlay),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%slot, error = %e, "stored overlay unreadable");
                statuses.push(Status::OverlayEntryUnreadable {
                    slot,
                    reason: e.to_string(),
                });
            }
        }
        self.load_default(slot, assets_dir, backend, statuses)
    }

    fn load_default(
        &self,
        slot: OverlaySlot,
        assets_dir: &Path,
        backend: &impl ImageBackend,
        statuses: &mut Vec<Status>,
    ) -> Option<Overlay> {
        let path = assets_dir.join(slot.default_asset());
        let loaded = fs::read(&path)
            .map_err(OverlayError::from)
            .and_then(|bytes| {
                let bitmap = decode_banner(&bytes, backend)?;
                Ok((bytes, bitmap))
            });
        match loaded {
            Ok((bytes, bitmap)) => {
                if let Err(e) = self.store_bytes(slot, &bytes) {
                    tracing::warn!(%slot, error = %e, "could not store default overlay");
                }
                statuses.push(Status::DefaultOverlayLoaded {
                    slot,
                    path: path.clone(),
                });
                Some(Overlay {
                    slot,
                    bitmap,
                    source: OverlaySource::DefaultAsset(path),
                })
            }
            Err(e) => {
                statuses.push(Status::DefaultOverlayMissing {
                    slot,
                    path,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Replace a slot's overlay with an image file. The file must decode.
    pub fn set_from_file(
        &self,
        slot: OverlaySlot,
        path: &Path,
        backend: &impl ImageBackend,
    ) -> Result<Overlay, OverlayError> {
        let bytes = fs::read(path)?;
        let bitmap = decode_banner(&bytes, backend)?;
        self.store_bytes(slot, &bytes)?;
        Ok(Overlay {
            slot,
            bitmap,
            source: OverlaySource::File(path.to_path_buf()),
        })
    }

    /// Drop a slot's entry and fall back to the default banner, which is
    /// stored again as the new entry.
    pub fn clear(
        &self,
        slot: OverlaySlot,
        assets_dir: &Path,
        backend: &impl ImageBackend,
        statuses: &mut Vec<Status>,
    ) -> Result<Option<Overlay>, OverlayError> {
        self.remove(slot)?;
        Ok(self.load_default(slot, assets_dir, backend, statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::test_helpers::{gradient, write_png_fixtures};
    use tempfile::TempDir;

    fn assets() -> TempDir {
        write_png_fixtures(&[
            ("header001.png", gradient(540, 50)),
            ("footer001.png", gradient(1080, 60)),
            ("custom.png", gradient(270, 90)),
        ])
    }

    #[test]
    fn slot_keys_and_defaults() {
        assert_eq!(OverlaySlot::Header.key(), "overlay_header");
        assert_eq!(OverlaySlot::Footer.key(), "overlay_footer");
        assert_eq!(OverlaySlot::Header.default_asset(), "header001.png");
        assert_eq!(OverlaySlot::Footer.default_asset(), "footer001.png");
    }

    #[test]
    fn too_tall_banner_is_rejected() {
        let tmp = write_png_fixtures(&[("sliver.png", gradient(2, 30))]);
        let state = TempDir::new().unwrap();
        let store = OverlayStore::new(state.path());
        let err = store
            .set_from_file(OverlaySlot::Header, &tmp.path().join("sliver.png"), &RustBackend::new())
            .unwrap_err();
        // 2x30 at 1080 wide is 16200 px tall
        assert!(matches!(err, OverlayError::TooTall { height: 16200 }));
        assert!(store.load_entry(OverlaySlot::Header).unwrap().is_none());
    }

    #[test]
    fn data_url_roundtrip_and_errors() {
        let url = encode_data_url("image/png", b"\x89PNG-ish");
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG-ish");

        assert!(matches!(
            decode_data_url("image/png;base64,AAAA"),
            Err(OverlayError::MalformedEntry(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png,raw"),
            Err(OverlayError::MalformedEntry(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(OverlayError::Base64(_))
        ));
    }

    #[test]
    fn missing_entry_loads_and_stores_default() {
        let assets = assets();
        let state = TempDir::new().unwrap();
        let store = OverlayStore::new(state.path());
        let backend = RustBackend::new();
        let mut statuses = Vec::new();

        let header = store
            .resolve(OverlaySlot::Header, assets.path(), &backend, &mut statuses)
            .unwrap();
        assert_eq!(header.bitmap.dimensions(), (540, 50));
        assert_eq!(header.output_height(), 100);
        assert!(matches!(header.source, OverlaySource::DefaultAsset(_)));
        assert!(matches!(
            statuses[0],
            Status::DefaultOverlayLoaded {
                slot: OverlaySlot::Header,
                ..
            }
        ));

        // Now stored: the next resolve comes from the entry
        let mut statuses = Vec::new();
        let again = store
            .resolve(OverlaySlot::Header, assets.path(), &backend, &mut statuses)
            .unwrap();
        assert_eq!(again.source, OverlaySource::Stored);
        assert_eq!(again.bitmap, header.bitmap);
        assert!(statuses.is_empty());
    }

    #[test]
    fn missing_default_reports_and_leaves_slot_empty() {
        let assets = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let store = OverlayStore::new(state.path());
        let mut statuses = Vec::new();

        let footer = store.resolve(
            OverlaySlot::Footer,
            assets.path(),
            &RustBackend::new(),
            &mut statuses,
        );
        assert!(footer.is_none());
        assert!(matches!(
            statuses[0],
            Status::DefaultOverlayMissing {
                slot: OverlaySlot::Footer,
                ..
            }
        ));
        assert!(store.load_entry(OverlaySlot::Footer).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_falls_back_to_default() {
        let assets = assets();
        let state = TempDir::new().unwrap();
        fs::write(state.path().join("overlay_header"), "garbage").unwrap();
        let store = OverlayStore::new(state.path());
        let mut statuses = Vec::new();

        let header = store
            .resolve(
                OverlaySlot::Header,
                assets.path(),
                &RustBackend::new(),
                &mut statuses,
            )
            .unwrap();
        assert!(matches!(header.source, OverlaySource::DefaultAsset(_)));
        assert!(matches!(
            statuses[0],
            Status::OverlayEntryUnreadable { .. }
        ));
    }

    #[test]
    fn set_then_clear_reverts_to_default() {
        let assets = assets();
        let state = TempDir::new().unwrap();
        let store = OverlayStore::new(state.path());
        let backend = RustBackend::new();

        let custom = store
            .set_from_file(OverlaySlot::Header, &assets.path().join("custom.png"), &backend)
            .unwrap();
        assert_eq!(custom.output_size(), (1080, 360));
        let stored = store.load(OverlaySlot::Header, &backend).unwrap().unwrap();
        assert_eq!(stored.bitmap.dimensions(), (270, 90));

        let mut statuses = Vec::new();
        let reverted = store
            .clear(OverlaySlot::Header, assets.path(), &backend, &mut statuses)
            .unwrap()
            .unwrap();
        assert_eq!(reverted.bitmap.dimensions(), (540, 50));
        let stored = store.load(OverlaySlot::Header, &backend).unwrap().unwrap();
        assert_eq!(stored.bitmap.dimensions(), (540, 50));
    }

    #[test]
    fn set_rejects_undecodable_file() {
        let tmp = TempDir::new().unwrap();
        let bogus = tmp.path().join("bogus.png");
        fs::write(&bogus, b"nope").unwrap();
        let store = OverlayStore::new(tmp.path().join("state"));
        let result = store.set_from_file(OverlaySlot::Footer, &bogus, &RustBackend::new());
        assert!(matches!(result, Err(OverlayError::Backend(_))));
        assert!(store.load_entry(OverlaySlot::Footer).unwrap().is_none());
    }
}
