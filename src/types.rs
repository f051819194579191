//! Shared types used across the session, compositor, and export driver.

use crate::overlay::OverlaySlot;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Stable identity of a photo file.
///
/// Derived from the file name, byte size, and modification time, so picking
/// the same file again (in a later run) yields the same id and its saved
/// edits apply again. Two different files only collide if all three match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    pub fn from_file(name: &str, size: u64, modified_ms: u128) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(size.to_le_bytes());
        hasher.update(modified_ms.to_le_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded photo in the current photo set.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: PhotoId,
    /// Original file name, used for output naming and status lines.
    pub name: String,
    /// Position in the photo set (source order).
    pub index: usize,
    pub bitmap: RgbaImage,
}

impl Photo {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Non-fatal notices from photo loading and overlay resolution.
///
/// Nothing here stops the session; the CLI prints these as status lines.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    PhotosLoaded {
        count: usize,
        skipped: usize,
    },
    DecodeSkipped {
        name: String,
        reason: String,
    },
    /// A stored overlay was found but could not be read back.
    OverlayEntryUnreadable {
        slot: OverlaySlot,
        reason: String,
    },
    /// The default banner was loaded and stored as the new entry.
    DefaultOverlayLoaded {
        slot: OverlaySlot,
        path: PathBuf,
    },
    /// The default banner could not be loaded; the slot stays empty.
    DefaultOverlayMissing {
        slot: OverlaySlot,
        path: PathBuf,
        reason: String,
    },
}
