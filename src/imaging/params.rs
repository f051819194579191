//! Parameter types for rendering and encoding.
//!
//! These types describe *what* to produce, not *how*. They flow from the
//! [`config`](crate::config) layer into the [`compositor`](super::compositor)
//! (pixels) and the [`backend`](super::backend) (bytes).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, default 92). Clamped on construction.
//! - [`OutputFormat`]: JPEG (lossy, opaque white base) or PNG (lossless, transparent base).
//! - [`BlurMethod`]: How the blur-fill background is softened.
//! - [`Placement`]: Per-photo edit placement, or the legacy contain policy.
//! - [`RenderOptions`]: Everything the compositor needs besides the photo and its edit.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Encoder quality in `0.0..=1.0`.
    pub fn fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy, no alpha: the canvas starts opaque white.
    #[default]
    Jpeg,
    /// Lossless, fixed quality: the canvas starts transparent.
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Png)
    }
}

/// Blur used for the photo-area background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurMethod {
    /// Downscale to 12% and back up, twice. Deterministic everywhere.
    #[default]
    Resample,
    /// True Gaussian blur (sigma 22).
    Gaussian,
}

/// How the photo is placed inside the photo area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Per-photo pan/zoom/rotate/light edits over an optional blur fill.
    #[default]
    Edit,
    /// Contain fit, no crop, no blur fill, edits ignored.
    Contain,
}

/// Everything the compositor needs to know about the output besides the
/// photo and its edit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub target_height: u32,
    pub format: OutputFormat,
    pub blur_fill: bool,
    pub blur: BlurMethod,
    pub placement: Placement,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            target_height: 1080,
            format: OutputFormat::default(),
            blur_fill: true,
            blur: BlurMethod::default(),
            placement: Placement::default(),
        }
    }
}
