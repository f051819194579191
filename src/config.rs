//! Compositor configuration module.
//!
//! Handles loading, validating, and merging `bannerframe.toml`. Stock
//! defaults are serialized to a TOML table and the user file is merged on
//! top of it key by key, so a config file only needs the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! height = 1080             # Output height in pixels (width is always 1080)
//! format = "jpeg"           # jpeg (white fill) or png (transparent)
//! quality = 92              # JPEG quality (0-100)
//! blur_fill = true          # Blurred copy of the photo behind it
//! blur = "resample"         # resample or gaussian
//! placement = "edit"        # edit (per-photo edits) or contain
//!
//! [export]
//! archive = false           # Bundle all outputs into one zip
//! yield_every = 2           # Photos between progress yields
//! on_decode_error = "skip"  # skip or abort
//!
//! [overlays]
//! assets_dir = "assets"     # Holds header001.png / footer001.png
//! state_dir = ".bannerframe" # Stored overlays and edits.json
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [output]
//! height = 1350
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{BlurMethod, OutputFormat, Placement, Quality, RenderOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "bannerframe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `bannerframe.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Output canvas settings (height, format, quality, blur).
    pub output: OutputConfig,
    /// Batch export behavior.
    pub export: ExportConfig,
    /// Where overlays and edits live.
    pub overlays: OverlaysConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 0-100".into(),
            ));
        }
        if self.output.height == 0 {
            return Err(ConfigError::Validation(
                "output.height must be positive".into(),
            ));
        }
        if self.export.yield_every == 0 {
            return Err(ConfigError::Validation(
                "export.yield_every must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Render options derived from the `[output]` section.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            target_height: self.output.height,
            format: self.output.format,
            blur_fill: self.output.blur_fill,
            blur: self.output.blur,
            placement: self.output.placement,
        }
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.quality)
    }
}

/// Output canvas settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Requested output height. The canvas grows past it when the banners
    /// would leave less than the minimum photo area.
    pub height: u32,
    pub format: OutputFormat,
    /// Lossy quality 0-100; ignored for PNG.
    pub quality: u32,
    pub blur_fill: bool,
    pub blur: BlurMethod,
    pub placement: Placement,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            height: render.target_height,
            format: render.format,
            quality: Quality::default().value(),
            blur_fill: render.blur_fill,
            blur: render.blur,
            placement: render.placement,
        }
    }
}

/// What to do when a photo can't be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Report it and keep loading the rest.
    #[default]
    Skip,
    /// Stop loading at the first failure.
    Abort,
}

/// Batch export behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub archive: bool,
    /// Emit a progress event (and check for cancellation) every N photos.
    pub yield_every: usize,
    pub on_decode_error: DecodePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            archive: false,
            yield_every: 2,
            on_decode_error: DecodePolicy::Skip,
        }
    }
}

/// Overlay asset and state locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlaysConfig {
    pub assets_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for OverlaysConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            state_dir: PathBuf::from(".bannerframe"),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `bannerframe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# bannerframe Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output canvas
# ---------------------------------------------------------------------------
[output]
# Output height in pixels. Width is always 1080. The header and footer keep
# their aspect ratio at 1080 wide; the photo area gets what is left, never
# less than 80 px (the canvas grows if the banners need more room).
height = 1080

# "jpeg": lossy, opaque white background.
# "png": lossless, transparent background.
format = "jpeg"

# JPEG encoding quality (0 = worst, 100 = best). Ignored for PNG.
quality = 92

# Fill the photo area with a blurred, darkened copy of the photo.
blur_fill = true

# "resample": two-pass downscale/upscale blur, identical on every platform.
# "gaussian": true gaussian blur.
blur = "resample"

# "edit": photo drawn with its saved pan/zoom/rotation/light edits.
# "contain": photo fitted whole inside the area, edits and blur fill ignored.
placement = "edit"

# ---------------------------------------------------------------------------
# Batch export
# ---------------------------------------------------------------------------
[export]
# Bundle all outputs into one zip archive instead of individual files.
archive = false

# Report progress (and honor cancellation) every N photos.
yield_every = 2

# What to do when a photo fails to decode: "skip" it or "abort" loading.
on_decode_error = "skip"

# ---------------------------------------------------------------------------
# Overlays and state
# ---------------------------------------------------------------------------
[overlays]
# Directory holding the default banners header001.png and footer001.png.
assets_dir = "assets"

# Directory for stored overlays and saved edits (edits.json).
state_dir = ".bannerframe"
"##
}
