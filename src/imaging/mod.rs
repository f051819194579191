//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, TIFF, WebP) |
//! | **Encode** | `JpegEncoder` / `PngEncoder`, `DynamicImage::write_to` fallback |
//! | **Banner / blur-fill scaling** | `imageops::resize` (Triangle) |
//! | **Gaussian blur fill** | `imageops::blur` |
//! | **Photo transform** | inverse-mapped bilinear sampling |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for output geometry and fit math (unit testable)
//! - **Parameters**: Data structures describing render and encode options
//! - **Tone**: shadow lift, auto-exposure analysis, the shadow cache
//! - **Compositor**: header + photo area + footer into one bitmap
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod compositor;
mod params;
pub mod rust_backend;
pub mod tone;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    FitRect, MIN_PHOTO_AREA_HEIGHT, OUTPUT_WIDTH, OutputGeometry, fit_contain, fit_cover,
    overlay_height,
};
pub use compositor::{Compositor, brightness_multiplier};
pub use params::{BlurMethod, OutputFormat, Placement, Quality, RenderOptions};
pub use rust_backend::{RustBackend, supported_input_extensions};
pub use tone::{
    ExposureAdjustment, LuminanceStats, ShadowCache, ShadowKey, analyze_exposure, exposure_stats,
};
