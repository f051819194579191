//! # bannerframe
//!
//! A batch photo compositor. Every photo in a set is framed between a shared
//! header and footer banner on a fixed 1080-pixel-wide canvas, adjusted
//! individually (pan, zoom, rotate, brightness, shadows), and exported as
//! individual files or one zip archive.
//!
//! # Architecture: Session, Compositor, Export
//!
//! ```text
//! scan      paths     →  photos         (discover, identify, decode)
//! session   photos    →  edit set       (draft/commit editing per photo)
//! export    session   →  files / zip    (render + encode every photo)
//! ```
//!
//! Rendering is a pure function of the photo, the banners, the photo's edit
//! record and the render options; [`imaging::Compositor`] does all of it.
//! The [`session::Session`] holds the state that feeds it: the photo set, the
//! active banners, the committed edit set, the single editor draft and the
//! shadow-lift cache. Export takes the session by shared reference and only
//! ever reads committed (or default) records.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry, tone adjustments, the compositor, codec backends |
//! | [`edits`] | `EditRecord` value type, `EditStore` persisted as `edits.json`, pointer mapping |
//! | [`session`] | The session object and the editor draft lifecycle |
//! | [`overlay`] | Header/footer banners, stored entries, default assets |
//! | [`scan`] | Photo discovery, identity and decoding |
//! | [`export`] | Batch export driver, directory and zip sinks, capabilities |
//! | [`config`] | `bannerframe.toml` loading, validation, merging |
//! | [`types`] | Shared types (`PhotoId`, `Photo`, `Status`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fixed Width, Flexible Height
//!
//! Output is always 1080 wide. Banners keep their aspect ratio at that
//! width, so their heights follow from the images themselves. The photo area
//! gets the rest of the requested height but never less than 80 px; when
//! tall banners would squeeze it further the canvas grows instead.
//!
//! ## Draft / Commit Editing
//!
//! Editing never touches the saved edit set directly. Opening the editor
//! copies the photo's record into a draft; every edit replaces the draft
//! with a new immutable [`edits::EditRecord`]; only an explicit save puts
//! it back, marked committed. Closing without saving just drops the draft.
//!
//! ## Deterministic Blur
//!
//! The default blur fill downsamples to 12% of the photo area and back up,
//! twice. It looks like a strong blur and produces the same pixels on every
//! platform. A true Gaussian is available via config.
//!
//! ## Explicit Capabilities
//!
//! Whether zip archives can be written is decided once, at startup, from the
//! compiled features ([`export::Capabilities`]). An archive request in a
//! build without it degrades to individual files with a notice instead of
//! failing.

pub mod config;
pub mod edits;
pub mod export;
pub mod imaging;
pub mod output;
pub mod overlay;
pub mod scan;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
