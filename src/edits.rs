//! Per-photo edit records and the persisted edit set.
//!
//! An [`EditRecord`] is an immutable value: every edit operation returns a
//! new record with the change applied and its range enforced. The session
//! keeps one record per photo in an [`EditStore`] and a single draft copy
//! while the editor is open (see [`session`](crate::session)).
//!
//! ## Ranges
//!
//! | Field | Range | Notes |
//! |---|---|---|
//! | `zoom` | 1.0–3.0 | wheel and slider; numeric entry may go down to 0.5 |
//! | `offset_x`, `offset_y` | ±2000 px | translation from the photo-area center |
//! | `rotation_deg` | 0–359 | normalized after every rotation |
//! | `brightness` | −50–50 | |
//! | `shadows` | 0–100 | |
//!
//! ## Storage
//!
//! The store is saved as `edits.json` in the state directory, keyed by
//! [`PhotoId`], so saved edits come back when the same files are loaded
//! again in a later run.

use crate::imaging::ExposureAdjustment;
use crate::types::PhotoId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 3.0;
/// Lowest zoom accepted from numeric entry, and the floor render applies.
pub const MIN_RENDER_ZOOM: f64 = 0.5;
/// Zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.06;
pub const MAX_OFFSET: f64 = 2000.0;

/// Name of the edit set file within the state directory.
const EDITS_FILENAME: &str = "edits.json";

/// Version of the edit set format. Files with another version are ignored.
const EDITS_VERSION: u32 = 1;

/// Transform and light state for one photo.
///
/// Deserialized records pass through the same clamps as edits, so a
/// hand-edited or stale `edits.json` can't bring out-of-range values in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEditRecord")]
pub struct EditRecord {
    base_scale: f64,
    zoom: f64,
    offset_x: f64,
    offset_y: f64,
    rotation_deg: i32,
    brightness: i32,
    shadows: i32,
    committed: bool,
}

impl EditRecord {
    /// The untouched record for a photo: fitted inside the area, no edits.
    pub fn default_for(base_scale: f64) -> Self {
        Self {
            base_scale,
            zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation_deg: 0,
            brightness: 0,
            shadows: 0,
            committed: false,
        }
    }

    pub fn base_scale(&self) -> f64 {
        self.base_scale
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }

    pub fn rotation_deg(&self) -> i32 {
        self.rotation_deg
    }

    pub fn brightness(&self) -> i32 {
        self.brightness
    }

    pub fn shadows(&self) -> i32 {
        self.shadows
    }

    /// Whether the user explicitly saved this record.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn with_base_scale(self, base_scale: f64) -> Self {
        Self { base_scale, ..self }
    }

    /// Pan by a canvas-space delta, clamped to ±[`MAX_OFFSET`].
    pub fn with_offset_delta(self, dx: f64, dy: f64) -> Self {
        Self {
            offset_x: (self.offset_x + dx).clamp(-MAX_OFFSET, MAX_OFFSET),
            offset_y: (self.offset_y + dy).clamp(-MAX_OFFSET, MAX_OFFSET),
            ..self
        }
    }

    /// One wheel notch per call: positive `delta_y` zooms out, negative in.
    /// Only the sign of the delta matters.
    pub fn with_wheel_zoom(self, delta_y: f64) -> Self {
        let step = if delta_y > 0.0 {
            -WHEEL_ZOOM_STEP
        } else if delta_y < 0.0 {
            WHEEL_ZOOM_STEP
        } else {
            0.0
        };
        self.with_slider_zoom(self.zoom + step)
    }

    /// Zoom from the slider, clamped to the normal operating range.
    pub fn with_slider_zoom(self, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom } else { self.zoom };
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ..self
        }
    }

    /// Zoom typed in directly; only the safety floor applies below 1.
    pub fn with_numeric_zoom(self, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom } else { self.zoom };
        Self {
            zoom: zoom.clamp(MIN_RENDER_ZOOM, MAX_ZOOM),
            ..self
        }
    }

    /// Rotate by `delta` degrees; the result is normalized to `0..360`.
    pub fn rotated(self, delta: i32) -> Self {
        Self {
            rotation_deg: normalize_degrees(self.rotation_deg.wrapping_add(delta)),
            ..self
        }
    }

    pub fn with_brightness(self, brightness: i32) -> Self {
        Self {
            brightness: brightness.clamp(-50, 50),
            ..self
        }
    }

    pub fn with_shadows(self, shadows: i32) -> Self {
        Self {
            shadows: shadows.clamp(0, 100),
            ..self
        }
    }

    /// Apply an auto-exposure suggestion.
    pub fn with_exposure(self, adjustment: ExposureAdjustment) -> Self {
        self.with_brightness(adjustment.brightness)
            .with_shadows(adjustment.shadows)
    }

    /// Brightness and shadows back to zero.
    pub fn without_light(self) -> Self {
        Self {
            brightness: 0,
            shadows: 0,
            ..self
        }
    }

    pub fn committed(self) -> Self {
        Self {
            committed: true,
            ..self
        }
    }
}

/// On-disk shape of an [`EditRecord`], before range enforcement.
#[derive(Deserialize)]
struct RawEditRecord {
    base_scale: f64,
    zoom: f64,
    offset_x: f64,
    offset_y: f64,
    rotation_deg: i32,
    brightness: i32,
    shadows: i32,
    committed: bool,
}

impl From<RawEditRecord> for EditRecord {
    fn from(raw: RawEditRecord) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        let base_scale = if raw.base_scale.is_finite() && raw.base_scale > 0.0 {
            raw.base_scale
        } else {
            1.0
        };
        EditRecord {
            committed: raw.committed,
            ..EditRecord::default_for(base_scale)
        }
        .with_numeric_zoom(raw.zoom)
        .with_offset_delta(finite_or_zero(raw.offset_x), finite_or_zero(raw.offset_y))
        .rotated(raw.rotation_deg)
        .with_brightness(raw.brightness)
        .with_shadows(raw.shadows)
    }
}

/// Normalize any angle in degrees to `0..360`.
pub fn normalize_degrees(deg: i32) -> i32 {
    deg.rem_euclid(360)
}

/// Map a pointer position on a displayed canvas to canvas (backing) pixels.
///
/// `display` is the on-screen size of the canvas, `backing` its pixel size;
/// positions are relative to the canvas's top-left corner.
pub fn to_canvas_point(
    position: (f64, f64),
    display: (f64, f64),
    backing: (u32, u32),
) -> (f64, f64) {
    let scale_x = if display.0 > 0.0 {
        backing.0 as f64 / display.0
    } else {
        1.0
    };
    let scale_y = if display.1 > 0.0 {
        backing.1 as f64 / display.1
    } else {
        1.0
    };
    (position.0 * scale_x, position.1 * scale_y)
}

/// Pointer-drag state for the editor canvas.
///
/// Feeds canvas-space deltas between successive pointer positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragTracker {
    last: Option<(f64, f64)>,
}

impl DragTracker {
    pub fn begin(&mut self, point: (f64, f64)) {
        self.last = Some(point);
    }

    /// Delta since the previous point, or `None` when no drag is active.
    pub fn update(&mut self, point: (f64, f64)) -> Option<(f64, f64)> {
        let last = self.last.replace(point)?;
        Some((point.0 - last.0, point.1 - last.1))
    }

    pub fn end(&mut self) {
        self.last = None;
    }

    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }
}

/// Committed (or synthesized default) records keyed by photo id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditStore {
    version: u32,
    records: BTreeMap<PhotoId, EditRecord>,
}

impl EditStore {
    pub fn new() -> Self {
        Self {
            version: EDITS_VERSION,
            records: BTreeMap::new(),
        }
    }

    /// Load from the state directory. Returns an empty store if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(EDITS_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::new(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(store) if store.version == EDITS_VERSION => store,
            Ok(_) | Err(_) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable edit set");
                Self::new()
            }
        }
    }

    /// Save the committed records to the state directory.
    pub fn save(&self, state_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(state_dir)?;
        let committed = Self {
            version: EDITS_VERSION,
            records: self
                .records
                .iter()
                .filter(|(_, r)| r.is_committed())
                .map(|(id, r)| (id.clone(), *r))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&committed)?;
        std::fs::write(state_dir.join(EDITS_FILENAME), json)
    }

    pub fn get(&self, id: &PhotoId) -> Option<&EditRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, id: PhotoId, record: EditRecord) {
        self.records.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records the user explicitly saved.
    pub fn committed(&self) -> impl Iterator<Item = (&PhotoId, &EditRecord)> {
        self.records.iter().filter(|(_, r)| r.is_committed())
    }

    /// Update every record's base scale in place (output geometry changed).
    pub fn rescale(&mut self, mut base_scale_for: impl FnMut(&PhotoId) -> Option<f64>) {
        for (id, record) in self.records.iter_mut() {
            if let Some(scale) = base_scale_for(id) {
                *record = record.with_base_scale(scale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> EditRecord {
        EditRecord::default_for(1.35)
    }

    // =========================================================================
    // EditRecord operations
    // =========================================================================

    #[test]
    fn default_record_is_untouched() {
        let r = record();
        assert_eq!(r.zoom(), 1.0);
        assert_eq!((r.offset_x(), r.offset_y()), (0.0, 0.0));
        assert_eq!(r.rotation_deg(), 0);
        assert_eq!((r.brightness(), r.shadows()), (0, 0));
        assert!(!r.is_committed());
    }

    #[test]
    fn updates_return_new_records() {
        let r = record();
        let moved = r.with_offset_delta(10.0, -5.0);
        assert_eq!((r.offset_x(), r.offset_y()), (0.0, 0.0));
        assert_eq!((moved.offset_x(), moved.offset_y()), (10.0, -5.0));
    }

    #[test]
    fn offsets_clamp_to_limit() {
        let r = record()
            .with_offset_delta(1500.0, -1500.0)
            .with_offset_delta(1500.0, -1500.0);
        assert_eq!((r.offset_x(), r.offset_y()), (2000.0, -2000.0));
    }

    #[test]
    fn four_quarter_turns_return_to_zero() {
        let r = record().rotated(90).rotated(90).rotated(90).rotated(90);
        assert_eq!(r.rotation_deg(), 0);
    }

    #[test]
    fn negative_rotation_normalizes() {
        assert_eq!(record().rotated(-90).rotation_deg(), 270);
        assert_eq!(record().rotated(-450).rotation_deg(), 270);
        assert_eq!(normalize_degrees(-360), 0);
        assert_eq!(normalize_degrees(725), 5);
    }

    #[test]
    fn wheel_zoom_stays_in_range_for_long_runs() {
        let mut r = record();
        for _ in 0..100 {
            r = r.with_wheel_zoom(-120.0);
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&r.zoom()));
        }
        assert_eq!(r.zoom(), MAX_ZOOM);
        for _ in 0..100 {
            r = r.with_wheel_zoom(1e9);
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&r.zoom()));
        }
        assert_eq!(r.zoom(), MIN_ZOOM);
    }

    #[test]
    fn wheel_zoom_uses_sign_only() {
        let small = record().with_wheel_zoom(-0.001);
        let big = record().with_wheel_zoom(-5000.0);
        assert_eq!(small.zoom(), big.zoom());
        assert!((small.zoom() - 1.06).abs() < 1e-12);
        assert_eq!(record().with_wheel_zoom(0.0).zoom(), 1.0);
    }

    #[test]
    fn slider_and_numeric_zoom_floors() {
        assert_eq!(record().with_slider_zoom(0.2).zoom(), 1.0);
        assert_eq!(record().with_slider_zoom(9.0).zoom(), 3.0);
        assert_eq!(record().with_numeric_zoom(0.2).zoom(), 0.5);
        assert_eq!(record().with_numeric_zoom(0.7).zoom(), 0.7);
        assert_eq!(record().with_numeric_zoom(f64::NAN).zoom(), 1.0);
    }

    #[test]
    fn light_values_clamp() {
        let r = record().with_brightness(80).with_shadows(-4);
        assert_eq!((r.brightness(), r.shadows()), (50, 0));
        let r = r.with_brightness(-80).with_shadows(400);
        assert_eq!((r.brightness(), r.shadows()), (-50, 100));
        let cleared = r.without_light();
        assert_eq!((cleared.brightness(), cleared.shadows()), (0, 0));
    }

    #[test]
    fn exposure_suggestion_applies_both_values() {
        let r = record().with_exposure(ExposureAdjustment {
            brightness: 12,
            shadows: 45,
        });
        assert_eq!((r.brightness(), r.shadows()), (12, 45));
    }

    // =========================================================================
    // Pointer mapping
    // =========================================================================

    #[test]
    fn canvas_point_accounts_for_display_scaling() {
        // 1080x1080 canvas shown at 540x540
        let p = to_canvas_point((100.0, 50.0), (540.0, 540.0), (1080, 1080));
        assert_eq!(p, (200.0, 100.0));
        // Non-uniform display stretch
        let p = to_canvas_point((10.0, 10.0), (1080.0, 270.0), (1080, 1080));
        assert_eq!(p, (10.0, 40.0));
    }

    #[test]
    fn drag_tracker_reports_deltas() {
        let mut drag = DragTracker::default();
        assert_eq!(drag.update((5.0, 5.0)), None);
        drag.begin((10.0, 10.0));
        assert_eq!(drag.update((15.0, 7.0)), Some((5.0, -3.0)));
        assert_eq!(drag.update((15.0, 17.0)), Some((0.0, 10.0)));
        drag.end();
        assert!(!drag.is_active());
        assert_eq!(drag.update((0.0, 0.0)), None);
    }

    // =========================================================================
    // EditStore
    // =========================================================================

    #[test]
    fn store_saves_only_committed_records() {
        let tmp = TempDir::new().unwrap();
        let mut store = EditStore::new();
        let saved = PhotoId::from_file("a.jpg", 1, 1);
        let draft_only = PhotoId::from_file("b.jpg", 1, 1);
        store.insert(saved.clone(), record().rotated(90).committed());
        store.insert(draft_only.clone(), record());
        store.save(tmp.path()).unwrap();

        let loaded = EditStore::load(tmp.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&saved).unwrap().rotation_deg(), 90);
        assert!(loaded.get(&draft_only).is_none());
    }

    #[test]
    fn store_load_tolerates_missing_and_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        assert!(EditStore::load(tmp.path()).is_empty());

        std::fs::write(tmp.path().join(EDITS_FILENAME), "{ nope").unwrap();
        assert!(EditStore::load(tmp.path()).is_empty());

        std::fs::write(
            tmp.path().join(EDITS_FILENAME),
            r#"{"version": 99, "records": {}}"#,
        )
        .unwrap();
        assert!(EditStore::load(tmp.path()).is_empty());
    }

    #[test]
    fn store_load_clamps_out_of_range_records() {
        let tmp = TempDir::new().unwrap();
        let id = PhotoId::from_file("a.jpg", 1, 1);
        let json = format!(
            r#"{{"version": 1, "records": {{"{id}": {{
                "base_scale": -3.0, "zoom": 40.0, "offset_x": 1000000.0,
                "offset_y": -1000000.0, "rotation_deg": -725, "brightness": 900,
                "shadows": -5, "committed": true
            }}}}}}"#
        );
        std::fs::write(tmp.path().join(EDITS_FILENAME), json).unwrap();

        let loaded = EditStore::load(tmp.path());
        let r = loaded.get(&id).unwrap();
        assert_eq!(r.zoom(), MAX_ZOOM);
        assert_eq!((r.offset_x(), r.offset_y()), (MAX_OFFSET, -MAX_OFFSET));
        assert_eq!(r.rotation_deg(), 355);
        assert_eq!((r.brightness(), r.shadows()), (50, 0));
        assert_eq!(r.base_scale(), 1.0);
        assert!(r.is_committed());
    }

    #[test]
    fn store_rescale_updates_base_scale() {
        let mut store = EditStore::new();
        let id = PhotoId::from_file("a.jpg", 1, 1);
        store.insert(id.clone(), record().with_slider_zoom(2.0));
        store.rescale(|_| Some(0.5));
        let r = store.get(&id).unwrap();
        assert_eq!(r.base_scale(), 0.5);
        assert_eq!(r.zoom(), 2.0);
    }
}
