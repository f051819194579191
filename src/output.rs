//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output leads with the photo, identified by its positional index and file
//! name, with details as indented context lines. The same photo looks the
//! same in `export`, `edit` and `analyze` output.
//!
//! # Output Format
//!
//! ## Export
//!
//! ```text
//! Exporting 3 photos (files)
//! 001 IMG_0001.jpg → IMG_0001_1080x1080.jpg (412 KB)
//! 002 IMG_0002.jpg → IMG_0002_1080x1080.jpg (398 KB)
//!     2 of 3 done
//! 003 IMG_0003.jpg → IMG_0003_1080x1080.jpg (405 KB)
//! Exported 3 photos
//! ```
//!
//! ## Analyze
//!
//! ```text
//! 001 IMG_0001.jpg
//!     Mean luminance: 62.4
//!     Suggested: brightness +50, shadows 45
//! ```
//!
//! ## Edit
//!
//! ```text
//! 001 IMG_0001.jpg (saved)
//!     Zoom: 1.30 × base 1.3500
//!     Offset: -40, 12
//!     Rotation: 90°
//!     Light: brightness +10, shadows 35
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: they do no I/O.

use crate::edits::EditRecord;
use crate::export::{ExportEvent, ExportMode, ExportSummary};
use crate::imaging::{ExposureAdjustment, LuminanceStats, OutputGeometry};
use crate::overlay::{Overlay, OverlaySlot, OverlaySource};
use crate::types::{Photo, Status};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Photo header line: 1-based index and file name.
fn photo_line(photo: &Photo) -> String {
    format!("{} {}", format_index(photo.index + 1), photo.name)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{} KB", b / 1024),
        b => format!("{} B", b),
    }
}

fn mode_label(mode: ExportMode) -> &'static str {
    match mode {
        ExportMode::Files => "files",
        ExportMode::Archive => "archive",
    }
}

fn signed(value: i32) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Export
// ============================================================================

/// Format a single export progress event as display lines.
///
/// `names` maps the 1-based photo index back to source file names; pass an
/// empty slice to show output names only.
pub fn format_export_event(event: &ExportEvent, names: &[String]) -> Vec<String> {
    match event {
        ExportEvent::Started { total, mode } => {
            vec![format!(
                "Exporting {} ({})",
                plural(*total, "photo"),
                mode_label(*mode)
            )]
        }
        ExportEvent::Degraded {
            requested,
            using,
            reason,
        } => vec![format!(
            "Note: {} export unavailable ({}), using {}",
            mode_label(*requested),
            reason,
            mode_label(*using)
        )],
        ExportEvent::EncodeFallback { name, reason } => vec![
            format!("Warning: encoding {} failed, retrying with fallback", name),
            format!("{}{}", indent(1), reason),
        ],
        ExportEvent::PhotoExported {
            index,
            filename,
            bytes,
            ..
        } => {
            let source = names
                .get(index.saturating_sub(1))
                .map(|n| format!("{} → ", n))
                .unwrap_or_default();
            vec![format!(
                "{} {}{} ({})",
                format_index(*index),
                source,
                filename,
                format_bytes(*bytes)
            )]
        }
        ExportEvent::Progress { done, total } => {
            vec![format!("{}{} of {} done", indent(1), done, total)]
        }
        ExportEvent::Cancelled { done, total } => {
            vec![format!("Cancelled after {} of {}", done, total)]
        }
        ExportEvent::Finished(summary) => format_export_summary(summary),
    }
}

/// Closing lines of an export.
pub fn format_export_summary(summary: &ExportSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let mut headline = format!("Exported {}", plural(summary.exported, "photo"));
    if summary.fallbacks > 0 {
        headline.push_str(&format!(
            " ({} via fallback encoder)",
            summary.fallbacks
        ));
    }
    lines.push(headline);
    if let Some(archive) = &summary.archive {
        lines.push(format!("{}Archive: {}", indent(1), archive.display()));
    }
    lines
}

// ============================================================================
// Status notices
// ============================================================================

/// Format a loading or overlay notice.
pub fn format_status(status: &Status) -> Vec<String> {
    match status {
        Status::PhotosLoaded { count, skipped: 0 } => {
            vec![format!("Loaded {}", plural(*count, "photo"))]
        }
        Status::PhotosLoaded { count, skipped } => vec![format!(
            "Loaded {} ({} skipped)",
            plural(*count, "photo"),
            skipped
        )],
        Status::DecodeSkipped { name, reason } => vec![
            format!("Skipped {}: could not decode", name),
            format!("{}{}", indent(1), reason),
        ],
        Status::OverlayEntryUnreadable { slot, reason } => vec![
            format!("Stored {} unreadable, using default", slot),
            format!("{}{}", indent(1), reason),
        ],
        Status::DefaultOverlayLoaded { slot, path } => {
            vec![format!("Default {} loaded from {}", slot, path.display())]
        }
        Status::DefaultOverlayMissing { slot, path, reason } => vec![
            format!("Default {} unavailable: {}", slot, path.display()),
            format!("{}{}", indent(1), reason),
            format!("{}Continuing without a {}", indent(1), slot),
        ],
    }
}

pub fn print_statuses(statuses: &[Status]) {
    for status in statuses {
        for line in format_status(status) {
            println!("{}", line);
        }
    }
}

// ============================================================================
// Overlays and geometry
// ============================================================================

/// One slot's state for `overlay show`.
pub fn format_overlay(slot: OverlaySlot, overlay: Option<&Overlay>) -> Vec<String> {
    let Some(overlay) = overlay else {
        return vec![format!("{}: none", slot)];
    };
    let (w, h) = overlay.bitmap.dimensions();
    let source = match &overlay.source {
        OverlaySource::Stored => "stored".to_string(),
        OverlaySource::DefaultAsset(p) => format!("default {}", p.display()),
        OverlaySource::File(p) => p.display().to_string(),
    };
    vec![
        format!("{}: {}x{} ({})", slot, w, h, source),
        format!(
            "{}On canvas: 1080x{} (aspect {:.3})",
            indent(1),
            overlay.output_height(),
            overlay.aspect_ratio()
        ),
    ]
}

/// Canvas layout summary.
pub fn format_geometry(geometry: &OutputGeometry) -> Vec<String> {
    vec![
        format!("Canvas: {}x{}", geometry.width(), geometry.canvas_height),
        format!(
            "{}Header {} / photo area {} / footer {}",
            indent(1),
            geometry.header_height,
            geometry.photo_area_height,
            geometry.footer_height
        ),
    ]
}

pub fn print_overlays(slots: &[(OverlaySlot, Option<&Overlay>)], geometry: &OutputGeometry) {
    for (slot, overlay) in slots {
        for line in format_overlay(*slot, *overlay) {
            println!("{}", line);
        }
    }
    for line in format_geometry(geometry) {
        println!("{}", line);
    }
}

// ============================================================================
// Analyze
// ============================================================================

/// Auto-exposure result for one photo.
pub fn format_analysis(
    photo: &Photo,
    stats: &LuminanceStats,
    adjustment: &ExposureAdjustment,
) -> Vec<String> {
    vec![
        photo_line(photo),
        format!("{}Mean luminance: {:.1}", indent(1), stats.mean),
        format!(
            "{}Percentiles: p05 {} / p95 {}",
            indent(1),
            stats.percentile(0.05),
            stats.percentile(0.95)
        ),
        format!(
            "{}Suggested: brightness {}, shadows {}",
            indent(1),
            signed(adjustment.brightness),
            adjustment.shadows
        ),
    ]
}

pub fn print_analysis(photo: &Photo, stats: &LuminanceStats, adjustment: &ExposureAdjustment) {
    for line in format_analysis(photo, stats, adjustment) {
        println!("{}", line);
    }
}

// ============================================================================
// Edit
// ============================================================================

/// An edit record as shown after `edit`.
pub fn format_edit(photo: &Photo, record: &EditRecord) -> Vec<String> {
    let state = if record.is_committed() {
        "saved"
    } else {
        "default"
    };
    let mut lines = vec![
        format!("{} ({})", photo_line(photo), state),
        format!(
            "{}Zoom: {:.2} × base {:.4}",
            indent(1),
            record.zoom(),
            record.base_scale()
        ),
        format!(
            "{}Offset: {:.0}, {:.0}",
            indent(1),
            record.offset_x(),
            record.offset_y()
        ),
        format!("{}Rotation: {}°", indent(1), record.rotation_deg()),
    ];
    if record.brightness() != 0 || record.shadows() != 0 {
        lines.push(format!(
            "{}Light: brightness {}, shadows {}",
            indent(1),
            signed(record.brightness()),
            record.shadows()
        ));
    }
    lines
}

pub fn print_edit(photo: &Photo, record: &EditRecord) {
    for line in format_edit(photo, record) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, photo_at, solid};
    use std::path::PathBuf;

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(4096), "4 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn signed_values_show_plus() {
        assert_eq!(signed(10), "+10");
        assert_eq!(signed(0), "0");
        assert_eq!(signed(-5), "-5");
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn format_export_started_and_photo() {
        let started = format_export_event(
            &ExportEvent::Started {
                total: 1,
                mode: ExportMode::Archive,
            },
            &[],
        );
        assert_eq!(started, vec!["Exporting 1 photo (archive)"]);

        let names = vec!["IMG_1.jpg".to_string()];
        let lines = format_export_event(
            &ExportEvent::PhotoExported {
                index: 1,
                total: 1,
                filename: "IMG_1_1080x1080.jpg".into(),
                bytes: 2048,
            },
            &names,
        );
        assert_eq!(lines, vec!["001 IMG_1.jpg → IMG_1_1080x1080.jpg (2 KB)"]);
    }

    #[test]
    fn format_export_degraded_mentions_both_modes() {
        let lines = format_export_event(
            &ExportEvent::Degraded {
                requested: ExportMode::Archive,
                using: ExportMode::Files,
                reason: "no zip".into(),
            },
            &[],
        );
        assert_eq!(lines, vec!["Note: archive export unavailable (no zip), using files"]);
    }

    #[test]
    fn format_summary_with_archive_and_fallbacks() {
        let summary = ExportSummary {
            mode: ExportMode::Archive,
            exported: 3,
            fallbacks: 1,
            cancelled: false,
            files: vec![],
            archive: Some(PathBuf::from("out/output_1080_1.zip")),
        };
        assert_eq!(
            format_export_summary(&summary),
            vec![
                "Exported 3 photos (1 via fallback encoder)",
                "    Archive: out/output_1080_1.zip",
            ]
        );
    }

    // =========================================================================
    // Status
    // =========================================================================

    #[test]
    fn format_loaded_with_and_without_skips() {
        assert_eq!(
            format_status(&Status::PhotosLoaded {
                count: 2,
                skipped: 0
            }),
            vec!["Loaded 2 photos"]
        );
        assert_eq!(
            format_status(&Status::PhotosLoaded {
                count: 1,
                skipped: 2
            }),
            vec!["Loaded 1 photo (2 skipped)"]
        );
    }

    #[test]
    fn format_missing_default_overlay() {
        let lines = format_status(&Status::DefaultOverlayMissing {
            slot: OverlaySlot::Footer,
            path: PathBuf::from("assets/footer001.png"),
            reason: "not found".into(),
        });
        assert_eq!(lines[0], "Default footer unavailable: assets/footer001.png");
        assert_eq!(lines[2], "    Continuing without a footer");
    }

    // =========================================================================
    // Overlay / analyze / edit
    // =========================================================================

    #[test]
    fn format_overlay_none_and_some() {
        assert_eq!(format_overlay(OverlaySlot::Header, None), vec!["header: none"]);
        let overlay = Overlay {
            slot: OverlaySlot::Header,
            bitmap: solid(540, 50, [0, 0, 0, 255]),
            source: OverlaySource::Stored,
        };
        let lines = format_overlay(OverlaySlot::Header, Some(&overlay));
        assert_eq!(lines[0], "header: 540x50 (stored)");
        assert_eq!(lines[1], "    On canvas: 1080x100 (aspect 10.800)");
    }

    #[test]
    fn format_geometry_lists_bands() {
        let geometry = OutputGeometry::compute(1080, Some((1080, 100)), None);
        assert_eq!(
            format_geometry(&geometry),
            vec!["Canvas: 1080x1080", "    Header 100 / photo area 980 / footer 0"]
        );
    }

    #[test]
    fn format_analysis_shows_suggestion() {
        let photo = photo_at("dark.jpg", 0, solid(10, 10, [20, 20, 20, 255]));
        let stats = LuminanceStats::from_bitmap(&photo.bitmap);
        let adjustment = ExposureAdjustment {
            brightness: 50,
            shadows: 65,
        };
        let lines = format_analysis(&photo, &stats, &adjustment);
        assert_eq!(lines[0], "001 dark.jpg");
        assert_eq!(lines[3], "    Suggested: brightness +50, shadows 65");
    }

    #[test]
    fn format_edit_shows_light_only_when_set() {
        let photo = photo_at("a.jpg", 1, gradient(4, 4));
        let plain = EditRecord::default_for(1.35);
        let lines = format_edit(&photo, &plain);
        assert_eq!(lines[0], "002 a.jpg (default)");
        assert_eq!(lines.len(), 4);

        let lit = plain.with_shadows(35).rotated(-90).committed();
        let lines = format_edit(&photo, &lit);
        assert_eq!(lines[0], "002 a.jpg (saved)");
        assert_eq!(lines[3], "    Rotation: 270°");
        assert_eq!(lines[4], "    Light: brightness 0, shadows 35");
    }
}
