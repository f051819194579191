//! Tone adjustments: shadow lift and auto-exposure analysis.
//!
//! Both operate on downsampled working copies. Shadow lift is a "feel"
//! adjustment applied to a proxy at most [`SHADOW_PROXY_MAX_WIDTH`] wide;
//! exposure analysis only needs a [`ANALYSIS_WIDTH`]-pixel thumbnail.
//!
//! Lifting shadows is the most expensive thing a preview redraw does, so
//! results are memoized in a [`ShadowCache`] keyed by photo-set generation,
//! photo id and amount. The session clears it whenever the photo set is
//! replaced.

use crate::types::PhotoId;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shadow-lift proxies are never wider than this.
pub const SHADOW_PROXY_MAX_WIDTH: u32 = 1600;

/// Exposure analysis runs on a thumbnail this wide.
pub const ANALYSIS_WIDTH: u32 = 240;

/// Mean luminance auto-exposure aims for.
const TARGET_MEAN: f64 = 140.0;

/// Luminance above which pixels get no lift at all.
const SHADOW_KNEE: f32 = 170.0;

/// Maximum lift (in 8-bit levels) for a black pixel at amount 100.
const MAX_LIFT: f32 = 110.0;

/// Rec. 709 luma of an 8-bit RGB triple.
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
}

/// Resize to `width` keeping the aspect ratio (height at least 1).
fn downsample_to_width(bitmap: &RgbaImage, width: u32) -> RgbaImage {
    let height = ((bitmap.height() as f64 * width as f64 / bitmap.width() as f64).round() as u32).max(1);
    imageops::resize(bitmap, width, height, FilterType::Triangle)
}

/// Brighten dark pixels in proportion to their darkness.
///
/// Returns `None` when `amount` is zero, meaning "draw the original".
/// Otherwise returns a proxy (downsampled to at most
/// [`SHADOW_PROXY_MAX_WIDTH`] wide) where every pixel with luminance `L`
/// gets `t² · amount/100 · 110` added to each channel, with
/// `t = 1 − min(1, L/170)`. Alpha is untouched.
pub fn apply_shadow_lift(bitmap: &RgbaImage, amount: u8) -> Option<RgbaImage> {
    if amount == 0 {
        return None;
    }
    let strength = (amount.min(100) as f32) / 100.0;

    let mut proxy = if bitmap.width() > SHADOW_PROXY_MAX_WIDTH {
        downsample_to_width(bitmap, SHADOW_PROXY_MAX_WIDTH)
    } else {
        bitmap.clone()
    };

    for pixel in proxy.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let t = 1.0 - (luminance(r, g, b) / SHADOW_KNEE).min(1.0);
        let lift = t * t * strength * MAX_LIFT;
        for channel in &mut pixel.0[..3] {
            *channel = (*channel as f32 + lift).round().clamp(0.0, 255.0) as u8;
        }
    }

    Some(proxy)
}

/// Brightness/shadow values suggested by [`analyze_exposure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureAdjustment {
    /// In `-50..=50`.
    pub brightness: i32,
    /// In `0..=100`.
    pub shadows: i32,
}

/// Luminance statistics of a downsampled photo.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceStats {
    pub histogram: [u32; 256],
    pub count: u64,
    pub mean: f64,
}

impl LuminanceStats {
    pub fn from_bitmap(bitmap: &RgbaImage) -> Self {
        let mut histogram = [0u32; 256];
        let mut sum = 0u64;
        let mut count = 0u64;
        for pixel in bitmap.pixels() {
            let [r, g, b, _] = pixel.0;
            let lum = luminance(r, g, b).round().clamp(0.0, 255.0) as usize;
            histogram[lum] += 1;
            sum += lum as u64;
            count += 1;
        }
        let mean = sum as f64 / count.max(1) as f64;
        Self {
            histogram,
            count,
            mean,
        }
    }

    /// First luminance bin whose cumulative count reaches `q · count`
    /// (255 if it is never reached).
    pub fn percentile(&self, q: f64) -> u8 {
        let target = self.count as f64 * q;
        let mut acc = 0u64;
        for (bin, &n) in self.histogram.iter().enumerate() {
            acc += n as u64;
            if acc as f64 >= target {
                return bin as u8;
            }
        }
        255
    }
}

/// Luminance statistics of the analysis thumbnail.
pub fn exposure_stats(bitmap: &RgbaImage) -> LuminanceStats {
    LuminanceStats::from_bitmap(&downsample_to_width(bitmap, ANALYSIS_WIDTH))
}

/// Suggest brightness and shadow values from the photo's histogram.
///
/// Brightness moves the mean luminance toward 140 (±50 covers about
/// ±0.68 stops); shadows are chosen from the 5th percentile; highlights
/// near clipping pull brightness back down.
pub fn analyze_exposure(bitmap: &RgbaImage) -> ExposureAdjustment {
    let stats = exposure_stats(bitmap);
    let p05 = stats.percentile(0.05);
    let p95 = stats.percentile(0.95);

    let ratio = TARGET_MEAN / stats.mean.max(1.0);
    let stops = ratio.log2();
    let mut brightness = ((stops / 0.68) * 50.0).round() as i32;
    brightness = brightness.clamp(-50, 50);

    let shadows = match p05 {
        0..35 => 65,
        35..55 => 45,
        55..70 => 25,
        _ => 10,
    };

    // Both checks apply in sequence
    if p95 > 240 {
        brightness = (brightness - 15).max(-30);
    }
    if p95 > 250 {
        brightness = (brightness - 22).max(-40);
    }

    tracing::debug!(
        mean = stats.mean,
        p05,
        p95,
        brightness,
        shadows,
        "exposure analysis"
    );

    ExposureAdjustment {
        brightness,
        shadows,
    }
}

/// Cache key for a shadow-lifted proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShadowKey {
    pub generation: u64,
    pub photo: PhotoId,
    pub amount: u8,
}

/// Memo table of shadow-lifted proxies.
///
/// Uses a Mutex (not RefCell) so the session stays `Sync` and renders can
/// borrow it immutably.
#[derive(Debug, Default)]
pub struct ShadowCache {
    entries: Mutex<HashMap<ShadowKey, Arc<RgbaImage>>>,
}

impl ShadowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached proxy for `key`, computing it on a miss.
    ///
    /// Returns `None` for amount zero (nothing is cached).
    pub fn get_or_lift(&self, key: ShadowKey, bitmap: &RgbaImage) -> Option<Arc<RgbaImage>> {
        if key.amount == 0 {
            return None;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = entries.get(&key) {
            tracing::debug!(photo = %key.photo, amount = key.amount, "shadow cache hit");
            return Some(Arc::clone(hit));
        }
        tracing::debug!(photo = %key.photo, amount = key.amount, "shadow cache miss");
        let lifted = Arc::new(apply_shadow_lift(bitmap, key.amount)?);
        entries.insert(key, Arc::clone(&lifted));
        Some(lifted)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry (photo set replaced).
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
