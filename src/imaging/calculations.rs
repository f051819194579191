//! Pure calculation functions for output geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Coordinates are in output pixels; the output width is the fixed
//! [`OUTPUT_WIDTH`].

/// Every rendered output is exactly this many pixels wide.
pub const OUTPUT_WIDTH: u32 = 1080;

/// The photo area between header and footer never shrinks below this height.
pub const MIN_PHOTO_AREA_HEIGHT: u32 = 80;

/// A placed rectangle plus the scale that produced it.
///
/// `x`/`y` are relative to the destination rectangle's origin and may be
/// negative when the placement overflows the destination (cover fit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub scale: f64,
}

fn centered(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64, scale: f64) -> FitRect {
    let w = src_w * scale;
    let h = src_h * scale;
    FitRect {
        x: (dst_w - w) / 2.0,
        y: (dst_h - h) / 2.0,
        w,
        h,
        scale,
    }
}

/// Scale-to-fill placement: the result covers the destination on both axes
/// and overflows it on at most one, centered.
///
/// Source dimensions must be positive.
///
/// # Examples
/// ```
/// # use bannerframe::imaging::fit_cover;
/// let fit = fit_cover(800.0, 600.0, 1080.0, 1080.0);
/// assert_eq!(fit.scale, 1.8);
/// assert_eq!((fit.w, fit.h), (1440.0, 1080.0));
/// assert_eq!((fit.x, fit.y), (-180.0, 0.0));
/// ```
pub fn fit_cover(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> FitRect {
    let scale = (dst_w / src_w).max(dst_h / src_h);
    centered(src_w, src_h, dst_w, dst_h, scale)
}

/// Scale-to-fit placement: the whole source is visible inside the
/// destination, centered, possibly leaving bands on one axis.
///
/// Source dimensions must be positive.
pub fn fit_contain(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> FitRect {
    let scale = (dst_w / src_w).min(dst_h / src_h);
    centered(src_w, src_h, dst_w, dst_h, scale)
}

/// Height of a banner once scaled to the fixed output width.
///
/// # Examples
/// ```
/// # use bannerframe::imaging::overlay_height;
/// // A 2160x200 banner is drawn at 1080x100
/// assert_eq!(overlay_height(2160, 200), 100);
/// ```
pub fn overlay_height(width: u32, height: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    (height as f64 * (OUTPUT_WIDTH as f64 / width as f64)).round() as u32
}

/// Derived layout of one output image: header, photo area, footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    /// Total output height (may exceed the requested height, see [`Self::compute`]).
    pub canvas_height: u32,
    pub header_height: u32,
    pub footer_height: u32,
    pub photo_area_height: u32,
}

impl OutputGeometry {
    /// Lay out an output of `target_height` with optional header/footer
    /// banners given by their intrinsic `(width, height)`.
    ///
    /// When the banners would leave less than [`MIN_PHOTO_AREA_HEIGHT`] for
    /// the photo, the photo area is floored and the canvas grows instead.
    pub fn compute(
        target_height: u32,
        header: Option<(u32, u32)>,
        footer: Option<(u32, u32)>,
    ) -> Self {
        let header_height = header.map(|(w, h)| overlay_height(w, h)).unwrap_or(0);
        let footer_height = footer.map(|(w, h)| overlay_height(w, h)).unwrap_or(0);

        let banners = header_height.saturating_add(footer_height);
        let mut canvas_height = target_height;
        let mut photo_area_height = target_height.saturating_sub(banners);

        if photo_area_height < MIN_PHOTO_AREA_HEIGHT {
            photo_area_height = MIN_PHOTO_AREA_HEIGHT;
            canvas_height = banners.saturating_add(photo_area_height);
        }

        Self {
            canvas_height,
            header_height,
            footer_height,
            photo_area_height,
        }
    }

    pub fn width(&self) -> u32 {
        OUTPUT_WIDTH
    }

    /// Top edge of the photo area.
    pub fn photo_area_top(&self) -> u32 {
        self.header_height
    }

    /// Top edge of the footer.
    pub fn footer_top(&self) -> u32 {
        self.header_height.saturating_add(self.photo_area_height)
    }

    /// Scale that fits a photo of the given size inside the photo area at
    /// zoom 1.
    pub fn base_scale(&self, photo_w: u32, photo_h: u32) -> f64 {
        let area_h = self.photo_area_height.max(MIN_PHOTO_AREA_HEIGHT) as f64;
        (OUTPUT_WIDTH as f64 / photo_w as f64).min(area_h / photo_h as f64)
    }
}
