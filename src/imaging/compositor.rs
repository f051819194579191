//! The compositor: header + edited photo area + footer → one output bitmap.
//!
//! Rendering is a pure function of the photo, the banners, the edit record
//! and the [`RenderOptions`]. The only state it touches is the
//! [`ShadowCache`], which memoizes shadow-lifted proxies and never changes
//! what gets drawn.
//!
//! ## Pipeline
//!
//! ```text
//! 1. geometry     header/footer heights from their aspect at 1080 wide
//! 2. base         opaque white (JPEG) or transparent (PNG)
//! 3. header       scaled to 1080 x header_height at the top
//! 4. photo area   a) blur fill: cover-fit, blurred, 95% opacity, 18% black wash
//!                 b) photo: baseScale·zoom, rotation, offset, clipped to the area,
//!                    shadow-lifted proxy and brightness multiplier when set
//! 5. footer       scaled to 1080 x footer_height at the bottom
//! ```
//!
//! The photo area is rendered into its own layer and then composited, so
//! nothing drawn for the photo can escape the area.

use super::calculations::{OUTPUT_WIDTH, OutputGeometry, fit_contain, fit_cover};
use super::params::{BlurMethod, Placement, RenderOptions};
use super::tone::{ShadowCache, ShadowKey};
use crate::edits::{EditRecord, MIN_RENDER_ZOOM};
use crate::types::Photo;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::borrow::Cow;

/// Fraction of the photo area's linear size used by the resample blur.
const RESAMPLE_BLUR_SCALE: f64 = 0.12;

/// Gaussian sigma for [`BlurMethod::Gaussian`].
const GAUSSIAN_BLUR_SIGMA: f32 = 22.0;

const BLUR_OPACITY: f32 = 0.95;
const WASH_OPACITY: f32 = 0.18;

/// Editor frame around the photo area.
const FRAME_COLOR: [u8; 4] = [37, 99, 235, 255];
const FRAME_OPACITY: f32 = 0.9;
const FRAME_WIDTH: u32 = 6;

/// Renders outputs for one session state: options, banners and cache.
///
/// Cheap to construct; the session builds one per render call.
pub struct Compositor<'a> {
    pub options: RenderOptions,
    pub header: Option<&'a RgbaImage>,
    pub footer: Option<&'a RgbaImage>,
    pub cache: &'a ShadowCache,
    /// Photo-set generation, part of every shadow cache key.
    pub generation: u64,
}

impl Compositor<'_> {
    pub fn geometry(&self) -> OutputGeometry {
        OutputGeometry::compute(
            self.options.target_height,
            self.header.map(|h| h.dimensions()),
            self.footer.map(|f| f.dimensions()),
        )
    }

    /// Render the final output for `photo` with `edit` applied.
    pub fn render(&self, photo: &Photo, edit: &EditRecord) -> RgbaImage {
        let geometry = self.geometry();
        let base = if self.options.format.has_alpha() {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 255, 255, 255])
        };
        let mut canvas = RgbaImage::from_pixel(OUTPUT_WIDTH, geometry.canvas_height, base);

        if let Some(header) = self.header
            && geometry.header_height > 0
        {
            blit_banner(&mut canvas, header, 0, geometry.header_height);
        }

        let area = self.render_photo_area(photo, edit, &geometry);
        composite_over(&mut canvas, &area, 0, geometry.photo_area_top() as i64, 1.0);

        if let Some(footer) = self.footer
            && geometry.footer_height > 0
        {
            blit_banner(
                &mut canvas,
                footer,
                geometry.footer_top(),
                geometry.footer_height,
            );
        }

        canvas
    }

    /// Render the editor view: the output plus a frame marking the photo area.
    pub fn render_editor(&self, photo: &Photo, edit: &EditRecord) -> RgbaImage {
        let mut canvas = self.render(photo, edit);
        let geometry = self.geometry();
        draw_frame(
            &mut canvas,
            geometry.photo_area_top(),
            geometry.photo_area_height,
        );
        canvas
    }

    fn render_photo_area(
        &self,
        photo: &Photo,
        edit: &EditRecord,
        geometry: &OutputGeometry,
    ) -> RgbaImage {
        let area_w = OUTPUT_WIDTH;
        let area_h = geometry.photo_area_height;
        let mut layer = RgbaImage::new(area_w, area_h);

        if self.options.placement == Placement::Contain {
            draw_contained(&mut layer, &photo.bitmap);
            return layer;
        }

        if self.options.blur_fill {
            let blurred = blur_fill(&photo.bitmap, area_w, area_h, self.options.blur);
            composite_over(&mut layer, &blurred, 0, 0, BLUR_OPACITY);
            wash(&mut layer, WASH_OPACITY);
        }

        let lifted = u8::try_from(edit.shadows().clamp(0, 100))
            .ok()
            .and_then(|amount| {
                self.cache.get_or_lift(
                    ShadowKey {
                        generation: self.generation,
                        photo: photo.id.clone(),
                        amount,
                    },
                    &photo.bitmap,
                )
            });
        let source: &RgbaImage = lifted.as_deref().unwrap_or(&photo.bitmap);

        let base_scale = if edit.base_scale().is_finite() && edit.base_scale() > 0.0 {
            edit.base_scale()
        } else {
            geometry.base_scale(photo.width(), photo.height())
        };
        let zoom = if edit.zoom().is_finite() {
            edit.zoom().max(MIN_RENDER_ZOOM)
        } else {
            1.0
        };
        // The shadow proxy may be smaller than the photo; keep the on-canvas size
        let proxy_ratio = photo.width() as f64 / source.width() as f64;

        let transform = Transform {
            center_x: area_w as f64 / 2.0 + edit.offset_x(),
            center_y: area_h as f64 / 2.0 + edit.offset_y(),
            scale: base_scale * zoom * proxy_ratio,
            radians: (edit.rotation_deg() as f64).to_radians(),
        };
        let brightness = (edit.brightness() != 0).then(|| brightness_multiplier(edit.brightness()));

        draw_transformed(&mut layer, source, transform, brightness);
        layer
    }
}

/// Map brightness `-50..=50` linearly onto a multiplier in `0.7..=1.3`.
pub fn brightness_multiplier(brightness: i32) -> f32 {
    1.0 + (brightness.clamp(-50, 50) as f32 / 50.0) * 0.30
}

/// Scale a banner to the full output width and draw it at `top`.
fn blit_banner(canvas: &mut RgbaImage, banner: &RgbaImage, top: u32, height: u32) {
    let scaled = if banner.dimensions() == (OUTPUT_WIDTH, height) {
        Cow::Borrowed(banner)
    } else {
        Cow::Owned(imageops::resize(banner, OUTPUT_WIDTH, height, FilterType::Triangle))
    };
    composite_over(canvas, &scaled, 0, top as i64, 1.0);
}

/// Cover-fit the photo over the area and soften it.
fn blur_fill(photo: &RgbaImage, area_w: u32, area_h: u32, method: BlurMethod) -> RgbaImage {
    let fit = fit_cover(
        photo.width() as f64,
        photo.height() as f64,
        area_w as f64,
        area_h as f64,
    );
    let cover_w = (fit.w.round() as u32).max(1);
    let cover_h = (fit.h.round() as u32).max(1);
    let cover = imageops::resize(photo, cover_w, cover_h, FilterType::Triangle);

    let mut temp = RgbaImage::new(area_w, area_h);
    composite_over(&mut temp, &cover, fit.x.round() as i64, fit.y.round() as i64, 1.0);

    match method {
        BlurMethod::Resample => {
            let small_w = ((area_w as f64 * RESAMPLE_BLUR_SCALE).round() as u32).max(1);
            let small_h = ((area_h as f64 * RESAMPLE_BLUR_SCALE).round() as u32).max(1);
            for _ in 0..2 {
                let small = imageops::resize(&temp, small_w, small_h, FilterType::Triangle);
                temp = imageops::resize(&small, area_w, area_h, FilterType::Triangle);
            }
            temp
        }
        BlurMethod::Gaussian => imageops::blur(&temp, GAUSSIAN_BLUR_SIGMA),
    }
}

/// Legacy placement: the whole photo, centered, no crop.
fn draw_contained(layer: &mut RgbaImage, photo: &RgbaImage) {
    let fit = fit_contain(
        photo.width() as f64,
        photo.height() as f64,
        layer.width() as f64,
        layer.height() as f64,
    );
    let w = (fit.w.round() as u32).max(1);
    let h = (fit.h.round() as u32).max(1);
    let scaled = imageops::resize(photo, w, h, FilterType::Triangle);
    composite_over(layer, &scaled, fit.x.round() as i64, fit.y.round() as i64, 1.0);
}

/// Flat translucent black over the whole layer.
fn wash(layer: &mut RgbaImage, opacity: f32) {
    for pixel in layer.pixels_mut() {
        blend_pixel(pixel, [0.0, 0.0, 0.0, 255.0], opacity);
    }
}

fn draw_frame(canvas: &mut RgbaImage, top: u32, height: u32) {
    let (w, h) = canvas.dimensions();
    let bottom = (top + height).min(h);
    let color = FRAME_COLOR.map(f32::from);
    for y in top..bottom {
        let in_band_y = y < top + FRAME_WIDTH || y + FRAME_WIDTH >= bottom;
        for x in 0..w {
            if in_band_y || x < FRAME_WIDTH || x + FRAME_WIDTH >= w {
                blend_pixel(canvas.get_pixel_mut(x, y), color, FRAME_OPACITY);
            }
        }
    }
}

/// Placement of the photo's center in layer coordinates.
#[derive(Debug, Clone, Copy)]
struct Transform {
    center_x: f64,
    center_y: f64,
    scale: f64,
    radians: f64,
}

/// Draw `src` through `transform`, clipped to the layer.
///
/// Works backwards from each destination pixel to a bilinear sample in the
/// source. Heavy downscales are pre-resized first so they don't alias.
fn draw_transformed(
    layer: &mut RgbaImage,
    src: &RgbaImage,
    mut transform: Transform,
    brightness: Option<f32>,
) {
    if !(transform.scale.is_finite() && transform.scale > 0.0) {
        return;
    }

    let src: Cow<'_, RgbaImage> = if transform.scale < 1.0 {
        let w = ((src.width() as f64 * transform.scale).round() as u32).max(1);
        let h = ((src.height() as f64 * transform.scale).round() as u32).max(1);
        transform.scale *= src.width() as f64 / w as f64;
        Cow::Owned(imageops::resize(src, w, h, FilterType::Triangle))
    } else {
        Cow::Borrowed(src)
    };

    let (sw, sh) = (src.width() as f64, src.height() as f64);
    let (cos, sin) = (transform.radians.cos(), transform.radians.sin());

    // Bounding box of the rotated, scaled source
    let half_w = sw * transform.scale / 2.0;
    let half_h = sh * transform.scale / 2.0;
    let extent_x = cos.abs() * half_w + sin.abs() * half_h;
    let extent_y = sin.abs() * half_w + cos.abs() * half_h;
    let (lw, lh) = (layer.width() as f64, layer.height() as f64);
    let x_start = (transform.center_x - extent_x).floor().clamp(0.0, lw) as u32;
    let x_end = (transform.center_x + extent_x).ceil().clamp(0.0, lw) as u32;
    let y_start = (transform.center_y - extent_y).floor().clamp(0.0, lh) as u32;
    let y_end = (transform.center_y + extent_y).ceil().clamp(0.0, lh) as u32;

    for y in y_start..y_end {
        let dy = y as f64 + 0.5 - transform.center_y;
        for x in x_start..x_end {
            let dx = x as f64 + 0.5 - transform.center_x;
            let sx = (dx * cos + dy * sin) / transform.scale + sw / 2.0;
            let sy = (-dx * sin + dy * cos) / transform.scale + sh / 2.0;
            if sx < 0.0 || sy < 0.0 || sx >= sw || sy >= sh {
                continue;
            }
            let mut sample = sample_bilinear(&src, sx, sy);
            if let Some(mul) = brightness {
                for c in &mut sample[..3] {
                    *c = (*c * mul).clamp(0.0, 255.0);
                }
            }
            blend_pixel(layer.get_pixel_mut(x, y), sample, 1.0);
        }
    }
}

/// Bilinear sample at continuous source coordinates (pixel centers at +0.5).
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> [f32; 4] {
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = (fx - x0) as f32;
    let ty = (fy - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let xs = [x0.clamp(0, max_x) as u32, (x0 + 1).clamp(0, max_x) as u32];
    let ys = [y0.clamp(0, max_y) as u32, (y0 + 1).clamp(0, max_y) as u32];

    let weights = [
        (xs[0], ys[0], (1.0 - tx) * (1.0 - ty)),
        (xs[1], ys[0], tx * (1.0 - ty)),
        (xs[0], ys[1], (1.0 - tx) * ty),
        (xs[1], ys[1], tx * ty),
    ];
    let mut out = [0.0f32; 4];
    for (px, py, w) in weights {
        let p = src.get_pixel(px, py).0;
        for i in 0..4 {
            out[i] += p[i] as f32 * w;
        }
    }
    out
}

/// Source-over one straight-alpha color onto a pixel.
fn blend_pixel(dst: &mut Rgba<u8>, src: [f32; 4], opacity: f32) {
    let sa = (src[3] / 255.0) * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        for i in 0..3 {
            dst.0[i] = src[i].round().clamp(0.0, 255.0) as u8;
        }
        dst.0[3] = 255;
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (src[i] * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        dst.0[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Source-over `top` onto `bottom` at `(x, y)`, clipped to `bottom`.
fn composite_over(bottom: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (bw, bh) = (bottom.width() as i64, bottom.height() as i64);
    for (tx, ty, pixel) in top.enumerate_pixels() {
        let bx = x + tx as i64;
        let by = y + ty as i64;
        if bx < 0 || by < 0 || bx >= bw || by >= bh {
            continue;
        }
        blend_pixel(
            bottom.get_pixel_mut(bx as u32, by as u32),
            pixel.0.map(f32::from),
            opacity,
        );
    }
}
