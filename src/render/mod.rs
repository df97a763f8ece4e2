//! # Rasterizer
//!
//! Draws a [`Scene`] into an RGBA bitmap at the logical canvas size.
//!
//! Each element becomes an upright sprite (see [`sprite`]) which is then
//! placed with its center-origin transform by inverse mapping: every target
//! pixel inside the sprite's rotated bounds is mapped back into sprite space
//! and sampled bilinearly. Rows are processed in parallel with rayon.
//!
//! Draw order is background first, then nodes in z-order. Shadows are drawn
//! right before the element that casts them.

pub mod color;
pub mod sprite;

pub use color::parse_color;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::config::CanvasConfig;
use crate::scene::{Element, GuideLine, Node, Scene, Transform};
use crate::text::Fonts;

use sprite::{Placed, blend_pixel};

/// What to draw besides the elements themselves.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Draw dashed grid guides. Export always leaves them out.
    pub guides: bool,
    /// Canvas color under everything. `None` leaves the canvas transparent.
    pub background: Option<Rgba<u8>>,
}

impl RenderOptions {
    pub fn export() -> Self {
        Self::default()
    }

    pub fn preview() -> Self {
        Self {
            guides: true,
            background: None,
        }
    }
}

pub struct Rasterizer<'a> {
    fonts: &'a Fonts,
    canvas: &'a CanvasConfig,
}

impl<'a> Rasterizer<'a> {
    pub fn new(fonts: &'a Fonts, canvas: &'a CanvasConfig) -> Self {
        Self { fonts, canvas }
    }

    /// Render the full scene at the logical canvas size.
    pub fn render(&self, scene: &Scene, options: &RenderOptions) -> RgbaImage {
        let fill = options.background.unwrap_or(Rgba([0, 0, 0, 0]));
        let mut target = RgbaImage::from_pixel(self.canvas.width, self.canvas.height, fill);

        if let Some(background) = &scene.background {
            self.draw_node(&mut target, background, options);
        }
        for node in &scene.nodes {
            self.draw_node(&mut target, node, options);
        }
        target
    }

    fn draw_node(&self, target: &mut RgbaImage, node: &Node, options: &RenderOptions) {
        if !node.visible {
            return;
        }
        let (placed, shadow) = match &node.element {
            Element::Image(img) => (sprite::image_sprite(img), img.shadow.as_ref()),
            Element::Text(text) => (sprite::text_sprite(self.fonts, text), text.shadow.as_ref()),
            Element::GridCell(cell) => (sprite::cell_sprite(cell), None),
            Element::Guide(guide) => {
                if options.guides {
                    draw_guide(target, guide);
                }
                return;
            }
        };
        let Some(Placed { sprite, transform }) = placed else {
            return;
        };

        if let Some(shadow) = shadow
            && let Some(shade) = sprite::shadow_sprite(&sprite, shadow)
        {
            let offset = Transform {
                left: transform.left + shadow.offset_x,
                top: transform.top + shadow.offset_y,
                ..transform
            };
            draw_sprite(target, &shade, &offset);
        }
        draw_sprite(target, &sprite, &transform);
    }
}

/// Place `sprite` on `target` with its center at `(t.left, t.top)`.
pub fn draw_sprite(target: &mut RgbaImage, sprite: &RgbaImage, t: &Transform) {
    let (sw, sh) = (sprite.width() as f32, sprite.height() as f32);
    if sw == 0.0 || sh == 0.0 || t.scale_x == 0.0 || t.scale_y == 0.0 {
        return;
    }
    let (tw, th) = (target.width() as usize, target.height() as usize);
    let (sin, cos) = t.angle.to_radians().sin_cos();
    let (hw, hh) = (sw * t.scale_x.abs() / 2.0, sh * t.scale_y.abs() / 2.0);

    // Rotated bounds, clipped to the target
    let ext_x = (hw * cos).abs() + (hh * sin).abs();
    let ext_y = (hw * sin).abs() + (hh * cos).abs();
    let x0 = (t.left - ext_x).floor().max(0.0) as usize;
    let x1 = ((t.left + ext_x).ceil().max(0.0) as usize).min(tw);
    let y0 = (t.top - ext_y).floor().max(0.0) as usize;
    let y1 = ((t.top + ext_y).ceil().max(0.0) as usize).min(th);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let row_bytes = tw * 4;
    let raw: &mut [u8] = &mut **target;
    raw[y0 * row_bytes..y1 * row_bytes]
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(i, row)| {
            let py = (y0 + i) as f32 + 0.5 - t.top;
            for x in x0..x1 {
                let px = x as f32 + 0.5 - t.left;
                // Undo rotation, then scale, then flips
                let mut lx = (px * cos + py * sin) / t.scale_x;
                let mut ly = (-px * sin + py * cos) / t.scale_y;
                if t.flip_x {
                    lx = -lx;
                }
                if t.flip_y {
                    ly = -ly;
                }
                let u = lx + sw / 2.0;
                let v = ly + sh / 2.0;
                if u < 0.0 || v < 0.0 || u > sw || v > sh {
                    continue;
                }
                let sample = sample_bilinear(sprite, u - 0.5, v - 0.5);
                if sample[3] == 0 {
                    continue;
                }
                let px_slice = &mut row[x * 4..x * 4 + 4];
                let mut dst = Rgba([px_slice[0], px_slice[1], px_slice[2], px_slice[3]]);
                blend_pixel(&mut dst, Rgba([sample[0], sample[1], sample[2], 255]), sample[3] as f32 / 255.0);
                px_slice.copy_from_slice(&dst.0);
            }
        });
}

/// Bilinear sample with premultiplied interpolation. Outside pixels are transparent.
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let fx = x.floor();
    let fy = y.floor();
    let (ax, ay) = (x - fx, y - fy);
    let (ix, iy) = (fx as i64, fy as i64);

    let mut acc = [0.0f32; 4];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - ax) * (1.0 - ay)),
        (1, 0, ax * (1.0 - ay)),
        (0, 1, (1.0 - ax) * ay),
        (1, 1, ax * ay),
    ] {
        let (sx, sy) = (ix + dx, iy + dy);
        if weight == 0.0 || sx < 0 || sy < 0 || sx >= w || sy >= h {
            continue;
        }
        let p = img.get_pixel(sx as u32, sy as u32);
        let a = p[3] as f32 / 255.0 * weight;
        acc[0] += p[0] as f32 * a;
        acc[1] += p[1] as f32 * a;
        acc[2] += p[2] as f32 * a;
        acc[3] += a;
    }
    if acc[3] <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Dashed line stepped one pixel at a time.
fn draw_guide(target: &mut RgbaImage, guide: &GuideLine) {
    let Some(color) = parse_color(&guide.stroke) else {
        return;
    };
    let (dx, dy) = (guide.to.0 - guide.from.0, guide.to.1 - guide.from.1);
    let steps = dx.abs().max(dy.abs()).ceil() as usize;
    let period = (guide.dash[0] + guide.dash[1]).max(1.0);
    let half = (guide.stroke_width / 2.0).max(0.5);
    let (w, h) = (target.width() as f32, target.height() as f32);

    for i in 0..=steps {
        let along = i as f32;
        if along % period >= guide.dash[0] {
            continue;
        }
        let f = if steps == 0 { 0.0 } else { along / steps as f32 };
        let (cx, cy) = (guide.from.0 + dx * f, guide.from.1 + dy * f);
        let (xa, xb) = ((cx - half).floor().max(0.0), (cx + half).ceil().min(w));
        let (ya, yb) = ((cy - half).floor().max(0.0), (cy + half).ceil().min(h));
        for y in ya as u32..yb as u32 {
            for x in xa as u32..xb as u32 {
                blend_pixel(target.get_pixel_mut(x, y), color, 1.0);
            }
        }
    }
}
