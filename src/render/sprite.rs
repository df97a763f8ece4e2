//! Per-element sprites.
//!
//! Every drawable element is first turned into an upright RGBA sprite at
//! (roughly) its final pixel size; the rasterizer then places the sprite
//! with the element's transform. Shadows are derived from a sprite's alpha.

use image::{Rgba, RgbaImage, imageops::FilterType};

use crate::scene::{GridCellElement, ImageElement, Shadow, TextAlign, TextElement, Transform};
use crate::text::{Fonts, TextMeasure};

use super::color::parse_color;

/// Largest sprite edge, in pixels. Larger scales are drawn upsampled.
const MAX_SPRITE_EDGE: f32 = 8192.0;

/// Largest glyph size rasterized directly. Bigger text is drawn upsampled.
const MAX_GLYPH_PX: f32 = 1024.0;

/// A sprite together with the transform that places it.
pub struct Placed {
    pub sprite: RgbaImage,
    pub transform: Transform,
}

/// Image bitmap resized to its on-canvas size.
pub fn image_sprite(img: &ImageElement) -> Option<Placed> {
    let bitmap = img.bitmap.as_ref()?;
    let t = img.transform;
    let (nw, nh) = (bitmap.width().max(1) as f32, bitmap.height().max(1) as f32);
    let tw = (nw * t.scale_x.abs()).round().clamp(1.0, MAX_SPRITE_EDGE);
    let th = (nh * t.scale_y.abs()).round().clamp(1.0, MAX_SPRITE_EDGE);

    let rgba = bitmap.to_rgba8();
    let mut sprite = if (tw as u32, th as u32) == (rgba.width(), rgba.height()) {
        rgba
    } else {
        image::imageops::resize(&rgba, tw as u32, th as u32, FilterType::Triangle)
    };

    if img.opacity < 1.0 {
        let opacity = img.opacity.clamp(0.0, 1.0);
        for p in sprite.pixels_mut() {
            p[3] = (p[3] as f32 * opacity).round() as u8;
        }
    }

    if let Some(color) = img.stroke.as_deref().and_then(parse_color)
        && img.stroke_width > 0.0
    {
        let border = (img.stroke_width * t.scale_x.abs()).round().max(1.0) as u32;
        let (w, h) = sprite.dimensions();
        for y in 0..h {
            for x in 0..w {
                if x < border || y < border || x + border >= w || y + border >= h {
                    blend_pixel(sprite.get_pixel_mut(x, y), color, 1.0);
                }
            }
        }
    }

    // Sizing already applied; keep the sprite scale at (±)1 for flips only
    let transform = Transform {
        scale_x: (nw * t.scale_x.abs() / tw).max(f32::EPSILON),
        scale_y: (nh * t.scale_y.abs() / th).max(f32::EPSILON),
        ..t
    };
    Some(Placed { sprite, transform })
}

/// Text block rendered at its effective pixel size.
pub fn text_sprite(fonts: &Fonts, text: &TextElement) -> Option<Placed> {
    let t = text.transform;
    let s = t.scale_y.abs();
    let wanted = text.font_size * s;
    if s <= f32::EPSILON || !wanted.is_finite() || wanted <= 0.0 {
        return None;
    }
    let px = wanted.min(MAX_GLYPH_PX);
    let upsample = wanted / px;
    let stroke_px = text.stroke_width * s / upsample;
    let pad = stroke_px.ceil() as usize + 1;

    let lines: Vec<_> = text
        .text
        .split('\n')
        .map(|line| fonts.render_line(line, px))
        .collect();
    let line_h = fonts.line_height(px).ceil() as usize;
    let content_w = lines.iter().map(|l| l.width).max().unwrap_or(1);
    let width = content_w + pad * 2;
    let height = line_h * lines.len() + pad * 2;

    let mut mask = vec![0.0f32; width * height];
    for (i, line) in lines.iter().enumerate() {
        let x0 = pad
            + match text.text_align {
                TextAlign::Left => 0,
                TextAlign::Center => (content_w - line.width) / 2,
                TextAlign::Right => content_w - line.width,
            };
        let y0 = pad + i * line_h;
        for y in 0..line.height.min(line_h) {
            for x in 0..line.width {
                let idx = (y0 + y) * width + x0 + x;
                mask[idx] = mask[idx].max(line.data[y * line.width + x]);
            }
        }
    }

    let mut sprite = RgbaImage::new(width as u32, height as u32);
    if let Some(stroke) = text.stroke.as_deref().and_then(parse_color)
        && stroke_px > 0.0
    {
        let radius = (stroke_px / 2.0).ceil().max(1.0) as usize;
        let outline = dilate(&mask, width, height, radius);
        paint_mask(&mut sprite, &outline, stroke);
    }
    if let Some(fill) = parse_color(&text.fill) {
        paint_mask(&mut sprite, &mask, fill);
    }

    let transform = Transform {
        scale_x: t.scale_x / s * upsample,
        scale_y: upsample,
        ..t
    };
    Some(Placed { sprite, transform })
}

/// Grid cell rectangle with fill and inner stroke.
pub fn cell_sprite(cell: &GridCellElement) -> Option<Placed> {
    let fill = parse_color(&cell.fill).filter(|c| c[3] > 0);
    let stroke = parse_color(&cell.stroke).filter(|c| c[3] > 0 && cell.stroke_width > 0.0);
    if fill.is_none() && stroke.is_none() {
        return None;
    }
    let w = cell.width.round().clamp(1.0, MAX_SPRITE_EDGE) as u32;
    let h = cell.height.round().clamp(1.0, MAX_SPRITE_EDGE) as u32;
    let border = cell.stroke_width.round().max(1.0) as u32;
    let sprite = RgbaImage::from_fn(w, h, |x, y| {
        let on_border = x < border || y < border || x + border >= w || y + border >= h;
        match (on_border, stroke, fill) {
            (true, Some(s), _) => s,
            (_, _, Some(f)) => f,
            _ => Rgba([0, 0, 0, 0]),
        }
    });
    let transform = Transform {
        scale_x: cell.transform.scale_x * cell.width / w as f32,
        scale_y: cell.transform.scale_y * cell.height / h as f32,
        ..cell.transform
    };
    Some(Placed { sprite, transform })
}

/// Blurred, tinted copy of a sprite's alpha, padded by the blur radius.
pub fn shadow_sprite(sprite: &RgbaImage, shadow: &Shadow) -> Option<RgbaImage> {
    let color = parse_color(&shadow.color).filter(|c| c[3] > 0)?;
    let pad = shadow.blur.max(0.0).ceil() as usize;
    let (sw, sh) = (sprite.width() as usize, sprite.height() as usize);
    let (w, h) = (sw + pad * 2, sh + pad * 2);

    let mut alpha = vec![0.0f32; w * h];
    for (x, y, p) in sprite.enumerate_pixels() {
        alpha[(y as usize + pad) * w + x as usize + pad] = p[3] as f32 / 255.0;
    }
    let radius = (shadow.blur / 2.0).round() as usize;
    if radius > 0 {
        // Two box passes approximate a gaussian
        for _ in 0..2 {
            alpha = box_blur(&alpha, w, h, radius);
        }
    }

    let mut out = RgbaImage::new(w as u32, h as u32);
    paint_mask(&mut out, &alpha, color);
    Some(out)
}

/// Source-over blend of `color` at `coverage` onto a straight-alpha pixel.
pub fn blend_pixel(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let sa = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let v = (color[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn paint_mask(target: &mut RgbaImage, mask: &[f32], color: Rgba<u8>) {
    let width = target.width() as usize;
    for (x, y, p) in target.enumerate_pixels_mut() {
        let coverage = mask[y as usize * width + x as usize];
        if coverage > 0.0 {
            blend_pixel(p, color, coverage);
        }
    }
}

/// Max filter over a square neighbourhood.
fn dilate(mask: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let mut horizontal = vec![0.0f32; mask.len()];
    for y in 0..height {
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            let row = &mask[y * width..(y + 1) * width];
            horizontal[y * width + x] = row[lo..=hi].iter().copied().fold(0.0, f32::max);
        }
    }
    let mut out = vec![0.0f32; mask.len()];
    for y in 0..height {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(height - 1);
        for x in 0..width {
            out[y * width + x] = (lo..=hi)
                .map(|yy| horizontal[yy * width + x])
                .fold(0.0, f32::max);
        }
    }
    out
}

/// Separable box blur with clamped edges.
fn box_blur(src: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let norm = 1.0 / (radius * 2 + 1) as f32;
    let mut tmp = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for k in 0..=radius * 2 {
                let xx = (x + k).saturating_sub(radius).min(width - 1);
                sum += src[y * width + xx];
            }
            tmp[y * width + x] = sum * norm;
        }
    }
    let mut out = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for k in 0..=radius * 2 {
                let yy = (y + k).saturating_sub(radius).min(height - 1);
                sum += tmp[yy * width + x];
            }
            out[y * width + x] = sum * norm;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::CellId;

    #[test]
    fn test_blend_opaque_over_transparent() {
        let mut p = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut p, Rgba([255, 0, 0, 255]), 1.0);
        assert_eq!(p, Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_blend_half_over_white() {
        let mut p = Rgba([255, 255, 255, 255]);
        blend_pixel(&mut p, Rgba([0, 0, 0, 255]), 0.5);
        assert_eq!(p[3], 255);
        assert!((p[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_transparent_cell_has_no_sprite() {
        let cell = GridCellElement {
            id: CellId::new(),
            row: 0,
            col: 0,
            transform: Transform::at(50.0, 50.0),
            width: 100.0,
            height: 100.0,
            fill: "transparent".to_string(),
            stroke: "transparent".to_string(),
            stroke_width: 2.0,
            product: None,
        };
        assert!(cell_sprite(&cell).is_none());
    }

    #[test]
    fn test_huge_font_is_rasterized_at_capped_size() {
        let fonts = Fonts::fallback();
        let mut text = TextElement::new("50% OFF");
        text.font_size = 1.0e7;
        let placed = text_sprite(&fonts, &text).unwrap();
        assert!(placed.sprite.height() as f32 <= MAX_SPRITE_EDGE);
        assert!(placed.sprite.width() as f32 <= MAX_SPRITE_EDGE);
        assert!((placed.transform.scale_y - 1.0e7 / MAX_GLYPH_PX).abs() < 1.0);

        text.font_size = f32::INFINITY;
        assert!(text_sprite(&fonts, &text).is_none());
    }

    #[test]
    fn test_text_sprite_with_stroke_is_larger() {
        let fonts = Fonts::fallback();
        let plain = text_sprite(&fonts, &TextElement::new("SALE")).unwrap();
        let mut stroked = TextElement::new("SALE");
        stroked.stroke = Some("#000000".to_string());
        stroked.stroke_width = 6.0;
        let stroked = text_sprite(&fonts, &stroked).unwrap();
        assert!(stroked.sprite.width() > plain.sprite.width());
    }

    #[test]
    fn test_shadow_sprite_padding() {
        let sprite = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        let shadow = Shadow {
            color: "rgba(0,0,0,0.5)".to_string(),
            blur: 4.0,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        let out = shadow_sprite(&sprite, &shadow).unwrap();
        assert_eq!(out.dimensions(), (18, 18));
        assert!(shadow_sprite(&sprite, &Shadow::default()).is_none());
    }
}
