//! TTF font loading, measurement and line rasterization.
//!
//! Renders text to an anti-aliased f32 coverage buffer using ab_glyph. When
//! no font file is available the same API falls back to fixed-advance
//! metrics and block glyphs, so layout and export keep working on machines
//! without fonts.

use ab_glyph::{Font, FontArc, ScaleFont};
use std::path::Path;
use tracing::{info, warn};

use crate::config::discover_font;
use crate::error::KvError;

use super::TextMeasure;

/// Line height multiplier applied to the font size.
pub const LINE_HEIGHT: f32 = 1.16;

/// Advance of a fallback glyph as a fraction of the font size.
const FALLBACK_ADVANCE: f32 = 0.6;

/// Rasterized text line as a coverage buffer.
pub struct LineRender {
    pub width: usize,
    pub height: usize,
    /// Coverage values: 0.0 = empty, 1.0 = fully inked.
    pub data: Vec<f32>,
}

/// The typeface used for every text element.
///
/// Font families stored on elements are kept for round-tripping, but the
/// rasterizer draws everything with this one face.
#[derive(Clone)]
pub struct Fonts {
    face: Option<FontArc>,
}

impl Fonts {
    /// Load the configured font, or the first system candidate.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = discover_font(path) else {
            warn!("no font file found, using fallback glyph metrics");
            return Self::fallback();
        };
        match std::fs::read(&path)
            .map_err(KvError::from)
            .and_then(Self::from_bytes)
        {
            Ok(fonts) => {
                info!(path = %path.display(), "loaded font");
                fonts
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "font failed to load, using fallback glyph metrics");
                Self::fallback()
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KvError> {
        let face = FontArc::try_from_vec(bytes)
            .map_err(|e| KvError::Input(format!("Invalid font data: {}", e)))?;
        Ok(Self { face: Some(face) })
    }

    /// Fixed-advance metrics, block glyphs.
    pub fn fallback() -> Self {
        Self { face: None }
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    /// Rasterize a single line at `pixel_height`.
    pub fn render_line(&self, text: &str, pixel_height: f32) -> LineRender {
        let width = self.line_width(text, pixel_height).ceil().max(1.0) as usize;
        let height = self.line_height(pixel_height).ceil().max(1.0) as usize;
        let mut data = vec![0.0f32; width * height];

        let Some(font) = &self.face else {
            // Block glyphs: one filled box per visible character
            let advance = pixel_height * FALLBACK_ADVANCE;
            let top = (height as f32 * 0.2) as usize;
            let bottom = (height as f32 * 0.8) as usize;
            for (i, ch) in text.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let x0 = (i as f32 * advance + advance * 0.1) as usize;
                let x1 = ((i as f32 + 1.0) * advance - advance * 0.1) as usize;
                for y in top..bottom.min(height) {
                    for x in x0..x1.min(width) {
                        data[y * width + x] = 1.0;
                    }
                }
            }
            return LineRender {
                width,
                height,
                data,
            };
        };

        let scaled = font.as_scaled(pixel_height);
        // Center the glyph box vertically inside the line box
        let glyph_box = scaled.ascent() - scaled.descent();
        let baseline_y = (height as f32 - glyph_box) / 2.0 + scaled.ascent();

        let mut caret_x = 0.0f32;
        let mut previous = None;
        for ch in text.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev) = previous {
                caret_x += scaled.kern(prev, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(
                pixel_height,
                ab_glyph::point(caret_x, baseline_y),
            );
            caret_x += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);

            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;
                    if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                        let idx = y as usize * width + x as usize;
                        data[idx] = (data[idx] + coverage).min(1.0);
                    }
                });
            }
        }

        LineRender {
            width,
            height,
            data,
        }
    }
}

impl TextMeasure for Fonts {
    fn line_width(&self, text: &str, font_size: f32) -> f32 {
        match &self.face {
            Some(font) => {
                let scaled = font.as_scaled(font_size);
                let mut width = 0.0f32;
                let mut previous = None;
                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(prev) = previous {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    previous = Some(id);
                }
                width
            }
            None => text.chars().count() as f32 * font_size * FALLBACK_ADVANCE,
        }
    }

    fn line_height(&self, font_size: f32) -> f32 {
        font_size * LINE_HEIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_metrics() {
        let fonts = Fonts::fallback();
        assert!(!fonts.has_face());
        assert!((fonts.line_width("ABCD", 10.0) - 24.0).abs() < 1e-6);
        assert!((fonts.line_height(10.0) - 11.6).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_render_has_ink() {
        let line = Fonts::fallback().render_line("Hi there", 24.0);
        assert!(line.width > 0);
        assert_eq!(line.data.len(), line.width * line.height);
        assert!(line.data.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_invalid_font_bytes() {
        assert!(Fonts::from_bytes(vec![0, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_missing_font_path_falls_back() {
        let fonts = Fonts::load(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!fonts.has_face());
    }
}
