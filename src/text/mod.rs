//! # Text Measurement and Wrapping
//!
//! Text layout needs one thing from the font: how wide a line is at a
//! given size. [`TextMeasure`] is that probe. [`Fonts`] implements it with a
//! real TTF face (or fixed-advance fallback metrics), and tests can plug in
//! any deterministic measurer.
//!
//! ```
//! use kvgen::text::{Fonts, wrap_text};
//!
//! let fonts = Fonts::fallback(); // 0.6 × size per character
//! let wrapped = wrap_text(&fonts, "ARROZ TIPO 1 PACOTE 5KG", 10.0, 80.0);
//! assert_eq!(wrapped, "ARROZ TIPO 1\nPACOTE 5KG");
//! ```

mod font;

pub use font::{Fonts, LINE_HEIGHT, LineRender};

/// Width probe used by layout and hit testing.
pub trait TextMeasure: Send + Sync {
    /// Rendered width of a single line at `font_size`.
    fn line_width(&self, text: &str, font_size: f32) -> f32;

    /// Height of one line at `font_size`.
    fn line_height(&self, font_size: f32) -> f32;
}

/// Size of a (possibly multi-line) text block.
pub fn measure_block(measure: &dyn TextMeasure, text: &str, font_size: f32) -> (f32, f32) {
    let mut width = 0.0f32;
    let mut lines = 0usize;
    for line in text.split('\n') {
        width = width.max(measure.line_width(line, font_size));
        lines += 1;
    }
    (width, lines as f32 * measure.line_height(font_size))
}

/// Greedy word wrap.
///
/// Words are taken in order and appended to the current line while the line
/// still fits `max_width`; a word that would overflow starts a new line. A
/// single word wider than `max_width` gets a line of its own. Existing line
/// breaks are treated as word separators, so wrapping already-wrapped text
/// at the same width yields the same lines.
pub fn wrap_text(measure: &dyn TextMeasure, text: &str, font_size: f32, max_width: f32) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.line_width(&candidate, font_size) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}
