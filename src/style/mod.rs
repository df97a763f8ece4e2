//! # Element Styling
//!
//! Applies and reads back the style controls of the editor panel: font
//! size, fill, stroke, stroke width, shadow and uniform scale.
//!
//! ## What each element accepts
//!
//! | Property | Text | Image | Grid cell | Guide |
//! |----------|------|-------|-----------|-------|
//! | `fontSize` | yes | - | - | - |
//! | `fill` | yes | - | yes | - |
//! | `stroke`, `strokeWidth` | yes | yes | yes | - |
//! | shadow fields | yes | yes | - | - |
//! | `scale` | yes | yes | - | - |
//!
//! Shadow controls edit one field of the panel state at a time, but the
//! element always receives the complete composed [`Shadow`], replacing the
//! previous one.

use serde::{Deserialize, Serialize};

use crate::scene::{Element, Shadow};

/// One edit from the style panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "camelCase")]
pub enum StyleProperty {
    FontSize(f32),
    Fill(String),
    Stroke(String),
    StrokeWidth(f32),
    ShadowColor(String),
    ShadowBlur(f32),
    ShadowOffsetX(f32),
    ShadowOffsetY(f32),
    /// Uniform scale applied to both axes.
    Scale(f32),
}

/// Style panel state, and the snapshot published when an element is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSnapshot {
    pub font_size: f32,
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f32,
    pub shadow: Shadow,
    pub scale: f32,
    /// Position new text elements are created at.
    pub left: f32,
    pub top: f32,
}

impl Default for StyleSnapshot {
    fn default() -> Self {
        Self {
            font_size: 42.0,
            fill: "#ffffff".to_string(),
            stroke: String::new(),
            stroke_width: 0.0,
            shadow: Shadow::default(),
            scale: 1.0,
            left: 540.0,
            top: 1536.0,
        }
    }
}

impl StyleSnapshot {
    /// Read the current style of an element, keeping panel values for
    /// properties the element does not have.
    pub fn of(element: &Element, base: &StyleSnapshot) -> Self {
        let mut snap = base.clone();
        if let Some(t) = element.transform() {
            snap.left = t.left;
            snap.top = t.top;
            snap.scale = t.scale_x;
        }
        match element {
            Element::Text(t) => {
                snap.font_size = t.font_size;
                snap.fill = t.fill.clone();
                snap.stroke = t.stroke.clone().unwrap_or_default();
                snap.stroke_width = t.stroke_width;
                snap.shadow = t.shadow.clone().unwrap_or_default();
            }
            Element::Image(i) => {
                snap.stroke = i.stroke.clone().unwrap_or_default();
                snap.stroke_width = i.stroke_width;
                snap.shadow = i.shadow.clone().unwrap_or_default();
            }
            Element::GridCell(c) => {
                snap.fill = c.fill.clone();
                snap.stroke = c.stroke.clone();
                snap.stroke_width = c.stroke_width;
            }
            Element::Guide(_) => {}
        }
        snap
    }

    /// Record a panel edit without touching any element.
    pub fn merge(&mut self, property: &StyleProperty) {
        match property {
            StyleProperty::FontSize(v) => self.font_size = *v,
            StyleProperty::Fill(c) => self.fill = c.clone(),
            StyleProperty::Stroke(c) => self.stroke = c.clone(),
            StyleProperty::StrokeWidth(w) => self.stroke_width = *w,
            StyleProperty::ShadowColor(c) => self.shadow.color = c.clone(),
            StyleProperty::ShadowBlur(b) => self.shadow.blur = *b,
            StyleProperty::ShadowOffsetX(x) => self.shadow.offset_x = *x,
            StyleProperty::ShadowOffsetY(y) => self.shadow.offset_y = *y,
            StyleProperty::Scale(s) => self.scale = *s,
        }
    }
}

/// Apply `property` to `element`, merging it into the panel `state` first.
///
/// Returns `false` when the property does not apply to this element kind
/// (the element is left untouched; the panel state still records the value).
pub fn apply_style(element: &mut Element, state: &mut StyleSnapshot, property: &StyleProperty) -> bool {
    state.merge(property);
    let shadow = || Some(state.shadow.clone());
    let stroke = || (!state.stroke.is_empty()).then(|| state.stroke.clone());

    match (element, property) {
        (Element::Text(t), StyleProperty::FontSize(v)) => t.font_size = *v,
        (Element::Text(t), StyleProperty::Fill(c)) => t.fill = c.clone(),
        (Element::Text(t), StyleProperty::Stroke(_)) => t.stroke = stroke(),
        (Element::Text(t), StyleProperty::StrokeWidth(w)) => t.stroke_width = *w,
        (Element::Text(t), p) if is_shadow(p) => t.shadow = shadow(),
        (Element::Text(t), StyleProperty::Scale(s)) => {
            t.transform.scale_x = *s;
            t.transform.scale_y = *s;
        }

        (Element::Image(i), StyleProperty::Stroke(_)) => i.stroke = stroke(),
        (Element::Image(i), StyleProperty::StrokeWidth(w)) => i.stroke_width = *w,
        (Element::Image(i), p) if is_shadow(p) => i.shadow = shadow(),
        (Element::Image(i), StyleProperty::Scale(s)) => {
            i.transform.scale_x = *s;
            i.transform.scale_y = *s;
            i.fit = None;
        }

        (Element::GridCell(c), StyleProperty::Fill(v)) => c.fill = v.clone(),
        (Element::GridCell(c), StyleProperty::Stroke(v)) => c.stroke = v.clone(),
        (Element::GridCell(c), StyleProperty::StrokeWidth(w)) => c.stroke_width = *w,

        _ => return false,
    }
    true
}

fn is_shadow(p: &StyleProperty) -> bool {
    matches!(
        p,
        StyleProperty::ShadowColor(_)
            | StyleProperty::ShadowBlur(_)
            | StyleProperty::ShadowOffsetX(_)
            | StyleProperty::ShadowOffsetY(_)
    )
}
