//! Persisted template types.
//!
//! The JSON layout matches what the browser editor stored under the
//! `kvTemplates` key: camelCase fields, one flat object per element with a
//! `type` discriminator. Readers must tolerate missing optional fields, so
//! every element field has a default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::scene::{
    CellId, CellProduct, Element, GridCellElement, ImageElement, Role, Shadow, TextAlign,
    TextElement, Transform,
};

pub const DEFAULT_TEMPLATE_NAME: &str = "Template sem nome";
pub const DEFAULT_TEMPLATE_DESCRIPTION: &str = "Sem descrição";

/// A saved KV: metadata plus its ordered element list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// `elements[0]` is the background when there is one.
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
}

impl Template {
    /// New template with a millisecond-timestamp id.
    pub fn new(name: &str, description: &str, elements: Vec<ElementRecord>) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            name: non_empty_or(name, DEFAULT_TEMPLATE_NAME),
            description: non_empty_or(description, DEFAULT_TEMPLATE_DESCRIPTION),
            created_at: now,
            last_updated: None,
            elements,
        }
    }

    pub fn background(&self) -> Option<&ElementRecord> {
        self.elements.iter().find(|e| e.is_background)
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// One serialized element.
///
/// `type` is one of `image`, `text` (also `i-text` / `textbox` from older
/// saves), `gridCell` (or a `rect` flagged `isGridCell`). Anything else, such
/// as guide `line`s, is ignored on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementRecord {
    #[serde(rename = "type")]
    pub kind: String,
    /// Role tag. Named `id` for compatibility with saved templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Role>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_background: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    pub left: f32,
    pub top: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub angle: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub opacity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(
        deserialize_with = "font_weight",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_weight: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    pub stroke_width: f32,
    #[serde(deserialize_with = "lenient_shadow", skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_id: Option<CellId>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_grid_cell: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<CellProduct>,
}

impl Default for ElementRecord {
    fn default() -> Self {
        Self {
            kind: String::new(),
            id: None,
            is_background: false,
            src: None,
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            flip_x: false,
            flip_y: false,
            opacity: 1.0,
            width: None,
            height: None,
            text: None,
            font_family: None,
            font_size: None,
            font_weight: None,
            fill: None,
            stroke: None,
            stroke_width: 0.0,
            shadow: None,
            text_align: None,
            cell_id: None,
            is_grid_cell: false,
            row: None,
            col: None,
            product: None,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Accepts `700`, `"700"`, `"bold"` and `"normal"`.
fn font_weight<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u16>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Weight {
        Number(f64),
        Text(String),
    }
    Ok(match Option::<Weight>::deserialize(de)? {
        Some(Weight::Number(n)) => Some(n.round().clamp(1.0, 1000.0) as u16),
        Some(Weight::Text(s)) => match s.trim() {
            "bold" | "bolder" => Some(700),
            "normal" | "lighter" => Some(400),
            other => other.parse().ok(),
        },
        None => None,
    })
}

/// Shadows saved as strings or `null` read back as no shadow.
fn lenient_shadow<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Shadow>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Shadow(Shadow),
        Other(serde_json::Value),
    }
    Ok(match Option::<Lenient>::deserialize(de)? {
        Some(Lenient::Shadow(s)) => Some(s),
        _ => None,
    })
}

impl ElementRecord {
    pub fn transform(&self) -> Transform {
        Transform {
            left: self.left,
            top: self.top,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            angle: self.angle,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
        }
    }

    fn set_transform(&mut self, t: &Transform) {
        self.left = t.left;
        self.top = t.top;
        self.scale_x = t.scale_x;
        self.scale_y = t.scale_y;
        self.angle = t.angle;
        self.flip_x = t.flip_x;
        self.flip_y = t.flip_y;
    }

    pub fn is_image(&self) -> bool {
        self.kind == "image"
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind.as_str(), "text" | "i-text" | "textbox")
    }

    pub fn is_grid_cell(&self) -> bool {
        self.kind == "gridCell" || (self.kind == "rect" && self.is_grid_cell)
    }

    /// Capture an element. Guides are never persisted.
    pub fn from_element(element: &Element) -> Option<Self> {
        let mut rec = ElementRecord {
            kind: element.kind_name().to_string(),
            ..Default::default()
        };
        match element {
            Element::Image(img) => {
                rec.src = Some(img.src.clone());
                rec.id = img.role.clone();
                rec.shadow = img.shadow.clone();
                rec.stroke = img.stroke.clone();
                rec.stroke_width = img.stroke_width;
                rec.opacity = img.opacity;
                rec.cell_id = img.cell_id;
                if let Some((w, h)) = img.natural {
                    rec.width = Some(w as f32);
                    rec.height = Some(h as f32);
                }
                rec.set_transform(&img.transform);
            }
            Element::Text(t) => {
                rec.text = Some(t.text.clone());
                rec.id = t.role.clone();
                rec.font_family = Some(t.font_family.clone());
                rec.font_size = Some(t.font_size);
                rec.font_weight = Some(t.font_weight);
                rec.fill = Some(t.fill.clone());
                rec.stroke = t.stroke.clone();
                rec.stroke_width = t.stroke_width;
                rec.shadow = t.shadow.clone();
                rec.text_align = Some(t.text_align);
                rec.cell_id = t.cell_id;
                rec.set_transform(&t.transform);
            }
            Element::GridCell(c) => {
                rec.cell_id = Some(c.id);
                rec.is_grid_cell = true;
                rec.row = Some(c.row);
                rec.col = Some(c.col);
                rec.width = Some(c.width);
                rec.height = Some(c.height);
                rec.fill = Some(c.fill.clone());
                rec.stroke = Some(c.stroke.clone());
                rec.stroke_width = c.stroke_width;
                rec.product = c.product.clone();
                rec.set_transform(&c.transform);
            }
            Element::Guide(_) => return None,
        }
        Some(rec)
    }

    /// Rebuild the element this record describes. Geometry is taken verbatim;
    /// images come back without a bitmap and must be loaded.
    pub fn to_element(&self) -> Option<Element> {
        let transform = self.transform();
        if self.is_image() {
            let mut img = ImageElement::new(self.src.clone().unwrap_or_default());
            img.transform = transform;
            img.role = self.id.clone();
            img.shadow = self.shadow.clone();
            img.stroke = self.stroke.clone().filter(|s| !s.is_empty());
            img.stroke_width = self.stroke_width;
            img.opacity = self.opacity;
            img.cell_id = self.cell_id;
            Some(Element::Image(img))
        } else if self.is_text() {
            let mut t = TextElement::new(self.text.clone().unwrap_or_default());
            t.transform = transform;
            t.role = self.id.clone();
            if let Some(family) = &self.font_family {
                t.font_family = family.clone();
            }
            if let Some(size) = self.font_size {
                t.font_size = size;
            }
            if let Some(weight) = self.font_weight {
                t.font_weight = weight;
            }
            if let Some(fill) = &self.fill {
                t.fill = fill.clone();
            }
            t.stroke = self.stroke.clone().filter(|s| !s.is_empty());
            t.stroke_width = self.stroke_width;
            t.shadow = self.shadow.clone();
            t.text_align = self.text_align.unwrap_or_default();
            t.cell_id = self.cell_id;
            Some(Element::Text(t))
        } else if self.is_grid_cell() {
            Some(Element::GridCell(GridCellElement {
                id: self.cell_id.unwrap_or_default(),
                row: self.row.unwrap_or(0),
                col: self.col.unwrap_or(0),
                transform,
                width: self.width.unwrap_or(0.0),
                height: self.height.unwrap_or(0.0),
                fill: self.fill.clone().unwrap_or_else(|| "transparent".to_string()),
                stroke: self.stroke.clone().unwrap_or_default(),
                stroke_width: self.stroke_width,
                product: self.product.clone(),
            }))
        } else {
            None
        }
    }
}
