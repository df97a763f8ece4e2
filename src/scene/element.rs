//! Element types for the scene graph.
//!
//! An element is one of four kinds: a bitmap image, a text node, a grid cell
//! (a container rectangle that can host a product) or a guide line. Positions
//! use center-origin semantics: `left`/`top` name the element's center in
//! canvas units.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::text::{TextMeasure, measure_block};

/// Identifier of a node inside one scene. Never reused within a composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identifier of a grid cell. Persisted with the cell and with every
/// element rendered inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub Uuid);

impl CellId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Center-origin placement of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub left: f32,
    pub top: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation in degrees, clockwise.
    pub angle: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl Transform {
    pub fn at(left: f32, top: f32) -> Self {
        Self {
            left,
            top,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }
}

/// Axis-aligned bounding box in canvas units (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    /// Bounds of a `width × height` box centered on `(cx, cy)`.
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Bounds of a `width × height` box placed and rotated by `t`.
    pub fn transformed(t: &Transform, width: f32, height: f32) -> Self {
        let w = width * t.scale_x.abs();
        let h = height * t.scale_y.abs();
        if t.angle.rem_euclid(360.0) == 0.0 {
            return Self::centered(t.left, t.top, w, h);
        }
        let (sin, cos) = t.angle.to_radians().sin_cos();
        let bw = (w * cos).abs() + (h * sin).abs();
        let bh = (w * sin).abs() + (h * cos).abs();
        Self::centered(t.left, t.top, bw, bh)
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ============================================================================
// STYLE PRIMITIVES
// ============================================================================

/// Drop shadow descriptor. Always replaced as a whole on the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shadow {
    pub color: String,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: "rgba(0,0,0,0)".to_string(),
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Horizontal alignment of multi-line text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

// ============================================================================
// ROLES
// ============================================================================

/// Semantic tag used to route incoming product data to the right node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Description,
    Price,
    Validity,
    LegalText,
    ProductImage,
    /// Free-form tag preserved verbatim.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Description => "description",
            Role::Price => "price",
            Role::Validity => "validity",
            Role::LegalText => "legalText",
            Role::ProductImage => "productImage",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "description" => Role::Description,
            "price" => Role::Price,
            "validity" => Role::Validity,
            "legalText" => Role::LegalText,
            "productImage" => Role::ProductImage,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ELEMENTS
// ============================================================================

/// Deferred sizing rule resolved once an image's natural size is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fit {
    /// Scale to cover the box (may crop). Kept permanently on the background.
    Cover { width: f32, height: f32 },
    /// Scale to fit inside the box. Cleared after it has been applied once.
    Contain { width: f32, height: f32 },
}

impl Fit {
    /// Uniform scale for an image of natural size `(w, h)`.
    pub fn scale_for(&self, w: u32, h: u32) -> f32 {
        let w = w.max(1) as f32;
        let h = h.max(1) as f32;
        match *self {
            Fit::Cover { width, height } => (width / w).max(height / h),
            Fit::Contain { width, height } => (width / w).min(height / h),
        }
    }
}

/// Bitmap element.
#[derive(Debug, Clone)]
pub struct ImageElement {
    /// Resolved source: URL, uploads path or `data:` URL.
    pub src: String,
    pub transform: Transform,
    pub shadow: Option<Shadow>,
    pub stroke: Option<String>,
    pub stroke_width: f32,
    pub opacity: f32,
    pub role: Option<Role>,
    pub cell_id: Option<CellId>,
    /// Pending sizing rule (see [`Fit`]).
    pub fit: Option<Fit>,
    /// Natural pixel size, known once the decode finished.
    pub natural: Option<(u32, u32)>,
    pub bitmap: Option<Arc<DynamicImage>>,
    /// True when the source failed to load and the default image is shown.
    pub placeholder: bool,
}

impl ImageElement {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            transform: Transform::default(),
            shadow: None,
            stroke: None,
            stroke_width: 0.0,
            opacity: 1.0,
            role: None,
            cell_id: None,
            fit: None,
            natural: None,
            bitmap: None,
            placeholder: false,
        }
    }

    pub fn at(mut self, left: f32, top: f32) -> Self {
        self.transform.left = left;
        self.transform.top = top;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn fit(mut self, fit: Fit) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn in_cell(mut self, cell: CellId) -> Self {
        self.cell_id = Some(cell);
        self
    }
}

/// Text element. `text` may contain `\n` line breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub fill: String,
    pub stroke: Option<String>,
    pub stroke_width: f32,
    pub shadow: Option<Shadow>,
    pub text_align: TextAlign,
    pub transform: Transform,
    pub role: Option<Role>,
    pub cell_id: Option<CellId>,
}

impl TextElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: "Arial".to_string(),
            font_size: 42.0,
            font_weight: 700,
            fill: "#ffffff".to_string(),
            stroke: None,
            stroke_width: 0.0,
            shadow: None,
            text_align: TextAlign::Center,
            transform: Transform::default(),
            role: None,
            cell_id: None,
        }
    }

    pub fn at(mut self, left: f32, top: f32) -> Self {
        self.transform.left = left;
        self.transform.top = top;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = fill.into();
        self
    }

    pub fn in_cell(mut self, cell: CellId) -> Self {
        self.cell_id = Some(cell);
        self
    }
}

/// Product shown inside a grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellProduct {
    #[serde(default)]
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image_url: String,
}

/// Grid cell container.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCellElement {
    pub id: CellId,
    pub row: u32,
    pub col: u32,
    /// Center of the cell and its user scale.
    pub transform: Transform,
    pub width: f32,
    pub height: f32,
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f32,
    pub product: Option<CellProduct>,
}

impl GridCellElement {
    /// Rendered size, including any user scale.
    pub fn scaled_size(&self) -> (f32, f32) {
        (
            self.width * self.transform.scale_x,
            self.height * self.transform.scale_y,
        )
    }
}

/// Dashed guide line. Purely visual, never exported.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideLine {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub stroke: String,
    pub stroke_width: f32,
    pub dash: [f32; 2],
}

/// Tagged union of every element kind.
#[derive(Debug, Clone)]
pub enum Element {
    Image(ImageElement),
    Text(TextElement),
    GridCell(GridCellElement),
    Guide(GuideLine),
}

impl Element {
    /// Short type name, matching the persisted `type` field.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Image(_) => "image",
            Element::Text(_) => "text",
            Element::GridCell(_) => "gridCell",
            Element::Guide(_) => "line",
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        match self {
            Element::Image(i) => Some(&i.transform),
            Element::Text(t) => Some(&t.transform),
            Element::GridCell(c) => Some(&c.transform),
            Element::Guide(_) => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        match self {
            Element::Image(i) => Some(&mut i.transform),
            Element::Text(t) => Some(&mut t.transform),
            Element::GridCell(c) => Some(&mut c.transform),
            Element::Guide(_) => None,
        }
    }

    pub fn role(&self) -> Option<&Role> {
        match self {
            Element::Image(i) => i.role.as_ref(),
            Element::Text(t) => t.role.as_ref(),
            _ => None,
        }
    }

    /// The grid cell an element belongs to (a cell belongs to itself).
    pub fn cell_id(&self) -> Option<CellId> {
        match self {
            Element::Image(i) => i.cell_id,
            Element::Text(t) => t.cell_id,
            Element::GridCell(c) => Some(c.id),
            Element::Guide(_) => None,
        }
    }

    /// Whether the element belongs to the grid layer rather than the main canvas.
    pub fn is_grid_part(&self) -> bool {
        match self {
            Element::GridCell(_) | Element::Guide(_) => true,
            _ => self.cell_id().is_some(),
        }
    }

    /// Axis-aligned bounds, or `None` for an image whose size is not known yet.
    pub fn bounds(&self, measure: &dyn TextMeasure) -> Option<Bounds> {
        match self {
            Element::Image(img) => {
                let (w, h) = img.natural?;
                Some(Bounds::transformed(&img.transform, w as f32, h as f32))
            }
            Element::Text(t) => {
                let (w, h) = measure_block(measure, &t.text, t.font_size);
                Some(Bounds::transformed(&t.transform, w, h))
            }
            Element::GridCell(c) => Some(Bounds::transformed(&c.transform, c.width, c.height)),
            Element::Guide(g) => {
                let x = g.from.0.min(g.to.0);
                let y = g.from.1.min(g.to.1);
                Some(Bounds {
                    x,
                    y,
                    width: (g.from.0 - g.to.0).abs(),
                    height: (g.from.1 - g.to.1).abs(),
                })
            }
        }
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub element: Element,
    pub selectable: bool,
    pub visible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_strings() {
        for s in ["description", "price", "validity", "legalText", "productImage", "badge"] {
            let role = Role::from(s.to_string());
            assert_eq!(role.as_str(), s);
        }
        assert_eq!(Role::from("badge".to_string()), Role::Other("badge".to_string()));
    }

    #[test]
    fn test_role_serde_is_plain_string() {
        let json = serde_json::to_string(&Role::LegalText).unwrap();
        assert_eq!(json, "\"legalText\"");
        let back: Role = serde_json::from_str("\"price\"").unwrap();
        assert_eq!(back, Role::Price);
    }

    #[test]
    fn test_fit_cover_and_contain() {
        let cover = Fit::Cover {
            width: 1080.0,
            height: 1920.0,
        };
        assert!((cover.scale_for(1000, 1000) - 1.92).abs() < 1e-6);
        let contain = Fit::Contain {
            width: 100.0,
            height: 50.0,
        };
        assert!((contain.scale_for(200, 200) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_rotated_square() {
        let t = Transform {
            angle: 90.0,
            ..Transform::at(100.0, 100.0)
        };
        let b = Bounds::transformed(&t, 40.0, 20.0);
        assert!((b.width - 20.0).abs() < 1e-3);
        assert!((b.height - 40.0).abs() < 1e-3);
        assert!(b.contains(100.0, 119.0));
        assert!(!b.contains(115.0, 100.0));
    }

    #[test]
    fn test_grid_part_detection() {
        let cell = CellId::new();
        let text = Element::Text(TextElement::new("x").in_cell(cell));
        assert!(text.is_grid_part());
        let free = Element::Text(TextElement::new("x"));
        assert!(!free.is_grid_part());
    }
}
