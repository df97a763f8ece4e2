//! # Grid Layout Engine
//!
//! Splits the canvas into `cols × rows` cells, each hosting one product:
//!
//! ```text
//! ┌──────────────┐
//! │    image     │ 60%
//! │              │
//! ├──────────────┤
//! │ DESCRIPTION  │ 25%
//! ├──────────────┤
//! │   R$ 9.90    │ 15%
//! └──────────────┘
//! ```
//!
//! Cell content carries the owning [`CellId`], so it can be found and
//! replaced when the product changes, and re-laid when the grid is resized.
//!
//! ## States
//!
//! ```text
//! Empty → LayoutApplied → CellSelected ⇄ ProductAssigned
//!              ↑ resize ←──────┘
//! any → Empty (clear)
//! ```
//!
//! ## Resizing
//!
//! Applying a new layout rebuilds every cell. Products of the old cells are
//! carried over by a [`RemapPolicy`]; [`RemapByCoordinate`] is the default.

mod layout;
mod remap;

pub use layout::{
    CellGeometry, DEFAULT_GAP, GUIDE_DASH, GUIDE_STROKE, GridLayout, MAX_CELLS, MAX_GAP, MAX_SCALE,
    MIN_CELLS, MIN_SCALE, PRESETS,
};
pub use remap::{RemapByCoordinate, RemapByIndex, RemapPolicy};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assets::{PLACEHOLDER_SRC, proxy_image_url};
use crate::catalog::ProductCatalog;
use crate::error::KvError;
use crate::export::{ExportedImage, Exporter};
use crate::scene::{
    CellId, CellProduct, Composer, Element, Fit, GridCellElement, ImageElement, NodeId, Role,
    TextElement, Transform,
};
use crate::text::wrap_text;

pub const CELL_FILL: &str = "rgba(200, 200, 200, 0.5)";
pub const CELL_STROKE: &str = "#ffffff";
pub const CELL_STROKE_WIDTH: f32 = 2.0;
pub const SNAP_STEP: f32 = 20.0;
const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

const IMAGE_SHARE: f32 = 0.6;
const DESCRIPTION_SHARE: f32 = 0.25;
const PRICE_SHARE: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    Empty,
    LayoutApplied,
    CellSelected,
    ProductAssigned,
}

/// Grid composition session.
pub struct GridEngine {
    composer: Composer,
    catalog: Arc<dyn ProductCatalog>,
    policy: Box<dyn RemapPolicy>,
    proxy_hosts: Vec<String>,
    layout: Option<GridLayout>,
    selected: Option<CellId>,
    guides_visible: bool,
}

impl GridEngine {
    /// Guides shown and snapping on, as the editor starts.
    pub fn new(mut composer: Composer, catalog: Arc<dyn ProductCatalog>) -> Self {
        composer.set_snap(Some(SNAP_STEP));
        Self {
            composer,
            catalog,
            policy: Box::new(RemapByCoordinate),
            proxy_hosts: Vec::new(),
            layout: None,
            selected: None,
            guides_visible: true,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn RemapPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_proxy_hosts(mut self, hosts: Vec<String>) -> Self {
        self.proxy_hosts = hosts;
        self
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn into_composer(self) -> Composer {
        self.composer
    }

    pub fn layout(&self) -> Option<GridLayout> {
        self.layout
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn state(&self) -> GridState {
        match (self.layout, self.selected) {
            (None, _) => GridState::Empty,
            (Some(_), None) => GridState::LayoutApplied,
            (Some(_), Some(cell)) => match self.cell(cell).and_then(|c| c.product.as_ref()) {
                Some(_) => GridState::ProductAssigned,
                None => GridState::CellSelected,
            },
        }
    }

    // ========================================================================
    // LAYOUT
    // ========================================================================

    /// Rebuild the grid as `layout`, carrying products over through the
    /// remap policy. Returns how many products were carried.
    pub fn apply_layout(&mut self, layout: GridLayout) -> usize {
        let canvas = *self.composer.canvas();
        let previous = self.layout;
        let carried: Vec<(u32, u32, CellProduct)> = self
            .cells()
            .into_iter()
            .filter_map(|(_, c)| c.product.clone().map(|p| (c.row, c.col, p)))
            .collect();

        self.selected = None;
        self.composer.select(None);
        self.composer.remove_where(|n| n.element.is_grid_part());

        let mut placed = Vec::with_capacity(layout.cell_count());
        for geometry in layout.cells(&canvas) {
            let cell = GridCellElement {
                id: CellId::new(),
                row: geometry.row,
                col: geometry.col,
                transform: Transform::at(geometry.center.0, geometry.center.1),
                width: geometry.width,
                height: geometry.height,
                fill: CELL_FILL.to_string(),
                stroke: CELL_STROKE.to_string(),
                stroke_width: CELL_STROKE_WIDTH,
                product: None,
            };
            let id = self.composer.add(Element::GridCell(cell));
            placed.push(((geometry.row, geometry.col), id));
        }
        for guide in layout.guides(&canvas) {
            let id = self.composer.add(Element::Guide(guide));
            self.composer.set_visible(id, self.guides_visible);
        }

        let mut kept = 0;
        if let Some(old) = previous {
            for (row, col, product) in carried {
                let Some(target) = self.policy.target(&old, &layout, row, col) else {
                    debug!(row, col, policy = self.policy.name(), "cell content dropped by resize");
                    continue;
                };
                if let Some(&(_, node)) = placed.iter().find(|(pos, _)| *pos == target) {
                    self.place_product(node, product);
                    kept += 1;
                }
            }
        }

        self.layout = Some(layout);
        info!(cols = layout.cols, rows = layout.rows, carried = kept, "grid layout applied");
        kept
    }

    /// Apply a named preset such as `twoByTwo`, keeping the current gap and scale.
    pub fn apply_preset(&mut self, name: &str) -> Result<usize, KvError> {
        let preset = GridLayout::preset(name)
            .ok_or_else(|| KvError::Input(format!("Unknown grid layout '{}'", name)))?;
        let current = self.layout.unwrap_or_default();
        Ok(self.apply_layout(preset.with_gap(current.gap).with_scale(current.scale)))
    }

    /// Change the gap of the current layout.
    pub fn set_gap(&mut self, gap: f32) -> usize {
        match self.layout {
            Some(layout) => self.apply_layout(layout.with_gap(gap)),
            None => 0,
        }
    }

    /// Change the scale of the current layout.
    pub fn set_scale(&mut self, scale: f32) -> usize {
        match self.layout {
            Some(layout) => self.apply_layout(layout.with_scale(scale)),
            None => 0,
        }
    }

    /// Pick up a grid restored from a template: the layout is inferred from
    /// the cells' rows and columns.
    pub fn adopt_scene(&mut self) -> Option<GridLayout> {
        let cells = self.cells();
        let cols = cells.iter().map(|(_, c)| c.col + 1).max()?;
        let rows = cells.iter().map(|(_, c)| c.row + 1).max()?;
        let base = self.layout.unwrap_or_default();
        let layout = GridLayout::new(cols, rows)
            .with_gap(base.gap)
            .with_scale(base.scale);
        self.layout = Some(layout);
        self.selected = None;
        Some(layout)
    }

    /// Remove every cell, its content and the guides.
    pub fn clear(&mut self) {
        self.composer.select(None);
        let removed = self.composer.remove_where(|n| n.element.is_grid_part());
        self.layout = None;
        self.selected = None;
        debug!(removed, "grid cleared");
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> Vec<(NodeId, &GridCellElement)> {
        let mut cells: Vec<_> = self
            .composer
            .scene()
            .nodes
            .iter()
            .filter_map(|n| match &n.element {
                Element::GridCell(c) => Some((n.id, c)),
                _ => None,
            })
            .collect();
        cells.sort_by_key(|(_, c)| (c.row, c.col));
        cells
    }

    pub fn cell(&self, id: CellId) -> Option<&GridCellElement> {
        self.cells().into_iter().find(|(_, c)| c.id == id).map(|(_, c)| c)
    }

    pub fn cell_at(&self, row: u32, col: u32) -> Option<&GridCellElement> {
        self.cells()
            .into_iter()
            .find(|(_, c)| c.row == row && c.col == col)
            .map(|(_, c)| c)
    }

    fn cell_node(&self, id: CellId) -> Option<NodeId> {
        self.cells().into_iter().find(|(_, c)| c.id == id).map(|(n, _)| n)
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn selected_cell(&self) -> Option<CellId> {
        self.selected
    }

    pub fn select_cell(&mut self, id: Option<CellId>) -> Result<(), KvError> {
        match id {
            Some(cell) => {
                let node = self
                    .cell_node(cell)
                    .ok_or_else(|| KvError::Input(format!("Unknown grid cell {}", cell)))?;
                self.composer.select(Some(node));
                self.selected = Some(cell);
            }
            None => {
                self.composer.select(None);
                self.selected = None;
            }
        }
        Ok(())
    }

    /// Click on the grid canvas. Clicking a cell or any of its content
    /// selects that cell; anything else clears the cell selection.
    pub fn click(&mut self, x: f32, y: f32) -> Option<CellId> {
        let hit = self.composer.click(x, y);
        self.selected = hit
            .and_then(|id| self.composer.element(id))
            .and_then(Element::cell_id);
        self.selected
    }

    // ========================================================================
    // PRODUCTS
    // ========================================================================

    /// Look up `code` and lay the product out inside `cell`.
    ///
    /// A lookup with no rows is [`KvError::ProductNotFound`]; on that or a
    /// network error the cell is left untouched.
    pub async fn assign_product(&mut self, cell: CellId, code: &str) -> Result<CellProduct, KvError> {
        let node = self
            .cell_node(cell)
            .ok_or_else(|| KvError::Input(format!("Unknown grid cell {}", cell)))?;
        let rows = self.catalog.search(code).await.inspect_err(|e| {
            warn!(code, error = %e, "product lookup failed, cell unchanged");
        })?;
        let product = rows
            .into_iter()
            .next()
            .ok_or_else(|| KvError::ProductNotFound(code.to_string()))?;

        let payload = CellProduct {
            code: code.to_string(),
            description: product.display_description(),
            price: product.price_label().unwrap_or_default(),
            image_url: product.image_url().unwrap_or_default().to_string(),
        };
        self.place_product(node, payload.clone());
        self.selected = Some(cell);
        self.composer.settle().await;
        info!(%cell, code, description = %payload.description, "product assigned to cell");
        Ok(payload)
    }

    /// Remove one cell's product and content. Other cells are untouched.
    pub fn clear_cell(&mut self, cell: CellId) -> Result<usize, KvError> {
        let node = self
            .cell_node(cell)
            .ok_or_else(|| KvError::Input(format!("Unknown grid cell {}", cell)))?;
        let removed = self.remove_cell_content(cell);
        self.composer.modify(node, |el| {
            if let Element::GridCell(c) = el {
                c.product = None;
            }
        });
        Ok(removed)
    }

    fn remove_cell_content(&mut self, cell: CellId) -> usize {
        let ids = self.composer.nodes_in_cell(cell);
        for id in &ids {
            self.composer.remove(*id);
        }
        ids.len()
    }

    /// Store `product` on the cell and (re)build its image, description and price.
    fn place_product(&mut self, node: NodeId, product: CellProduct) {
        let Some(Element::GridCell(cell)) = self.composer.element(node) else {
            return;
        };
        let cell_id = cell.id;
        let (cx, cy) = (cell.transform.left, cell.transform.top);
        let (cw, ch) = cell.scaled_size();

        self.remove_cell_content(cell_id);
        self.composer.modify(node, |el| {
            if let Element::GridCell(c) = el {
                c.product = Some(product.clone());
            }
        });

        let image_h = ch * IMAGE_SHARE;
        let desc_h = ch * DESCRIPTION_SHARE;
        let price_h = ch * PRICE_SHARE;
        let top_edge = cy - ch / 2.0;

        let src = if product.image_url.is_empty() {
            PLACEHOLDER_SRC.to_string()
        } else {
            proxy_image_url(&product.image_url, &self.proxy_hosts)
        };
        let image = ImageElement::new(src)
            .at(cx, top_edge + image_h / 2.0)
            .role(Role::ProductImage)
            .fit(Fit::Contain {
                width: cw * 0.9,
                height: image_h * 0.9,
            })
            .in_cell(cell_id);
        self.composer.add(Element::Image(image));

        let desc_size = (desc_h * 0.4).min(24.0);
        let fonts = self.composer.fonts().clone();
        let wrapped = wrap_text(fonts.as_ref(), &product.description, desc_size, cw * 0.85);
        let description = TextElement::new(wrapped)
            .at(cx, top_edge + image_h + desc_h / 2.0)
            .size(desc_size)
            .role(Role::Description)
            .in_cell(cell_id);
        self.composer.add(Element::Text(description));

        if !product.price.is_empty() {
            let price = TextElement::new(product.price.as_str())
                .at(cx, top_edge + image_h + desc_h + price_h / 2.0)
                .size((price_h * 0.6).min(28.0))
                .role(Role::Price)
                .in_cell(cell_id);
            self.composer.add(Element::Text(price));
        }
    }

    // ========================================================================
    // GUIDES, SNAP AND BACKGROUND
    // ========================================================================

    pub fn guides_visible(&self) -> bool {
        self.guides_visible
    }

    pub fn set_guides_visible(&mut self, visible: bool) {
        self.guides_visible = visible;
        for id in self.guide_ids() {
            self.composer.set_visible(id, visible);
        }
    }

    pub fn toggle_guides(&mut self) -> bool {
        self.set_guides_visible(!self.guides_visible);
        self.guides_visible
    }

    fn guide_ids(&self) -> Vec<NodeId> {
        self.composer
            .scene()
            .nodes
            .iter()
            .filter(|n| matches!(n.element, Element::Guide(_)))
            .map(|n| n.id)
            .collect()
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.composer.set_snap(enabled.then_some(SNAP_STEP));
    }

    pub fn set_background(&mut self, src: impl Into<String>) -> NodeId {
        self.composer.set_background_src(src)
    }

    pub fn remove_background(&mut self) -> bool {
        self.composer.clear_background().is_some()
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Export only the cells' content: cell fill and stroke are made
    /// transparent and guides hidden for the export, then restored.
    pub async fn export_grid(&mut self, exporter: &Exporter) -> Result<ExportedImage, KvError> {
        let has_content = self
            .composer
            .scene()
            .nodes
            .iter()
            .any(|n| !matches!(n.element, Element::GridCell(_) | Element::Guide(_)) && n.element.cell_id().is_some());
        if !has_content {
            return Err(KvError::Input("Nothing to export, add products to the grid first".to_string()));
        }

        self.composer.select(None);
        let saved: Vec<(NodeId, String, String)> = self
            .cells()
            .into_iter()
            .map(|(id, c)| (id, c.fill.clone(), c.stroke.clone()))
            .collect();
        for (id, _, _) in &saved {
            self.composer.modify(*id, |el| {
                if let Element::GridCell(c) = el {
                    c.fill = TRANSPARENT.to_string();
                    c.stroke = TRANSPARENT.to_string();
                }
            });
        }
        let guides = self.guide_ids();
        for id in &guides {
            self.composer.set_visible(*id, false);
        }

        let result = exporter.export(&mut self.composer).await;

        for (id, fill, stroke) in saved {
            self.composer.modify(id, move |el| {
                if let Element::GridCell(c) = el {
                    c.fill = fill;
                    c.stroke = stroke;
                }
            });
        }
        for id in guides {
            self.composer.set_visible(id, self.guides_visible);
        }
        result
    }
}
