//! # KV Editor Session
//!
//! The single-poster editor: a [`Composer`] plus the external services and
//! the edit history. Product data is routed into the scene by role tag:
//!
//! | Role | Receives |
//! |------|----------|
//! | `description` | upper-cased `descricao` |
//! | `price` | `R$ <vl_oferta>` (only when there is an offer) |
//! | `productImage` | `link_imagem`, through the image proxy |
//!
//! Missing description and price texts are created from the style panel
//! state; a missing product image is created centered in the upper half.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo(mut editor: kvgen::editor::KvEditor) -> Result<(), kvgen::KvError> {
//! editor.search_product("7891234567890").await?;
//! let poster = editor.export(&kvgen::export::Exporter::default()).await?;
//! # Ok(())
//! # }
//! ```

mod history;

pub use history::{HISTORY_LIMIT, History};

use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assets::{PLACEHOLDER_SRC, encode_png, proxy_image_url};
use crate::catalog::{BackgroundRemover, Product, ProductCatalog};
use crate::error::KvError;
use crate::export::{ExportedImage, Exporter};
use crate::scene::{Composer, Element, Fit, ImageElement, NodeId, Role, Shadow, TextElement};
use crate::storage::TemplateStore;
use crate::template::{
    DEFAULT_TEMPLATE_DESCRIPTION, DEFAULT_TEMPLATE_NAME, RestoreReport, RoleInference, Template,
    deserialize_into, load_template, serialize_scene, serialize_template,
};

/// Vertical gap between a created description and its price.
const PRICE_OFFSET: f32 = 60.0;

/// Drop shadow of the product image, as the shadow panel exposes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductShadow {
    pub enabled: bool,
    pub blur: f32,
    pub offset_y: f32,
    pub opacity: f32,
}

impl Default for ProductShadow {
    fn default() -> Self {
        Self {
            enabled: false,
            blur: 15.0,
            offset_y: 15.0,
            opacity: 0.5,
        }
    }
}

impl ProductShadow {
    pub fn to_shadow(&self) -> Option<Shadow> {
        self.enabled.then(|| Shadow {
            color: format!("rgba(0,0,0,{})", self.opacity.clamp(0.0, 1.0)),
            blur: self.blur.max(0.0),
            offset_x: 0.0,
            offset_y: self.offset_y,
        })
    }
}

/// Quick placements for the description and price texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPreset {
    Top,
    Middle,
    Bottom,
}

impl TextPreset {
    /// Vertical positions of description and price, as fractions of the canvas height.
    fn rows(self) -> (f32, f32) {
        match self {
            TextPreset::Top => (0.3, 0.4),
            TextPreset::Middle => (0.5, 0.6),
            TextPreset::Bottom => (0.7, 0.8),
        }
    }
}

pub struct KvEditor {
    composer: Composer,
    catalog: Arc<dyn ProductCatalog>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    proxy_hosts: Vec<String>,
    history: History,
    template: Option<Template>,
}

impl KvEditor {
    pub fn new(composer: Composer, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            composer,
            catalog,
            remover: None,
            proxy_hosts: Vec::new(),
            history: History::default(),
            template: None,
        }
    }

    pub fn with_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
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

    /// The template being edited, if one was loaded.
    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ========================================================================
    // TEMPLATES
    // ========================================================================

    /// Replace the scene with `template` and start a fresh history.
    pub async fn load_template(&mut self, template: &Template) -> RestoreReport {
        let report = load_template(&mut self.composer, template, RoleInference::Legacy).await;
        self.template = Some(template.clone());
        self.history.clear();
        report
    }

    /// Save the scene as a new template. Blank names get the defaults.
    pub fn save_template(&mut self, store: &TemplateStore, name: &str, description: &str) -> Result<Template, KvError> {
        let name = non_blank(name).unwrap_or(DEFAULT_TEMPLATE_NAME);
        let description = non_blank(description).unwrap_or(DEFAULT_TEMPLATE_DESCRIPTION);
        let template = store.insert(serialize_template(&self.composer, name, description))?;
        self.template = Some(template.clone());
        Ok(template)
    }

    /// Write the scene back into the loaded template.
    pub fn save_changes(&mut self, store: &TemplateStore) -> Result<Template, KvError> {
        let id = self
            .template
            .as_ref()
            .map(|t| t.id.clone())
            .ok_or_else(|| KvError::Input("No template loaded".to_string()))?;
        let updated = store.update_elements(&id, serialize_scene(&self.composer))?;
        self.template = Some(updated.clone());
        Ok(updated)
    }

    // ========================================================================
    // PRODUCTS
    // ========================================================================

    /// Look up `code` and apply the first row to the scene.
    ///
    /// Nothing changes when the lookup fails or finds nothing.
    pub async fn search_product(&mut self, code: &str) -> Result<Product, KvError> {
        let rows = self.catalog.search(code).await.inspect_err(|e| {
            warn!(code, error = %e, "product lookup failed");
        })?;
        let product = rows
            .into_iter()
            .next()
            .ok_or_else(|| KvError::ProductNotFound(code.to_string()))?;
        self.checkpoint();
        self.apply_product(&product).await;
        info!(code, description = %product.descricao, "product applied");
        Ok(product)
    }

    /// Route a product's fields into the role-tagged elements.
    pub async fn apply_product(&mut self, product: &Product) {
        let description = product.display_description();
        match self.composer.find_by_role(&Role::Description) {
            Some(id) => self.set_text(id, description),
            None => {
                self.create_text(description, Role::Description, 0.0);
            }
        }

        if let Some(price) = product.price_label() {
            match self.composer.find_by_role(&Role::Price) {
                Some(id) => self.set_text(id, price),
                None => {
                    self.create_text(price, Role::Price, PRICE_OFFSET);
                }
            }
        }

        let src = match product.image_url() {
            Some(url) => proxy_image_url(url, &self.proxy_hosts),
            None => PLACEHOLDER_SRC.to_string(),
        };
        match self.composer.find_by_role(&Role::ProductImage) {
            Some(id) => {
                if let Err(e) = self.composer.replace_image_src(id, src) {
                    warn!(error = %e, "product image could not be replaced");
                }
            }
            None => {
                let canvas = *self.composer.canvas();
                let image = ImageElement::new(src)
                    .at(canvas.width_f() / 2.0, canvas.height_f() * 0.45)
                    .role(Role::ProductImage)
                    .fit(Fit::Contain {
                        width: canvas.width_f() * 0.7,
                        height: canvas.height_f() * 0.4,
                    });
                self.composer.add(Element::Image(image));
            }
        }
        self.composer.settle().await;
    }

    fn set_text(&mut self, id: NodeId, text: String) {
        self.composer.modify(id, |el| {
            if let Element::Text(t) = el {
                t.text = text;
            }
        });
    }

    /// New text styled like the style panel, `offset` below its position.
    fn create_text(&mut self, text: String, role: Role, offset: f32) -> NodeId {
        let style = self.composer.style_state().clone();
        let mut element = TextElement::new(text)
            .at(style.left, style.top + offset)
            .size(style.font_size)
            .fill(style.fill)
            .role(role);
        element.stroke = non_blank(&style.stroke).map(str::to_string);
        element.stroke_width = style.stroke_width;
        element.shadow = (style.shadow != Shadow::default()).then_some(style.shadow);
        self.composer.add(Element::Text(element))
    }

    /// Send the product image through the background-removal service.
    ///
    /// Placement, scale, rotation, flips and shadow are kept.
    pub async fn remove_product_background(&mut self) -> Result<(), KvError> {
        let remover = self
            .remover
            .clone()
            .ok_or_else(|| KvError::Input("Background removal is not configured".to_string()))?;
        let id = self
            .composer
            .find_by_role(&Role::ProductImage)
            .ok_or_else(|| KvError::Input("No product image found".to_string()))?;
        if self.composer.pending_decodes() > 0 {
            self.composer.settle().await;
        }
        let bitmap = match self.composer.element(id) {
            Some(Element::Image(img)) => img.bitmap.clone(),
            _ => None,
        }
        .ok_or_else(|| KvError::Asset("Product image is not loaded".to_string()))?;

        let payload = general_purpose::STANDARD.encode(encode_png(&bitmap)?);
        let processed = remover.remove_background(&payload).await.inspect_err(|e| {
            warn!(error = %e, "background removal failed");
        })?;
        self.checkpoint();
        self.composer.replace_image_src(id, processed)?;
        self.composer.settle().await;
        debug!(node = %id, "product background removed");
        Ok(())
    }

    /// Set or clear the product image shadow.
    pub fn set_product_shadow(&mut self, shadow: ProductShadow) -> Result<(), KvError> {
        let id = self
            .composer
            .find_by_role(&Role::ProductImage)
            .ok_or_else(|| KvError::Input("No product image found".to_string()))?;
        self.checkpoint();
        self.composer.modify(id, |el| {
            if let Element::Image(img) = el {
                img.shadow = shadow.to_shadow();
            }
        });
        Ok(())
    }

    /// Move description and price to a preset position, centered horizontally.
    pub fn apply_text_preset(&mut self, preset: TextPreset) {
        let canvas = *self.composer.canvas();
        let (desc_row, price_row) = preset.rows();
        self.checkpoint();
        for (role, row) in [(Role::Description, desc_row), (Role::Price, price_row)] {
            if let Some(id) = self.composer.find_by_role(&role) {
                self.composer.modify(id, |el| {
                    if let Some(t) = el.transform_mut() {
                        t.left = canvas.width_f() / 2.0;
                        t.top = canvas.height_f() * row;
                    }
                });
            }
        }
    }

    // ========================================================================
    // HISTORY AND EXPORT
    // ========================================================================

    /// Record the current scene so the next edit can be undone.
    pub fn checkpoint(&mut self) {
        self.history.record(serialize_scene(&self.composer));
    }

    /// Returns whether anything was undone.
    pub async fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(serialize_scene(&self.composer)) else {
            return false;
        };
        deserialize_into(&mut self.composer, &previous, RoleInference::Strict).await;
        true
    }

    pub async fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(serialize_scene(&self.composer)) else {
            return false;
        };
        deserialize_into(&mut self.composer, &next, RoleInference::Strict).await;
        true
    }

    pub async fn export(&mut self, exporter: &Exporter) -> Result<ExportedImage, KvError> {
        exporter.export(&mut self.composer).await
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}
