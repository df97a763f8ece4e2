//! The Composition Engine.
//!
//! ## Image decoding
//!
//! Adding an image (or changing its source) starts a decode task on the
//! tokio runtime. Nothing that depends on an image's natural size runs
//! until [`Composer::settle`] has joined every pending decode: settle is the
//! completion barrier export and layout wait on. Outside a runtime the
//! decode is queued and started by the next `settle`.
//!
//! ## Render passes
//!
//! [`Composer::render_pass`] enforces the size rules that need natural
//! dimensions: the background is rescaled to cover the canvas and recentered
//! whenever its scale drifts, and pending `Contain` fits are applied once.

use image::{DynamicImage, RgbaImage, imageops::FilterType};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::assets::{AssetLoader, abbreviate, placeholder_image};
use crate::config::CanvasConfig;
use crate::error::KvError;
use crate::render::{Rasterizer, RenderOptions};
use crate::store::{Listeners, LocalMap, MapChange, SubscriptionId};
use crate::style::{StyleProperty, StyleSnapshot, apply_style};
use crate::template::ElementRecord;
use crate::text::Fonts;

use super::{CellId, Element, Fit, ImageElement, Node, NodeId, Role, Scene};

/// Scale drift tolerated before the background is refitted.
const SCALE_EPSILON: f32 = 1e-4;

type Decode = (NodeId, String, Result<DynamicImage, KvError>);

/// Notifications published by the [`Composer`].
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Added(NodeId),
    Removed(NodeId),
    /// Geometry, style or content of a node changed.
    Modified(NodeId),
    /// `style` is the selected element's current style, or `None` when the
    /// selection was cleared.
    SelectionChanged {
        selected: Option<NodeId>,
        style: Option<StyleSnapshot>,
    },
    BackgroundChanged(Option<NodeId>),
}

/// On-screen presentation of the canvas. Never affects stored coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn for_canvas(canvas: &CanvasConfig, zoom: f32) -> Self {
        Self {
            zoom,
            width: (canvas.width_f() * zoom).round().max(1.0) as u32,
            height: (canvas.height_f() * zoom).round().max(1.0) as u32,
        }
    }
}

/// Owner of the live scene graph.
pub struct Composer {
    canvas: CanvasConfig,
    scene: Scene,
    loader: Arc<dyn AssetLoader>,
    fonts: Arc<Fonts>,
    pending: JoinSet<Decode>,
    queued: Vec<(NodeId, String)>,
    next_id: u64,
    selection: Option<NodeId>,
    style: StyleSnapshot,
    events: Listeners<SceneEvent>,
    shapes: LocalMap<NodeId, ElementRecord>,
    viewport: Viewport,
    snap: Option<f32>,
    render_count: u64,
}

impl Composer {
    pub fn new(canvas: CanvasConfig, loader: Arc<dyn AssetLoader>, fonts: Arc<Fonts>) -> Self {
        Self {
            viewport: Viewport::for_canvas(&canvas, 1.0),
            canvas,
            scene: Scene::default(),
            loader,
            fonts,
            pending: JoinSet::new(),
            queued: Vec::new(),
            next_id: 1,
            selection: None,
            style: StyleSnapshot::default(),
            events: Listeners::new(),
            shapes: LocalMap::new(),
            snap: None,
            render_count: 0,
        }
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn fonts(&self) -> &Arc<Fonts> {
        &self.fonts
    }

    pub fn loader(&self) -> Arc<dyn AssetLoader> {
        self.loader.clone()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.scene.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.scene.get(id).map(|n| &n.element)
    }

    /// Mirror of the main-canvas shapes (no background, no grid parts).
    pub fn shapes(&self) -> &LocalMap<NodeId, ElementRecord> {
        &self.shapes
    }

    pub fn subscribe_shapes(
        &mut self,
        listener: impl FnMut(&MapChange<NodeId>) + Send + 'static,
    ) -> SubscriptionId {
        self.shapes.subscribe(listener)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SceneEvent) + Send + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Number of render passes run so far.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Decodes started or queued but not joined yet.
    pub fn pending_decodes(&self) -> usize {
        self.pending.len() + self.queued.len()
    }

    // ========================================================================
    // ELEMENTS
    // ========================================================================

    /// Add an element on top of the scene. Guides are added non-selectable.
    pub fn add(&mut self, element: Element) -> NodeId {
        let id = self.alloc_id();
        let selectable = !matches!(element, Element::Guide(_));
        self.queue_decode(id, &element);
        self.scene.nodes.push(Node {
            id,
            element,
            selectable,
            visible: true,
        });
        self.mirror(id);
        self.events.emit(&SceneEvent::Added(id));
        id
    }

    /// Remove a node (or the background) and return its element.
    pub fn remove(&mut self, id: NodeId) -> Option<Element> {
        if self.scene.is_background(id) {
            return self.clear_background().map(Element::Image);
        }
        let pos = self.scene.nodes.iter().position(|n| n.id == id)?;
        let node = self.scene.nodes.remove(pos);
        self.forget(id);
        Some(node.element)
    }

    /// Remove every node matching `predicate`. Returns how many were removed.
    pub fn remove_where(&mut self, predicate: impl Fn(&Node) -> bool) -> usize {
        let ids: Vec<NodeId> = self
            .scene
            .nodes
            .iter()
            .filter(|n| predicate(n))
            .map(|n| n.id)
            .collect();
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }

    /// Swap the element of an existing node, keeping its id and z-order.
    pub fn replace(&mut self, id: NodeId, element: Element) -> Result<(), KvError> {
        let decode = match &element {
            Element::Image(img) if img.bitmap.is_none() => Some(img.src.clone()),
            _ => None,
        };
        let node = self
            .scene
            .get_mut(id)
            .ok_or_else(|| KvError::Input(format!("Unknown node {}", id)))?;
        node.element = element;
        if let Some(src) = decode {
            self.spawn_decode(id, src);
        }
        self.mirror(id);
        self.events.emit(&SceneEvent::Modified(id));
        Ok(())
    }

    /// Point an image at a new source. Placement, shadow, role and cell are kept.
    pub fn replace_image_src(&mut self, id: NodeId, src: impl Into<String>) -> Result<(), KvError> {
        let src = src.into();
        let node = self
            .scene
            .get_mut(id)
            .ok_or_else(|| KvError::Input(format!("Unknown node {}", id)))?;
        let Element::Image(img) = &mut node.element else {
            return Err(KvError::Input(format!("Node {} is not an image", id)));
        };
        img.src = src.clone();
        img.bitmap = None;
        img.natural = None;
        img.placeholder = false;
        self.spawn_decode(id, src);
        self.mirror(id);
        self.events.emit(&SceneEvent::Modified(id));
        Ok(())
    }

    /// Mutate a node in place and publish one modification event.
    pub fn modify<R>(&mut self, id: NodeId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        let node = self.scene.get_mut(id)?;
        let result = f(&mut node.element);
        self.mirror(id);
        self.events.emit(&SceneEvent::Modified(id));
        Some(result)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        let Some(node) = self.scene.get_mut(id) else {
            return false;
        };
        if node.visible != visible {
            node.visible = visible;
            self.events.emit(&SceneEvent::Modified(id));
        }
        true
    }

    /// Move a node's center, rounding to the snap grid when enabled.
    pub fn move_element(&mut self, id: NodeId, left: f32, top: f32) -> bool {
        let (left, top) = match self.snap {
            Some(step) if step > 0.0 => ((left / step).round() * step, (top / step).round() * step),
            _ => (left, top),
        };
        self.modify(id, |el| {
            if let Some(t) = el.transform_mut() {
                t.left = left;
                t.top = top;
            }
        })
        .is_some()
    }

    pub fn set_snap(&mut self, step: Option<f32>) {
        self.snap = step;
    }

    pub fn snap(&self) -> Option<f32> {
        self.snap
    }

    /// First main-scene node carrying `role`.
    pub fn find_by_role(&self, role: &Role) -> Option<NodeId> {
        self.scene
            .nodes
            .iter()
            .find(|n| n.element.role() == Some(role))
            .map(|n| n.id)
    }

    /// Content nodes tagged with `cell` (the cell rectangle itself excluded).
    pub fn nodes_in_cell(&self, cell: CellId) -> Vec<NodeId> {
        self.scene
            .nodes
            .iter()
            .filter(|n| !matches!(n.element, Element::GridCell(_)) && n.element.cell_id() == Some(cell))
            .map(|n| n.id)
            .collect()
    }

    /// Remove everything, background included.
    pub fn clear(&mut self) {
        let ids: Vec<NodeId> = self.scene.iter().map(|n| n.id).collect();
        for id in ids {
            self.remove(id);
        }
        self.shapes.clear();
    }

    // ========================================================================
    // BACKGROUND
    // ========================================================================

    /// Install `image` as the background, replacing any previous one.
    ///
    /// The background is never selectable and is always cover-fitted to the
    /// canvas once its natural size is known.
    pub fn set_background(&mut self, mut image: ImageElement) -> NodeId {
        image.fit = Some(Fit::Cover {
            width: self.canvas.width_f(),
            height: self.canvas.height_f(),
        });
        image.role = None;
        image.cell_id = None;

        let id = self.alloc_id();
        let element = Element::Image(image);
        self.queue_decode(id, &element);
        if let Some(old) = self.scene.background.take() {
            self.forget(old.id);
        }
        self.scene.background = Some(Node {
            id,
            element,
            selectable: false,
            visible: true,
        });
        self.events.emit(&SceneEvent::BackgroundChanged(Some(id)));
        id
    }

    /// Background from a source, centered on the canvas.
    pub fn set_background_src(&mut self, src: impl Into<String>) -> NodeId {
        let (cx, cy) = self.canvas.center();
        self.set_background(ImageElement::new(src).at(cx, cy))
    }

    pub fn clear_background(&mut self) -> Option<ImageElement> {
        let node = self.scene.background.take()?;
        self.forget(node.id);
        self.events.emit(&SceneEvent::BackgroundChanged(None));
        match node.element {
            Element::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn background(&self) -> Option<&ImageElement> {
        match &self.scene.background.as_ref()?.element {
            Element::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn background_id(&self) -> Option<NodeId> {
        self.scene.background.as_ref().map(|n| n.id)
    }

    // ========================================================================
    // SELECTION AND STYLE
    // ========================================================================

    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    /// Make `id` the active selection (or clear it) and publish its style.
    ///
    /// Non-selectable and hidden nodes cannot be selected; selecting one
    /// clears the selection.
    pub fn select(&mut self, id: Option<NodeId>) -> Option<NodeId> {
        let target = id.filter(|id| {
            self.scene
                .get(*id)
                .is_some_and(|n| n.selectable && n.visible)
        });
        self.selection = target;
        let style = target
            .and_then(|id| self.scene.get(id))
            .map(|n| StyleSnapshot::of(&n.element, &self.style));
        if let Some(style) = &style {
            self.style = style.clone();
        }
        self.events.emit(&SceneEvent::SelectionChanged {
            selected: target,
            style,
        });
        target
    }

    /// Select the topmost selectable node under `(x, y)`; empty canvas clears.
    pub fn click(&mut self, x: f32, y: f32) -> Option<NodeId> {
        let hit = self.hit_test(x, y);
        self.select(hit)
    }

    pub fn hit_test(&self, x: f32, y: f32) -> Option<NodeId> {
        let measure = self.fonts.as_ref();
        self.scene
            .nodes
            .iter()
            .rev()
            .filter(|n| n.selectable && n.visible)
            .find(|n| n.element.bounds(measure).is_some_and(|b| b.contains(x, y)))
            .map(|n| n.id)
    }

    /// Style panel state.
    pub fn style_state(&self) -> &StyleSnapshot {
        &self.style
    }

    pub fn style_state_mut(&mut self) -> &mut StyleSnapshot {
        &mut self.style
    }

    /// Apply a style edit to the selection. Every call that changes the
    /// element publishes one modification event.
    pub fn apply_style(&mut self, property: &StyleProperty) -> bool {
        let Some(id) = self.selection else {
            self.style.merge(property);
            return false;
        };
        let Some(node) = self.scene.get_mut(id) else {
            self.style.merge(property);
            return false;
        };
        let applied = apply_style(&mut node.element, &mut self.style, property);
        if applied {
            self.mirror(id);
            self.events.emit(&SceneEvent::Modified(id));
        }
        applied
    }

    // ========================================================================
    // VIEWPORT
    // ========================================================================

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        self.viewport = Viewport::for_canvas(&self.canvas, zoom);
    }

    // ========================================================================
    // DECODING AND RENDERING
    // ========================================================================

    /// Wait for every pending image decode, then run a render pass.
    ///
    /// Failed loads get the placeholder bitmap; the element keeps its
    /// original source so it is saved unchanged.
    pub async fn settle(&mut self) {
        for (id, src) in std::mem::take(&mut self.queued) {
            self.spawn_on_runtime(id, src);
        }
        while let Some(joined) = self.pending.join_next().await {
            match joined {
                Ok((id, src, result)) => self.finish_decode(id, &src, result),
                Err(e) => warn!(error = %e, "image decode task failed"),
            }
        }
        self.render_pass();
    }

    /// Enforce the size rules that depend on natural image sizes.
    pub fn render_pass(&mut self) {
        self.render_count += 1;
        let canvas = self.canvas;

        let mut refitted = None;
        if let Some(bg) = &mut self.scene.background
            && let Element::Image(img) = &mut bg.element
            && let Some((w, h)) = img.natural
        {
            let scale = canvas.cover_scale(w, h);
            let (cx, cy) = canvas.center();
            let t = &mut img.transform;
            let drifted = (t.scale_x - scale).abs() > SCALE_EPSILON
                || (t.scale_y - scale).abs() > SCALE_EPSILON
                || (t.left - cx).abs() > SCALE_EPSILON
                || (t.top - cy).abs() > SCALE_EPSILON;
            if drifted {
                t.scale_x = scale;
                t.scale_y = scale;
                t.left = cx;
                t.top = cy;
                refitted = Some(bg.id);
            }
        }
        if let Some(id) = refitted {
            debug!(node = %id, "background refitted to cover canvas");
            self.events.emit(&SceneEvent::BackgroundChanged(Some(id)));
        }

        let mut fitted = Vec::new();
        for node in &mut self.scene.nodes {
            if let Element::Image(img) = &mut node.element
                && let (Some(fit), Some((w, h))) = (img.fit, img.natural)
            {
                let scale = fit.scale_for(w, h);
                let t = &mut img.transform;
                let changed = (t.scale_x - scale).abs() > SCALE_EPSILON
                    || (t.scale_y - scale).abs() > SCALE_EPSILON;
                t.scale_x = scale;
                t.scale_y = scale;
                if matches!(fit, Fit::Contain { .. }) {
                    img.fit = None;
                }
                if changed {
                    fitted.push(node.id);
                }
            }
        }
        for id in fitted {
            self.mirror(id);
            self.events.emit(&SceneEvent::Modified(id));
        }
    }

    /// Rasterize the scene at the logical canvas size.
    pub fn rasterize(&self, options: &RenderOptions) -> RgbaImage {
        Rasterizer::new(&self.fonts, &self.canvas).render(&self.scene, options)
    }

    /// What the user sees: guides included, scaled to the viewport.
    pub fn render_viewport(&self) -> RgbaImage {
        let full = self.rasterize(&RenderOptions::preview());
        if (full.width(), full.height()) == (self.viewport.width, self.viewport.height) {
            return full;
        }
        image::imageops::resize(&full, self.viewport.width, self.viewport.height, FilterType::Triangle)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn queue_decode(&mut self, id: NodeId, element: &Element) {
        if let Element::Image(img) = element
            && img.bitmap.is_none()
        {
            self.spawn_decode(id, img.src.clone());
        }
    }

    fn spawn_decode(&mut self, id: NodeId, src: String) {
        if tokio::runtime::Handle::try_current().is_ok() {
            self.spawn_on_runtime(id, src);
        } else {
            self.queued.push((id, src));
        }
    }

    fn spawn_on_runtime(&mut self, id: NodeId, src: String) {
        let loader = self.loader.clone();
        self.pending.spawn(async move {
            let result = loader.load(&src).await;
            (id, src, result)
        });
    }

    fn finish_decode(&mut self, id: NodeId, src: &str, result: Result<DynamicImage, KvError>) {
        let Some(node) = self.scene.get_mut(id) else {
            debug!(node = %id, "decode finished for removed node");
            return;
        };
        let Element::Image(img) = &mut node.element else {
            return;
        };
        if img.src != src {
            debug!(node = %id, "discarding decode of a replaced source");
            return;
        }
        let (bitmap, placeholder) = match result {
            Ok(bitmap) => (bitmap, false),
            Err(e) => {
                warn!(node = %id, src = %abbreviate(src), error = %e, "image failed to load, using placeholder");
                (placeholder_image().clone(), true)
            }
        };
        img.natural = Some((bitmap.width(), bitmap.height()));
        img.bitmap = Some(Arc::new(bitmap));
        img.placeholder = placeholder;
        self.mirror(id);
        self.events.emit(&SceneEvent::Modified(id));
    }

    /// Keep the shape mirror in sync for main-canvas nodes.
    fn mirror(&mut self, id: NodeId) {
        if self.scene.is_background(id) {
            return;
        }
        let Some(node) = self.scene.nodes.iter().find(|n| n.id == id) else {
            return;
        };
        if node.element.is_grid_part() {
            return;
        }
        if let Some(record) = ElementRecord::from_element(&node.element) {
            self.shapes.set(id, record);
        }
    }

    fn forget(&mut self, id: NodeId) {
        if self.selection == Some(id) {
            self.select(None);
        }
        self.shapes.delete(&id);
        self.events.emit(&SceneEvent::Removed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetLoader;
    use crate::scene::{Role, TextElement};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 50, 50, 255])))
    }

    fn composer() -> Composer {
        let loader = MemoryAssetLoader::new()
            .with("bg.png", solid(1000, 1000))
            .with("wide.png", solid(400, 100))
            .with("product.png", solid(200, 400));
        Composer::new(
            CanvasConfig::KV_PORTRAIT,
            Arc::new(loader),
            Arc::new(Fonts::fallback()),
        )
    }

    fn record(c: &mut Composer) -> Arc<Mutex<Vec<SceneEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        c.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        log
    }

    #[tokio::test]
    async fn test_background_cover_after_settle() {
        let mut c = composer();
        let id = c.set_background_src("bg.png");
        assert_eq!(c.pending_decodes(), 1);
        c.settle().await;
        let bg = c.background().unwrap();
        assert!((bg.transform.scale_x - 1.92).abs() < 1e-5);
        assert!((bg.transform.scale_y - 1.92).abs() < 1e-5);
        assert_eq!((bg.transform.left, bg.transform.top), (540.0, 960.0));
        assert!(!c.get(id).unwrap().selectable);
    }

    #[tokio::test]
    async fn test_background_drift_is_corrected() {
        let mut c = composer();
        c.set_background_src("wide.png");
        c.settle().await;
        c.scene.background.as_mut().unwrap().element.transform_mut().unwrap().scale_x = 1.0;
        c.render_pass();
        let bg = c.background().unwrap();
        assert!((bg.transform.scale_x - 19.2).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_failed_load_uses_placeholder_and_keeps_src() {
        let mut c = composer();
        let id = c.add(Element::Image(ImageElement::new("https://nowhere/missing.png")));
        let ok = c.add(Element::Image(ImageElement::new("product.png")));
        c.settle().await;
        let Some(Element::Image(img)) = c.element(id) else { panic!() };
        assert!(img.placeholder);
        assert_eq!(img.src, "https://nowhere/missing.png");
        assert_eq!(img.natural, Some((512, 512)));
        let Some(Element::Image(img)) = c.element(ok) else { panic!() };
        assert!(!img.placeholder);
        assert_eq!(img.natural, Some((200, 400)));
    }

    #[tokio::test]
    async fn test_contain_fit_applied_once() {
        let mut c = composer();
        let id = c.add(Element::Image(
            ImageElement::new("product.png").fit(Fit::Contain {
                width: 100.0,
                height: 100.0,
            }),
        ));
        c.settle().await;
        let Some(Element::Image(img)) = c.element(id) else { panic!() };
        assert!((img.transform.scale_x - 0.25).abs() < 1e-6);
        assert!(img.fit.is_none());
    }

    #[tokio::test]
    async fn test_replace_image_src_preserves_transform() {
        let mut c = composer();
        let mut img = ImageElement::new("product.png").role(Role::ProductImage);
        img.transform.angle = 15.0;
        img.transform.flip_x = true;
        img.transform.left = 300.0;
        img.transform.scale_x = 0.7;
        let id = c.add(Element::Image(img));
        c.settle().await;
        c.replace_image_src(id, "wide.png").unwrap();
        c.settle().await;
        let Some(Element::Image(img)) = c.element(id) else { panic!() };
        assert_eq!(img.transform.angle, 15.0);
        assert!(img.transform.flip_x);
        assert_eq!(img.transform.left, 300.0);
        assert_eq!(img.transform.scale_x, 0.7);
        assert_eq!(img.role, Some(Role::ProductImage));
        assert_eq!(img.natural, Some((400, 100)));
    }

    #[test]
    fn test_click_selects_topmost_and_empty_clears() {
        let mut c = composer();
        let log = record(&mut c);
        let below = c.add(Element::Text(TextElement::new("AAAA").at(540.0, 960.0)));
        let above = c.add(Element::Text(TextElement::new("BB").at(540.0, 960.0).size(20.0)));
        assert_eq!(c.click(540.0, 960.0), Some(above));
        assert_eq!(c.click(580.0, 960.0), Some(below));
        assert_eq!(c.click(10.0, 10.0), None);
        assert_eq!(c.selection(), None);
        let last = log.lock().unwrap().last().cloned();
        assert_eq!(
            last,
            Some(SceneEvent::SelectionChanged {
                selected: None,
                style: None
            })
        );
    }

    #[test]
    fn test_apply_style_emits_one_event_per_call() {
        let mut c = composer();
        let id = c.add(Element::Text(TextElement::new("PROMO")));
        c.select(Some(id));
        let log = record(&mut c);
        for size in [40.0, 41.0, 42.0] {
            assert!(c.apply_style(&StyleProperty::FontSize(size)));
        }
        let modified = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == SceneEvent::Modified(id))
            .count();
        assert_eq!(modified, 3);
    }

    #[test]
    fn test_style_without_selection_only_updates_panel() {
        let mut c = composer();
        assert!(!c.apply_style(&StyleProperty::Fill("#123456".into())));
        assert_eq!(c.style_state().fill, "#123456");
    }

    #[test]
    fn test_shapes_mirror_main_canvas_only() {
        let mut c = composer();
        let text = c.add(Element::Text(TextElement::new("A")));
        c.add(Element::Text(TextElement::new("B").in_cell(CellId::new())));
        c.set_background_src("bg.png");
        assert_eq!(c.shapes().len(), 1);
        assert!(c.shapes().has(&text));
        c.remove(text);
        assert!(c.shapes().is_empty());
    }

    #[test]
    fn test_snap_rounds_moves() {
        let mut c = composer();
        let id = c.add(Element::Text(TextElement::new("A")));
        c.set_snap(Some(20.0));
        c.move_element(id, 109.0, 231.0);
        let t = c.element(id).unwrap().transform().unwrap();
        assert_eq!((t.left, t.top), (100.0, 240.0));
    }

    #[test]
    fn test_remove_selected_clears_selection() {
        let mut c = composer();
        let id = c.add(Element::Text(TextElement::new("A")));
        c.select(Some(id));
        c.remove(id);
        assert_eq!(c.selection(), None);
        assert!(c.remove(id).is_none());
    }

    #[test]
    fn test_zoom_changes_viewport_only() {
        let mut c = composer();
        c.set_zoom(0.3);
        assert_eq!(c.viewport().width, 324);
        assert_eq!(c.viewport().height, 576);
        assert_eq!(c.canvas().width, 1080);
    }

    #[test]
    fn test_queued_without_runtime() {
        let mut c = composer();
        c.add(Element::Image(ImageElement::new("bg.png")));
        assert_eq!(c.pending_decodes(), 1);
    }
}
