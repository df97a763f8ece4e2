//! # Poster Pipeline Tests
//!
//! End-to-end checks over the public API: template round-trip, background
//! fitting, grid geometry and remap, export resolution, text wrap and the
//! product search flow.

use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbaImage};
use pretty_assertions::assert_eq;

use kvgen::{
    CanvasConfig, Composer, KvError, Template,
    assets::MemoryAssetLoader,
    catalog::{Product, StaticCatalog},
    editor::KvEditor,
    export::Exporter,
    grid::{GridEngine, GridLayout},
    scene::{Element, ImageElement, Role, Shadow, TextAlign, TextElement},
    template::{ElementRecord, RoleInference, deserialize_into, serialize_scene},
    text::{Fonts, wrap_text},
};

// ============================================================================
// FIXTURES
// ============================================================================

fn solid(w: u32, h: u32, color: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color)))
}

fn loader() -> MemoryAssetLoader {
    MemoryAssetLoader::new()
        .with("bg.png", solid(1000, 1000, [0, 0, 128, 255]))
        .with("tall.png", solid(500, 2000, [0, 128, 0, 255]))
        .with("arroz.png", solid(400, 200, [255, 0, 0, 255]))
}

fn composer() -> Composer {
    Composer::new(
        CanvasConfig::KV_PORTRAIT,
        Arc::new(loader()),
        Arc::new(Fonts::fallback()),
    )
}

fn catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new(vec![
        Product {
            codprod: "123".into(),
            codauxiliar: "7891234567890".into(),
            descricao: "ARROZ 5KG".into(),
            link_imagem: Some("arroz.png".into()),
            vl_oferta: 12.5,
        },
        Product {
            codprod: "456".into(),
            codauxiliar: "7890000000456".into(),
            descricao: "feijão preto".into(),
            link_imagem: Some("arroz.png".into()),
            vl_oferta: 7.0,
        },
    ]))
}

fn text_with_role(composer: &Composer, role: Role) -> Option<String> {
    let id = composer.find_by_role(&role)?;
    match composer.element(id) {
        Some(Element::Text(t)) => Some(t.text.clone()),
        _ => None,
    }
}

// ============================================================================
// TEMPLATE ROUND-TRIP
// ============================================================================

#[tokio::test]
async fn test_scene_roundtrip_preserves_geometry_and_style() {
    let mut original = composer();
    original.set_background_src("bg.png");
    let mut product = ImageElement::new("arroz.png")
        .at(540.0, 800.0)
        .role(Role::ProductImage);
    product.transform.scale_x = 1.5;
    product.transform.scale_y = 1.5;
    product.transform.angle = 12.0;
    product.shadow = Some(Shadow {
        color: "rgba(0,0,0,0.5)".into(),
        blur: 15.0,
        offset_x: 0.0,
        offset_y: 15.0,
    });
    original.add(Element::Image(product));

    let mut price = TextElement::new("R$ 9,90")
        .at(540.0, 1500.0)
        .role(Role::Price)
        .size(96.0)
        .fill("#ffcc00");
    price.stroke = Some("#000000".into());
    price.stroke_width = 3.0;
    price.text_align = TextAlign::Left;
    price.transform.flip_x = true;
    original.add(Element::Text(price));
    original.add(Element::Text(
        TextElement::new("Oferta válida até 30/04").at(540.0, 1850.0),
    ));
    original.settle().await;

    let records = serialize_scene(&original);
    assert_eq!(records.len(), 4);
    assert!(records[0].is_background);

    let mut restored = composer();
    let report = deserialize_into(&mut restored, &records, RoleInference::Strict).await;
    assert_eq!(report.restored, 4);
    assert_eq!(report.placeholders, 0);
    assert_eq!(serialize_scene(&restored), records);
}

#[tokio::test]
async fn test_roundtrip_through_json() {
    let mut original = composer();
    original.set_background_src("tall.png");
    original.add(Element::Text(
        TextElement::new("ARROZ").at(100.0, 200.0).role(Role::Description),
    ));
    original.settle().await;

    let template = Template::new("Oferta", "", serialize_scene(&original));
    let json = serde_json::to_string(&template).unwrap();
    let back: Template = serde_json::from_str(&json).unwrap();
    assert_eq!(back, template);

    let mut restored = composer();
    deserialize_into(&mut restored, &back.elements, RoleInference::Strict).await;
    assert_eq!(
        text_with_role(&restored, Role::Description).as_deref(),
        Some("ARROZ")
    );
}

// ============================================================================
// BACKGROUND
// ============================================================================

#[tokio::test]
async fn test_background_cover_scale_and_center() {
    for (src, w, h) in [("bg.png", 1000.0f32, 1000.0f32), ("tall.png", 500.0, 2000.0)] {
        let mut c = composer();
        c.set_background_src(src);
        c.settle().await;
        let bg = c.background().unwrap();
        let expected = (1080.0 / w).max(1920.0 / h);
        assert!((bg.transform.scale_x - expected).abs() < 1e-4, "{}", src);
        assert!((bg.transform.scale_y - expected).abs() < 1e-4, "{}", src);
        assert_eq!((bg.transform.left, bg.transform.top), (540.0, 960.0));
    }
}

// ============================================================================
// GRID
// ============================================================================

#[test]
fn test_grid_cells_partition_the_canvas() {
    let layout = GridLayout::new(3, 2).with_gap(20.0).with_scale(0.8);
    let mut grid = GridEngine::new(composer(), catalog());
    grid.apply_layout(layout);

    let cells = grid.cells();
    assert_eq!(cells.len(), 6);
    let expected_w = 1080.0 * 0.8 / 3.0 - 20.0;
    let expected_h = 1920.0 * 0.8 / 2.0 - 20.0;

    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for (_, cell) in &cells {
        assert!((cell.width - expected_w).abs() < 1e-3);
        assert!((cell.height - expected_h).abs() < 1e-3);
        let (cx, cy) = (cell.transform.left, cell.transform.top);
        min_x = min_x.min(cx - cell.width / 2.0);
        max_x = max_x.max(cx + cell.width / 2.0);
        min_y = min_y.min(cy - cell.height / 2.0);
        max_y = max_y.max(cy + cell.height / 2.0);
    }
    assert!(((min_x + max_x) / 2.0 - 540.0).abs() < 1e-3);
    assert!(((min_y + max_y) / 2.0 - 960.0).abs() < 1e-3);
}

#[tokio::test]
async fn test_grid_resize_keeps_first_cell_and_drops_second() {
    let mut grid = GridEngine::new(composer(), catalog());
    grid.apply_layout(GridLayout::new(2, 2));
    let first = grid.cell_at(0, 0).unwrap().id;
    let second = grid.cell_at(0, 1).unwrap().id;
    grid.assign_product(first, "123").await.unwrap();
    grid.assign_product(second, "456").await.unwrap();

    grid.apply_layout(GridLayout::new(1, 2));

    let codes: Vec<Option<String>> = grid
        .cells()
        .iter()
        .map(|(_, c)| c.product.as_ref().map(|p| p.code.clone()))
        .collect();
    assert_eq!(codes, vec![Some("123".to_string()), None]);
}

// ============================================================================
// EXPORT
// ============================================================================

#[tokio::test]
async fn test_export_resolution_ignores_zoom() {
    let mut outputs = Vec::new();
    for zoom in [0.3, 1.0] {
        let mut c = composer();
        c.set_background_src("bg.png");
        c.add(Element::Text(TextElement::new("R$ 9,90").at(540.0, 1500.0)));
        c.set_zoom(zoom);

        let exported = Exporter::default().export(&mut c).await.unwrap();
        let decoded = image::load_from_memory(&exported.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
        assert_eq!(c.viewport().zoom, zoom);
        outputs.push(exported.png);
    }
    assert_eq!(outputs[0], outputs[1]);
}

// ============================================================================
// TEXT
// ============================================================================

#[test]
fn test_wrap_is_stable_when_rewrapped() {
    let fonts = Fonts::fallback();
    let description = "BISCOITO RECHEADO SABOR CHOCOLATE COM MORANGO 140G";
    for width in [120.0, 230.0, 460.0] {
        let once = wrap_text(&fonts, description, 24.0, width);
        let twice = wrap_text(&fonts, &once, 24.0, width);
        assert_eq!(twice, once);
    }
}

// ============================================================================
// PRODUCT SEARCH
// ============================================================================

fn offer_template() -> Template {
    Template::new(
        "Oferta",
        "",
        vec![
            ElementRecord {
                kind: "image".into(),
                is_background: true,
                src: Some("bg.png".into()),
                left: 540.0,
                top: 960.0,
                ..Default::default()
            },
            ElementRecord {
                kind: "text".into(),
                id: Some(Role::Price),
                text: Some("R$ 9,90".into()),
                left: 540.0,
                top: 1500.0,
                font_size: Some(120.0),
                ..Default::default()
            },
        ],
    )
}

#[tokio::test]
async fn test_search_fills_price_and_description() {
    let mut editor = KvEditor::new(composer(), catalog());
    let report = editor.load_template(&offer_template()).await;
    assert_eq!(report.restored, 2);
    let background_before = editor.composer().background().unwrap().clone();

    let product = editor.search_product("123").await.unwrap();
    assert_eq!(product.descricao, "ARROZ 5KG");

    let c = editor.composer();
    assert_eq!(text_with_role(c, Role::Price).as_deref(), Some("R$ 12.50"));
    assert_eq!(text_with_role(c, Role::Description).as_deref(), Some("ARROZ 5KG"));

    let background_after = c.background().unwrap();
    assert_eq!(background_after.src, background_before.src);
    assert_eq!(background_after.transform, background_before.transform);
}

#[tokio::test]
async fn test_search_by_barcode_and_undo() {
    let mut editor = KvEditor::new(composer(), catalog());
    editor.load_template(&offer_template()).await;

    editor.search_product("7890000000456").await.unwrap();
    assert_eq!(
        text_with_role(editor.composer(), Role::Description).as_deref(),
        Some("FEIJÃO PRETO")
    );

    assert!(editor.undo().await);
    let c = editor.composer();
    assert_eq!(text_with_role(c, Role::Price).as_deref(), Some("R$ 9,90"));
    assert!(c.find_by_role(&Role::Description).is_none());
}

#[tokio::test]
async fn test_restore_with_broken_image_uses_placeholder_and_continues() {
    let template = Template::new(
        "Oferta",
        "",
        vec![
            ElementRecord {
                kind: "image".into(),
                is_background: true,
                src: Some("bg.png".into()),
                left: 540.0,
                top: 960.0,
                ..Default::default()
            },
            ElementRecord {
                kind: "image".into(),
                id: Some(Role::ProductImage),
                src: Some("missing.png".into()),
                left: 540.0,
                top: 800.0,
                scale_x: 0.5,
                scale_y: 0.5,
                angle: 8.0,
                ..Default::default()
            },
            ElementRecord {
                kind: "image".into(),
                src: Some("arroz.png".into()),
                left: 200.0,
                top: 300.0,
                scale_x: 0.25,
                scale_y: 0.25,
                ..Default::default()
            },
            ElementRecord {
                kind: "text".into(),
                id: Some(Role::Price),
                text: Some("R$ 9,90".into()),
                left: 540.0,
                top: 1500.0,
                font_size: Some(120.0),
                ..Default::default()
            },
        ],
    );

    let mut editor = KvEditor::new(composer(), catalog());
    let report = editor.load_template(&template).await;
    assert_eq!(report.placeholders, 1);
    assert_eq!(report.restored, 4);

    let c = editor.composer();
    let broken = c.find_by_role(&Role::ProductImage).unwrap();
    let Some(Element::Image(broken)) = c.element(broken) else {
        panic!("expected the product image")
    };
    assert!(broken.placeholder);
    assert!(broken.bitmap.is_some());
    assert_eq!(broken.src, "missing.png");
    assert_eq!(
        (broken.transform.left, broken.transform.top, broken.transform.scale_x, broken.transform.angle),
        (540.0, 800.0, 0.5, 8.0)
    );

    let loaded = c
        .scene()
        .nodes
        .iter()
        .find_map(|n| match &n.element {
            Element::Image(img) if img.src == "arroz.png" => Some(img.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!loaded.placeholder);
    assert_eq!(loaded.natural, Some((400, 200)));
    assert_eq!(
        (loaded.transform.left, loaded.transform.top, loaded.transform.scale_x),
        (200.0, 300.0, 0.25)
    );

    let price = c.find_by_role(&Role::Price).unwrap();
    let Some(Element::Text(price)) = c.element(price) else {
        panic!("expected the price text")
    };
    assert_eq!(price.text, "R$ 9,90");
    assert_eq!((price.transform.left, price.transform.top), (540.0, 1500.0));
    assert_eq!(price.font_size, 120.0);

    let bg = c.background().unwrap();
    assert!((bg.transform.scale_x - 1.92).abs() < 1e-4);
    assert_eq!((bg.transform.left, bg.transform.top), (540.0, 960.0));

    // saving keeps the intended source
    let saved = serialize_scene(c);
    assert!(saved.iter().any(|r| r.src.as_deref() == Some("missing.png")));
}

#[tokio::test]
async fn test_unknown_product_leaves_template_alone() {
    let mut editor = KvEditor::new(composer(), catalog());
    editor.load_template(&offer_template()).await;
    let before = serialize_scene(editor.composer());

    let err = editor.search_product("000").await.unwrap_err();
    assert!(matches!(err, KvError::ProductNotFound(code) if code == "000"));
    assert_eq!(serialize_scene(editor.composer()), before);
}
