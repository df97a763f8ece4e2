//! # HTTP Service Tests
//!
//! Requests go straight into the router with `oneshot`; no socket is bound.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::{Value, json};
use tower::ServiceExt;

use kvgen::{
    assets::MemoryAssetLoader,
    catalog::{Product, StaticCatalog},
    server::{AppState, ServerConfig, router},
    storage::{MemoryStorage, TemplateStore},
    text::Fonts,
};

fn app() -> Router {
    let loader = MemoryAssetLoader::new()
        .with(
            "bg.png",
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(108, 192, Rgba([0, 0, 200, 255]))),
        )
        .with(
            "arroz.png",
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([200, 0, 0, 255]))),
        );
    let catalog = StaticCatalog::new(vec![Product {
        codprod: "123".into(),
        codauxiliar: "7891234567890".into(),
        descricao: "arroz 5kg".into(),
        link_imagem: Some("arroz.png".into()),
        vl_oferta: 12.5,
    }]);
    let state = AppState::from_parts(
        ServerConfig {
            public_dir: std::env::temp_dir().join(format!("kvgen-test-{}", uuid::Uuid::new_v4())),
            ..Default::default()
        },
        TemplateStore::new(Arc::new(MemoryStorage::new())),
        Arc::new(catalog),
        Arc::new(loader),
        Arc::new(Fonts::fallback()),
    );
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn offer_elements() -> Value {
    json!([
        {"type": "image", "isBackground": true, "src": "bg.png", "left": 540, "top": 960},
        {"type": "text", "id": "price", "text": "R$ 9,90", "left": 540, "top": 1500, "fontSize": 120}
    ])
}

#[tokio::test]
async fn test_template_lifecycle() {
    let app = app();

    let (status, list) = send_json(&app, empty_request("GET", "/api/templates")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));

    let (status, created) = send_json(
        &app,
        json_request(
            "POST",
            "/api/templates",
            json!({"name": "Oferta", "elements": offer_elements()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Oferta");
    assert_eq!(created["description"], "Sem descrição");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send_json(&app, empty_request("GET", &format!("/api/templates/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["elements"].as_array().unwrap().len(), 2);

    let (status, updated) = send_json(
        &app,
        json_request(
            "PUT",
            &format!("/api/templates/{}", id),
            json!({"name": "  ", "elements": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Template sem nome");
    assert_eq!(updated["elements"], json!([]));
    assert!(updated["lastUpdated"].is_string());

    let (status, _) = send(&app, empty_request("DELETE", &format!("/api/templates/{}", id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send_json(&app, empty_request("GET", &format!("/api/templates/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(&id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_are_all_kept() {
    let app = app();
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let app = app.clone();
        tasks.spawn(async move {
            let (status, _) = send_json(
                &app,
                json_request("POST", "/api/templates", json!({"name": format!("KV {}", i)})),
            )
            .await;
            status
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::CREATED);
    }

    let (_, list) = send_json(&app, empty_request("GET", "/api/templates")).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 20);
    let mut ids: Vec<&str> = list.iter().map(|t| t["id"].as_str().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn test_delete_unknown_template() {
    let (status, _) = send(&app(), empty_request("DELETE", "/api/templates/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_lookup() {
    let app = app();

    let (status, rows) = send_json(&app, empty_request("GET", "/api/products/7891234567890")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["codprod"], "123");
    assert_eq!(rows[0]["vl_oferta"], 12.5);

    let (status, body) = send_json(&app, empty_request("GET", "/api/products/000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_render_template_with_product() {
    let app = app();
    let (_, created) = send_json(
        &app,
        json_request(
            "POST",
            "/api/templates",
            json!({"name": "Oferta", "elements": offer_elements()}),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/templates/{}/render", id),
            json!({"code": "123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let png = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1080, 1920));

    // no body renders the template as stored
    let (status, png) = send(&app, empty_request("POST", &format!("/api/templates/{}/render", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(png.starts_with(b"\x89PNG"));

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/templates/{}/render", id),
            json!({"code": "000"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_requires_file() {
    let boundary = "kvgenboundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/background")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send_json(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_upload_stores_background() {
    let app = app();
    let boundary = "kvgenboundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"fundo.PNG\"\r\nContent-Type: image/png\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend_from_slice(b"\x89PNG\r\n\x1a\nnot really a png");
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/api/background")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let path = json["filePath"].as_str().unwrap();
    assert!(path.starts_with("/uploads/backgrounds/"));
    // extension kept as uploaded
    assert!(path.ends_with(".PNG"));

    // served back from the uploads directory
    let (status, bytes) = send(&app, empty_request("GET", path)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"\x89PNG"));
}
