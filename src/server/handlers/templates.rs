//! Template CRUD and rendering.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::editor::KvEditor;
use crate::export::Exporter;
use crate::scene::Composer;
use crate::template::{DEFAULT_TEMPLATE_DESCRIPTION, DEFAULT_TEMPLATE_NAME, ElementRecord, Template};

use super::super::state::AppState;
use super::{ApiError, api_error, from_kv};

/// Request body for creating a template.
#[derive(Debug, Deserialize)]
pub struct CreateTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
}

/// Request body for saving changes. Omitted fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub elements: Option<Vec<ElementRecord>>,
}

/// Request body for rendering.
#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    /// Product code to apply before exporting.
    pub code: Option<String>,
    /// Run the product image through the background-removal service.
    #[serde(default, rename = "removeBackground")]
    pub remove_background: bool,
}

fn find(state: &AppState, id: &str) -> Result<Template, ApiError> {
    state
        .templates
        .list()
        .map_err(from_kv)?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Template '{}' not found", id)))
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

/// GET /api/templates
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Template>>, ApiError> {
    state.templates.list().map(Json).map_err(from_kv)
}

/// GET /api/templates/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Template>, ApiError> {
    find(&state, &id).map(Json)
}

/// POST /api/templates
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTemplate>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    let template = Template::new(
        &or_default(&body.name, DEFAULT_TEMPLATE_NAME),
        &or_default(&body.description, DEFAULT_TEMPLATE_DESCRIPTION),
        body.elements,
    );
    let saved = state.templates.insert(template).map_err(from_kv)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// PUT /api/templates/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTemplate>,
) -> Result<Json<Template>, ApiError> {
    let mut template = find(&state, &id)?;
    if let Some(name) = body.name {
        template.name = or_default(&name, DEFAULT_TEMPLATE_NAME);
    }
    if let Some(description) = body.description {
        template.description = or_default(&description, DEFAULT_TEMPLATE_DESCRIPTION);
    }
    if let Some(elements) = body.elements {
        template.elements = elements;
    }
    state.templates.update(template).map(Json).map_err(from_kv)
}

/// DELETE /api/templates/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.templates.delete(&id).map_err(from_kv)? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(api_error(StatusCode::NOT_FOUND, format!("Template '{}' not found", id))),
    }
}

/// POST /api/templates/:id/render - Export the template as PNG.
///
/// The body is optional; `{"code": "..."}` applies that product first and
/// `"removeBackground": true` also cuts out its image.
pub async fn render(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RenderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RenderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)))?
    };
    let template = find(&state, &id)?;

    let composer = Composer::new(state.canvas, state.loader.clone(), state.fonts.clone());
    let mut editor = KvEditor::new(composer, state.catalog.clone())
        .with_proxy_hosts(state.config.services.proxy_hosts.clone());
    if let Some(remover) = &state.remover {
        editor = editor.with_remover(remover.clone());
    }
    editor.load_template(&template).await;
    if let Some(code) = request.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        editor.search_product(code).await.map_err(from_kv)?;
    }
    if request.remove_background {
        editor.remove_product_background().await.map_err(from_kv)?;
    }
    let image = editor.export(&Exporter::default()).await.map_err(from_kv)?;

    info!(template = %id, code = ?request.code, bytes = image.png.len(), "template rendered");
    Ok(([(header::CONTENT_TYPE, "image/png")], image.png))
}
