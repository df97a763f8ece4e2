//! Catalog lookup.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::catalog::Product;
use crate::error::KvError;

use super::super::state::AppState;
use super::{ApiError, from_kv};

/// GET /api/products/:code - Catalog rows for one code.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let rows = state.catalog.search(&code).await.map_err(from_kv)?;
    if rows.is_empty() {
        return Err(from_kv(KvError::ProductNotFound(code)));
    }
    Ok(Json(rows))
}
