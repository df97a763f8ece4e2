//! # HTTP Service
//!
//! Background uploads, template storage and poster rendering over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! kvgen serve --listen 0.0.0.0:3000 --public-dir ./public
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/background` | multipart `file` upload, returns `{success, filePath}` |
//! | GET | `/uploads/*path` | uploaded files |
//! | GET | `/api/templates` | template list |
//! | POST | `/api/templates` | save a new template |
//! | GET | `/api/templates/:id` | one template |
//! | PUT | `/api/templates/:id` | save changes |
//! | DELETE | `/api/templates/:id` | delete |
//! | POST | `/api/templates/:id/render` | PNG export, optionally with `{"code": ...}` applied |
//! | GET | `/api/products/:code` | catalog lookup |

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::error::KvError;

/// Upload size limit.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(state.config.public_dir.join("uploads"));

    Router::new()
        // Uploads
        .route(
            "/api/background",
            post(handlers::upload::background).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service("/uploads", uploads)
        // Templates
        .route(
            "/api/templates",
            get(handlers::templates::list).post(handlers::templates::create),
        )
        .route(
            "/api/templates/:id",
            get(handlers::templates::get)
                .put(handlers::templates::update)
                .delete(handlers::templates::delete),
        )
        .route("/api/templates/:id/render", post(handlers::templates::render))
        // Catalog
        .route("/api/products/:code", get(handlers::products::search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use kvgen::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), kvgen::KvError> {
/// serve(ServerConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), KvError> {
    let listen_addr = config.listen_addr.clone();
    let public_dir = config.public_dir.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| KvError::Input(format!("Failed to bind to {}: {}", listen_addr, e)))?;

    info!(addr = %listen_addr, public_dir = %public_dir.display(), "kvgen server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
