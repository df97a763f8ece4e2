//! Background image upload.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::super::state::AppState;
use super::{ApiError, api_error};

/// Response from the upload endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Public path of the stored file, e.g. `/uploads/backgrounds/<uuid>.png`
    pub file_path: String,
}

/// Extension as uploaded, if it names an image type.
fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    let mime = mime_guess::from_ext(&ext.to_ascii_lowercase()).first()?;
    (mime.type_() == mime_guess::mime::IMAGE).then(|| ext.to_string())
}

/// POST /api/background - Store an uploaded background under a random name.
pub async fn background(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e)))?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }

    let (filename, bytes) = upload
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file provided"))?;
    let ext = image_extension(&filename)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Only image files are accepted"))?;

    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let dir = state.config.backgrounds_dir();
    let stored = async {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), &bytes).await
    }
    .await;
    if let Err(e) = stored {
        error!(dir = %dir.display(), error = %e, "background upload failed");
        return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error uploading file"));
    }

    info!(file = %name, bytes = bytes.len(), "background uploaded");
    Ok(Json(UploadResponse {
        success: true,
        file_path: format!("/uploads/backgrounds/{}", name),
    }))
}
