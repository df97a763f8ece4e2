//! # Image Assets
//!
//! Resolves element image sources to decoded bitmaps.
//!
//! A source is one of:
//! - a `data:` URL with base64 payload (background-removal results, embedded images),
//! - an `http(s)://` URL (product photos, proxied through [`proxy_image_url`]),
//! - a public path such as `/uploads/backgrounds/<uuid>.png`, resolved against
//!   the public directory the upload endpoint writes to,
//! - [`PLACEHOLDER_SRC`], the built-in default product image.
//!
//! Loading is asynchronous; the composition engine spawns one decode task per
//! image and joins them explicitly before any size-dependent layout.

mod placeholder;

pub use placeholder::{PLACEHOLDER_SRC, placeholder_image};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

use crate::error::KvError;

/// Public image proxy used to avoid cross-origin failures on some CDNs.
const IMAGE_PROXY: &str = "https://images.weserv.nl/";

/// Resolves an image source to a decoded bitmap.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, src: &str) -> Result<DynamicImage, KvError>;
}

/// Loader for data URLs, HTTP URLs and files under a public directory.
pub struct HttpAssetLoader {
    client: reqwest::Client,
    public_dir: PathBuf,
}

impl HttpAssetLoader {
    pub fn new(public_dir: impl Into<PathBuf>) -> Result<Self, KvError> {
        let client = reqwest::Client::builder()
            .user_agent("kvgen/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, public_dir))
    }

    pub fn with_client(client: reqwest::Client, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            public_dir: public_dir.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<DynamicImage, KvError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KvError::Asset(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(KvError::Asset(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| KvError::Asset(format!("Failed to read image data: {}", e)))?;
        decode_bytes(&bytes)
    }

    async fn read_public(&self, path: &str) -> Result<DynamicImage, KvError> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(KvError::Input(format!("Path escapes public dir: {}", path)));
        }
        let full = self.public_dir.join(relative);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| KvError::Asset(format!("Failed to read {}: {}", full.display(), e)))?;
        decode_bytes(&bytes)
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn load(&self, src: &str) -> Result<DynamicImage, KvError> {
        debug!(src = %abbreviate(src), "loading image");
        if src == PLACEHOLDER_SRC {
            Ok(placeholder_image().clone())
        } else if src.starts_with("data:") {
            decode_data_url(src)
        } else if src.starts_with("http://") || src.starts_with("https://") {
            self.fetch(src).await
        } else if src.is_empty() {
            Err(KvError::Asset("Empty image source".to_string()))
        } else {
            self.read_public(src).await
        }
    }
}

/// In-memory loader keyed by source string. Used for offline rendering and tests.
#[derive(Default)]
pub struct MemoryAssetLoader {
    images: RwLock<HashMap<String, DynamicImage>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, src: impl Into<String>, image: DynamicImage) {
        if let Ok(mut images) = self.images.write() {
            images.insert(src.into(), image);
        }
    }

    pub fn with(self, src: impl Into<String>, image: DynamicImage) -> Self {
        self.insert(src, image);
        self
    }
}

#[async_trait]
impl AssetLoader for MemoryAssetLoader {
    async fn load(&self, src: &str) -> Result<DynamicImage, KvError> {
        if src == PLACEHOLDER_SRC {
            return Ok(placeholder_image().clone());
        }
        if src.starts_with("data:") {
            return decode_data_url(src);
        }
        let images = self
            .images
            .read()
            .map_err(|_| KvError::Asset("Image table poisoned".to_string()))?;
        images
            .get(src)
            .cloned()
            .ok_or_else(|| KvError::Asset(format!("Unknown image source: {}", abbreviate(src))))
    }
}

/// Rewrite product image URLs hosted on `proxy_hosts` through the public
/// image proxy. `data:` URLs and other hosts pass through unchanged.
pub fn proxy_image_url(url: &str, proxy_hosts: &[String]) -> String {
    if url.is_empty() || url.starts_with("data:") {
        return url.to_string();
    }
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
    let Some(host) = host else {
        return url.to_string();
    };
    if !proxy_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
        return url.to_string();
    }
    match reqwest::Url::parse_with_params(IMAGE_PROXY, &[("url", url), ("n", "1")]) {
        Ok(proxied) => proxied.to_string(),
        Err(_) => url.to_string(),
    }
}

/// Decode encoded image bytes (PNG, JPEG, WebP, ...).
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, KvError> {
    image::load_from_memory(bytes)
        .map_err(|e| KvError::Asset(format!("Failed to decode image: {}", e)))
}

/// Decode a `data:<mime>;base64,<payload>` URL. A bare base64 payload is accepted too.
pub fn decode_data_url(src: &str) -> Result<DynamicImage, KvError> {
    let payload = match src.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| KvError::Asset("Malformed data URL".to_string()))?;
            if !meta.ends_with(";base64") {
                return Err(KvError::Asset("Only base64 data URLs are supported".to_string()));
            }
            data
        }
        None => src,
    };
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| KvError::Asset(format!("Invalid base64 image: {}", e)))?;
    decode_bytes(&bytes)
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, KvError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode an image as a PNG data URL.
pub fn png_data_url(image: &DynamicImage) -> Result<String, KvError> {
    let bytes = encode_png(image)?;
    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(&bytes)
    ))
}

/// Normalize a base64 payload or data URL to a PNG data URL.
pub fn as_data_url(payload: &str) -> String {
    if payload.starts_with("data:") {
        payload.to_string()
    } else {
        format!("data:image/png;base64,{}", payload)
    }
}

/// Shorten long sources (data URLs) for log lines.
pub(crate) fn abbreviate(src: &str) -> String {
    if src.len() > 80 {
        let cut = src
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= 64)
            .last()
            .unwrap_or(0);
        format!("{}...", &src[..cut])
    } else {
        src.to_string()
    }
}
