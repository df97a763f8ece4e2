//! # Product Catalog and Background Removal
//!
//! Clients for the two external services the editor depends on:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | search | `GET {base}/produtos/{code}` | `[Product]` |
//! | batch lookup | `POST {base}/produtos/lote {"codigos": [...]}` | `[Product]` |
//! | background removal | `POST {url} {"image": <base64 png>}` | `{"processedImage": <base64 or data URL>}` |
//!
//! Each call is a single request with no retry. A non-2xx status or an
//! unreadable body is a [`KvError::Network`]; callers apply nothing on error.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::assets::as_data_url;
use crate::error::KvError;

/// One catalog row. Field names follow the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "string_or_number")]
    pub codprod: String,
    /// Barcode.
    #[serde(default, deserialize_with = "string_or_number")]
    pub codauxiliar: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub link_imagem: Option<String>,
    /// Offer price; `0` when there is none.
    #[serde(default, deserialize_with = "number_or_string")]
    pub vl_oferta: f64,
}

impl Product {
    /// Description as shown on posters.
    pub fn display_description(&self) -> String {
        self.descricao.trim().to_uppercase()
    }

    /// Formatted offer price, only when there is one.
    pub fn price_label(&self) -> Option<String> {
        (self.vl_oferta > 0.0).then(|| format_price(self.vl_oferta))
    }

    /// Image URL, if the product has a usable one.
    pub fn image_url(&self) -> Option<&str> {
        self.link_imagem
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// `R$ 12.50` (two decimals, dot separator).
pub fn format_price(value: f64) -> String {
    format!("R$ {:.2}", value)
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Option::<Raw>::deserialize(de)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Int(n)) => n.to_string(),
        Some(Raw::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

fn number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(de)? {
        Some(Raw::Number(n)) => n,
        Some(Raw::Text(s)) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        None => 0.0,
    })
}

/// Product lookup.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Rows for one product code. An empty list means "not found".
    async fn search(&self, code: &str) -> Result<Vec<Product>, KvError>;

    /// Rows for a list of barcodes.
    async fn lookup_batch(&self, codes: &[String]) -> Result<Vec<Product>, KvError>;
}

/// Background-removal service.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Takes a base64 PNG, returns the processed image as a data URL.
    async fn remove_background(&self, png_base64: &str) -> Result<String, KvError>;
}

fn http_client() -> Result<reqwest::Client, KvError> {
    Ok(reqwest::Client::builder()
        .user_agent("kvgen/0.1")
        .timeout(Duration::from_secs(60))
        .build()?)
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response, KvError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(100).collect();
    warn!(%status, what, "service returned an error");
    Err(KvError::Network(format!("{} failed: HTTP {} {}", what, status, snippet)))
}

/// Catalog service client.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> Result<Self, KvError> {
        Self::with_client(http_client()?, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, KvError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| KvError::Input(format!("Invalid catalog URL '{}': {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, KvError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KvError::Input(format!("Catalog URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    codigos: &'a [String],
}

#[async_trait]
impl ProductCatalog for HttpCatalog {
    async fn search(&self, code: &str) -> Result<Vec<Product>, KvError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(KvError::Input("Product code is empty".to_string()));
        }
        let url = self.endpoint(&["produtos", code])?;
        debug!(%url, "searching product");
        let response = self.client.get(url).send().await?;
        let products = ensure_success(response, "Product search")
            .await?
            .json::<Vec<Product>>()
            .await?;
        Ok(products)
    }

    async fn lookup_batch(&self, codes: &[String]) -> Result<Vec<Product>, KvError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&["produtos", "lote"])?;
        debug!(%url, count = codes.len(), "batch product lookup");
        let response = self
            .client
            .post(url)
            .json(&BatchRequest { codigos: codes })
            .send()
            .await?;
        let products = ensure_success(response, "Batch lookup")
            .await?
            .json::<Vec<Product>>()
            .await?;
        Ok(products)
    }
}

/// Background-removal service client.
pub struct HttpBackgroundRemover {
    client: reqwest::Client,
    url: String,
}

impl HttpBackgroundRemover {
    pub fn new(url: impl Into<String>) -> Result<Self, KvError> {
        Ok(Self::with_client(http_client()?, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveResponse {
    processed_image: String,
}

#[async_trait]
impl BackgroundRemover for HttpBackgroundRemover {
    async fn remove_background(&self, png_base64: &str) -> Result<String, KvError> {
        debug!(url = %self.url, bytes = png_base64.len(), "removing background");
        let response = self
            .client
            .post(&self.url)
            .json(&RemoveRequest { image: png_base64 })
            .send()
            .await?;
        let body = ensure_success(response, "Background removal")
            .await?
            .json::<RemoveResponse>()
            .await?;
        if body.processed_image.is_empty() {
            return Err(KvError::Network("Background removal returned no image".to_string()));
        }
        Ok(as_data_url(&body.processed_image))
    }
}

/// Fixed product list. Lookups match `codprod` or `codauxiliar`.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: Vec<Product>,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Load a JSON array of products.
    pub fn from_json(json: &str) -> Result<Self, KvError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    fn matches(product: &Product, code: &str) -> bool {
        product.codprod == code || product.codauxiliar == code
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn search(&self, code: &str) -> Result<Vec<Product>, KvError> {
        let code = code.trim();
        Ok(self
            .products
            .iter()
            .filter(|p| Self::matches(p, code))
            .cloned()
            .collect())
    }

    async fn lookup_batch(&self, codes: &[String]) -> Result<Vec<Product>, KvError> {
        Ok(self
            .products
            .iter()
            .filter(|p| codes.iter().any(|c| Self::matches(p, c.trim())))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    fn product_json() -> Value {
        json!([{
            "codprod": 123,
            "codauxiliar": "7891234567890",
            "descricao": "Arroz 5kg",
            "link_imagem": null,
            "vl_oferta": 12.5
        }])
    }

    async fn spawn_services() -> String {
        let app = Router::new()
            .route(
                "/produtos/:code",
                get(|Path(code): Path<String>| async move {
                    match code.as_str() {
                        "123" => (StatusCode::OK, Json(product_json())),
                        "500" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"}))),
                        _ => (StatusCode::OK, Json(json!([]))),
                    }
                }),
            )
            .route(
                "/produtos/lote",
                post(|Json(body): Json<Value>| async move {
                    let n = body["codigos"].as_array().map(|a| a.len()).unwrap_or(0);
                    Json(json!(vec![product_json()[0].clone(); n]))
                }),
            )
            .route(
                "/remover-fundo",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "processedImage": body["image"] }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_product_lenient_fields() {
        let p: Vec<Product> = serde_json::from_value(product_json()).unwrap();
        assert_eq!(p[0].codprod, "123");
        assert_eq!(p[0].price_label().as_deref(), Some("R$ 12.50"));
        assert_eq!(p[0].display_description(), "ARROZ 5KG");
        assert!(p[0].image_url().is_none());

        let p: Product = serde_json::from_str(r#"{"descricao":"X","vl_oferta":"9,90"}"#).unwrap();
        assert_eq!(p.vl_oferta, 9.9);
        let p: Product = serde_json::from_str(r#"{"descricao":"X","vl_oferta":0}"#).unwrap();
        assert!(p.price_label().is_none());
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(12.5), "R$ 12.50");
        assert_eq!(format_price(3.0), "R$ 3.00");
    }

    #[tokio::test]
    async fn test_http_catalog_search() {
        let base = spawn_services().await;
        let catalog = HttpCatalog::new(&base).unwrap();
        let found = catalog.search("123").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(catalog.search("999").await.unwrap().is_empty());
        assert!(matches!(catalog.search("500").await, Err(KvError::Network(_))));
        assert!(matches!(catalog.search("  ").await, Err(KvError::Input(_))));
    }

    #[tokio::test]
    async fn test_http_catalog_batch() {
        let base = spawn_services().await;
        let catalog = HttpCatalog::new(&format!("{}/", base)).unwrap();
        let codes = vec!["1".to_string(), "2".to_string()];
        assert_eq!(catalog.lookup_batch(&codes).await.unwrap().len(), 2);
        assert!(catalog.lookup_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_remover_returns_data_url() {
        let base = spawn_services().await;
        let remover = HttpBackgroundRemover::new(format!("{}/remover-fundo", base)).unwrap();
        let out = remover.remove_background("iVBORw0KGgo=").await.unwrap();
        assert_eq!(out, "data:image/png;base64,iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let catalog = HttpCatalog::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(catalog.search("123").await, Err(KvError::Network(_))));
    }

    #[tokio::test]
    async fn test_static_catalog_matches_either_code() {
        let products: Vec<Product> = serde_json::from_value(product_json()).unwrap();
        let catalog = StaticCatalog::new(products);
        assert_eq!(catalog.search("123").await.unwrap().len(), 1);
        assert_eq!(catalog.search("7891234567890").await.unwrap().len(), 1);
        assert!(catalog.search("1").await.unwrap().is_empty());
    }
}
