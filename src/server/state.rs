//! Server state and configuration.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::assets::{AssetLoader, HttpAssetLoader};
use crate::catalog::{BackgroundRemover, HttpBackgroundRemover, HttpCatalog, ProductCatalog};
use crate::config::{CanvasConfig, ServiceConfig, discover_font};
use crate::error::KvError;
use crate::storage::{FileStorage, TemplateStore};
use crate::text::Fonts;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:3000")
    pub listen_addr: String,
    /// Directory holding `uploads/`; public paths resolve against it
    pub public_dir: PathBuf,
    /// JSON file holding the persisted templates
    pub storage_path: PathBuf,
    /// TTF font for text rendering; system fonts are probed when unset
    pub font_path: Option<PathBuf>,
    pub services: ServiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            public_dir: PathBuf::from("public"),
            storage_path: PathBuf::from("kvgen-storage.json"),
            font_path: None,
            services: ServiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Where uploaded backgrounds are written.
    pub fn backgrounds_dir(&self) -> PathBuf {
        self.public_dir.join("uploads").join("backgrounds")
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub canvas: CanvasConfig,
    pub templates: TemplateStore,
    pub catalog: Arc<dyn ProductCatalog>,
    pub remover: Option<Arc<dyn BackgroundRemover>>,
    pub loader: Arc<dyn AssetLoader>,
    pub fonts: Arc<Fonts>,
}

impl AppState {
    /// Wire the real services from `config`.
    pub fn new(config: ServerConfig) -> Result<Self, KvError> {
        let font = discover_font(config.font_path.as_deref());
        if font.is_none() {
            warn!("no font found, text will use fallback metrics");
        }
        let fonts = Arc::new(Fonts::load(font.as_deref()));
        let templates = TemplateStore::new(Arc::new(FileStorage::new(&config.storage_path)));
        let catalog = Arc::new(HttpCatalog::new(&config.services.catalog_url)?);
        let remover = Arc::new(HttpBackgroundRemover::new(
            config.services.background_removal_url.clone(),
        )?);
        let loader = Arc::new(HttpAssetLoader::new(config.public_dir.clone())?);
        Ok(Self {
            config,
            canvas: CanvasConfig::KV_PORTRAIT,
            templates,
            catalog,
            remover: Some(remover),
            loader,
            fonts,
        })
    }

    /// State from ready-made parts.
    pub fn from_parts(
        config: ServerConfig,
        templates: TemplateStore,
        catalog: Arc<dyn ProductCatalog>,
        loader: Arc<dyn AssetLoader>,
        fonts: Arc<Fonts>,
    ) -> Self {
        Self {
            config,
            canvas: CanvasConfig::KV_PORTRAIT,
            templates,
            catalog,
            remover: None,
            loader,
            fonts,
        }
    }
}
