//! # Batch Variants
//!
//! Renders one poster per product from a single template. Products are
//! fetched in one batch lookup; every product gets a fresh editor session,
//! so nothing leaks from one variant into the next.
//!
//! A failure on one product is recorded in the report and the batch moves
//! on. Background removal failures only cost the removal: the variant is
//! rendered with the original product image.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::assets::AssetLoader;
use crate::catalog::{BackgroundRemover, Product, ProductCatalog};
use crate::config::CanvasConfig;
use crate::editor::KvEditor;
use crate::error::KvError;
use crate::export::{ExportedImage, Exporter};
use crate::scene::Composer;
use crate::template::Template;
use crate::text::Fonts;

/// `kv_<barcode>.png`, falling back to the product code.
pub fn variant_file_name(product: &Product) -> String {
    let code = if product.codauxiliar.trim().is_empty() {
        product.codprod.trim()
    } else {
        product.codauxiliar.trim()
    };
    let safe: String = code
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("kv_{}.png", safe)
}

#[derive(Debug)]
pub struct BatchOutput {
    pub code: String,
    pub file_name: String,
    pub image: ExportedImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub code: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outputs: Vec<BatchOutput>,
    pub failures: Vec<BatchFailure>,
    /// Requested codes the catalog did not return.
    pub missing: Vec<String>,
}

impl BatchReport {
    /// Write every output under `dir`. Returns the written paths.
    pub fn write_all(&self, dir: &Path) -> Result<Vec<PathBuf>, KvError> {
        std::fs::create_dir_all(dir)?;
        self.outputs
            .iter()
            .map(|out| {
                let path = dir.join(&out.file_name);
                out.image.save(&path)?;
                Ok(path)
            })
            .collect()
    }
}

pub struct BatchGenerator {
    template: Template,
    canvas: CanvasConfig,
    loader: Arc<dyn AssetLoader>,
    fonts: Arc<Fonts>,
    catalog: Arc<dyn ProductCatalog>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    proxy_hosts: Vec<String>,
    exporter: Exporter,
}

impl BatchGenerator {
    pub fn new(
        template: Template,
        canvas: CanvasConfig,
        loader: Arc<dyn AssetLoader>,
        fonts: Arc<Fonts>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            template,
            canvas,
            loader,
            fonts,
            catalog,
            remover: None,
            proxy_hosts: Vec::new(),
            exporter: Exporter::default(),
        }
    }

    /// Remove the product image background on every variant.
    pub fn with_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn with_proxy_hosts(mut self, hosts: Vec<String>) -> Self {
        self.proxy_hosts = hosts;
        self
    }

    /// Look up `codes` and render a variant for each product found.
    pub async fn generate(&self, codes: &[String]) -> Result<BatchReport, KvError> {
        if codes.is_empty() {
            return Err(KvError::Input("No product codes given".to_string()));
        }
        let products = self.catalog.lookup_batch(codes).await?;
        let mut report = self.generate_products(&products).await;
        report.missing = codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !products.iter().any(|p| p.codauxiliar == *c || p.codprod == *c))
            .map(str::to_string)
            .collect();
        for code in &report.missing {
            warn!(code = %code, "product not returned by batch lookup");
        }
        Ok(report)
    }

    /// Render a variant for each product.
    pub async fn generate_products(&self, products: &[Product]) -> BatchReport {
        let mut report = BatchReport::default();
        for product in products {
            let code = product.codauxiliar.clone();
            match self.render(product).await {
                Ok(image) => report.outputs.push(BatchOutput {
                    code,
                    file_name: variant_file_name(product),
                    image,
                }),
                Err(e) => {
                    warn!(code = %code, error = %e, "variant failed");
                    report.failures.push(BatchFailure {
                        code,
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            rendered = report.outputs.len(),
            failed = report.failures.len(),
            template = %self.template.id,
            "batch finished"
        );
        report
    }

    /// Render one variant.
    pub async fn render(&self, product: &Product) -> Result<ExportedImage, KvError> {
        let composer = Composer::new(self.canvas, self.loader.clone(), self.fonts.clone());
        let mut editor = KvEditor::new(composer, self.catalog.clone())
            .with_proxy_hosts(self.proxy_hosts.clone());
        if let Some(remover) = &self.remover {
            editor = editor.with_remover(remover.clone());
        }
        editor.load_template(&self.template).await;
        editor.apply_product(product).await;
        if self.remover.is_some()
            && let Err(e) = editor.remove_product_background().await
        {
            warn!(code = %product.codauxiliar, error = %e, "background removal skipped");
        }
        editor.export(&self.exporter).await
    }
}
