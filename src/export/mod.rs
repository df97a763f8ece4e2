//! # Export Pipeline
//!
//! Produces the finished poster as PNG bytes, always at the canvas
//! resolution no matter what zoom the editor is showing.
//!
//! ```text
//! snapshot viewport
//!   → zoom 1, viewport = canvas size
//!   → settle (join pending decodes) + render pass
//!   → rasterize without guides
//!   → restore viewport
//!   → encode: primary strategy, fallback strategy on error
//! ```
//!
//! The viewport is restored before encoding, so it is back in place on
//! every path, including failures.

use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage, codecs::png::PngEncoder};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::assets::encode_png;
use crate::error::KvError;
use crate::render::RenderOptions;
use crate::scene::Composer;

/// An exported poster.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub width: u32,
    pub height: u32,
    /// PNG bytes.
    pub png: Vec<u8>,
}

impl ExportedImage {
    pub fn save(&self, path: &Path) -> Result<(), KvError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.png)?;
        info!(path = %path.display(), bytes = self.png.len(), "poster written");
        Ok(())
    }
}

/// One way of turning a rasterized surface into PNG bytes.
pub trait EncodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, surface: &RgbaImage) -> Result<Vec<u8>, KvError>;
}

/// Encode through the image's own PNG writer.
pub struct DirectPng;

impl EncodeStrategy for DirectPng {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn encode(&self, surface: &RgbaImage) -> Result<Vec<u8>, KvError> {
        encode_png(&DynamicImage::ImageRgba8(surface.clone()))
    }
}

/// Extract the raw pixel buffer and feed it to a bare PNG encoder.
pub struct SurfaceBlob;

impl EncodeStrategy for SurfaceBlob {
    fn name(&self) -> &'static str {
        "surface"
    }

    fn encode(&self, surface: &RgbaImage) -> Result<Vec<u8>, KvError> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(
                surface.as_raw(),
                surface.width(),
                surface.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| KvError::Export(e.to_string()))?;
        Ok(png)
    }
}

/// Full-resolution exporter with a primary and a fallback encoder.
pub struct Exporter {
    primary: Box<dyn EncodeStrategy>,
    fallback: Box<dyn EncodeStrategy>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(Box::new(DirectPng), Box::new(SurfaceBlob))
    }
}

impl Exporter {
    pub fn new(primary: Box<dyn EncodeStrategy>, fallback: Box<dyn EncodeStrategy>) -> Self {
        Self { primary, fallback }
    }

    /// Export the composer's scene at canvas resolution.
    pub async fn export(&self, composer: &mut Composer) -> Result<ExportedImage, KvError> {
        let saved = composer.viewport();
        composer.set_zoom(1.0);
        composer.settle().await;
        let surface = composer.rasterize(&RenderOptions::export());
        composer.set_viewport(saved);
        debug!(
            width = surface.width(),
            height = surface.height(),
            zoom = saved.zoom,
            "scene rasterized for export"
        );
        self.encode(surface)
    }

    /// Encode an already rasterized surface.
    pub fn encode(&self, surface: RgbaImage) -> Result<ExportedImage, KvError> {
        let (width, height) = surface.dimensions();
        let png = match self.primary.encode(&surface) {
            Ok(png) => png,
            Err(primary_err) => {
                warn!(
                    strategy = self.primary.name(),
                    error = %primary_err,
                    "primary export failed, trying fallback"
                );
                self.fallback.encode(&surface).map_err(|fallback_err| {
                    KvError::Export(format!(
                        "{} failed ({}), {} failed ({})",
                        self.primary.name(),
                        primary_err,
                        self.fallback.name(),
                        fallback_err
                    ))
                })?
            }
        };
        Ok(ExportedImage { width, height, png })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryAssetLoader, decode_bytes};
    use crate::config::CanvasConfig;
    use crate::scene::Viewport;
    use crate::text::Fonts;
    use image::Rgba;
    use std::sync::Arc;

    struct Broken;

    impl EncodeStrategy for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn encode(&self, _surface: &RgbaImage) -> Result<Vec<u8>, KvError> {
            Err(KvError::Export("surface tainted".into()))
        }
    }

    fn composer() -> Composer {
        let bg = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([10, 20, 30, 255])));
        Composer::new(
            CanvasConfig::KV_PORTRAIT,
            Arc::new(MemoryAssetLoader::new().with("bg.png", bg)),
            Arc::new(Fonts::fallback()),
        )
    }

    #[tokio::test]
    async fn test_export_ignores_zoom_and_restores_it() {
        let mut c = composer();
        c.set_background_src("bg.png");
        c.set_zoom(0.3);
        let before = c.viewport();
        let out = Exporter::default().export(&mut c).await.unwrap();
        assert_eq!((out.width, out.height), (1080, 1920));
        assert_eq!(c.viewport(), before);
        let decoded = decode_bytes(&out.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
        assert_eq!(decoded.to_rgba8().get_pixel(540, 960), &Rgba([10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let mut c = composer();
        let out = Exporter::new(Box::new(Broken), Box::new(SurfaceBlob))
            .export(&mut c)
            .await
            .unwrap();
        assert!(out.png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_both_strategies_failing_is_export_error() {
        let mut c = composer();
        c.set_viewport(Viewport::for_canvas(&CanvasConfig::KV_PORTRAIT, 0.5));
        let err = Exporter::new(Box::new(Broken), Box::new(Broken))
            .export(&mut c)
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Export(_)));
        assert_eq!(c.viewport().zoom, 0.5);
    }
}
