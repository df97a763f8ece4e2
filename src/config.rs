//! # Canvas and Service Configuration
//!
//! This module defines the fixed poster geometry and the endpoints of the
//! external services the editor talks to.
//!
//! ## Canvas
//!
//! | Format | Width | Height | Orientation |
//! |--------|-------|--------|-------------|
//! | KV portrait | 1080 | 1920 | portrait |
//!
//! ## Usage
//!
//! ```
//! use kvgen::config::CanvasConfig;
//!
//! let canvas = CanvasConfig::KV_PORTRAIT;
//! assert_eq!(canvas.center(), (540.0, 960.0));
//! ```

use std::path::{Path, PathBuf};

/// # Canvas Configuration
///
/// The fixed virtual coordinate space every element lives in. On-screen
/// zoom never changes these numbers; exports are always produced at
/// `width × height`.
///
/// ## Background fitting
///
/// ```text
/// cover_scale = max(width / image_w, height / image_h)
///
/// For a 1000×1000 background on KV_PORTRAIT:
///   max(1.08, 1.92) = 1.92  → 1920×1920, cropped left/right
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasConfig {
    /// Format name
    pub name: &'static str,

    /// Canvas width in canvas units (pixels at zoom 1)
    pub width: u32,

    /// Canvas height in canvas units
    pub height: u32,
}

impl CanvasConfig {
    /// # KV Portrait
    ///
    /// 1080×1920 story-format poster.
    pub const KV_PORTRAIT: Self = Self {
        name: "KV portrait",
        width: 1080,
        height: 1920,
    };

    /// Canvas width as f32
    #[inline]
    pub fn width_f(&self) -> f32 {
        self.width as f32
    }

    /// Canvas height as f32
    #[inline]
    pub fn height_f(&self) -> f32 {
        self.height as f32
    }

    /// Center point of the canvas
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.width_f() / 2.0, self.height_f() / 2.0)
    }

    /// Scale that makes an image of natural size `(w, h)` cover the canvas
    /// without letterboxing.
    ///
    /// ## Example
    ///
    /// ```
    /// use kvgen::config::CanvasConfig;
    ///
    /// let canvas = CanvasConfig::KV_PORTRAIT;
    /// assert!((canvas.cover_scale(1000, 1000) - 1.92).abs() < 1e-6);
    /// ```
    pub fn cover_scale(&self, w: u32, h: u32) -> f32 {
        let w = w.max(1) as f32;
        let h = h.max(1) as f32;
        (self.width_f() / w).max(self.height_f() / h)
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::KV_PORTRAIT
    }
}

/// Endpoints of the external collaborators.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the product catalog (`GET {base}/produtos/{code}`).
    pub catalog_url: String,
    /// Full URL of the background-removal service.
    pub background_removal_url: String,
    /// Hosts whose images must be routed through the image proxy.
    pub proxy_hosts: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            catalog_url: "http://172.16.23.35:8000".to_string(),
            background_removal_url: "http://0.0.0.0:8000/remover-fundo".to_string(),
            proxy_hosts: vec!["cdn-cosmos.bluesoft.com.br".to_string()],
        }
    }
}

/// Well-known bold sans-serif fonts, probed in order when no font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Resolve the font file to use for text rendering.
///
/// An explicit path wins; otherwise the first existing system candidate.
pub fn discover_font(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        assert_eq!(CanvasConfig::KV_PORTRAIT.center(), (540.0, 960.0));
    }

    #[test]
    fn test_cover_scale_landscape_image() {
        // 1920x1080 landscape: height is the binding side
        let s = CanvasConfig::KV_PORTRAIT.cover_scale(1920, 1080);
        assert!((s - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn test_cover_scale_zero_dimension() {
        let s = CanvasConfig::KV_PORTRAIT.cover_scale(0, 0);
        assert!(s.is_finite());
    }

    #[test]
    fn test_explicit_font_wins() {
        let p = PathBuf::from("/tmp/some-font.ttf");
        assert_eq!(discover_font(Some(&p)), Some(p));
    }
}
