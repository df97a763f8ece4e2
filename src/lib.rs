//! # kvgen - Key-Visual Poster Generator
//!
//! kvgen composes marketing posters ("key visuals") for retail products on a
//! fixed 1080×1920 canvas. It provides:
//!
//! - **Scene composition**: a background plus layered text, image and grid
//!   cell elements, owned by a [`scene::Composer`]
//! - **Templates**: saved scenes with role-tagged elements, persisted to a
//!   key-value store
//! - **Product routing**: catalog rows flow into the description, price and
//!   product image elements
//! - **Grid layouts**: `cols × rows` product grids with guides and resize remap
//! - **Export**: full-resolution PNG regardless of the on-screen zoom
//! - **HTTP service**: template CRUD, background upload, catalog lookup and
//!   server-side rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kvgen::{
//!     assets::HttpAssetLoader,
//!     catalog::HttpCatalog,
//!     config::{CanvasConfig, discover_font},
//!     editor::KvEditor,
//!     export::Exporter,
//!     scene::Composer,
//!     text::Fonts,
//! };
//!
//! # async fn demo() -> Result<(), kvgen::KvError> {
//! let loader = Arc::new(HttpAssetLoader::new("public")?);
//! let fonts = Arc::new(Fonts::load(discover_font(None).as_deref()));
//! let composer = Composer::new(CanvasConfig::KV_PORTRAIT, loader, fonts);
//!
//! let catalog = Arc::new(HttpCatalog::new("http://localhost:8000")?);
//! let mut editor = KvEditor::new(composer, catalog);
//! editor.composer_mut().set_background_src("/uploads/backgrounds/fundo.png");
//! editor.search_product("7891234567890").await?;
//!
//! let poster = editor.export(&Exporter::default()).await?;
//! poster.save(std::path::Path::new("kv.png"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`scene`] | Elements, the composer and its render pass |
//! | [`render`] | Rasterizer and color parsing |
//! | [`text`] | Fonts, measurement and word wrap |
//! | [`style`] | Style panel state and style application |
//! | [`template`] | Template model and scene (de)serialization |
//! | [`storage`] | Key-value storage and the template store |
//! | [`catalog`] | Product lookup and background removal |
//! | [`editor`] | Template editor with undo/redo |
//! | [`grid`] | Grid layout engine |
//! | [`export`] | PNG export |
//! | [`batch`] | One poster per product |
//! | [`server`] | HTTP service |

pub mod assets;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod grid;
pub mod render;
pub mod scene;
pub mod server;
pub mod storage;
pub mod store;
pub mod style;
pub mod template;
pub mod text;

// Re-exports for convenience
pub use config::CanvasConfig;
pub use error::KvError;
pub use scene::Composer;
pub use template::Template;
