//! # kvgen CLI
//!
//! Command-line interface for key-visual posters.
//!
//! ## Usage
//!
//! ```bash
//! # Run the HTTP service
//! kvgen serve --listen 0.0.0.0:3000
//!
//! # Render a stored template with a product applied
//! kvgen render 1712345678901 --code 7891234567890 --output kv.png
//!
//! # One poster per product
//! kvgen batch 1712345678901 7891234567890 7890000000001 --out-dir out
//!
//! # Grid poster
//! kvgen grid --cols 2 --rows 2 --product 0,0=123 --product 0,1=456 -o grid-kv.png
//!
//! # Stored templates
//! kvgen templates list
//! kvgen templates delete 1712345678901
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kvgen::{
    KvError,
    assets::HttpAssetLoader,
    batch::BatchGenerator,
    catalog::{HttpBackgroundRemover, HttpCatalog},
    config::{CanvasConfig, ServiceConfig, discover_font},
    editor::KvEditor,
    export::Exporter,
    grid::{GridEngine, GridLayout},
    scene::Composer,
    server::{self, ServerConfig},
    storage::{FileStorage, TemplateStore},
    text::Fonts,
};

/// kvgen - Key-visual poster generator
#[derive(Parser, Debug)]
#[command(name = "kvgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command.
#[derive(Args, Debug)]
struct Common {
    /// Directory holding uploads/ (public image paths resolve against it)
    #[arg(long, env = "KVGEN_PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,

    /// Template storage file
    #[arg(long, env = "KVGEN_STORAGE", default_value = "kvgen-storage.json")]
    storage: PathBuf,

    /// TTF font used for text (defaults to a system bold sans-serif)
    #[arg(long, env = "KVGEN_FONT")]
    font: Option<PathBuf>,

    /// Product catalog base URL
    #[arg(long, env = "KVGEN_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Background-removal service URL
    #[arg(long, env = "KVGEN_BG_REMOVAL_URL")]
    bg_removal_url: Option<String>,
}

impl Common {
    fn services(&self) -> ServiceConfig {
        let mut services = ServiceConfig::default();
        if let Some(url) = &self.catalog_url {
            services.catalog_url = url.clone();
        }
        if let Some(url) = &self.bg_removal_url {
            services.background_removal_url = url.clone();
        }
        services
    }

    fn store(&self) -> TemplateStore {
        TemplateStore::new(Arc::new(FileStorage::new(&self.storage)))
    }

    fn fonts(&self) -> Arc<Fonts> {
        let path = discover_font(self.font.as_deref());
        if path.is_none() {
            warn!("no font found, text will use fallback metrics");
        }
        Arc::new(Fonts::load(path.as_deref()))
    }

    fn composer(&self) -> Result<Composer, KvError> {
        let loader = Arc::new(HttpAssetLoader::new(self.public_dir.clone())?);
        Ok(Composer::new(CanvasConfig::KV_PORTRAIT, loader, self.fonts()))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long, env = "KVGEN_LISTEN", default_value = "0.0.0.0:3000")]
        listen: String,

        #[command(flatten)]
        common: Common,
    },

    /// Render a stored template to PNG
    Render {
        /// Template id
        template: String,

        /// Product code to apply before rendering
        #[arg(long)]
        code: Option<String>,

        /// Send the product image through the background-removal service
        #[arg(long)]
        remove_background: bool,

        /// Output file
        #[arg(short, long, default_value = "kv.png")]
        output: PathBuf,

        #[command(flatten)]
        common: Common,
    },

    /// Render one poster per product from a stored template
    Batch {
        /// Template id
        template: String,

        /// Product barcodes
        codes: Vec<String>,

        /// File with one barcode per line
        #[arg(long, value_name = "FILE")]
        codes_file: Option<PathBuf>,

        /// Send each product image through the background-removal service
        #[arg(long)]
        remove_background: bool,

        /// Output directory
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        #[command(flatten)]
        common: Common,
    },

    /// Compose a grid poster
    Grid {
        /// Named layout (twoByTwo, threeByThree, twoByOne, oneByTwo, threeByOne, oneByThree)
        #[arg(long, conflicts_with_all = ["cols", "rows"])]
        preset: Option<String>,

        #[arg(long, default_value = "2")]
        cols: u32,

        #[arg(long, default_value = "2")]
        rows: u32,

        /// Space between cells
        #[arg(long, default_value = "10")]
        gap: f32,

        /// Size of the grid block relative to the canvas (0.5 to 1)
        #[arg(long, default_value = "1")]
        scale: f32,

        /// Product for a cell, as ROW,COL=CODE
        #[arg(long = "product", value_name = "ROW,COL=CODE")]
        products: Vec<String>,

        /// Background image (path under the public dir, URL or data URL)
        #[arg(long)]
        background: Option<String>,

        /// Output file
        #[arg(short, long, default_value = "grid-kv.png")]
        output: PathBuf,

        #[command(flatten)]
        common: Common,
    },

    /// Manage stored templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,

        #[command(flatten)]
        common: Common,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateAction {
    /// List stored templates
    List,
    /// Print one template as JSON
    Show { id: String },
    /// Delete a template
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kvgen=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), KvError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, common } => {
            let config = ServerConfig {
                listen_addr: listen,
                public_dir: common.public_dir.clone(),
                storage_path: common.storage.clone(),
                font_path: common.font.clone(),
                services: common.services(),
            };
            server::serve(config).await?;
        }

        Commands::Render {
            template,
            code,
            remove_background,
            output,
            common,
        } => {
            let services = common.services();
            let template = common.store().get(&template)?;
            let catalog = Arc::new(HttpCatalog::new(&services.catalog_url)?);
            let mut editor = KvEditor::new(common.composer()?, catalog)
                .with_proxy_hosts(services.proxy_hosts.clone());
            if remove_background {
                let remover = HttpBackgroundRemover::new(services.background_removal_url.clone())?;
                editor = editor.with_remover(Arc::new(remover));
            }

            let report = editor.load_template(&template).await;
            if report.placeholders > 0 {
                warn!(count = report.placeholders, "some images were replaced by the placeholder");
            }
            if let Some(code) = code {
                let product = editor.search_product(&code).await?;
                println!("Applied {} ({})", product.display_description(), code);
            }
            if remove_background {
                editor.remove_product_background().await?;
            }
            editor.export(&Exporter::default()).await?.save(&output)?;
            println!("Saved to {}", output.display());
        }

        Commands::Batch {
            template,
            mut codes,
            codes_file,
            remove_background,
            out_dir,
            common,
        } => {
            if let Some(path) = codes_file {
                let content = std::fs::read_to_string(&path)?;
                codes.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            let services = common.services();
            let template = common.store().get(&template)?;
            let loader = Arc::new(HttpAssetLoader::new(common.public_dir.clone())?);
            let catalog = Arc::new(HttpCatalog::new(&services.catalog_url)?);
            let mut generator = BatchGenerator::new(
                template,
                CanvasConfig::KV_PORTRAIT,
                loader,
                common.fonts(),
                catalog,
            )
            .with_proxy_hosts(services.proxy_hosts.clone());
            if remove_background {
                let remover = HttpBackgroundRemover::new(services.background_removal_url.clone())?;
                generator = generator.with_remover(Arc::new(remover));
            }

            let report = generator.generate(&codes).await?;
            for path in report.write_all(&out_dir)? {
                println!("  {}", path.display());
            }
            for failure in &report.failures {
                println!("  FAILED {}: {}", failure.code, failure.error);
            }
            for code in &report.missing {
                println!("  NOT FOUND {}", code);
            }
            println!(
                "{} rendered, {} failed, {} not found",
                report.outputs.len(),
                report.failures.len(),
                report.missing.len()
            );
        }

        Commands::Grid {
            preset,
            cols,
            rows,
            gap,
            scale,
            products,
            background,
            output,
            common,
        } => {
            let services = common.services();
            let catalog = Arc::new(HttpCatalog::new(&services.catalog_url)?);
            let mut grid = GridEngine::new(common.composer()?, catalog)
                .with_proxy_hosts(services.proxy_hosts.clone());

            let layout = match preset {
                Some(name) => GridLayout::preset(&name)
                    .ok_or_else(|| KvError::Input(format!("Unknown grid layout '{}'", name)))?,
                None => GridLayout::new(cols, rows),
            };
            grid.apply_layout(layout.with_gap(gap).with_scale(scale));
            if let Some(src) = background {
                grid.set_background(src);
            }

            for spec in &products {
                let (row, col, code) = parse_cell_product(spec)?;
                let cell = grid
                    .cell_at(row, col)
                    .map(|c| c.id)
                    .ok_or_else(|| KvError::Input(format!("No cell at {},{}", row, col)))?;
                let payload = grid.assign_product(cell, &code).await?;
                info!(row, col, code = %code, "cell filled");
                println!("[{},{}] {}", row, col, payload.description);
            }

            grid.export_grid(&Exporter::default()).await?.save(&output)?;
            println!("Saved to {}", output.display());
        }

        Commands::Templates { action, common } => {
            let store = common.store();
            match action {
                TemplateAction::List => {
                    let templates = store.list()?;
                    if templates.is_empty() {
                        println!("No templates stored in {}", common.storage.display());
                    }
                    for t in templates {
                        println!(
                            "{}  {}  ({} elements, created {})",
                            t.id,
                            t.name,
                            t.elements.len(),
                            t.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
                TemplateAction::Show { id } => {
                    println!("{}", serde_json::to_string_pretty(&store.get(&id)?)?);
                }
                TemplateAction::Delete { id } => {
                    if store.delete(&id)? {
                        println!("Deleted {}", id);
                    } else {
                        return Err(KvError::Input(format!("Unknown template '{}'", id)));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Parse `ROW,COL=CODE`.
fn parse_cell_product(spec: &str) -> Result<(u32, u32, String), KvError> {
    let invalid = || KvError::Input(format!("Expected ROW,COL=CODE, got '{}'", spec));
    let (position, code) = spec.split_once('=').ok_or_else(invalid)?;
    let (row, col) = position.split_once(',').ok_or_else(invalid)?;
    let row = row.trim().parse().map_err(|_| invalid())?;
    let col = col.trim().parse().map_err(|_| invalid())?;
    let code = code.trim();
    if code.is_empty() {
        return Err(invalid());
    }
    Ok((row, col, code.to_string()))
}
