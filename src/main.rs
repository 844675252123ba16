use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vismatch_api::{AppState, RestApi, DEFAULT_MAX_UPLOAD_BYTES};
use vismatch_embed::{RemoteEmbeddingProvider, RemoteProviderConfig, DEFAULT_MAX_IMAGE_BYTES};
use vismatch_storage::{CatalogBuilder, CatalogPaths, CatalogStore, AUGMENTED_CATALOG_FILE, RAW_CATALOG_FILE};

/// Visual product matcher: find catalog products that look like an image
#[derive(Parser, Debug)]
#[command(name = "vismatch")]
#[command(version, about = "Visual product matcher", long_about = None)]
struct Args {
    /// Directories searched for catalog files, in order (default: ./data then ../data)
    #[arg(long = "data-dir", global = true, env = "VISMATCH_DATA_DIRS", value_delimiter = ',')]
    data_dirs: Vec<PathBuf>,

    /// File name of the raw catalog inside a data directory
    #[arg(long, global = true, env = "VISMATCH_RAW_FILE", default_value = RAW_CATALOG_FILE)]
    raw_file: String,

    /// File name of the embedding-augmented catalog inside a data directory
    #[arg(long, global = true, env = "VISMATCH_AUGMENTED_FILE", default_value = AUGMENTED_CATALOG_FILE)]
    augmented_file: String,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, env = "VISMATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the catalog and serve the HTTP API
    Serve {
        #[arg(long, env = "VISMATCH_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "VISMATCH_PORT", default_value_t = 8000)]
        port: u16,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Largest accepted upload, in bytes
        #[arg(long, env = "VISMATCH_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },

    /// Embed every catalog image and write the augmented catalog
    Precompute {
        /// Raw catalog to read (default: products.json in the data dirs)
        #[arg(long, env = "VISMATCH_INPUT")]
        input: Option<PathBuf>,

        /// Augmented catalog to write (default: next to the input)
        #[arg(long, env = "VISMATCH_OUTPUT")]
        output: Option<PathBuf>,

        /// Keep embeddings already present in the input
        #[arg(long)]
        reuse_existing: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ProviderArgs {
    /// Model server endpoint that turns image bytes into an embedding
    #[arg(long, env = "VISMATCH_PROVIDER_ENDPOINT", default_value = "http://127.0.0.1:9000/embed")]
    provider_endpoint: String,

    /// Inference calls allowed in flight; 1 serializes the model
    #[arg(long, env = "VISMATCH_PROVIDER_CONCURRENCY", default_value_t = 1)]
    provider_concurrency: usize,

    /// Upper bound for one embedding call, image download included
    #[arg(long, env = "VISMATCH_PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    provider_timeout_secs: u64,

    /// Largest remote image that will be downloaded, in bytes
    #[arg(long, env = "VISMATCH_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,
}

impl ProviderArgs {
    fn build(&self) -> anyhow::Result<RemoteEmbeddingProvider> {
        let mut config = RemoteProviderConfig::new(self.provider_endpoint.clone());
        config.concurrency = self.provider_concurrency.max(1);
        config.timeout = Duration::from_secs(self.provider_timeout_secs);
        config.max_image_bytes = self.max_image_bytes;
        RemoteEmbeddingProvider::new(config).context("Failed to create embedding provider")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dirs = if args.data_dirs.is_empty() {
        CatalogPaths::default_dirs()
    } else {
        args.data_dirs
    };
    let paths = CatalogPaths::new(data_dirs).with_file_names(args.raw_file, args.augmented_file);

    match args.command {
        Command::Serve {
            host,
            port,
            provider,
            max_upload_bytes,
        } => serve(paths, host, port, provider, max_upload_bytes).await,
        Command::Precompute {
            input,
            output,
            reuse_existing,
            provider,
        } => precompute(paths, input, output, reuse_existing, provider).await,
    }
}

async fn serve(
    paths: CatalogPaths,
    host: String,
    port: u16,
    provider: ProviderArgs,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    info!("Starting vismatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directories: {:?}", paths.data_dirs);

    let store = Arc::new(CatalogStore::open(paths).context("Failed to load catalog")?);
    let report = store.report();
    info!(
        items = report.stats.total,
        searchable = report.stats.searchable,
        dim = ?report.stats.dim,
        source = ?report.source,
        "Catalog loaded"
    );

    let provider = provider.build()?;
    info!("Embedding provider: {}", vismatch_embed::EmbeddingProvider::name(&provider));

    let state = Arc::new(
        AppState::new(store, Arc::new(provider)).with_max_upload_bytes(max_upload_bytes),
    );

    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on {}:{}", host, port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(state, &host, port).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}

async fn precompute(
    paths: CatalogPaths,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    reuse_existing: bool,
    provider: ProviderArgs,
) -> anyhow::Result<()> {
    let input = match input {
        Some(path) => path,
        None => paths
            .raw_path()
            .context("No data directory configured to look for the raw catalog")?,
    };
    let output = output.unwrap_or_else(|| input.with_file_name(&paths.augmented_file));

    info!("Loading products from {}", input.display());
    let builder = CatalogBuilder::new(provider.build()?).reuse_existing(reuse_existing);
    let report = builder
        .run(&input, &output)
        .await
        .with_context(|| format!("Precompute from {} failed", input.display()))?;

    info!(
        "Saved {} products ({} embedded, {} reused, {} failed) to {}",
        report.total,
        report.embedded,
        report.reused,
        report.failed,
        report.output.display()
    );
    Ok(())
}
