//! Cachefront - an in-memory, precompressing static content server
//!
//! This is the main entry point for the Cachefront CLI.

use anyhow::Context;
use cachefront_core::config::{CachefrontConfig, ConfigLoader, LogFormat, LoggingConfig};
use cachefront_server::{AccessLog, ContentServer};
use cachefront_settings::{
    MemoryStore, SettingsDocument, SettingsRegistry, SettingsStore, TomlFileStore,
};
use cachefront_static::{ContentCache, RequestResolver};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Cachefront - serve a directory from memory, precompressed
#[derive(Parser)]
#[command(name = "cachefront")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server with a configuration file
    Run {
        /// Path to the configuration file (TOML or JSON)
        #[arg(default_value = "cachefront.toml")]
        config: PathBuf,
    },

    /// Serve a directory with built-in defaults
    #[command(name = "file-server")]
    FileServer {
        /// Address to listen on
        #[arg(long, default_value = ":8080")]
        listen: String,

        /// Root directory to serve
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Validate a configuration file and its settings document
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "cachefront.toml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: path } => {
            let config = ConfigLoader::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            init_logging(&config.logging, cli.verbose || config.debug);
            tracing::info!("📄 Loaded configuration from: {}", path.display());
            serve(config)?;
        }

        Commands::FileServer { listen, root } => {
            let config = CachefrontConfig {
                listen: normalize_listen(&listen),
                sites_dir: root,
                ..CachefrontConfig::default()
            };
            init_logging(&config.logging, cli.verbose);
            tracing::info!(
                "Starting file server on {} serving {}",
                config.listen,
                config.sites_dir.display()
            );
            serve(config)?;
        }

        Commands::Validate { config } => {
            init_logging(&LoggingConfig::default(), cli.verbose);
            tracing::info!("Validating config: {}", config.display());

            match validate(&config) {
                Ok(()) => println!("✅ Configuration '{}' is valid!", config.display()),
                Err(e) => {
                    eprintln!("❌ Configuration Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Cachefront v{}", cachefront_core::VERSION);
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if verbose {
        tracing::info!("Verbose mode enabled");
    }
}

/// `:8080` listens on every interface
fn normalize_listen(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    }
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = ConfigLoader::load(path)?;

    if let Some(settings_file) = &config.settings_file {
        let document = TomlFileStore::new(settings_file).document()?;
        cachefront_settings::validate_document(&document)
            .with_context(|| format!("Invalid settings in {}", settings_file.display()))?;
    }
    if let Some(admin) = &config.admin {
        admin
            .listen
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid admin listen address: {}", admin.listen))?;
    }
    if !config.sites_dir.is_dir() {
        tracing::warn!(
            "⚠️ Site directory {} does not exist, the cache will be empty",
            config.sites_dir.display()
        );
    }
    Ok(())
}

fn serve(config: CachefrontConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: CachefrontConfig) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting Cachefront v{}", cachefront_core::VERSION);
    cachefront_server::metrics::init();

    let store: Arc<dyn SettingsStore> = match &config.settings_file {
        Some(path) => {
            tracing::info!("⚙️ Runtime settings from: {}", path.display());
            Arc::new(TomlFileStore::new(path))
        }
        None => {
            tracing::info!("⚙️ No settings file, using built-in defaults");
            Arc::new(MemoryStore::new(SettingsDocument::starter()))
        }
    };
    let settings = Arc::new(SettingsRegistry::with_profile(store, config.refresh));
    let cache = Arc::new(ContentCache::new(&config.sites_dir, settings));
    let server = Arc::new(ContentServer::new(
        RequestResolver::new(Arc::clone(&cache)),
        AccessLog::default(),
    ));

    let listener = ContentServer::bind(&config.listen).await?;

    // Requests are answered with the loading page until this finishes
    let initial = Arc::clone(&cache);
    tokio::spawn(async move {
        initial.rebuild().await;
    });

    if let Some(admin) = config.admin.as_ref().filter(|admin| admin.enabled) {
        let addr: SocketAddr = admin
            .listen
            .parse()
            .with_context(|| format!("Invalid admin listen address: {}", admin.listen))?;
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            if let Err(e) = cachefront_api::run_admin_server(addr, cache).await {
                tracing::error!("Admin server error: {}", e);
            }
        });
    }

    #[cfg(unix)]
    rebuild_on_sighup(Arc::clone(&cache));

    tokio::select! {
        result = server.run(listener) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("👋 Shutting down"),
    }
    Ok(())
}

#[cfg(unix)]
fn rebuild_on_sighup(cache: Arc<ContentCache>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut stream = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("❌ Failed to create SIGHUP listener: {}", e);
                return;
            }
        };

        tracing::info!("📡 SIGHUP listener active");
        while stream.recv().await.is_some() {
            tracing::info!("🔔 Received SIGHUP, rebuilding content from {}", cache.sites_dir().display());
            cache.rebuild().await;
        }
    });
}
