//! naturae-server: HTTP backend of the Naturae species flashcard app

use anyhow::{Context, Result};
use clap::Parser;
use naturae_common::config::{self, Settings, TomlConfig};
use naturae_common::db::init_database;
use naturae_server::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Config file name looked up inside the root folder
const ROOT_CONFIG_FILE: &str = "naturae.toml";

const DEFAULT_LOG_DIRECTIVES: &str = "naturae_server=info,naturae_common=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "naturae-server", version, about = "Naturae flashcard backend")]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "NATURAE_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and uploaded media
    #[arg(short, long, env = "NATURAE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, env = "NATURAE_CONFIG")]
    config: Option<PathBuf>,
}

/// Explicit path, else `naturae.toml` in the root folder, else the user config
fn config_path(args: &Args) -> PathBuf {
    if let Some(path) = &args.config {
        return path.clone();
    }

    let in_root = config::resolve_root_folder(args.root_folder.as_deref(), &TomlConfig::default())
        .join(ROOT_CONFIG_FILE);
    if in_root.exists() {
        in_root
    } else {
        config::default_config_path()
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_level.is_empty() {
            EnvFilter::new(DEFAULT_LOG_DIRECTIVES)
        } else {
            EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so that its log level can apply
    let config_path = config_path(&args);
    let toml_config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&toml_config.log_level);

    info!(
        "Starting Naturae server (naturae-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config file: {}", config_path.display());

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let settings = Settings::from_parts(root_folder, args.port, toml_config);
    settings.validate().context("Invalid configuration")?;
    settings
        .ensure_directories()
        .context("Failed to create root folder")?;

    info!("Root folder: {}", settings.root_folder.display());
    info!("Database path: {}", settings.db_path.display());

    let pool = match init_database(&settings.db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(pool, settings).context("Failed to create HTTP clients")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("naturae-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
