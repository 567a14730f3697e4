//! # Greenmap CLI
//!
//! Serves green-space layers as GeoJSON and looks up site details from the
//! Oracle database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greenmap_common::{AppConfig, Credentials, Error};
use greenmap_data::{get_site_details, LayerCatalog, MemoryStore, RecordStore};
use greenmap_serve::ServerState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Command-line interface for greenmap
#[derive(Parser)]
#[command(name = "greenmap")]
#[command(version)]
#[command(about = "GeoJSON layer server for green-space access mapping")]
#[command(long_about = "Serves green-space layers as GeoJSON and site details from Oracle:
  greenmap serve                      # Serve on 127.0.0.1:5000 with the built-in layers
  greenmap serve --config site.toml   # Use a configuration file
  greenmap layers                     # Load every layer and print a summary
  greenmap site LNR1                  # Print the details of one site as JSON

Database credentials are read from ORACLE_USER and ORACLE_PASSWORD, or from a
.env file in the working directory.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load every layer and start the HTTP server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Address to bind, overriding the configuration
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load every layer and print a summary
    Layers {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the details of one site as JSON
    Site {
        /// Site reference, e.g. LNR1
        reference: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Only present in development
    dotenv::dotenv().ok();

    init_logging(cli.json_logs);

    match cli.command {
        Command::Serve { config, host, port } => {
            let config = load_config(config)?;
            serve(config, host, port).await
        }
        Command::Layers { config } => {
            let config = load_config(config)?;
            print_layers(config).await
        }
        Command::Site { reference, config } => {
            let config = load_config(config)?;
            print_site(config, reference).await
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = AppConfig::load(path.as_deref()).context("invalid configuration")?;
    tracing::debug!(layers = config.layers.len(), "configuration loaded");
    Ok(config)
}

/// Pick the record store; credentials are only required when the database is used
fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    if !config.uses_database() {
        tracing::info!("no database-backed layers configured");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let credentials = Credentials::from_env()?;
    open_database(credentials, config)
}

#[cfg(feature = "oracle")]
fn open_database(credentials: Credentials, config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    tracing::info!(
        user = %credentials.user,
        database = %config.database.connect_string(),
        "using Oracle database"
    );
    Ok(Arc::new(greenmap_data::OracleStore::new(
        credentials,
        config.database.clone(),
    )))
}

#[cfg(not(feature = "oracle"))]
fn open_database(_credentials: Credentials, _config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    anyhow::bail!("the configuration uses the database but greenmap was built without the `oracle` feature")
}

/// Load every layer off the async runtime
async fn load_state(config: AppConfig) -> Result<ServerState> {
    let store = open_store(&config)?;
    tokio::task::spawn_blocking(move || ServerState::load(&config, store))
        .await
        .context("layer loading task failed")?
        .context("failed to load layers")
}

async fn serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = load_state(config).await?;
    greenmap_serve::serve(Arc::new(state), &host, port)
        .await
        .with_context(|| format!("server on {host}:{port} failed"))
}

async fn print_layers(config: AppConfig) -> Result<()> {
    let state = load_state(config).await?;
    print!("{}", format_summaries(&state.catalog));
    Ok(())
}

fn format_summaries(catalog: &LayerCatalog) -> String {
    let mut out = format!("{:<16} {:>9}  {:<44} {}\n", "LAYER", "FEATURES", "EXTENT", "SOURCE");
    for summary in catalog.summaries() {
        let extent = summary
            .bbox
            .map(|[a, b, c, d]| format!("{a:.5},{b:.5},{c:.5},{d:.5}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<16} {:>9}  {:<44} {}\n",
            summary.name, summary.feature_count, extent, summary.source
        ));
    }
    out
}

async fn print_site(config: AppConfig, reference: String) -> Result<()> {
    let site_config = config
        .site_details
        .clone()
        .context("site details are not configured")?;
    let store = open_store(&config)?;

    let key = reference.clone();
    let details =
        tokio::task::spawn_blocking(move || get_site_details(store.as_ref(), &site_config, &key))
            .await
            .context("site lookup task failed")?
            .with_context(|| format!("failed to look up site {reference}"))?
            .ok_or_else(|| Error::SiteNotFound(reference.clone()))?;

    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}
