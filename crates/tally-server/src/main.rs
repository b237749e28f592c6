//! tally-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and blob directory, builds the EDGAR client, and serves the JSON
//! API over HTTP.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tally_api::{AppState, AuthConfig};
use tally_edgar::{EdgarClient, EdgarConfig};
use tally_ingest::Ingestor;
use tally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Tally treasury-fact ledger server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let db_path = expand_tilde(&server_cfg.db_path);
  let blob_dir = expand_tilde(&server_cfg.blob_dir);

  let store = SqliteStore::open(&db_path, &blob_dir)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  let store = Arc::new(store);

  let mut edgar_cfg = EdgarConfig::new(server_cfg.sec_user_agent.clone());
  edgar_cfg.min_delay = Duration::from_millis(server_cfg.sec_min_delay_ms);
  for (ticker, cik) in &server_cfg.entities {
    edgar_cfg = edgar_cfg.with_cik(ticker.clone(), cik.clone());
  }
  let edgar = Arc::new(
    EdgarClient::new(edgar_cfg).context("failed to build EDGAR client")?,
  );

  let ingestor = Ingestor::new(store.clone(), edgar.clone(), edgar.clone())
    .context("failed to build ingestion pipeline")?;

  let state = AppState {
    store,
    ingestor: Arc::new(ingestor),
    auth: Arc::new(AuthConfig::new(&server_cfg.bearer_secret)),
  };

  let app = tally_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
