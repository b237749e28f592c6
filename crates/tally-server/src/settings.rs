//! Runtime server configuration, deserialised from `config.toml` layered
//! with `TALLY_`-prefixed environment variables.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;

fn default_host() -> String {
  "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
  8080
}

fn default_min_delay_ms() -> u64 {
  150
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,

  /// SQLite database file.
  pub db_path:  PathBuf,
  /// Directory raw document bytes are stored under.
  pub blob_dir: PathBuf,

  /// Shared secret required on mutating endpoints.
  pub bearer_secret: String,

  /// Identification string sent to EDGAR, e.g. `tally admin@example.com`.
  /// EDGAR rejects anonymous clients.
  pub sec_user_agent:   String,
  /// Minimum delay between EDGAR requests, per their fair-use policy.
  #[serde(default = "default_min_delay_ms")]
  pub sec_min_delay_ms: u64,

  /// Ticker (lowercase) to zero-padded 10-digit CIK.
  #[serde(default)]
  pub entities: HashMap<String, String>,
}
