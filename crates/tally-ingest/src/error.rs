//! Error type for `tally-ingest`.
//!
//! Only infrastructure-level failures surface here; per-item problems are
//! recorded as skips in the batch summary instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The backing store is unreachable or misbehaving. Aborts the whole run.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A fetch failure with nothing to fall back on (e.g. the filing index
  /// itself could not be loaded after retries).
  #[error(transparent)]
  Fetch(#[from] tally_core::fetch::FetchError),

  #[error(transparent)]
  Extract(#[from] tally_extract::Error),

  /// Severity thresholds were not strictly increasing.
  #[error("severity thresholds must be positive and strictly increasing: {0}")]
  PolicyNotMonotonic(String),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
