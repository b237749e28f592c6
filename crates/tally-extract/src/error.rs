//! Error types for the tally-extract crate.

use tally_core::metric::Metric;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An extracted value failed a sanity bound. Always surfaced to the
  /// caller, never silently dropped.
  #[error("guardrail rejected {metric} value {value}: {reason}")]
  Guardrail {
    metric: Metric,
    value:  f64,
    reason: String,
  },

  #[error("unparseable amount: {0:?}")]
  Amount(String),

  #[error("invalid extractor pattern: {0}")]
  Pattern(#[from] regex::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
