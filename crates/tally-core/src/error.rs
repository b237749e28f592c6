//! Error types for `tally-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("artifact not found: {0}")]
  ArtifactNotFound(Uuid),

  #[error("discrepancy not found: {0}")]
  DiscrepancyNotFound(Uuid),

  #[error("run not found: {0}")]
  RunNotFound(Uuid),

  #[error("unknown metric: {0:?}")]
  UnknownMetric(String),

  #[error("unknown discriminant: {0}")]
  UnknownDiscriminant(String),

  #[error("confidence {0} is outside [0, 1]")]
  ConfidenceOutOfRange(f64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
