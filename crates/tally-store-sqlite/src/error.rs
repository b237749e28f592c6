//! Error type for `tally-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("blob i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown stored discriminant: {0}")]
  Decode(String),

  /// Attempted an identity backfill on an artifact that was not found.
  #[error("artifact not found: {0}")]
  ArtifactNotFound(Uuid),

  #[error("discrepancy not found: {0}")]
  DiscrepancyNotFound(Uuid),

  /// CAS failure: the discrepancy is already resolved or dismissed.
  #[error("discrepancy {0} is not pending")]
  NotPending(Uuid),

  /// A resolution must move a discrepancy into a terminal status.
  #[error("resolution status must be resolved or dismissed")]
  NonTerminalResolution,

  #[error("run not found: {0}")]
  RunNotFound(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
