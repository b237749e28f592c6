//! Runs — metadata for ingestion and reconciliation batches.
//!
//! Every fact event references the run that produced it, for audit and
//! rollback. Runs are an audit aid only: deleting a run row degrades
//! auditability but never invalidates a fact event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
  Scheduled,
  Manual,
}

impl RunTrigger {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Scheduled => "scheduled",
      Self::Manual => "manual",
    }
  }
}

/// One execution of an ingestion or reconciliation batch. Immutable once
/// ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
  pub run_id:     Uuid,
  pub started_at: DateTime<Utc>,
  pub ended_at:   Option<DateTime<Utc>>,
  pub trigger:    RunTrigger,
  pub notes:      Option<String>,
}
