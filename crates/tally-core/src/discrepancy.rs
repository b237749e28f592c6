//! Discrepancy — a detected disagreement between the ledger's canonical value
//! and independently sourced comparison values for the same (entity, metric).
//!
//! Status transitions only `pending → resolved` or `pending → dismissed`.
//! Terminal rows are never reopened by the reconciliation engine; a new
//! conflict creates a new row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, metric::Metric};

// ─── Severity ────────────────────────────────────────────────────────────────

/// How badly the comparison values disagree with ours. Ordering matters:
/// `Minor < Moderate < Major`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Minor,
  Moderate,
  Major,
}

impl Severity {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Minor => "minor",
      Self::Moderate => "moderate",
      Self::Major => "major",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "minor" => Ok(Self::Minor),
      "moderate" => Ok(Self::Moderate),
      "major" => Ok(Self::Major),
      other => Err(Error::UnknownDiscriminant(format!("severity {other:?}"))),
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyStatus {
  Pending,
  Resolved,
  Dismissed,
}

impl DiscrepancyStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Resolved => "resolved",
      Self::Dismissed => "dismissed",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "resolved" => Ok(Self::Resolved),
      "dismissed" => Ok(Self::Dismissed),
      other => Err(Error::UnknownDiscriminant(format!("status {other:?}"))),
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Resolved | Self::Dismissed)
  }
}

// ─── Comparison values ───────────────────────────────────────────────────────

/// One independently sourced candidate value, with its own provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonValue {
  pub value:  f64,
  /// Human-readable source name, e.g. an aggregator or dashboard.
  pub source: String,
  pub url:    Option<String>,
  pub as_of:  Option<NaiveDate>,
}

// ─── Discrepancy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
  pub id:                Uuid,
  pub entity_id:         String,
  pub metric:            Metric,
  pub our_value:         f64,
  pub comparison_values: Vec<ComparisonValue>,
  pub severity:          Severity,
  pub max_deviation_pct: f64,
  pub status:            DiscrepancyStatus,
  pub resolution_value:  Option<f64>,
  pub resolution_source: Option<String>,
  pub resolution_notes:  Option<String>,
  pub resolved_by:       Option<String>,
  pub resolved_at:       Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::LedgerStore::upsert_pending_discrepancy`].
/// Always lands as `pending`; if a pending row already exists for the
/// (entity, metric) pair, its comparison values, severity and deviation are
/// refreshed in place instead of creating a duplicate.
#[derive(Debug, Clone)]
pub struct NewDiscrepancy {
  pub entity_id:         String,
  pub metric:            Metric,
  pub our_value:         f64,
  pub comparison_values: Vec<ComparisonValue>,
  pub severity:          Severity,
  pub max_deviation_pct: f64,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// A human decision closing a pending discrepancy. `status` must be terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct Resolution {
  pub status:            DiscrepancyStatus,
  pub resolution_value:  Option<f64>,
  pub resolution_source: Option<String>,
  pub notes:             Option<String>,
  pub resolved_by:       Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn severity_ordering() {
    assert!(Severity::Minor < Severity::Moderate);
    assert!(Severity::Moderate < Severity::Major);
  }

  #[test]
  fn terminal_statuses() {
    assert!(!DiscrepancyStatus::Pending.is_terminal());
    assert!(DiscrepancyStatus::Resolved.is_terminal());
    assert!(DiscrepancyStatus::Dismissed.is_terminal());
  }
}
