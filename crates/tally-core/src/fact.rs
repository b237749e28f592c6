//! Fact events — the fundamental unit of the Tally ledger.
//!
//! A fact event is one immutable observation of one metric for one entity.
//! Events are never updated or deleted; uniqueness over the full observation
//! tuple makes re-ingestion of the same document a no-op rather than a
//! duplicate row. "Latest" and "as of" are read-time projections, never
//! stored state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, metric::Metric};

// ─── FactEvent ───────────────────────────────────────────────────────────────

/// One observation of one metric. Once written, no field is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactEvent {
  pub event_id:          Uuid,
  pub entity_id:         String,
  pub metric:            Metric,
  pub value:             f64,
  pub unit:              String,
  /// The date the value is asserted to be true for (e.g. "as of Jan 31").
  pub as_of:             NaiveDate,
  /// The date the source document was filed.
  pub reported_at:       NaiveDate,
  /// The artifact this value was extracted from.
  pub artifact_id:       Uuid,
  /// The ingestion run that produced this event. Audit aid only: losing the
  /// run row never invalidates the event.
  pub run_id:            Uuid,
  /// Name of the extractor variant that matched, for traceability.
  pub extraction_method: String,
  /// Extraction confidence in `[0, 1]`.
  pub confidence:        f64,
  /// The excerpt of source text the value was read from.
  pub quoted_text:       Option<String>,
  /// Server-assigned; never changes after creation.
  pub created_at:        DateTime<Utc>,
}

// ─── NewFactEvent ────────────────────────────────────────────────────────────

/// Input to [`crate::store::LedgerStore::append_fact`].
/// `event_id` and `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewFactEvent {
  pub entity_id:         String,
  pub metric:            Metric,
  pub value:             f64,
  pub unit:              String,
  pub as_of:             NaiveDate,
  pub reported_at:       NaiveDate,
  pub artifact_id:       Uuid,
  pub run_id:            Uuid,
  pub extraction_method: String,
  pub confidence:        f64,
  pub quoted_text:       Option<String>,
}

impl NewFactEvent {
  /// Reject events whose confidence is outside `[0, 1]` before they reach
  /// the store.
  pub fn validate(&self) -> Result<()> {
    if !(0.0..=1.0).contains(&self.confidence) || !self.confidence.is_finite() {
      return Err(Error::ConfidenceOutOfRange(self.confidence));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn event() -> NewFactEvent {
    NewFactEvent {
      entity_id:         "mstr".into(),
      metric:            Metric::Holdings,
      value:             713_502.0,
      unit:              "coins".into(),
      as_of:             NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
      reported_at:       NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
      artifact_id:       Uuid::new_v4(),
      run_id:            Uuid::new_v4(),
      extraction_method: "holdings_narrative_aggregate".into(),
      confidence:        0.95,
      quoted_text:       None,
    }
  }

  #[test]
  fn confidence_in_range_passes() {
    assert!(event().validate().is_ok());
  }

  #[test]
  fn confidence_out_of_range_rejected() {
    let mut e = event();
    e.confidence = 1.5;
    assert!(matches!(
      e.validate(),
      Err(Error::ConfidenceOutOfRange(_))
    ));

    e.confidence = f64::NAN;
    assert!(e.validate().is_err());
  }
}
