//! Reconciliation engine.
//!
//! Compares the ledger's latest value for each (entity, metric) against
//! independently sourced comparison values, classifies the worst deviation
//! against a configured severity policy, and persists a pending discrepancy
//! for human review. Never resolves anything on its own.

use std::sync::Arc;

use tally_core::{
  discrepancy::{Discrepancy, NewDiscrepancy, Severity},
  fetch::ComparisonFetcher,
  metric::Metric,
  store::LedgerStore,
};

use crate::error::{Error, Result};

// ─── Severity policy ─────────────────────────────────────────────────────────

/// Deviation thresholds, in percent. A deviation below `minor_pct` is in
/// agreement and no discrepancy is persisted; each band is inclusive of its
/// lower bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityPolicy {
  pub minor_pct:    f64,
  pub moderate_pct: f64,
  pub major_pct:    f64,
}

impl Default for SeverityPolicy {
  fn default() -> Self {
    Self { minor_pct: 5.0, moderate_pct: 25.0, major_pct: 75.0 }
  }
}

impl SeverityPolicy {
  /// Thresholds must be positive and strictly increasing.
  pub fn new(minor_pct: f64, moderate_pct: f64, major_pct: f64) -> Result<Self> {
    if !(minor_pct > 0.0 && minor_pct < moderate_pct && moderate_pct < major_pct)
    {
      return Err(Error::PolicyNotMonotonic(format!(
        "{minor_pct} / {moderate_pct} / {major_pct}"
      )));
    }
    Ok(Self { minor_pct, moderate_pct, major_pct })
  }

  /// `None` means the values agree closely enough that no discrepancy is
  /// recorded.
  pub fn classify(&self, deviation_pct: f64) -> Option<Severity> {
    if deviation_pct >= self.major_pct {
      Some(Severity::Major)
    } else if deviation_pct >= self.moderate_pct {
      Some(Severity::Moderate)
    } else if deviation_pct >= self.minor_pct {
      Some(Severity::Minor)
    } else {
      None
    }
  }
}

/// `|comparison - ours| / |ours| * 100`. A zero baseline disagreeing with a
/// non-zero comparison counts as a full 100% deviation rather than dividing
/// by zero.
pub fn deviation_pct(ours: f64, comparison: f64) -> f64 {
  if ours == 0.0 {
    return if comparison == 0.0 { 0.0 } else { 100.0 };
  }
  ((comparison - ours).abs() / ours.abs()) * 100.0
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Reconciler<S> {
  store:       Arc<S>,
  comparisons: Arc<dyn ComparisonFetcher>,
  policy:      SeverityPolicy,
}

impl<S> Reconciler<S>
where
  S: LedgerStore,
  S::Error: 'static,
{
  pub fn new(
    store: Arc<S>,
    comparisons: Arc<dyn ComparisonFetcher>,
    policy: SeverityPolicy,
  ) -> Self {
    Self { store, comparisons, policy }
  }

  /// Compare the latest ledger value for one (entity, metric) against the
  /// comparison sources.
  ///
  /// Returns the open discrepancy when one was created or refreshed, `None`
  /// when the ledger has no value for the metric, no comparison source
  /// reports one, or the worst deviation stays below the minor threshold.
  /// Terminal discrepancies from earlier conflicts are never touched; a new
  /// conflict opens a new pending row.
  pub async fn reconcile(
    &self,
    entity_id: &str,
    metric: Metric,
  ) -> Result<Option<Discrepancy>> {
    let Some(latest) = self
      .store
      .latest_fact(entity_id, metric)
      .await
      .map_err(Error::store)?
    else {
      return Ok(None);
    };

    let comparisons =
      self.comparisons.comparison_values(entity_id, metric).await?;
    if comparisons.is_empty() {
      return Ok(None);
    }

    let max_deviation = comparisons
      .iter()
      .map(|c| deviation_pct(latest.value, c.value))
      .fold(0.0_f64, f64::max);

    let Some(severity) = self.policy.classify(max_deviation) else {
      tracing::debug!(
        entity_id,
        metric = %metric,
        max_deviation_pct = max_deviation,
        "ledger agrees with comparison sources"
      );
      return Ok(None);
    };

    tracing::info!(
      entity_id,
      metric = %metric,
      our_value = latest.value,
      max_deviation_pct = max_deviation,
      severity = severity.as_str(),
      "discrepancy detected"
    );

    let row = self
      .store
      .upsert_pending_discrepancy(NewDiscrepancy {
        entity_id: entity_id.to_owned(),
        metric,
        our_value: latest.value,
        comparison_values: comparisons,
        severity,
        max_deviation_pct: max_deviation,
      })
      .await
      .map_err(Error::store)?;

    Ok(Some(row))
  }

  /// Run [`Self::reconcile`] for every metric of one entity. Comparison
  /// fetch failures skip that metric and keep going; store failures abort.
  pub async fn reconcile_entity(
    &self,
    entity_id: &str,
  ) -> Result<Vec<Discrepancy>> {
    let mut open = Vec::new();
    for metric in Metric::ALL {
      match self.reconcile(entity_id, metric).await {
        Ok(Some(row)) => open.push(row),
        Ok(None) => {}
        Err(Error::Fetch(e)) => {
          tracing::warn!(
            entity_id,
            metric = %metric,
            error = %e,
            "comparison fetch failed; metric skipped"
          );
        }
        Err(e) => return Err(e),
      }
    }
    Ok(open)
  }
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use tally_core::{
    discrepancy::{ComparisonValue, DiscrepancyStatus, Resolution},
    fact::NewFactEvent,
    fetch::FetchError,
  };
  use tally_store_sqlite::SqliteStore;

  use super::*;

  struct FixedComparisons(Vec<ComparisonValue>);

  #[async_trait]
  impl ComparisonFetcher for FixedComparisons {
    async fn comparison_values(
      &self,
      _entity_id: &str,
      _metric: Metric,
    ) -> Result<Vec<ComparisonValue>, FetchError> {
      Ok(self.0.clone())
    }
  }

  struct FailingComparisons;

  #[async_trait]
  impl ComparisonFetcher for FailingComparisons {
    async fn comparison_values(
      &self,
      _entity_id: &str,
      _metric: Metric,
    ) -> Result<Vec<ComparisonValue>, FetchError> {
      Err(FetchError::Transport {
        url:     "https://example.com".into(),
        message: "timed out".into(),
      })
    }
  }

  fn comparison(value: f64) -> ComparisonValue {
    ComparisonValue {
      value,
      source: "aggregator".into(),
      url: None,
      as_of: None,
    }
  }

  async fn seeded_store(value: f64) -> Arc<SqliteStore> {
    use bytes::Bytes;
    use chrono::{NaiveDate, Utc};
    use tally_core::artifact::{NewArtifact, SourceType};
    use uuid::Uuid;

    let store = SqliteStore::open_in_memory().await.unwrap();
    let put = store
      .put_artifact(
        NewArtifact {
          entity_id:    "mstr".into(),
          source_type:  SourceType::Filing,
          content_key:  "mstr/8k/8k-2026-02-02.html".into(),
          content_type: "text/html".into(),
          fetched_at:   Utc::now(),
        },
        Bytes::from_static(b"doc"),
      )
      .await
      .unwrap();

    store
      .append_fact(NewFactEvent {
        entity_id:         "mstr".into(),
        metric:            Metric::Holdings,
        value,
        unit:              "coins".into(),
        as_of:             NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        reported_at:       NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
        artifact_id:       put.artifact_id,
        run_id:            Uuid::new_v4(),
        extraction_method: "holdings_narrative_held".into(),
        confidence:        0.95,
        quoted_text:       None,
      })
      .await
      .unwrap();

    Arc::new(store)
  }

  #[test]
  fn policy_rejects_non_monotonic_thresholds() {
    assert!(SeverityPolicy::new(5.0, 25.0, 75.0).is_ok());
    assert!(SeverityPolicy::new(25.0, 5.0, 75.0).is_err());
    assert!(SeverityPolicy::new(5.0, 5.0, 75.0).is_err());
    assert!(SeverityPolicy::new(0.0, 25.0, 75.0).is_err());
  }

  #[test]
  fn classification_is_monotonic() {
    let policy = SeverityPolicy::default();
    assert_eq!(policy.classify(4.0), None);
    assert_eq!(policy.classify(10.0), Some(Severity::Minor));
    assert_eq!(policy.classify(50.0), Some(Severity::Moderate));
    assert_eq!(policy.classify(90.0), Some(Severity::Major));
    // Lower bounds are inclusive.
    assert_eq!(policy.classify(5.0), Some(Severity::Minor));
    assert_eq!(policy.classify(25.0), Some(Severity::Moderate));
    assert_eq!(policy.classify(75.0), Some(Severity::Major));
  }

  #[test]
  fn zero_baseline_deviation() {
    assert_eq!(deviation_pct(0.0, 0.0), 0.0);
    assert_eq!(deviation_pct(0.0, 500.0), 100.0);
    assert!((deviation_pct(100.0, 110.0) - 10.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn worst_deviation_drives_severity() {
    // 713000 deviates 0.07%, 900000 deviates 26.1%; the worst one lands the
    // pair in the moderate band.
    let store = seeded_store(713_502.0).await;
    let engine = Reconciler::new(
      store.clone(),
      Arc::new(FixedComparisons(vec![
        comparison(713_000.0),
        comparison(900_000.0),
      ])),
      SeverityPolicy::default(),
    );

    let row = engine
      .reconcile("mstr", Metric::Holdings)
      .await
      .unwrap()
      .expect("discrepancy expected");

    assert_eq!(row.severity, Severity::Moderate);
    assert_eq!(row.status, DiscrepancyStatus::Pending);
    assert!((row.max_deviation_pct - 26.138_78).abs() < 1e-3);
    assert_eq!(row.comparison_values.len(), 2);
  }

  #[tokio::test]
  async fn agreement_creates_nothing() {
    let store = seeded_store(713_502.0).await;
    let engine = Reconciler::new(
      store.clone(),
      Arc::new(FixedComparisons(vec![comparison(713_000.0)])),
      SeverityPolicy::default(),
    );

    assert!(engine.reconcile("mstr", Metric::Holdings).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn no_baseline_creates_nothing() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let engine = Reconciler::new(
      store,
      Arc::new(FixedComparisons(vec![comparison(1.0)])),
      SeverityPolicy::default(),
    );

    assert!(engine.reconcile("mstr", Metric::Holdings).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn repeat_runs_refresh_the_pending_row() {
    let store = seeded_store(713_502.0).await;
    let engine = Reconciler::new(
      store.clone(),
      Arc::new(FixedComparisons(vec![comparison(900_000.0)])),
      SeverityPolicy::default(),
    );

    let first = engine.reconcile("mstr", Metric::Holdings).await.unwrap().unwrap();
    let second =
      engine.reconcile("mstr", Metric::Holdings).await.unwrap().unwrap();
    assert_eq!(first.id, second.id);
  }

  #[tokio::test]
  async fn terminal_rows_stay_closed() {
    let store = seeded_store(713_502.0).await;
    let engine = Reconciler::new(
      store.clone(),
      Arc::new(FixedComparisons(vec![comparison(900_000.0)])),
      SeverityPolicy::default(),
    );

    let open = engine.reconcile("mstr", Metric::Holdings).await.unwrap().unwrap();
    store
      .resolve_discrepancy(open.id, Resolution {
        status:            DiscrepancyStatus::Resolved,
        resolution_value:  Some(713_502.0),
        resolution_source: Some("amended filing".into()),
        notes:             Some("confirmed via amended filing".into()),
        resolved_by:       Some("analyst".into()),
      })
      .await
      .unwrap();

    // The next run sees the same conflict but must open a new row, not
    // rewrite the closed one.
    let reopened =
      engine.reconcile("mstr", Metric::Holdings).await.unwrap().unwrap();
    assert_ne!(reopened.id, open.id);

    let closed = store.get_discrepancy(open.id).await.unwrap().unwrap();
    assert_eq!(closed.status, DiscrepancyStatus::Resolved);
  }

  #[tokio::test]
  async fn fetch_failure_skips_metric_in_entity_sweep() {
    let store = seeded_store(713_502.0).await;
    let engine = Reconciler::new(
      store,
      Arc::new(FailingComparisons),
      SeverityPolicy::default(),
    );

    // No metric aborts the sweep; it just comes back empty.
    let open = engine.reconcile_entity("mstr").await.unwrap();
    assert!(open.is_empty());
  }
}
