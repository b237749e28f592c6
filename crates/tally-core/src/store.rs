//! The `LedgerStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! Higher layers (`tally-ingest`, `tally-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  artifact::{Artifact, NewArtifact, PutOutcome},
  discrepancy::{
    Discrepancy, DiscrepancyStatus, NewDiscrepancy, Resolution, Severity,
  },
  fact::{FactEvent, NewFactEvent},
  metric::Metric,
  run::{Run, RunTrigger},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Filters for [`LedgerStore::list_discrepancies`].
#[derive(Debug, Clone, Default)]
pub struct DiscrepancyQuery {
  pub status:    Option<DiscrepancyStatus>,
  pub severity:  Option<Severity>,
  pub entity_id: Option<String>,
  /// Restrict to rows created at or after this instant.
  pub since:     Option<DateTime<Utc>>,
  /// Restrict to rows created before this instant.
  pub until:     Option<DateTime<Utc>>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the Tally persistence backend: the content store, the
/// append-only fact ledger, discrepancy records and the run register.
///
/// Fact writes are append-only; artifacts are immutable apart from the
/// one-time identity backfill; discrepancy status moves only out of
/// `pending`. All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Content store ─────────────────────────────────────────────────────

  /// Persist raw document bytes under the deterministic content key and
  /// record metadata. If a row already exists for
  /// `(entity_id, content_key)`, nothing is written and the existing
  /// artifact id is returned with `inserted = false`.
  ///
  /// Bytes are written before metadata; a metadata failure leaves no row
  /// pointing at missing bytes and the whole call is retryable.
  fn put_artifact(
    &self,
    input: NewArtifact,
    bytes: Bytes,
  ) -> impl Future<Output = Result<PutOutcome, Self::Error>> + Send + '_;

  /// Retrieve artifact metadata by id. Returns `None` if not found.
  fn get_artifact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Artifact>, Self::Error>> + Send + '_;

  /// All artifacts for an entity still missing their filing identity.
  fn unresolved_artifacts<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + 'a;

  /// One-time identity backfill. Returns `true` if this call set the
  /// identity, `false` if the artifact was already resolved (no-op).
  fn backfill_identity<'a>(
    &'a self,
    artifact_id: Uuid,
    filing_identifier: &'a str,
    source_url: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Fact ledger — append-only writes ──────────────────────────────────

  /// Insert-or-ignore against the observation uniqueness tuple
  /// `(entity, metric, as_of, reported_at, artifact, value, unit)`.
  /// Returns `true` if a new row was inserted, `false` on a duplicate.
  /// Never updates existing rows.
  fn append_fact(
    &self,
    input: NewFactEvent,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The latest known value: maximum `as_of`, ties broken by maximum
  /// `reported_at`, then maximum `created_at` (most recently ingested
  /// wins). Recomputed on read, never cached.
  fn latest_fact<'a>(
    &'a self,
    entity_id: &'a str,
    metric: Metric,
  ) -> impl Future<Output = Result<Option<FactEvent>, Self::Error>> + Send + 'a;

  /// The value that was true on `date`: the event with the greatest
  /// `as_of <= date` (same tie-break as [`Self::latest_fact`]), or `None`
  /// if no event precedes it.
  fn fact_as_of<'a>(
    &'a self,
    entity_id: &'a str,
    metric: Metric,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<FactEvent>, Self::Error>> + Send + 'a;

  // ── Discrepancies ─────────────────────────────────────────────────────

  /// Create a pending discrepancy, or — if a pending row already exists for
  /// the (entity, metric) pair — refresh its comparison values, severity and
  /// deviation in place. Terminal rows are never touched.
  fn upsert_pending_discrepancy(
    &self,
    input: NewDiscrepancy,
  ) -> impl Future<Output = Result<Discrepancy, Self::Error>> + Send + '_;

  fn get_discrepancy(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Discrepancy>, Self::Error>> + Send + '_;

  fn list_discrepancies<'a>(
    &'a self,
    query: &'a DiscrepancyQuery,
  ) -> impl Future<Output = Result<Vec<Discrepancy>, Self::Error>> + Send + 'a;

  /// Compare-and-set a single discrepancy out of `pending` into a terminal
  /// status, recording resolver identity and `resolved_at`. Errors if the
  /// row is missing or already terminal.
  fn resolve_discrepancy(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> impl Future<Output = Result<Discrepancy, Self::Error>> + Send + '_;

  /// Resolve or dismiss every pending row for an (entity, metric) pair in
  /// one atomic statement. Returns the number of rows updated.
  fn resolve_discrepancies_for<'a>(
    &'a self,
    entity_id: &'a str,
    metric: Metric,
    resolution: Resolution,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  // ── Run register ──────────────────────────────────────────────────────

  fn start_run(
    &self,
    trigger: RunTrigger,
    notes: Option<String>,
  ) -> impl Future<Output = Result<Run, Self::Error>> + Send + '_;

  /// Stamp `ended_at`. A run is immutable once ended.
  fn finish_run(
    &self,
    run_id: Uuid,
  ) -> impl Future<Output = Result<Run, Self::Error>> + Send + '_;

  fn list_runs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Run>, Self::Error>> + Send + '_;
}
