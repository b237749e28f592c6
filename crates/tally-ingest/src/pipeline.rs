//! The ingestion pipeline.
//!
//! One [`Ingestor::ingest`] call processes a single entity: load the filing
//! index, fetch each relevant filing inside the lookback window, store the
//! raw bytes, backfill filing identity, extract facts, and append them to
//! the ledger. Per-item failures are recorded as skips in the batch summary
//! and never abort sibling items; only store failures abort the run.
//!
//! Dry runs are enforced here, at the write boundary: no store write of any
//! kind is issued, regardless of what upstream capabilities claim to do.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures::{StreamExt as _, stream};
use serde::Serialize;
use tally_core::{
  artifact::{NewArtifact, SourceType, content_key},
  fact::NewFactEvent,
  fetch::{
    DocumentFetcher, FetchError, FetchedDocument, FilingEntry, FilingIndex,
    FilingIndexFetcher,
  },
  metric::Metric,
  run::RunTrigger,
  store::LedgerStore,
};
use tally_extract::Extractors;
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  resolver::{self, LocalReference, Resolution},
};

/// Form types worth extracting treasury facts from.
const RELEVANT_FORMS: [&str; 5] = ["8-K", "10-K", "10-Q", "6-K", "20-F"];

fn is_relevant_form(form: &str) -> bool {
  RELEVANT_FORMS.contains(&form)
}

fn document_ext(primary_document: &str) -> &str {
  match primary_document.rsplit_once('.') {
    Some((_, ext)) if !ext.is_empty() => ext,
    _ => "html",
  }
}

// ─── Options and summary ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
  pub lookback_days: i64,
  pub dry_run:       bool,
}

impl Default for IngestOptions {
  fn default() -> Self {
    Self { lookback_days: 30, dry_run: false }
  }
}

/// Bounded exponential backoff for retryable fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_retries:     u32,
  pub initial_backoff: Duration,
  pub max_backoff:     Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries:     3,
      initial_backoff: Duration::from_millis(500),
      max_backoff:     Duration::from_secs(30),
    }
  }
}

/// Why one item in a batch produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  FetchFailed,
  NotFound,
  AmbiguousMatch,
  ParseNoMatch,
  GuardrailRejected,
  Duplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
  /// What was being processed, e.g. a content key or URL.
  pub reference: String,
  pub reason:    SkipReason,
  pub detail:    Option<String>,
}

/// What one ingestion batch did. Batches always run to completion; failures
/// show up here rather than as errors.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
  pub entity_id:             String,
  /// `None` on dry runs, which never touch the run register.
  pub run_id:                Option<Uuid>,
  pub dry_run:               bool,
  pub attempted:             usize,
  pub artifacts_inserted:    usize,
  pub facts_inserted:        usize,
  pub identities_backfilled: usize,
  pub skipped:               Vec<SkippedItem>,
}

impl IngestSummary {
  fn new(entity_id: &str, dry_run: bool) -> Self {
    Self {
      entity_id: entity_id.to_owned(),
      run_id: None,
      dry_run,
      attempted: 0,
      artifacts_inserted: 0,
      facts_inserted: 0,
      identities_backfilled: 0,
      skipped: Vec::new(),
    }
  }

  fn skip(&mut self, reference: &str, reason: SkipReason, detail: Option<String>) {
    self.skipped.push(SkippedItem {
      reference: reference.to_owned(),
      reason,
      detail,
    });
  }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

pub struct Ingestor<S> {
  store:       Arc<S>,
  documents:   Arc<dyn DocumentFetcher>,
  filings:     Arc<dyn FilingIndexFetcher>,
  extractors:  Extractors,
  retry:       RetryPolicy,
  concurrency: usize,
}

impl<S> Ingestor<S>
where
  S: LedgerStore,
  S::Error: 'static,
{
  pub fn new(
    store: Arc<S>,
    documents: Arc<dyn DocumentFetcher>,
    filings: Arc<dyn FilingIndexFetcher>,
  ) -> Result<Self> {
    Ok(Self {
      store,
      documents,
      filings,
      extractors: Extractors::new()?,
      retry: RetryPolicy::default(),
      concurrency: 4,
    })
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Bound on how many entities [`Self::ingest_many`] works concurrently.
  /// Work within one entity is always sequential.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  /// Ingest one entity's relevant filings from the lookback window.
  ///
  /// Failing to load the filing index fails the whole call, since nothing
  /// can proceed without it. Everything after that degrades to per-item
  /// skips.
  pub async fn ingest(
    &self,
    entity_id: &str,
    options: IngestOptions,
    trigger: RunTrigger,
  ) -> Result<IngestSummary> {
    let index = self.load_index(entity_id).await?;
    let cutoff =
      Utc::now().date_naive() - chrono::Duration::days(options.lookback_days);

    let mut summary = IngestSummary::new(entity_id, options.dry_run);

    let run = if options.dry_run {
      None
    } else {
      let run = self
        .store
        .start_run(trigger, Some(format!("ingest {entity_id}")))
        .await
        .map_err(Error::store)?;
      summary.run_id = Some(run.run_id);
      Some(run)
    };

    tracing::info!(
      entity_id,
      lookback_days = options.lookback_days,
      dry_run = options.dry_run,
      "ingestion started"
    );

    // Heal artifacts left unresolved by earlier runs while we have the
    // index loaded anyway.
    if !options.dry_run {
      self.resolve_pending(entity_id, &index, &mut summary).await?;
    }

    let relevant: Vec<&FilingEntry> = index
      .entries
      .iter()
      .filter(|e| is_relevant_form(&e.form) && e.filing_date >= cutoff)
      .collect();

    for entry in relevant {
      summary.attempted += 1;
      self
        .ingest_entry(entity_id, &index.cik, entry, run.as_ref().map(|r| r.run_id), &mut summary)
        .await?;
    }

    if let Some(run) = run {
      self.store.finish_run(run.run_id).await.map_err(Error::store)?;
    }

    tracing::info!(
      entity_id,
      attempted = summary.attempted,
      artifacts_inserted = summary.artifacts_inserted,
      facts_inserted = summary.facts_inserted,
      skipped = summary.skipped.len(),
      "ingestion finished"
    );

    Ok(summary)
  }

  /// Ingest several entities with bounded concurrency. Per-entity outcomes
  /// are independent; one entity failing never stops the others.
  pub async fn ingest_many(
    &self,
    entity_ids: &[String],
    options: IngestOptions,
    trigger: RunTrigger,
  ) -> Vec<(String, Result<IngestSummary>)> {
    stream::iter(entity_ids)
      .map(|entity_id| async move {
        let outcome = self.ingest(entity_id, options, trigger).await;
        (entity_id.clone(), outcome)
      })
      .buffer_unordered(self.concurrency)
      .collect()
      .await
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn load_index(&self, entity_id: &str) -> Result<FilingIndex> {
    let mut backoff = self.retry.initial_backoff;
    let mut attempt = 0;
    loop {
      match self.filings.filing_index(entity_id).await {
        Ok(index) => return Ok(index),
        Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
          attempt += 1;
          tracing::warn!(
            entity_id,
            attempt,
            error = %e,
            "filing index fetch failed; retrying"
          );
          tokio::time::sleep(backoff).await;
          backoff = (backoff * 2).min(self.retry.max_backoff);
        }
        Err(e) => return Err(e.into()),
      }
    }
  }

  async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, FetchError> {
    let mut backoff = self.retry.initial_backoff;
    let mut attempt = 0;
    loop {
      match self.documents.fetch_document(url).await {
        Ok(doc) => return Ok(doc),
        Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
          attempt += 1;
          tracing::warn!(url, attempt, error = %e, "fetch failed; retrying");
          tokio::time::sleep(backoff).await;
          backoff = (backoff * 2).min(self.retry.max_backoff);
        }
        Err(e) => return Err(e),
      }
    }
  }

  /// Match every still-unresolved artifact of this entity against the
  /// loaded index and backfill identities where the match is unique.
  async fn resolve_pending(
    &self,
    entity_id: &str,
    index: &FilingIndex,
    summary: &mut IngestSummary,
  ) -> Result<()> {
    let unresolved = self
      .store
      .unresolved_artifacts(entity_id)
      .await
      .map_err(Error::store)?;

    for artifact in unresolved {
      let Some(reference) = LocalReference::parse(&artifact.content_key) else {
        summary.skip(
          &artifact.content_key,
          SkipReason::NotFound,
          Some("content key is not a filing reference".into()),
        );
        continue;
      };

      match resolver::resolve(index, &reference) {
        Resolution::Resolved { filing_identifier, primary_doc_url } => {
          let set = self
            .store
            .backfill_identity(
              artifact.artifact_id,
              &filing_identifier,
              &primary_doc_url,
            )
            .await
            .map_err(Error::store)?;
          if set {
            summary.identities_backfilled += 1;
            tracing::info!(
              entity_id,
              content_key = artifact.content_key,
              filing_identifier,
              "filing identity backfilled"
            );
          }
        }
        Resolution::Ambiguous { candidates } => {
          tracing::warn!(
            entity_id,
            content_key = artifact.content_key,
            candidates,
            "ambiguous filing reference left unresolved"
          );
          summary.skip(
            &artifact.content_key,
            SkipReason::AmbiguousMatch,
            Some(format!("{candidates} same-day candidates")),
          );
        }
        Resolution::NotFound => {
          summary.skip(
            &artifact.content_key,
            SkipReason::NotFound,
            Some("no index entry matches the reference".into()),
          );
        }
      }
    }

    Ok(())
  }

  async fn ingest_entry(
    &self,
    entity_id: &str,
    cik: &str,
    entry: &FilingEntry,
    run_id: Option<Uuid>,
    summary: &mut IngestSummary,
  ) -> Result<()> {
    let url = entry.primary_doc_url(cik);
    let key = content_key(
      entity_id,
      &entry.form,
      entry.filing_date,
      entry.accession_suffix(),
      document_ext(&entry.primary_document),
    );

    let doc = match self.fetch_document(&url).await {
      Ok(doc) => doc,
      Err(FetchError::Status { status: 404, .. }) => {
        summary.skip(&key, SkipReason::NotFound, Some(url));
        return Ok(());
      }
      Err(e) => {
        tracing::warn!(url, error = %e, "document fetch failed");
        summary.skip(&key, SkipReason::FetchFailed, Some(e.to_string()));
        return Ok(());
      }
    };

    let artifact_id = if let Some(run_id) = run_id {
      let outcome = self
        .store
        .put_artifact(
          NewArtifact {
            entity_id:    entity_id.to_owned(),
            source_type:  SourceType::Filing,
            content_key:  key.clone(),
            content_type: doc.content_type.clone(),
            fetched_at:   Utc::now(),
          },
          doc.bytes.clone(),
        )
        .await
        .map_err(Error::store)?;

      if !outcome.inserted {
        // Already ingested; its facts are already in the ledger.
        summary.skip(&key, SkipReason::Duplicate, None);
        return Ok(());
      }
      summary.artifacts_inserted += 1;

      // The index entry is itself the authoritative identity.
      let set = self
        .store
        .backfill_identity(outcome.artifact_id, &entry.accession, &url)
        .await
        .map_err(Error::store)?;
      if set {
        summary.identities_backfilled += 1;
      }

      Some(outcome.artifact_id)
    } else {
      summary.artifacts_inserted += 1;
      None
    };

    let text = tally_extract::document_text(&String::from_utf8_lossy(&doc.bytes));
    let mut matched_any = false;

    for metric in Metric::ALL {
      let fact = match self.extractors.extract(metric, &text) {
        Ok(Some(fact)) => fact,
        Ok(None) => continue,
        Err(e @ tally_extract::Error::Guardrail { .. }) => {
          tracing::warn!(
            entity_id,
            content_key = key,
            metric = %metric,
            error = %e,
            "guardrail rejected extracted value"
          );
          summary.skip(&key, SkipReason::GuardrailRejected, Some(e.to_string()));
          continue;
        }
        Err(e) => return Err(e.into()),
      };
      matched_any = true;

      let (Some(artifact_id), Some(run_id)) = (artifact_id, run_id) else {
        // Dry run: count the fact that would have been appended.
        summary.facts_inserted += 1;
        continue;
      };

      let inserted = self
        .store
        .append_fact(NewFactEvent {
          entity_id: entity_id.to_owned(),
          metric: fact.metric,
          value: fact.value,
          unit: fact.unit,
          // Filings rarely state a separate effective date in a
          // machine-recoverable way; the filing date stands in for both.
          as_of: entry.filing_date,
          reported_at: entry.filing_date,
          artifact_id,
          run_id,
          extraction_method: fact.variant,
          confidence: fact.confidence,
          quoted_text: Some(fact.quoted_text),
        })
        .await
        .map_err(Error::store)?;

      if inserted {
        summary.facts_inserted += 1;
      } else {
        tracing::debug!(
          entity_id,
          metric = %metric,
          "identical observation already in ledger"
        );
      }
    }

    if !matched_any {
      summary.skip(&key, SkipReason::ParseNoMatch, None);
    }

    Ok(())
  }
}
