//! End-to-end pipeline tests against an in-memory store and canned fetchers.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tally_core::{
  artifact::{NewArtifact, SourceType},
  fetch::{
    DocumentFetcher, FetchError, FetchedDocument, FilingEntry, FilingIndex,
    FilingIndexFetcher,
  },
  metric::Metric,
  run::RunTrigger,
  store::{DiscrepancyQuery, LedgerStore},
};
use tally_store_sqlite::SqliteStore;

use crate::{IngestOptions, Ingestor, SkipReason};

// ─── Canned capabilities ─────────────────────────────────────────────────────

struct CannedDocuments(HashMap<String, &'static str>);

#[async_trait]
impl DocumentFetcher for CannedDocuments {
  async fn fetch_document(
    &self,
    url: &str,
  ) -> Result<FetchedDocument, FetchError> {
    match self.0.get(url) {
      Some(&body) => Ok(FetchedDocument {
        url:          url.to_owned(),
        content_type: "text/html".into(),
        bytes:        Bytes::from_static(body.as_bytes()),
      }),
      None => Err(FetchError::Status { status: 404, url: url.to_owned() }),
    }
  }
}

struct CannedIndex(FilingIndex);

#[async_trait]
impl FilingIndexFetcher for CannedIndex {
  async fn filing_index(
    &self,
    _entity_id: &str,
  ) -> Result<FilingIndex, FetchError> {
    Ok(self.0.clone())
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

const CIK: &str = "0001050446";

const HOLDINGS_8K: &str = "<html><body><p>As of January 31, 2026, the \
   Company held approximately 713,502 bitcoins acquired for $48 billion. \
   Cash and cash equivalents of approximately $60.3 million.</p></body></html>";

fn today_minus(days: i64) -> NaiveDate {
  Utc::now().date_naive() - chrono::Duration::days(days)
}

fn entry(form: &str, filing_date: NaiveDate, accession: &str) -> FilingEntry {
  FilingEntry {
    form: form.into(),
    filing_date,
    accession: accession.into(),
    primary_document: "d86156d8k.htm".into(),
  }
}

fn doc_url(accession: &str) -> String {
  format!(
    "https://www.sec.gov/Archives/edgar/data/1050446/{}/d86156d8k.htm",
    accession.replace('-', "")
  )
}

struct Fixture {
  store:    Arc<SqliteStore>,
  ingestor: Ingestor<SqliteStore>,
}

async fn fixture(
  entries: Vec<FilingEntry>,
  docs: Vec<(&FilingEntry, &'static str)>,
) -> Fixture {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let documents = CannedDocuments(
    docs
      .into_iter()
      .map(|(e, body)| (doc_url(&e.accession), body))
      .collect(),
  );
  let filings = CannedIndex(FilingIndex { cik: CIK.into(), entries });

  let ingestor = Ingestor::new(
    store.clone(),
    Arc::new(documents),
    Arc::new(filings),
  )
  .unwrap();

  Fixture { store, ingestor }
}

async fn run(fixture: &Fixture, options: IngestOptions) -> crate::IngestSummary {
  fixture
    .ingestor
    .ingest("mstr", options, RunTrigger::Manual)
    .await
    .unwrap()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingests_a_filing_end_to_end() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(vec![e.clone()], vec![(&e, HOLDINGS_8K)]).await;

  let summary = run(&fx, IngestOptions::default()).await;
  assert_eq!(summary.attempted, 1);
  assert_eq!(summary.artifacts_inserted, 1);
  // Holdings plus cash reserves from the same document.
  assert_eq!(summary.facts_inserted, 2);
  assert!(summary.skipped.is_empty());
  assert!(summary.run_id.is_some());

  let latest = fx
    .store
    .latest_fact("mstr", Metric::Holdings)
    .await
    .unwrap()
    .expect("holdings recorded");
  assert_eq!(latest.value, 713_502.0);
  assert_eq!(latest.extraction_method, "holdings_narrative_held");
  assert!(latest.quoted_text.as_deref().unwrap().contains("713,502"));

  // Identity came straight from the index entry.
  let artifact = fx.store.get_artifact(latest.artifact_id).await.unwrap().unwrap();
  assert_eq!(
    artifact.filing_identifier.as_deref(),
    Some("0001193125-20-215604")
  );
  assert_eq!(artifact.source_url.as_deref(), Some(doc_url(&e.accession).as_str()));

  let runs = fx.store.list_runs(10).await.unwrap();
  assert_eq!(runs.len(), 1);
  assert!(runs[0].ended_at.is_some());
}

#[tokio::test]
async fn second_identical_run_is_a_no_op() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(vec![e.clone()], vec![(&e, HOLDINGS_8K)]).await;

  let first = run(&fx, IngestOptions::default()).await;
  assert_eq!(first.artifacts_inserted, 1);

  let second = run(&fx, IngestOptions::default()).await;
  assert_eq!(second.artifacts_inserted, 0);
  assert_eq!(second.facts_inserted, 0);
  assert_eq!(second.skipped.len(), 1);
  assert_eq!(second.skipped[0].reason, SkipReason::Duplicate);
}

#[tokio::test]
async fn fetch_failure_does_not_abort_the_batch() {
  let good = entry("8-K", today_minus(5), "0001193125-20-215604");
  let missing = entry("8-K", today_minus(3), "0001193125-20-999999");
  // Only the first document is actually servable.
  let fx =
    fixture(vec![good.clone(), missing], vec![(&good, HOLDINGS_8K)]).await;

  let summary = run(&fx, IngestOptions::default()).await;
  assert_eq!(summary.attempted, 2);
  assert_eq!(summary.artifacts_inserted, 1);
  assert_eq!(summary.skipped.len(), 1);
  assert_eq!(summary.skipped[0].reason, SkipReason::NotFound);
}

#[tokio::test]
async fn lookback_and_form_filters_apply() {
  let recent = entry("8-K", today_minus(5), "0001193125-20-215604");
  let stale = entry("8-K", today_minus(400), "0001193125-19-111111");
  let irrelevant = entry("S-8", today_minus(5), "0001193125-20-222222");
  let fx = fixture(
    vec![recent.clone(), stale, irrelevant],
    vec![(&recent, HOLDINGS_8K)],
  )
  .await;

  let summary = run(&fx, IngestOptions::default()).await;
  assert_eq!(summary.attempted, 1);
}

#[tokio::test]
async fn unmatched_document_records_parse_no_match() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(
    vec![e.clone()],
    vec![(&e, "<html><p>board appointed a new director</p></html>")],
  )
  .await;

  let summary = run(&fx, IngestOptions::default()).await;
  assert_eq!(summary.artifacts_inserted, 1);
  assert_eq!(summary.facts_inserted, 0);
  assert_eq!(summary.skipped.len(), 1);
  assert_eq!(summary.skipped[0].reason, SkipReason::ParseNoMatch);
}

#[tokio::test]
async fn guardrail_rejection_is_surfaced() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(
    vec![e.clone()],
    vec![(&e, "<p>held approximately 900,000,000 bitcoins</p>")],
  )
  .await;

  let summary = run(&fx, IngestOptions::default()).await;
  assert_eq!(summary.facts_inserted, 0);
  assert!(
    summary
      .skipped
      .iter()
      .any(|s| s.reason == SkipReason::GuardrailRejected)
  );
  assert!(
    fx.store
      .latest_fact("mstr", Metric::Holdings)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn dry_run_writes_nothing() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(vec![e.clone()], vec![(&e, HOLDINGS_8K)]).await;

  let summary = run(&fx, IngestOptions { dry_run: true, ..Default::default() }).await;
  assert!(summary.run_id.is_none());
  assert_eq!(summary.facts_inserted, 2);

  assert!(
    fx.store
      .latest_fact("mstr", Metric::Holdings)
      .await
      .unwrap()
      .is_none()
  );
  assert!(fx.store.list_runs(10).await.unwrap().is_empty());
  assert!(
    fx.store
      .list_discrepancies(&DiscrepancyQuery::default())
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn heals_previously_unresolved_artifacts() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(vec![e.clone()], vec![(&e, HOLDINGS_8K)]).await;

  // An artifact from an earlier source that never learned its identity.
  let key = format!("mstr/8k/8k-{}-215604.html", today_minus(5));
  fx.store
    .put_artifact(
      NewArtifact {
        entity_id:    "mstr".into(),
        source_type:  SourceType::Filing,
        content_key:  key.clone(),
        content_type: "text/html".into(),
        fetched_at:   Utc::now(),
      },
      Bytes::from_static(HOLDINGS_8K.as_bytes()),
    )
    .await
    .unwrap();
  assert_eq!(fx.store.unresolved_artifacts("mstr").await.unwrap().len(), 1);

  let summary = run(&fx, IngestOptions::default()).await;
  assert!(summary.identities_backfilled >= 1);
  assert!(fx.store.unresolved_artifacts("mstr").await.unwrap().is_empty());
}

#[tokio::test]
async fn ambiguous_reference_stays_unresolved() {
  let a = entry("8-K", today_minus(400), "0001193125-19-100001");
  let b = entry("8-K", today_minus(400), "0001193125-19-100002");
  let fx = fixture(vec![a, b], vec![]).await;

  // Suffix-less key for a day with two 8-K filings.
  let key = format!("mstr/8k/8k-{}.html", today_minus(400));
  fx.store
    .put_artifact(
      NewArtifact {
        entity_id:    "mstr".into(),
        source_type:  SourceType::Filing,
        content_key:  key.clone(),
        content_type: "text/html".into(),
        fetched_at:   Utc::now(),
      },
      Bytes::from_static(b"doc"),
    )
    .await
    .unwrap();

  let summary = run(&fx, IngestOptions::default()).await;
  assert!(
    summary
      .skipped
      .iter()
      .any(|s| s.reason == SkipReason::AmbiguousMatch && s.reference == key)
  );
  assert_eq!(fx.store.unresolved_artifacts("mstr").await.unwrap().len(), 1);
}

#[tokio::test]
async fn ingest_many_runs_each_entity() {
  let e = entry("8-K", today_minus(5), "0001193125-20-215604");
  let fx = fixture(vec![e.clone()], vec![(&e, HOLDINGS_8K)]).await;

  let outcomes = fx
    .ingestor
    .ingest_many(
      &["mstr".to_owned(), "mara".to_owned()],
      IngestOptions::default(),
      RunTrigger::Scheduled,
    )
    .await;

  assert_eq!(outcomes.len(), 2);
  for (_, outcome) in outcomes {
    assert!(outcome.is_ok());
  }
}
