//! Injected capabilities — external fetchers the core consumes.
//!
//! Concrete implementations live outside the core (`tally-edgar` for the SEC
//! ones); the pipeline and reconciliation engine hold them as trait objects,
//! so tests can substitute canned data.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{discrepancy::ComparisonValue, metric::Metric};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure modes shared by all fetcher capabilities.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Upstream returned a non-success HTTP status.
  #[error("upstream returned {status} for {url}")]
  Status { status: u16, url: String },

  /// Network / transport failure (DNS, TLS, timeout, ...).
  #[error("transport error for {url}: {message}")]
  Transport { url: String, message: String },

  /// The upstream has no data for this entity at all.
  #[error("no upstream data for entity {0:?}")]
  UnknownEntity(String),

  #[error("malformed upstream payload: {0}")]
  Decode(String),
}

impl FetchError {
  /// Whether a bounded retry with backoff is worthwhile. Rate limiting and
  /// server-side errors are; 4xx responses and decode failures are not.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      Self::Transport { .. } => true,
      Self::UnknownEntity(_) | Self::Decode(_) => false,
    }
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Raw bytes fetched from a source URL.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
  pub url:          String,
  pub content_type: String,
  pub bytes:        Bytes,
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
  /// Fetch raw bytes for a URL. Implementations must send the configured
  /// User-Agent/contact string and respect the source's rate limits.
  async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

// ─── Filing index ────────────────────────────────────────────────────────────

/// One entry in an entity's authoritative filing index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingEntry {
  /// Form type as filed, e.g. `8-K`.
  pub form:             String,
  pub filing_date:      NaiveDate,
  /// Dashed accession-like identifier, e.g. `0001193125-20-215604`.
  pub accession:        String,
  /// Filename of the primary document within the filing.
  pub primary_document: String,
}

impl FilingEntry {
  /// The trailing segment of the accession number, used to disambiguate
  /// same-day filings of the same form.
  pub fn accession_suffix(&self) -> Option<&str> {
    self.accession.rsplit('-').next()
  }

  /// Canonical URL of the primary document within the EDGAR-style archive.
  pub fn primary_doc_url(&self, cik: &str) -> String {
    let cik_digits = cik.trim_start_matches('0');
    let accession = self.accession.replace('-', "");
    format!(
      "https://www.sec.gov/Archives/edgar/data/{cik_digits}/{accession}/{doc}",
      doc = self.primary_document
    )
  }
}

/// The complete (paginated pages already merged) filing index for one entity.
#[derive(Debug, Clone)]
pub struct FilingIndex {
  /// Zero-padded CIK-like registrant number the index was loaded for.
  pub cik:     String,
  pub entries: Vec<FilingEntry>,
}

#[async_trait]
pub trait FilingIndexFetcher: Send + Sync {
  /// Load the entity's full filing index, including any overflow pages.
  /// Called once per entity per resolver run.
  async fn filing_index(&self, entity_id: &str) -> Result<FilingIndex, FetchError>;
}

// ─── Comparison values ───────────────────────────────────────────────────────

#[async_trait]
pub trait ComparisonFetcher: Send + Sync {
  /// Independently sourced candidate values for one (entity, metric), each
  /// with its own provenance.
  async fn comparison_values(
    &self,
    entity_id: &str,
    metric: Metric,
  ) -> Result<Vec<ComparisonValue>, FetchError>;
}
