//! Artifact — one raw fetched source document.
//!
//! An artifact is immutable once created, with a single exception: its filing
//! identity (`filing_identifier` + `source_url`) may be backfilled exactly
//! once by the resolver. Raw bytes live on disk under the content key; the
//! database holds metadata and a content hash only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Source type ─────────────────────────────────────────────────────────────

/// What kind of document this artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
  /// A primary filing document.
  Filing,
  /// A filing exhibit (press release, shareholder letter, ...).
  Exhibit,
}

impl SourceType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Filing => "filing",
      Self::Exhibit => "exhibit",
    }
  }
}

// ─── Artifact ────────────────────────────────────────────────────────────────

/// One raw fetched document. `(entity_id, content_key)` is unique; ingesting
/// the same document twice is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
  pub artifact_id:       Uuid,
  /// Ticker of the tracked entity, lowercase.
  pub entity_id:         String,
  pub source_type:       SourceType,
  /// Canonical filing identifier (dashed accession number); `None` until the
  /// resolver backfills it.
  pub filing_identifier: Option<String>,
  /// Canonical URL of the primary document; backfilled with the identifier.
  pub source_url:        Option<String>,
  /// Deterministic storage key, e.g. `mstr/8k/8k-2020-08-11-215604.html`.
  pub content_key:       String,
  /// SHA-256 hex digest of the stored bytes.
  pub content_hash:      String,
  pub content_type:      String,
  /// When the bytes were fetched from the upstream source.
  pub fetched_at:        DateTime<Utc>,
  /// Server-assigned; never changes after creation.
  pub created_at:        DateTime<Utc>,
}

impl Artifact {
  pub fn is_resolved(&self) -> bool {
    self.filing_identifier.is_some() && self.source_url.is_some()
  }
}

/// Input to [`crate::store::LedgerStore::put_artifact`].
/// `artifact_id`, `content_hash` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewArtifact {
  pub entity_id:    String,
  pub source_type:  SourceType,
  pub content_key:  String,
  pub content_type: String,
  pub fetched_at:   DateTime<Utc>,
}

/// Result of a content-store put: the artifact id for the key, and whether
/// this call actually inserted it (`false` means the key already existed and
/// nothing was written).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PutOutcome {
  pub artifact_id: Uuid,
  pub inserted:    bool,
}

// ─── Content keys ────────────────────────────────────────────────────────────

/// Build the deterministic content key for a filing document:
/// `{ticker}/{form bucket}/{form bucket}-{date}[-{suffix}].{ext}`.
///
/// The form bucket is the form type lowercased with dashes removed
/// (`8-K` → `8k`). The optional suffix disambiguates same-day filings of the
/// same form and is matched against the accession number's trailing segment
/// during identity resolution.
pub fn content_key(
  ticker: &str,
  form: &str,
  date: NaiveDate,
  suffix: Option<&str>,
  ext: &str,
) -> String {
  let ticker = ticker.to_lowercase();
  let bucket = form.to_lowercase().replace('-', "");
  match suffix {
    Some(sfx) => format!("{ticker}/{bucket}/{bucket}-{date}-{sfx}.{ext}"),
    None => format!("{ticker}/{bucket}/{bucket}-{date}.{ext}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn content_key_with_suffix() {
    let date = NaiveDate::from_ymd_opt(2020, 8, 11).unwrap();
    assert_eq!(
      content_key("MSTR", "8-K", date, Some("215604"), "html"),
      "mstr/8k/8k-2020-08-11-215604.html"
    );
  }

  #[test]
  fn content_key_without_suffix() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 6).unwrap();
    assert_eq!(
      content_key("mara", "10-Q", date, None, "html"),
      "mara/10q/10q-2024-02-06.html"
    );
  }
}
