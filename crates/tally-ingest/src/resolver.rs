//! Filing identity resolution.
//!
//! An artifact ingested from a locally-generated reference knows only its
//! form type, filing date and (sometimes) a disambiguating suffix. The
//! resolver matches that partial reference against the entity's
//! authoritative filing index to recover the canonical accession-style
//! identifier and primary document URL.
//!
//! The one rule that matters: the resolver never guesses. Two same-day
//! filings of the same form with no suffix stay unresolved as
//! [`Resolution::Ambiguous`] rather than picking one arbitrarily.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tally_core::fetch::{FilingEntry, FilingIndex};

/// Trailing `-YYYY-MM-DD[-suffix].ext` portion of a content-key filename.
static LOCAL_REF: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"-(\d{4}-\d{2}-\d{2})(?:-(\d{3,8}))?\.[A-Za-z0-9]+$")
    .expect("valid regex")
});

// ─── Local references ────────────────────────────────────────────────────────

/// The partial filing reference encoded in an artifact's content key,
/// `{ticker}/{form bucket}/{form bucket}-{date}[-{suffix}].{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
  /// Lowercased form type with dashes removed, e.g. `8k`.
  pub form_bucket: String,
  pub filing_date: NaiveDate,
  /// Trailing accession segment, when the key carries one.
  pub suffix:      Option<String>,
}

impl LocalReference {
  pub fn parse(content_key: &str) -> Option<Self> {
    let mut segments = content_key.split('/');
    let _ticker = segments.next()?;
    let bucket = segments.next()?;
    let filename = segments.next()?;
    if segments.next().is_some() || bucket.is_empty() {
      return None;
    }

    let caps = LOCAL_REF.captures(filename)?;
    let filing_date =
      NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    let suffix = caps.get(2).map(|m| m.as_str().to_owned());

    Some(Self { form_bucket: bucket.to_owned(), filing_date, suffix })
  }
}

/// Lowercase a form type and drop dashes, so `8-K` and the key bucket `8k`
/// compare equal.
pub fn form_bucket(form: &str) -> String {
  form.to_lowercase().replace('-', "")
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Outcome of matching one local reference against the filing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Resolved {
    filing_identifier: String,
    primary_doc_url:   String,
  },
  /// More than one candidate and no way to tell them apart.
  Ambiguous { candidates: usize },
  NotFound,
}

/// Scan the index for entries matching the reference's form and date.
///
/// With a suffix, the match is against the accession number's trailing
/// segment and is either unique or [`Resolution::NotFound`]. Without one,
/// exactly one date+form hit resolves; several hits are
/// [`Resolution::Ambiguous`].
pub fn resolve(index: &FilingIndex, reference: &LocalReference) -> Resolution {
  let candidates: Vec<&FilingEntry> = index
    .entries
    .iter()
    .filter(|e| {
      e.filing_date == reference.filing_date
        && form_bucket(&e.form) == reference.form_bucket
    })
    .collect();

  let matched: Vec<&FilingEntry> = match &reference.suffix {
    Some(suffix) => candidates
      .into_iter()
      .filter(|e| e.accession_suffix() == Some(suffix.as_str()))
      .collect(),
    None => candidates,
  };

  match matched.as_slice() {
    [] => Resolution::NotFound,
    [entry] => Resolution::Resolved {
      filing_identifier: entry.accession.clone(),
      primary_doc_url:   entry.primary_doc_url(&index.cik),
    },
    many => Resolution::Ambiguous { candidates: many.len() },
  }
}
