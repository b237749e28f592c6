//! Numeric normalization applied uniformly to every extracted amount.
//!
//! Filings write the same number many ways: `$4,250.0 million`,
//! `1,050,000`, `$3.0 billion`. All of them reduce to a plain `f64` here
//! before any guardrail or ledger code sees them.

use crate::{Error, Result};

/// Parse a raw matched amount plus an optional scale word.
///
/// Strips currency signs and comma separators; `thousand` / `million` /
/// `billion` multiply accordingly (case-insensitive).
pub fn parse_amount(raw: &str, scale_word: Option<&str>) -> Result<f64> {
  let cleaned: String = raw
    .trim()
    .trim_start_matches('$')
    .chars()
    .filter(|c| *c != ',')
    .collect();

  if cleaned.is_empty() {
    return Err(Error::Amount(raw.to_owned()));
  }

  let base: f64 = cleaned
    .parse()
    .map_err(|_| Error::Amount(raw.to_owned()))?;

  Ok(base * scale_factor(scale_word))
}

fn scale_factor(scale_word: Option<&str>) -> f64 {
  match scale_word.map(str::to_ascii_lowercase).as_deref() {
    Some("thousand") => 1e3,
    Some("million") => 1e6,
    Some("billion") => 1e9,
    _ => 1.0,
  }
}
