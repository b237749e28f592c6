//! Pattern-based fact extraction for Tally.
//!
//! Applies an ordered set of named extractor variants to filing text and
//! yields zero-or-one structured fact per metric. Pure synchronous; no HTTP
//! or database dependencies.
//!
//! Extraction is deliberately conservative: no variant match means no fact
//! (the caller records a skip), and a guardrail rejects implausible values
//! before they can reach the ledger.
//!
//! # Quick start
//!
//! ```no_run
//! use tally_core::metric::Metric;
//! use tally_extract::Extractors;
//!
//! let extractors = Extractors::new().unwrap();
//! let text = "the Company held approximately 713,502 bitcoins";
//! if let Some(fact) = extractors.extract(Metric::Holdings, text).unwrap() {
//!   println!("{} = {} ({})", fact.metric, fact.value, fact.variant);
//! }
//! ```

pub mod error;
pub mod guardrail;
pub mod normalize;
mod patterns;
pub mod text;

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tally_core::metric::Metric;

pub use error::{Error, Result};
pub use text::document_text;

// ─── Variants ────────────────────────────────────────────────────────────────

/// Which shape of source text a variant targets. Narrative variants outrank
/// tabular ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
  Narrative,
  Tabular,
}

/// One compiled, named extractor pattern.
pub struct Variant {
  pub name:       &'static str,
  pub kind:       VariantKind,
  pub confidence: f64,
  regex:          Regex,
}

impl Variant {
  pub(crate) fn compile(spec: &patterns::VariantSpec) -> Result<Self> {
    Ok(Self {
      name:       spec.name,
      kind:       spec.kind,
      confidence: spec.confidence,
      regex:      Regex::new(spec.pattern)?,
    })
  }
}

// ─── Extracted fact ──────────────────────────────────────────────────────────

/// A structured fact read out of document text, tagged with the variant that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFact {
  pub metric:      Metric,
  pub value:       f64,
  pub unit:        String,
  /// Name of the matching variant, for traceability.
  pub variant:     String,
  pub kind:        VariantKind,
  pub confidence:  f64,
  /// Source text surrounding the match.
  pub quoted_text: String,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The per-metric ordered extractor sets. Build once, reuse across
/// documents; construction compiles every pattern.
pub struct Extractors {
  by_metric: HashMap<Metric, Vec<Variant>>,
}

impl Extractors {
  pub fn new() -> Result<Self> {
    let mut by_metric = HashMap::new();
    for metric in Metric::ALL {
      by_metric.insert(metric, patterns::compile(metric)?);
    }
    Ok(Self { by_metric })
  }

  /// The variants registered for a metric, in priority order.
  pub fn variants(&self, metric: Metric) -> &[Variant] {
    self.by_metric.get(&metric).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Try each variant in priority order; the first match produces the fact.
  ///
  /// Returns `Ok(None)` when no variant matches (the caller records
  /// `parse_no_match`), and `Err(Error::Guardrail { .. })` when a match
  /// produced an implausible value — that rejection must be surfaced, not
  /// treated as a plain miss.
  pub fn extract(&self, metric: Metric, text: &str) -> Result<Option<ExtractedFact>> {
    for variant in self.variants(metric) {
      let Some(caps) = variant.regex.captures(text) else {
        continue;
      };

      let raw = match caps.name("value") {
        Some(m) => m.as_str(),
        None => continue,
      };
      let scale = caps.name("scale").map(|m| m.as_str());

      // A matched-but-unparseable amount is treated as a miss for this
      // variant; lower-priority variants still get a chance.
      let value = match normalize::parse_amount(raw, scale) {
        Ok(v) => v,
        Err(Error::Amount(_)) => continue,
        Err(e) => return Err(e),
      };

      guardrail::check(metric, value)?;

      let whole = caps.get(0).expect("capture 0 always present");
      return Ok(Some(ExtractedFact {
        metric,
        value,
        unit: metric.default_unit().to_owned(),
        variant: variant.name.to_owned(),
        kind: variant.kind,
        confidence: variant.confidence,
        quoted_text: text::excerpt(text, whole.start(), whole.end()),
      }));
    }

    Ok(None)
  }
}
