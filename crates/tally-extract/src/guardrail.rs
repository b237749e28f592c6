//! Sanity bounds applied before an extracted value may enter the ledger.
//!
//! Extraction is conservative: a value that is non-finite, negative, or
//! implausibly large for its metric is rejected outright. The caller records
//! the rejection; it is never silently dropped.

use tally_core::metric::Metric;

use crate::{Error, Result};

/// Upper sanity bound per metric, in the metric's default unit.
/// No tracked entity holds a hundred million coins, and no reporting-currency
/// balance-sheet line should reach these caps.
fn max_plausible(metric: Metric) -> f64 {
  match metric {
    Metric::Holdings => 1e8,
    Metric::SharesOutstanding => 1e11,
    Metric::TotalDebt => 5e11,
    Metric::CashReserves => 5e11,
    Metric::PreferredEquity => 2e12,
  }
}

/// Reject values that cannot possibly be a real observation of `metric`.
pub fn check(metric: Metric, value: f64) -> Result<()> {
  if !value.is_finite() {
    return Err(Error::Guardrail {
      metric,
      value,
      reason: "non-finite".into(),
    });
  }
  if value < 0.0 {
    return Err(Error::Guardrail {
      metric,
      value,
      reason: "negative".into(),
    });
  }
  let cap = max_plausible(metric);
  if value >= cap {
    return Err(Error::Guardrail {
      metric,
      value,
      reason: format!("exceeds sanity bound {cap:e}"),
    });
  }
  Ok(())
}
