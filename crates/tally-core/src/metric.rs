//! Metric — a named financial fact type tracked per entity.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The five canonical metrics observed from filings and compared against
/// independent sources. The discriminant strings are stable: they appear in
/// database columns and API query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
  /// Treasury asset holdings (coin count, not fiat value).
  Holdings,
  SharesOutstanding,
  TotalDebt,
  CashReserves,
  PreferredEquity,
}

impl Metric {
  pub const ALL: [Metric; 5] = [
    Metric::Holdings,
    Metric::SharesOutstanding,
    Metric::TotalDebt,
    Metric::CashReserves,
    Metric::PreferredEquity,
  ];

  /// The discriminant string stored in the `metric` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Holdings => "holdings",
      Self::SharesOutstanding => "shares_outstanding",
      Self::TotalDebt => "total_debt",
      Self::CashReserves => "cash_reserves",
      Self::PreferredEquity => "preferred_equity",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "holdings" => Ok(Self::Holdings),
      "shares_outstanding" => Ok(Self::SharesOutstanding),
      "total_debt" => Ok(Self::TotalDebt),
      "cash_reserves" => Ok(Self::CashReserves),
      "preferred_equity" => Ok(Self::PreferredEquity),
      other => Err(Error::UnknownMetric(other.to_owned())),
    }
  }

  /// The unit a freshly extracted value of this metric is denominated in.
  /// Holdings are counted in the entity's treasury asset; everything else is
  /// in the entity's reporting currency or plain share counts.
  pub fn default_unit(&self) -> &'static str {
    match self {
      Self::Holdings => "coins",
      Self::SharesOutstanding => "shares",
      Self::TotalDebt | Self::CashReserves | Self::PreferredEquity => "USD",
    }
  }
}

impl std::fmt::Display for Metric {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
