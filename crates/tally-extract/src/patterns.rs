//! The default extractor variant sets, per metric.
//!
//! Behaviour is data: each variant is a named, prioritised pattern, so a
//! false negative can be traced to (and tested against) the exact variant
//! that should have matched. Narrative-sentence forms come first, tabular
//! forms after; the first match wins.
//!
//! Every pattern captures a `value` group and optionally a `scale` group
//! (`thousand` / `million` / `billion`), both handed to the shared
//! normaliser.

use tally_core::metric::Metric;

use crate::{Result, VariantKind, Variant};

/// Declarative form of a variant, compiled by [`Variant::compile`].
pub(crate) struct VariantSpec {
  pub name:       &'static str,
  pub kind:       VariantKind,
  pub pattern:    &'static str,
  pub confidence: f64,
}

/// Ordered variant specs for one metric, highest priority first.
pub(crate) fn specs(metric: Metric) -> &'static [VariantSpec] {
  match metric {
    Metric::Holdings => HOLDINGS,
    Metric::SharesOutstanding => SHARES_OUTSTANDING,
    Metric::TotalDebt => TOTAL_DEBT,
    Metric::CashReserves => CASH_RESERVES,
    Metric::PreferredEquity => PREFERRED_EQUITY,
  }
}

pub(crate) fn compile(metric: Metric) -> Result<Vec<Variant>> {
  specs(metric).iter().map(Variant::compile).collect()
}

const HOLDINGS: &[VariantSpec] = &[
  VariantSpec {
    name:       "holdings_narrative_held",
    kind:       VariantKind::Narrative,
    // "held approximately 713,502 bitcoins" / "holds an aggregate of ..."
    pattern:    r"(?i)\b(?:held|holds|hold)\s+(?:an\s+aggregate\s+of\s+)?(?:approximately\s+)?(?P<value>\d[\d,]*)\s+(?:bitcoin|btc|ether|eth|sol\b|coin)",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "holdings_narrative_aggregate",
    kind:       VariantKind::Narrative,
    pattern:    r"(?i)aggregate\s+(?:\w+\s+)?holdings\s+(?:of|were|total(?:ed)?)\s+(?:approximately\s+)?(?P<value>\d[\d,]*)",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "holdings_tabular_total",
    kind:       VariantKind::Tabular,
    pattern:    r"(?i)total\s+(?:digital\s+assets?|bitcoin|btc|ether|eth)\s*[:|]?\s*(?P<value>\d[\d,]*)\b",
    confidence: 0.85,
  },
];

const SHARES_OUTSTANDING: &[VariantSpec] = &[
  VariantSpec {
    name:       "shares_narrative_outstanding",
    kind:       VariantKind::Narrative,
    pattern:    r"(?i)(?P<value>\d[\d,]*)\s+shares\s+(?:of\s+(?:class\s+a\s+)?common\s+stock\s+)?(?:issued\s+and\s+)?outstanding",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "shares_tabular_outstanding",
    kind:       VariantKind::Tabular,
    pattern:    r"(?i)shares\s+outstanding\s*[:|]?\s*(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?\b",
    confidence: 0.85,
  },
];

const TOTAL_DEBT: &[VariantSpec] = &[
  VariantSpec {
    name:       "debt_narrative_principal",
    kind:       VariantKind::Narrative,
    pattern:    r"(?i)aggregate\s+principal\s+amount\s+of\s+\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "debt_tabular_total",
    kind:       VariantKind::Tabular,
    pattern:    r"(?i)total\s+(?:debt|indebtedness)\s*(?:of\s+)?[:|]?\s*\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?\b",
    confidence: 0.85,
  },
];

const CASH_RESERVES: &[VariantSpec] = &[
  VariantSpec {
    name:       "cash_narrative_equivalents",
    kind:       VariantKind::Narrative,
    pattern:    r"(?i)cash(?:,?\s+cash\s+equivalents)?(?:\s+and\s+(?:cash\s+)?equivalents)?\s+of\s+(?:approximately\s+)?\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "cash_tabular_equivalents",
    kind:       VariantKind::Tabular,
    pattern:    r"(?i)cash\s+and\s+cash\s+equivalents\s*[:|]?\s*\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?\b",
    confidence: 0.85,
  },
];

const PREFERRED_EQUITY: &[VariantSpec] = &[
  VariantSpec {
    name:       "preferred_narrative_liquidation",
    kind:       VariantKind::Narrative,
    pattern:    r"(?i)preferred\s+stock[^.]{0,120}?aggregate\s+(?:liquidation\s+preference|stated\s+amount)\s+of\s+\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?",
    confidence: 0.95,
  },
  VariantSpec {
    name:       "preferred_tabular_equity",
    kind:       VariantKind::Tabular,
    pattern:    r"(?i)preferred\s+(?:equity|stock)\s*[:|]?\s*\$?(?P<value>\d[\d,.]*)\s*(?P<scale>thousand|million|billion)?\b",
    confidence: 0.85,
  },
];
