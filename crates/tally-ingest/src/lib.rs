//! Ingestion, filing identity resolution and reconciliation for Tally.
//!
//! The pipeline wires the injected fetcher capabilities to the ledger store:
//! fetch, dedup-store, resolve identity, extract, append. The reconciliation
//! engine compares ledger values against independent sources and opens
//! discrepancies for human review.

pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;

pub use error::{Error, Result};
pub use pipeline::{
  IngestOptions, IngestSummary, Ingestor, RetryPolicy, SkipReason, SkippedItem,
};
pub use reconcile::{Reconciler, SeverityPolicy};

#[cfg(test)]
mod tests;
