//! Core types and trait definitions for the Tally fact ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod artifact;
pub mod discrepancy;
pub mod error;
pub mod fact;
pub mod fetch;
pub mod metric;
pub mod run;
pub mod store;

pub use error::{Error, Result};
