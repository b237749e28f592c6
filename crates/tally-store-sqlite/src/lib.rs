//! SQLite backend for the Tally ledger store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Raw document bytes are kept on
//! disk under the blob root, addressed by content key; the database holds
//! metadata and content hashes only.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
