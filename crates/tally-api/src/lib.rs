//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] backed by any [`tally_core::store::LedgerStore`]
//! plus the ingestion pipeline. TLS and transport concerns are the caller's
//! responsibility; auth is a shared-secret bearer token on mutating routes.
//!
//! # Mounting
//!
//! ```rust,ignore
//! axum::serve(listener, tally_api::router(state)).await?;
//! ```

pub mod auth;
pub mod discrepancies;
pub mod error;
pub mod facts;
pub mod ingest;
pub mod runs;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tally_core::store::LedgerStore;
use tally_ingest::Ingestor;

pub use auth::AuthConfig;
pub use error::ApiError;

/// Shared handler state.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub ingestor: Arc<Ingestor<S>>,
  pub auth:     Arc<AuthConfig>,
}

// Manual impl: `S` itself need not be `Clone` behind the `Arc`s.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      ingestor: self.ingestor.clone(),
      auth:     self.auth.clone(),
    }
  }
}

/// Build the fully-materialised router for `state`.
pub fn router<S>(state: AppState<S>) -> Router<()>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Ingestion
    .route("/ingest/{ticker}", post(ingest::trigger::<S>))
    // Discrepancy review
    .route(
      "/discrepancies",
      get(discrepancies::list::<S>).patch(discrepancies::resolve_bulk::<S>),
    )
    .route(
      "/discrepancies/{id}",
      get(discrepancies::get_one::<S>)
        .patch(discrepancies::resolve_one::<S>),
    )
    // Fact projections
    .route("/facts/latest", get(facts::latest::<S>))
    .route("/facts/as-of", get(facts::as_of::<S>))
    // Audit
    .route("/runs", get(runs::list::<S>))
    .with_state(state)
}
