//! Ingestion entry point.
//!
//! `POST /ingest/{ticker}?lookback_days=30&dry_run=false`
//!
//! Dry runs are read-only end to end and therefore exempt from auth; real
//! runs require the bearer credential.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::HeaderMap,
};
use serde::Deserialize;
use tally_core::{run::RunTrigger, store::LedgerStore};
use tally_ingest::{IngestOptions, IngestSummary};

use crate::{AppState, auth, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct IngestParams {
  pub lookback_days: Option<i64>,
  #[serde(default)]
  pub dry_run:       bool,
}

/// `POST /ingest/{ticker}`
pub async fn trigger<S>(
  State(state): State<AppState<S>>,
  Path(ticker): Path<String>,
  Query(params): Query<IngestParams>,
  headers: HeaderMap,
) -> Result<Json<IngestSummary>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if !params.dry_run {
    auth::verify_bearer(&headers, &state.auth)?;
  }

  let options = IngestOptions {
    lookback_days: params.lookback_days.unwrap_or(30),
    dry_run:       params.dry_run,
  };

  let summary = state
    .ingestor
    .ingest(&ticker.to_lowercase(), options, RunTrigger::Manual)
    .await?;
  Ok(Json(summary))
}
