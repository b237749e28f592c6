//! Run register listing, for audit.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use tally_core::{run::Run, store::LedgerStore};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /runs?limit=50`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Run>>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let runs = state
    .store
    .list_runs(params.limit.unwrap_or(50))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(runs))
}
