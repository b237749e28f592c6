//! Read-only fact projections.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/facts/latest` | `?entity_id=&metric=` |
//! | `GET`  | `/facts/as-of`  | `?entity_id=&metric=&date=YYYY-MM-DD` |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::{fact::FactEvent, metric::Metric, store::LedgerStore};

use crate::{AppState, error::ApiError};

fn parse_metric(raw: &str) -> Result<Metric, ApiError> {
  Metric::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ─── Latest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LatestParams {
  pub entity_id: String,
  pub metric:    String,
}

/// `GET /facts/latest?entity_id=mstr&metric=holdings`
pub async fn latest<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<LatestParams>,
) -> Result<Json<FactEvent>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let metric = parse_metric(&params.metric)?;
  let fact = state
    .store
    .latest_fact(&params.entity_id, metric)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no {metric} recorded for {}",
        params.entity_id
      ))
    })?;
  Ok(Json(fact))
}

// ─── As of ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AsOfParams {
  pub entity_id: String,
  pub metric:    String,
  pub date:      NaiveDate,
}

/// `GET /facts/as-of?entity_id=mstr&metric=holdings&date=2021-02-01`
pub async fn as_of<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<AsOfParams>,
) -> Result<Json<FactEvent>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let metric = parse_metric(&params.metric)?;
  let fact = state
    .store
    .fact_as_of(&params.entity_id, metric, params.date)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no {metric} recorded for {} on or before {}",
        params.entity_id, params.date
      ))
    })?;
  Ok(Json(fact))
}
