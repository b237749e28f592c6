//! Discrepancy review surface.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/discrepancies` | filters: `status`, `severity`, `entity`, `since`, `until`, `limit`, `offset` |
//! | `GET`   | `/discrepancies/{id}` | |
//! | `PATCH` | `/discrepancies/{id}` | body: [`ResolutionBody`]; 409 when already terminal |
//! | `PATCH` | `/discrepancies` | bulk form over an (entity, metric) pair |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{
  discrepancy::{Discrepancy, DiscrepancyStatus, Resolution, Severity},
  metric::Metric,
  store::{DiscrepancyQuery, LedgerStore},
};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:   Option<String>,
  pub severity: Option<String>,
  /// Entity ticker filter.
  pub entity:   Option<String>,
  pub since:    Option<DateTime<Utc>>,
  pub until:    Option<DateTime<Utc>>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

impl ListParams {
  fn into_query(self) -> Result<DiscrepancyQuery, ApiError> {
    let status = self
      .status
      .as_deref()
      .map(DiscrepancyStatus::parse)
      .transpose()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let severity = self
      .severity
      .as_deref()
      .map(Severity::parse)
      .transpose()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(DiscrepancyQuery {
      status,
      severity,
      entity_id: self.entity,
      since: self.since,
      until: self.until,
      limit: self.limit,
      offset: self.offset,
    })
  }
}

/// `GET /discrepancies`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Discrepancy>>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = params.into_query()?;
  let rows =
    state.store.list_discrepancies(&query).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /discrepancies/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Discrepancy>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let row = state
    .store
    .get_discrepancy(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("discrepancy {id} not found")))?;
  Ok(Json(row))
}

// ─── Resolve one ─────────────────────────────────────────────────────────────

/// JSON body accepted by both PATCH forms.
#[derive(Debug, Deserialize)]
pub struct ResolutionBody {
  pub status:            DiscrepancyStatus,
  pub resolution_value:  Option<f64>,
  pub resolution_source: Option<String>,
  pub notes:             Option<String>,
  pub resolved_by:       Option<String>,
}

impl ResolutionBody {
  fn into_resolution(self) -> Result<Resolution, ApiError> {
    if !self.status.is_terminal() {
      return Err(ApiError::BadRequest(
        "status must be resolved or dismissed".into(),
      ));
    }
    Ok(Resolution {
      status:            self.status,
      resolution_value:  self.resolution_value,
      resolution_source: self.resolution_source,
      notes:             self.notes,
      resolved_by:       self.resolved_by,
    })
  }
}

/// `PATCH /discrepancies/{id}`
pub async fn resolve_one<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ResolutionBody>,
) -> Result<Json<Discrepancy>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let resolution = body.into_resolution()?;

  // Distinguish 404 from 409 before attempting the compare-and-set.
  let current = state
    .store
    .get_discrepancy(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("discrepancy {id} not found")))?;
  if current.status.is_terminal() {
    return Err(ApiError::Conflict(format!(
      "discrepancy {id} is already {}",
      current.status.as_str()
    )));
  }

  let row = state
    .store
    .resolve_discrepancy(id, resolution)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    id = %id,
    status = row.status.as_str(),
    resolved_by = row.resolved_by.as_deref().unwrap_or("-"),
    "discrepancy closed"
  );
  Ok(Json(row))
}

// ─── Bulk resolve ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkResolutionBody {
  pub entity_id: String,
  pub metric:    String,
  #[serde(flatten)]
  pub resolution: ResolutionBody,
}

#[derive(Debug, Serialize)]
pub struct BulkResolutionOutcome {
  pub updated: usize,
}

/// `PATCH /discrepancies` — close every pending row for an (entity, metric)
/// pair in one statement.
pub async fn resolve_bulk<S>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<BulkResolutionBody>,
) -> Result<Json<BulkResolutionOutcome>, ApiError>
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let metric = Metric::parse(&body.metric)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let resolution = body.resolution.into_resolution()?;

  let updated = state
    .store
    .resolve_discrepancies_for(&body.entity_id, metric, resolution)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    entity_id = body.entity_id,
    metric = %metric,
    updated,
    "bulk discrepancy resolution"
  );
  Ok(Json(BulkResolutionOutcome { updated }))
}
