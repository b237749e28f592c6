//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Missing or invalid bearer credential on a mutating endpoint.
  #[error("auth_failed")]
  AuthFailed,

  /// The requested transition lost a compare-and-set, e.g. resolving an
  /// already-terminal discrepancy.
  #[error("conflict: {0}")]
  Conflict(String),

  /// An upstream source failed while serving the request.
  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<tally_ingest::Error> for ApiError {
  fn from(e: tally_ingest::Error) -> Self {
    use tally_core::fetch::FetchError;
    match e {
      tally_ingest::Error::Fetch(FetchError::UnknownEntity(entity)) => {
        Self::NotFound(format!("unknown entity {entity:?}"))
      }
      tally_ingest::Error::Fetch(e) => Self::Upstream(e.to_string()),
      tally_ingest::Error::Store(e) => Self::Store(e),
      other => Self::Upstream(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::AuthFailed => {
        (StatusCode::UNAUTHORIZED, "auth_failed".to_owned())
      }
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
