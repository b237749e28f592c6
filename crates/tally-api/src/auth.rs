//! Bearer-token extractor and standalone verifier.
//!
//! The server holds only a SHA-256 digest of the shared secret; incoming
//! tokens are hashed and the fixed-width digests compared, so the comparison
//! shape does not depend on how much of the token matched.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use sha2::{Digest as _, Sha256};
use tally_core::store::LedgerStore;

use crate::{AppState, error::ApiError};

/// Credential accepted for mutating endpoints on this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  secret_digest: [u8; 32],
}

impl AuthConfig {
  pub fn new(shared_secret: &str) -> Self {
    Self { secret_digest: Sha256::digest(shared_secret.as_bytes()).into() }
  }
}

/// Zero-size marker: present in the handler means the request carried the
/// shared secret.
pub struct Authenticated;

/// Verify the `Authorization: Bearer <secret>` header directly — used by
/// handlers whose auth requirement is conditional (dry runs skip it).
pub fn verify_bearer(
  headers: &HeaderMap,
  config: &AuthConfig,
) -> Result<(), ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::AuthFailed)?;

  let token = header_val.strip_prefix("Bearer ").ok_or(ApiError::AuthFailed)?;

  let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
  if digest != config.secret_digest {
    return Err(ApiError::AuthFailed);
  }
  Ok(())
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: LedgerStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(&parts.headers, &state.auth)?;
    Ok(Authenticated)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::{Request, header};

  use super::*;
  use crate::tests::noop_state;

  async fn extract(
    req: Request<axum::body::Body>,
  ) -> Result<Authenticated, ApiError> {
    let state = noop_state("hunter2");
    let (mut parts, _) = req.into_parts();
    Authenticated::from_request_parts(&mut parts, &state).await
  }

  #[tokio::test]
  async fn correct_secret() {
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Bearer hunter2")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(extract(req).await.is_ok());
  }

  #[tokio::test]
  async fn wrong_secret() {
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Bearer letmein")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::AuthFailed)));
  }

  #[tokio::test]
  async fn missing_header() {
    let req = Request::builder().body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::AuthFailed)));
  }

  #[tokio::test]
  async fn wrong_scheme() {
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Basic aHVudGVyMg==")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::AuthFailed)));
  }
}
