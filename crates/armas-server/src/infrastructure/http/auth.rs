//! `X-API-Key` authentication middleware.
//!
//! Every route except `/api/health` sits behind [`require_api_key`].  A
//! request without the header gets `401 MISSING_API_KEY`; a request with the
//! wrong key gets `403 INVALID_API_KEY`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::dto::ApiError;
use super::ApiState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match request.headers().get(API_KEY_HEADER) {
        None => Err(ApiError::missing_api_key()),
        Some(value) if value.as_bytes().is_empty() => Err(ApiError::missing_api_key()),
        Some(value) if value.as_bytes() != state.api_key.as_bytes() => {
            warn!(
                "rejected {} {}: invalid API key",
                request.method(),
                request.uri().path()
            );
            Err(ApiError::invalid_api_key())
        }
        Some(_) => Ok(next.run(request).await),
    }
}
