use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::StatusCode;
use http::header::AUTHORIZATION;

use crate::api::server::{AppState, RouteError};
use crate::util::constant_time_cmp;

/// Guards the score producer routes with the deployment's internal token.
///
/// Accepts the token either bare or as `Bearer <token>`.
pub async fn verify_internal_ident(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let internal_token = state
        .internal_token
        .as_deref()
        .ok_or(RouteError::AuthError(StatusCode::UNAUTHORIZED))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(RouteError::AuthError(StatusCode::BAD_REQUEST))?
        .to_str()
        .map_err(|_| RouteError::AuthError(StatusCode::BAD_REQUEST))?;
    let presented = header.strip_prefix("Bearer ").unwrap_or(header);

    if !constant_time_cmp(presented, internal_token) {
        Err(RouteError::AuthError(StatusCode::UNAUTHORIZED))
    } else {
        Ok(next.run(req).await)
    }
}
