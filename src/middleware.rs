//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::Result;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// Require a valid access token.
///
/// Verified claims are attached to the request extensions.
pub async fn authorize(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let Some(token) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
    else {
        return Err(ServerError::Unauthorized);
    };

    let claims = state.token.decode(token.trim())?;
    tracing::debug!(username = %claims.user_info.username, "request authorized");

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
