//! Users-related HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::Result;
use crate::router::Valid;
use crate::token::Claims;
use crate::user::{
    CreateUserRequest, DeleteUserRequest, UpdateUserRequest, UserSummary,
};
use crate::{AppState, ServerError};

/// Outcome of a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl From<String> for Message {
    fn from(message: String) -> Self {
        Self { message }
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET`, `POST`, `PATCH` and `DELETE /users`. Authorization required.
        .route("/", get(list).post(create).patch(update).delete(delete))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::authorize,
        ))
}

/// Surface a missing resource with the historical status code when
/// `users.legacy_status_codes` is set.
fn legacy(
    config: &Configuration,
    err: ServerError,
    into: fn(String) -> ServerError,
) -> ServerError {
    match err {
        ServerError::NotFound(message) if config.users.legacy_status_codes => {
            into(message)
        },
        err => err,
    }
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>> {
    state
        .users
        .list()
        .await
        .map(Json)
        .map_err(|err| legacy(&state.config, err, ServerError::InvalidInput))
}

async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Valid(body): Valid<CreateUserRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    tracing::debug!(caller = %claims.user_info.username, "creating user");
    let message = state.users.create(body).await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Valid(body): Valid<UpdateUserRequest>,
) -> Result<Json<Message>> {
    tracing::debug!(caller = %claims.user_info.username, "updating user");

    state
        .users
        .update(body)
        .await
        .map(|message| Json(message.into()))
        .map_err(|err| legacy(&state.config, err, ServerError::Conflict))
}

async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Valid(body): Valid<DeleteUserRequest>,
) -> Result<Json<Message>> {
    tracing::debug!(caller = %claims.user_info.username, "deleting user");

    state
        .users
        .delete(body)
        .await
        .map(|message| Json(message.into()))
        .map_err(|err| legacy(&state.config, err, ServerError::Conflict))
}
