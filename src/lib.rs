//! Notekeeper is the user management API of a note-taking application.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod crypto;
mod database;
pub mod error;
mod middleware;
pub mod note;
mod router;
pub mod telemetry;
pub mod token;
pub mod user;

pub mod config;

pub use error::ServerError;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::crypto::Argon2PasswordHasher;
use crate::note::{NoteRepository, PgNoteRepository};
use crate::user::{PgUserRepository, UserRepository, UserService};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    state: Option<&AppState>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let token = match state {
        Some(state) => {
            let token = state
                .token
                .create(token::UserInfo {
                    username: "admin".into(),
                    roles: vec!["Admin".into()],
                })
                .expect("cannot create JWT");
            format!("Bearer {token}")
        },
        None => String::default(),
    };

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, token)
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// In-memory state, with a handle on notes to seed ownership.
#[cfg(test)]
pub(crate) fn test_state(
    legacy_status_codes: bool,
) -> (AppState, note::InMemoryNoteRepository) {
    let notes = note::InMemoryNoteRepository::new();
    let mut config = config::Configuration::default();
    config.name = "notekeeper".into();
    config.users = config::Users {
        legacy_status_codes,
    };

    let state = AppState {
        config: Arc::new(config),
        users: UserService::new(
            Arc::new(user::InMemoryUserRepository::new()),
            Arc::new(notes.clone()),
            Arc::new(crypto::test_hasher()),
        ),
        token: token::TokenManager::new("test-secret"),
        metrics: None,
    };

    (state, notes)
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: UserService,
    pub token: token::TokenManager,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, state.config.timeout()))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let mut routes = Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .nest("/users", router::users::router(state.clone()));

    // `GET /metrics` exposes Prometheus metrics when a recorder is set.
    if let Some(handle) = state.metrics.clone() {
        routes =
            routes.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    routes
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let (users, notes): (Arc<dyn UserRepository>, Arc<dyn NoteRepository>) =
        match config.postgres {
            Some(ref postgres) => {
                let db = database::Database::from_config(postgres).await?;
                // execute migrations scripts on start.
                db.migrate().await?;

                (
                    Arc::new(PgUserRepository::new(db.postgres.clone())),
                    Arc::new(PgNoteRepository::new(db.postgres)),
                )
            },
            None => {
                tracing::warn!(
                    "missing `postgres` entry on `config.yaml` file, users are kept in memory"
                );
                (
                    Arc::new(user::InMemoryUserRepository::new()),
                    Arc::new(note::InMemoryNoteRepository::new()),
                )
            },
        };

    let hasher = Arc::new(Argon2PasswordHasher::new(config.argon2.clone())?);

    // handle jwt.
    let Some(secret) = config.access_token_secret() else {
        return Err(
            "missing `token.access_token_secret` entry on `config.yaml` file".into(),
        );
    };
    let token = token::TokenManager::new(&secret);

    Ok(AppState {
        config,
        users: UserService::new(users, notes, hasher),
        token,
        metrics,
    })
}
