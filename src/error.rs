//! Error handler for notekeeper.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Caller-visible category of a [`ServerError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    Persistence,
    Unauthorized,
    Internal,
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    InvalidInput(String),

    /// Uniqueness or referential-integrity violation.
    #[error("{0}")]
    Conflict(String),

    /// Referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Storage did not complete an otherwise valid write.
    #[error("{0}")]
    Persistence(String),

    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Wrap any error as an internal one.
    pub fn internal<E>(details: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Category surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::InvalidInput(_)
            | ServerError::Validation(_)
            | ServerError::Axum(_) => ErrorKind::InvalidInput,
            ServerError::Conflict(_) => ErrorKind::Conflict,
            ServerError::NotFound(_) => ErrorKind::NotFound,
            ServerError::Persistence(_) => ErrorKind::Persistence,
            ServerError::Unauthorized => ErrorKind::Unauthorized,
            ServerError::Sql(_) | ServerError::Internal { .. } => {
                ErrorKind::Internal
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::Persistence => {
                StatusCode::BAD_REQUEST
            },
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    kind: ErrorKind,
    message: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `kind` field.
    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Update human-readable message.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .kind(self.kind())
            .status(self.status())
            .message(&self.to_string());

        let response = match &self {
            ServerError::Validation(validation_errors) => response
                .message("There were validation errors with your request.")
                .errors(validation_errors),

            ServerError::Axum(rejection) => response.message(&rejection.body_text()),

            ServerError::Unauthorized => response.message("Unauthorized"),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");
                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(
                    error = ?source,
                    %details,
                    "server returned 500 status"
                );
                ResponseError::default()
            },

            _ => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "kind": "internal",
                "message": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_response() {
        let (status, body) =
            body_of(ServerError::Conflict("User already exists".into())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");
        assert_eq!(body["message"], "User already exists");
        assert_eq!(body["status"], 409);
    }

    #[tokio::test]
    async fn test_persistence_keeps_bad_request() {
        let (status, body) = body_of(ServerError::Persistence(
            "User could not be created".into(),
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "persistence");
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, body) = body_of(ServerError::Internal {
            details: "pool exhausted".into(),
            source: None,
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error.");
    }
}
