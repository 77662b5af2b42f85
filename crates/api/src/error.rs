use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use critter_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses of
/// the form `{ "error": message, "code": code }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `critter_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a domain error.
pub fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::AlreadyConsumed { .. }
        | CoreError::AlreadyOpened { .. }
        | CoreError::InvalidTransition(_)
        | CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::LimitReached(_) | CoreError::TooEarly { .. } | CoreError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => {
                let status = core_status(core);
                let message = match core {
                    CoreError::NotFound { entity, id } => {
                        format!("{entity} with id {id} not found")
                    }
                    CoreError::Internal(msg) => {
                        tracing::error!(error = %msg, "Internal core error");
                        "An internal error occurred".to_string()
                    }
                    CoreError::StoreUnavailable(msg) => {
                        tracing::error!(error = %msg, "Store unavailable");
                        "The game store is temporarily unavailable".to_string()
                    }
                    other => other.to_string(),
                };
                (status, core.kind(), message)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
