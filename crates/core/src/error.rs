use crate::types::DbId;

/// Domain error shared by every layer.
///
/// Each variant carries a stable machine-readable code (see [`CoreError::kind`])
/// plus a human-readable message via `Display`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Resource unit {id} has already been consumed")]
    AlreadyConsumed { id: DbId },

    #[error("Bonus container {id} has already been opened")]
    AlreadyOpened { id: DbId },

    #[error("Limit reached: {0}")]
    LimitReached(String),

    #[error("Too early: {remaining_secs} seconds remaining")]
    TooEarly { remaining_secs: i64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable code surfaced to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::AlreadyConsumed { .. } => "ALREADY_CONSUMED",
            CoreError::AlreadyOpened { .. } => "ALREADY_OPENED",
            CoreError::LimitReached(_) => "LIMIT_REACHED",
            CoreError::TooEarly { .. } => "TOO_EARLY",
            CoreError::InvalidTransition(_) => "INVALID_TRANSITION",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Only persistence failures are worth retrying; everything else is
    /// terminal for the operation that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}
