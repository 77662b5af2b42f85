//! Database row structs.
//!
//! Each submodule contains a `FromRow` struct matching one table (or query
//! projection) and its conversion into the matching `critter_core` type.
//! Text and JSON columns are decoded here, so a malformed row surfaces as
//! `CoreError::Internal` instead of leaking into the engine.

pub mod achievement;
pub mod bonus_box;
pub mod character;
pub mod event;
pub mod food;
pub mod quest;

use critter_core::error::CoreError;

/// Decode a JSON column into a domain value.
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(value)
        .map_err(|e| CoreError::Internal(format!("Malformed {column} column: {e}")))
}

/// Encode a domain value for a JSON column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(e.to_string()))
}
