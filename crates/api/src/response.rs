//! Success envelope: every 2xx body is `{ "data": ... }`. Errors use the
//! `{ "error", "code" }` shape from [`crate::error`].

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// What a handler returns for a successful response.
pub type Envelope<T> = Json<DataResponse<T>>;

impl<T: Serialize> DataResponse<T> {
    pub fn json(data: T) -> Envelope<T> {
        Json(DataResponse { data })
    }
}
