//! HTTP handlers grouped by resource.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Json, Path, Query};

use crate::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

/// Unwraps an optional extractor, turning its rejection into a JSON error.
pub(crate) fn accept<T, R: Into<ApiError>>(extracted: Result<T, R>) -> Result<T, ApiError> {
    extracted.map_err(Into::into)
}

pub(crate) type JsonBody<T> = Result<Json<T>, JsonRejection>;
pub(crate) type QueryParams<T> = Result<Query<T>, QueryRejection>;
pub(crate) type PathId = Result<Path<i64>, PathRejection>;
