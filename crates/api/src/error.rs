//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CatalogError, FieldError, OrderError};
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order placement, mutation or lookup error.
    Order(OrderError),
    /// Catalog query error.
    Catalog(CatalogError),
    /// Internal server error.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<i64>,
}

impl ErrorBody {
    fn message(error: String) -> Self {
        Self {
            error,
            details: Vec::new(),
            order_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::message(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::message(msg)),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Catalog(err) => catalog_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::message(msg)),
        };

        if status.is_server_error() {
            tracing::error!(error = %body.error, "internal server error");
        }
        metrics::counter!("api_errors_total", "status" => status.as_str().to_owned())
            .increment(1);

        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, ErrorBody) {
    match err {
        OrderError::Validation(errors) => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "Validation failed".to_string(),
                details: errors.fields().to_vec(),
                order_id: None,
            },
        ),
        OrderError::ProductNotFound(_)
        | OrderError::InsufficientStock { .. }
        | OrderError::PriceMismatch { .. } => {
            (StatusCode::BAD_REQUEST, ErrorBody::message(err.to_string()))
        }
        OrderError::OrderNotFound(_) => (StatusCode::NOT_FOUND, ErrorBody::message(err.to_string())),
        OrderError::IdempotencyConflict(order_id) => (
            StatusCode::CONFLICT,
            ErrorBody {
                error: err.to_string(),
                details: Vec::new(),
                order_id: Some(order_id.as_i64()),
            },
        ),
        OrderError::ViewUnavailable { order_id, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                error: err.to_string(),
                details: Vec::new(),
                order_id: Some(order_id.as_i64()),
            },
        ),
        OrderError::TransactionFailure(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::message(err.to_string()),
        ),
    }
}

fn catalog_error_to_response(err: CatalogError) -> (StatusCode, ErrorBody) {
    let status = match &err {
        CatalogError::InvalidRange(_) | CatalogError::EmptySearchQuery => StatusCode::BAD_REQUEST,
        CatalogError::ProductNotFound(_)
        | CatalogError::CategoryNotFound(_)
        | CatalogError::BrandNotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, ErrorBody::message(err.to_string()))
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}
