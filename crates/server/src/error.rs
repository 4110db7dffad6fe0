//! Service-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use forecast::ForecastError;
use serde::Serialize;
use thiserror::Error;

/// Every way a service operation can fail
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The product is unknown to the index or table the operation needs
    #[error("{0}")]
    NotFound(String),

    /// A required artifact failed to load at startup
    #[error("{0}")]
    NotReady(String),

    #[error("Insufficient data for forecasting: need at least {required} weeks, have {available}")]
    InsufficientData { available: usize, required: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Request exceeded its {0} ms budget")]
    Timeout(u64),

    #[error("Internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn product_not_found(product_id: &str) -> Self {
        ServiceError::NotFound(format!("Product {} not found", product_id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Join(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ForecastError> for ServiceError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::InsufficientData { available, required } => {
                ServiceError::InsufficientData { available, required }
            }
            other => ServiceError::Internal(other.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(ErrorPayload {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, ServiceError>;
