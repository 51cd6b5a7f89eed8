use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::StoreError;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Throughput exceeded: {0}")]
    ThroughputExceeded(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => AppError::InvalidInput(msg),
            StoreError::Throughput(msg) => AppError::ThroughputExceeded(msg),
            StoreError::Transport(_) | StoreError::MalformedRecord(_) => {
                AppError::StoreFailure(err.to_string())
            }
        }
    }
}

impl AppError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::ThroughputExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreFailure(_) | AppError::HttpClient(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let message = match self {
            AppError::InvalidInput(msg)
            | AppError::Unauthenticated(msg)
            | AppError::ThroughputExceeded(msg) => msg,
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_validation_maps_to_bad_request() {
        let err: AppError = StoreError::Validation("malformed cursor".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_throughput_maps_to_429() {
        let err: AppError = StoreError::Throughput("pool exhausted".to_string()).into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_store_transport_and_records_map_to_500() {
        let transport: AppError = StoreError::Transport("connection reset".to_string()).into();
        let record: AppError = StoreError::MalformedRecord("missing title".to_string()).into();
        assert!(matches!(transport, AppError::StoreFailure(_)));
        assert!(matches!(record, AppError::StoreFailure(_)));
        assert_eq!(record.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthenticated_is_401() {
        let err = AppError::Unauthenticated("User is not authenticated".to_string());
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
