use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

/// Request failures. The message is sent to the client verbatim.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// `{"error": "..."}`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // alternate form keeps the context chain
        ApiError::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::NotFound(message) => info!("{status}: {message}"),
            ApiError::Internal(message) => error!("{status}: {message}"),
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(
            ApiError::not_found("No data available").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_anyhow_keeps_chain() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("connection reset"));
        let err = ApiError::from(
            res.context("KRX request stk_isu_ohlcv failed")
                .unwrap_err(),
        );
        assert_eq!(
            err,
            ApiError::Internal("KRX request stk_isu_ohlcv failed: connection reset".into())
        );
    }
}
