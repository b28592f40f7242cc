//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The model runtime could not be reached
    #[error("Ollama unavailable: {0}")]
    Unavailable(String),

    /// The model answered, but not in a usable shape
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<chain_kit::Error> for ApiError {
    fn from(e: chain_kit::Error) -> Self {
        use chain_kit::Error as E;
        match e {
            E::Model(inner) => ApiError::Unavailable(format!("{inner:#}")),
            E::Parse(_)
            | E::Validation(_)
            | E::UnknownTool(_)
            | E::ToolArguments { .. }
            | E::Tool { .. } => ApiError::BadGateway(e.to_string()),
            E::MissingVariable(_)
            | E::Template(_)
            | E::Storage(_)
            | E::StorageTask(_)
            | E::Workflow(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

/// Errors from the service layer are runtime failures
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Unavailable(format!("{e:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_failure_is_503_with_prefix() {
        let e: ApiError = chain_kit::Error::Model(anyhow::anyhow!("connection refused")).into();
        assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.to_string(), "Ollama unavailable: connection refused");
    }

    #[test]
    fn test_output_errors_are_502() {
        let e: ApiError = chain_kit::Error::Parse("no JSON".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        let e: ApiError = chain_kit::Error::Validation("rating".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        let e: ApiError = chain_kit::Error::UnknownTool("x".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_errors_are_500() {
        let e: ApiError = chain_kit::Error::Workflow("loop".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
