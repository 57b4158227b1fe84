use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dify_client::DifyError;
use dify_relay_common::ApiResponse;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("download failed ({url}): {message}")]
    Download { url: String, message: String },

    #[error("upload to backend failed ({filename}): {source}")]
    Upload {
        filename: String,
        #[source]
        source: DifyError,
    },

    #[error("workflow execution failed: {0}")]
    Workflow(#[source] DifyError),

    #[error("failed to parse workflow response: {0}")]
    Parse(String),

    #[error("callback delivery failed: {0}")]
    Callback(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Download { .. }
            | RelayError::Upload { .. }
            | RelayError::Workflow(_)
            | RelayError::Parse(_)
            | RelayError::Callback(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }
        let body = ApiResponse::error(status.as_u16(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_error_names_the_url() {
        let err = RelayError::Download {
            url: "https://files.example.com/b.pdf".to_string(),
            message: "HTTP status 404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("https://files.example.com/b.pdf"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upload_error_names_the_file_and_cause() {
        let err = RelayError::Upload {
            filename: "a.pdf".to_string(),
            source: DifyError::Backend {
                status: 413,
                message: "file_too_large".to_string(),
            },
        };
        assert_eq!(err.to_string(), "upload to backend failed (a.pdf): file_too_large");
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(RelayError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(RelayError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }
}
