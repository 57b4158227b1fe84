use thiserror::Error;

pub type Result<T> = std::result::Result<T, DifyError>;

#[derive(Debug, Error)]
pub enum DifyError {
    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected the call and explained why in an `{"error": "..."}` body.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DifyError {
    /// HTTP status returned by the backend, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            DifyError::Backend { status, .. } | DifyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DifyError {
    fn from(err: reqwest::Error) -> Self {
        DifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DifyError {
    fn from(err: serde_json::Error) -> Self {
        DifyError::Parse(err.to_string())
    }
}
