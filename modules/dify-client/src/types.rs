use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata the backend returns for a stored upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: i64,
}

/// How the backend should deliver a workflow result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Blocking,
    Streaming,
}

impl ResponseMode {
    /// Callers send free-form mode strings. Anything other than `streaming`
    /// (case-insensitive) runs blocking.
    pub fn from_mode_str(mode: &str) -> Self {
        if mode.trim().eq_ignore_ascii_case("streaming") {
            ResponseMode::Streaming
        } else {
            ResponseMode::Blocking
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Blocking => "blocking",
            ResponseMode::Streaming => "streaming",
        }
    }
}

/// Body of `POST /v1/workflows/run`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunRequest {
    pub inputs: Map<String, Value>,
    pub response_mode: ResponseMode,
    pub user: String,
}

impl WorkflowRunRequest {
    pub fn new(inputs: Map<String, Value>, response_mode: ResponseMode, user: impl Into<String>) -> Self {
        Self {
            inputs,
            response_mode,
            user: user.into(),
        }
    }
}

/// Error shape the backend uses on non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}
