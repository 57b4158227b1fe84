use dify_client::FileUploadResponse;
use serde::{Deserialize, Serialize};

use crate::files::{file_type_for_extension, FileCategory};

// --- Response envelopes ---

/// Envelope wrapped around every JSON response the relay sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn new(code: u16, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self::new(200, message, Some(data))
    }
}

impl ApiResponse<()> {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message, None)
    }
}

/// Result of a workflow run: the synchronous response body and the callback payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_response: Vec<FileUploadResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowResponse {
    pub fn completed(file_response: Vec<FileUploadResponse>, workflow_data: serde_json::Value) -> Self {
        Self {
            file_response,
            workflow_data: Some(workflow_data),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }
}

// --- Async request lifecycle ---

/// Lifecycle of an asynchronous request: `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AsyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AsyncStatus::Completed | AsyncStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AsyncStatus::Pending => "pending",
            AsyncStatus::Processing => "processing",
            AsyncStatus::Completed => "completed",
            AsyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AsyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRecord {
    pub request_id: String,
    pub status: AsyncStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Caller's opt-in to asynchronous processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsyncRequest {
    pub callback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AsyncRequest {
    pub fn new(callback_url: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            request_id: request_id.filter(|id| !id.is_empty()),
        }
    }

    /// Only a non-empty callback URL turns a request asynchronous.
    pub fn is_enabled(&self) -> bool {
        !self.callback_url.trim().is_empty()
    }
}

// --- Workflow input values ---

/// Reference to an uploaded file, substituted into workflow inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub transfer_method: String,
    pub upload_file_id: String,
    #[serde(rename = "type")]
    pub file_type: FileCategory,
}

impl FileReference {
    pub fn from_upload(upload: &FileUploadResponse) -> Self {
        Self {
            transfer_method: "local_file".to_string(),
            upload_file_id: upload.id.clone(),
            file_type: file_type_for_extension(&upload.extension),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "transfer_method": self.transfer_method,
            "upload_file_id": self.upload_file_id,
            "type": self.file_type,
        })
    }
}
