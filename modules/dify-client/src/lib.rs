pub mod error;
pub mod types;

pub use error::{DifyError, Result};
pub use types::{FileUploadResponse, ResponseMode, WorkflowRunRequest};

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::debug;
use types::ErrorBody;

/// Applied to uploads and blocking workflow runs. Streaming runs have no total
/// deadline since a workflow may legitimately stream for a long time.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw bytes of a streamed workflow run, exactly as the backend sent them.
pub type WorkflowStream = BoxStream<'static, Result<Bytes>>;

#[derive(Clone)]
pub struct DifyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl DifyClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    /// Build on top of an existing client so connection pools are shared.
    pub fn with_client(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload one file. Any 2xx counts as success.
    pub async fn upload_file(
        &self,
        content: Bytes,
        filename: &str,
        user: &str,
    ) -> Result<FileUploadResponse> {
        let url = format!("{}/v1/files/upload", self.base_url);
        let mime = mime_guess::from_path(filename).first_or_octet_stream();

        debug!(filename, size = content.len(), mime = %mime, "Uploading file to backend");

        let part = Part::bytes(Vec::from(content))
            .file_name(filename.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| DifyError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("file", part).text("user", user.to_string());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Run a workflow and return the raw JSON body. Only HTTP 200 counts as success.
    pub async fn run_workflow(&self, request: &WorkflowRunRequest) -> Result<Bytes> {
        let url = format!("{}/v1/workflows/run", self.base_url);

        debug!(
            user = %request.user,
            response_mode = request.response_mode.as_str(),
            "Running workflow"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if status != StatusCode::OK {
            return Err(error_from_body(status, &body));
        }

        Ok(body)
    }

    /// Run a workflow in streaming mode. The mode is forced regardless of what
    /// the request carried. The stream is returned only once the backend has
    /// answered 200, so callers can still report an error cleanly before
    /// forwarding any bytes.
    pub async fn stream_workflow(&self, mut request: WorkflowRunRequest) -> Result<WorkflowStream> {
        let url = format!("{}/v1/workflows/run", self.base_url);
        request.response_mode = ResponseMode::Streaming;

        debug!(user = %request.user, "Streaming workflow");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.bytes().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        Ok(resp.bytes_stream().map_err(DifyError::from).boxed())
    }
}

/// Prefer the backend's own `error` message; fall back to status plus raw body.
fn error_from_body(status: StatusCode, body: &[u8]) -> DifyError {
    if let Ok(ErrorBody {
        error: Some(message),
    }) = serde_json::from_slice::<ErrorBody>(body)
    {
        if !message.is_empty() {
            return DifyError::Backend {
                status: status.as_u16(),
                message,
            };
        }
    }

    DifyError::Api {
        status: status.as_u16(),
        message: String::from_utf8_lossy(body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_message_wins() {
        let err = error_from_body(StatusCode::BAD_REQUEST, br#"{"error": "file too large"}"#);
        assert_eq!(err.to_string(), "file too large");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn non_json_body_is_embedded() {
        let err = error_from_body(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(err.to_string(), "API error (status 502): upstream down");
    }

    #[test]
    fn empty_error_field_falls_back_to_raw_body() {
        let err = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, br#"{"error": ""}"#);
        assert!(matches!(err, DifyError::Api { status: 500, .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = DifyClient::new("https://dify.example.com/", "key");
        assert_eq!(client.base_url(), "https://dify.example.com");
    }
}
