use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{Json, Response},
};
use dify_client::{FileUploadResponse, ResponseMode};
use dify_relay_common::{ApiResponse, AsyncRequest};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{bearer_token, dispatch, require, AppState};
use crate::error::{RelayError, Result};
use crate::pipeline::{FileBinding, WorkflowJob};
use crate::resolver::FileSource;

/// Input key carrying the file descriptor in URL-based workflow requests.
const FILE_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct WorkflowRequest {
    #[serde(default)]
    domain: String,
    inputs: Map<String, Value>,
    #[serde(default)]
    response_mode: String,
    #[serde(default)]
    user: String,
    #[serde(default, rename = "async")]
    async_request: Option<AsyncRequest>,
}

impl WorkflowRequest {
    fn validate(&self) -> Result<()> {
        require(&self.domain, "domain")?;
        require(&self.response_mode, "response_mode")?;
        require(&self.user, "user")
    }

    fn async_request(&self) -> Option<AsyncRequest> {
        self.async_request
            .as_ref()
            .map(|a| AsyncRequest::new(a.callback_url.clone(), a.request_id.clone()))
    }

    /// Remove and decode `inputs.file`.
    fn take_file<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let raw = self
            .inputs
            .remove(FILE_FIELD)
            .ok_or_else(|| RelayError::Validation("inputs.file is required".to_string()))?;
        serde_json::from_value(raw)
            .map_err(|e| RelayError::Validation(format!("inputs.file is malformed: {e}")))
    }
}

#[derive(Deserialize)]
struct SingleFileInput {
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    file_value: String,
}

#[derive(Deserialize)]
struct MultiFileInput {
    #[serde(default)]
    file_urls: Vec<String>,
    #[serde(default)]
    file_value: String,
}

#[derive(Deserialize)]
pub struct UploadUrlRequest {
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    domain: String,
}

fn bad_json(rejection: JsonRejection) -> RelayError {
    RelayError::Validation(format!("invalid request body: {}", rejection.body_text()))
}

/// POST /dify/fileSingle/workflow
pub async fn single_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<WorkflowRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(mut request) = body.map_err(bad_json)?;
    let api_key = bearer_token(&headers)?;
    request.validate()?;

    let file: SingleFileInput = request.take_file()?;
    require(&file.file_url, "inputs.file.file_url")?;
    require(&file.file_value, "inputs.file.file_value")?;

    let pipeline = state.pipeline(&request.domain, &api_key);
    let async_request = request.async_request();
    let job = WorkflowJob {
        inputs: request.inputs,
        file_key: file.file_value,
        files: FileBinding::Single(FileSource::Url(file.file_url)),
        user: request.user,
        response_mode: ResponseMode::from_mode_str(&request.response_mode),
    };

    dispatch(&state, pipeline, job, async_request).await
}

/// POST /dify/files/workflow
pub async fn multi_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<WorkflowRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(mut request) = body.map_err(bad_json)?;
    let api_key = bearer_token(&headers)?;
    request.validate()?;

    let file: MultiFileInput = request.take_file()?;
    if file.file_urls.is_empty() {
        return Err(RelayError::Validation("inputs.file.file_urls must not be empty".to_string()));
    }
    let max = state.config.max_upload_files;
    if file.file_urls.len() > max {
        return Err(RelayError::Validation(format!(
            "too many files: {} given, at most {max} allowed",
            file.file_urls.len()
        )));
    }
    if file.file_urls.iter().any(|url| url.trim().is_empty()) {
        return Err(RelayError::Validation("inputs.file.file_urls contains an empty URL".to_string()));
    }
    require(&file.file_value, "inputs.file.file_value")?;

    let pipeline = state.pipeline(&request.domain, &api_key);
    let async_request = request.async_request();
    let job = WorkflowJob {
        inputs: request.inputs,
        file_key: file.file_value,
        files: FileBinding::Multiple(file.file_urls.into_iter().map(FileSource::Url).collect()),
        user: request.user,
        response_mode: ResponseMode::from_mode_str(&request.response_mode),
    };

    dispatch(&state, pipeline, job, async_request).await
}

/// POST /dify/upload/url: download and upload only, no workflow run.
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<FileUploadResponse>>> {
    let Json(request) = body.map_err(bad_json)?;
    let api_key = bearer_token(&headers)?;
    require(&request.file_url, "file_url")?;
    require(&request.user, "user")?;
    require(&request.domain, "domain")?;

    let uploaded = state
        .pipeline(&request.domain, &api_key)
        .upload_one(&FileSource::Url(request.file_url), &request.user)
        .await?;

    Ok(Json(ApiResponse::success("upload succeeded", uploaded)))
}
