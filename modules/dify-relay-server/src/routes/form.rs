use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::HeaderMap,
    response::Response,
};
use bytes::Bytes;
use dify_client::ResponseMode;
use dify_relay_common::AsyncRequest;
use serde_json::{Map, Value};

use super::{bearer_token, dispatch, AppState};
use crate::error::{RelayError, Result};
use crate::pipeline::{FileBinding, WorkflowJob};
use crate::resolver::FileSource;

/// Form fields consumed by the relay itself; everything else becomes a workflow input.
const RESERVED_FIELDS: [&str; 6] = [
    "file_value",
    "domain",
    "user",
    "response_mode",
    "callback_url",
    "request_id",
];

struct FormFile {
    field: String,
    filename: String,
    content: Bytes,
}

/// Multipart body read fully into memory. For repeated text fields the first value wins.
#[derive(Default)]
struct ParsedForm {
    fields: HashMap<String, String>,
    files: Vec<FormFile>,
}

impl ParsedForm {
    async fn read(mut multipart: Multipart, max_file_size: usize) -> Result<Self> {
        let mut form = ParsedForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content = field.bytes().await.map_err(bad_form)?;
                    if content.len() > max_file_size {
                        return Err(RelayError::Validation(format!(
                            "file {filename} exceeds the {max_file_size} byte limit"
                        )));
                    }
                    form.files.push(FormFile {
                        field: name,
                        filename,
                        content,
                    });
                }
                None => {
                    let value = field.text().await.map_err(bad_form)?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.text(key)
            .map(str::to_string)
            .ok_or_else(|| RelayError::Validation(format!("{key} is required")))
    }

    fn take_files(&mut self, field: &str) -> Vec<FileSource> {
        let (matching, rest): (Vec<FormFile>, Vec<FormFile>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field == field);
        self.files = rest;

        matching
            .into_iter()
            .map(|f| FileSource::Upload {
                filename: f.filename,
                content: f.content,
            })
            .collect()
    }

    fn async_request(&self) -> Option<AsyncRequest> {
        let callback_url = self.text("callback_url")?;
        Some(AsyncRequest::new(
            callback_url,
            self.text("request_id").map(str::to_string),
        ))
    }

    /// Every non-reserved text field, as a string input.
    fn inputs(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect()
    }
}

fn bad_form(e: MultipartError) -> RelayError {
    RelayError::Validation(format!("failed to parse form: {}", e.body_text()))
}

fn bad_multipart(rejection: MultipartRejection) -> RelayError {
    RelayError::Validation(format!("invalid form request: {}", rejection.body_text()))
}

/// POST /dify/fileSingle/formdata/workflow
pub async fn single_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let multipart = multipart.map_err(bad_multipart)?;
    let mut form = ParsedForm::read(multipart, state.config.max_file_size).await?;
    let api_key = bearer_token(&headers)?;

    let domain = form.required("domain")?;
    let response_mode = form.required("response_mode")?;
    let user = form.required("user")?;
    let file_key = form.required("file_value")?;

    let mut files = form.take_files("file");
    let source = match (files.pop(), files.is_empty()) {
        (Some(source), true) => source,
        (Some(_), false) => {
            return Err(RelayError::Validation("exactly one file is allowed".to_string()))
        }
        (None, _) => return Err(RelayError::Validation("file is required".to_string())),
    };

    let job = WorkflowJob {
        inputs: form.inputs(),
        file_key,
        files: FileBinding::Single(source),
        user,
        response_mode: ResponseMode::from_mode_str(&response_mode),
    };

    let pipeline = state.pipeline(&domain, &api_key);
    dispatch(&state, pipeline, job, form.async_request()).await
}

/// POST /dify/files/formdata/workflow
pub async fn multi_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let multipart = multipart.map_err(bad_multipart)?;
    let mut form = ParsedForm::read(multipart, state.config.max_file_size).await?;
    let api_key = bearer_token(&headers)?;

    let domain = form.required("domain")?;
    let file_key = form.required("file_value")?;
    let user = form
        .text("user")
        .unwrap_or(state.config.default_user.as_str())
        .to_string();
    let response_mode = ResponseMode::from_mode_str(form.text("response_mode").unwrap_or_default());

    let files = form.take_files("files");
    if files.is_empty() {
        return Err(RelayError::Validation("files is required".to_string()));
    }
    let max = state.config.max_upload_files;
    if files.len() > max {
        return Err(RelayError::Validation(format!(
            "too many files: {} given, at most {max} allowed",
            files.len()
        )));
    }

    let job = WorkflowJob {
        inputs: form.inputs(),
        file_key,
        files: FileBinding::Multiple(files),
        user,
        response_mode,
    };

    let pipeline = state.pipeline(&domain, &api_key);
    dispatch(&state, pipeline, job, form.async_request()).await
}
