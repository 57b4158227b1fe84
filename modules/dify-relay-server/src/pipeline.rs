use std::sync::Arc;

use dify_client::{DifyClient, FileUploadResponse, ResponseMode, WorkflowRunRequest, WorkflowStream};
use dify_relay_common::{FileReference, WorkflowResponse};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::resolver::{FileResolver, FileSource, ResolvedFile};

/// Whether the workflow input takes one file reference or an ordered list.
#[derive(Debug, Clone)]
pub enum FileBinding {
    Single(FileSource),
    Multiple(Vec<FileSource>),
}

impl FileBinding {
    pub fn sources(&self) -> &[FileSource] {
        match self {
            FileBinding::Single(source) => std::slice::from_ref(source),
            FileBinding::Multiple(sources) => sources,
        }
    }
}

/// One workflow invocation, whatever route it arrived on.
#[derive(Debug, Clone)]
pub struct WorkflowJob {
    pub inputs: Map<String, Value>,
    /// Input key that receives the uploaded file reference(s).
    pub file_key: String,
    pub files: FileBinding,
    pub user: String,
    pub response_mode: ResponseMode,
}

pub enum WorkflowOutcome {
    Completed(WorkflowResponse),
    Streaming(WorkflowStream),
}

/// resolve -> upload -> substitute -> run, shared by every route and the async runner.
#[derive(Clone)]
pub struct Pipeline {
    dify: DifyClient,
    resolver: Arc<dyn FileResolver>,
}

impl Pipeline {
    pub fn new(dify: DifyClient, resolver: Arc<dyn FileResolver>) -> Self {
        Self { dify, resolver }
    }

    pub async fn upload_one(&self, source: &FileSource, user: &str) -> Result<FileUploadResponse> {
        let ResolvedFile { filename, content } = self.resolver.resolve(source).await?;

        let uploaded = self
            .dify
            .upload_file(content, &filename, user)
            .await
            .map_err(|source| RelayError::Upload {
                filename: filename.clone(),
                source,
            })?;

        debug!(source = source.describe(), file_id = %uploaded.id, "File uploaded to backend");
        Ok(uploaded)
    }

    /// Uploads in order, one at a time. The first failure stops the loop, so
    /// later files are never fetched or uploaded.
    pub async fn upload_all(&self, files: &FileBinding, user: &str) -> Result<Vec<FileUploadResponse>> {
        let mut uploads = Vec::with_capacity(files.sources().len());
        for source in files.sources() {
            uploads.push(self.upload_one(source, user).await?);
        }
        Ok(uploads)
    }

    pub async fn execute(&self, job: WorkflowJob) -> Result<WorkflowOutcome> {
        match job.response_mode {
            ResponseMode::Blocking => Ok(WorkflowOutcome::Completed(self.run_blocking(job).await?)),
            ResponseMode::Streaming => Ok(WorkflowOutcome::Streaming(self.run_streaming(job).await?)),
        }
    }

    pub async fn run_blocking(&self, job: WorkflowJob) -> Result<WorkflowResponse> {
        let (request, uploads) = self.prepare(job, ResponseMode::Blocking).await?;

        let body = self
            .dify
            .run_workflow(&request)
            .await
            .map_err(RelayError::Workflow)?;
        let workflow_data: Value =
            serde_json::from_slice(&body).map_err(|e| RelayError::Parse(e.to_string()))?;

        Ok(WorkflowResponse::completed(uploads, workflow_data))
    }

    /// Returns once the backend has accepted the run with 200; the stream
    /// carries its body unchanged.
    pub async fn run_streaming(&self, job: WorkflowJob) -> Result<WorkflowStream> {
        let (request, _) = self.prepare(job, ResponseMode::Streaming).await?;
        self.dify
            .stream_workflow(request)
            .await
            .map_err(RelayError::Workflow)
    }

    async fn prepare(
        &self,
        job: WorkflowJob,
        mode: ResponseMode,
    ) -> Result<(WorkflowRunRequest, Vec<FileUploadResponse>)> {
        info!(
            user = %job.user,
            files = job.files.sources().len(),
            response_mode = mode.as_str(),
            "Running workflow pipeline"
        );

        let uploads = self.upload_all(&job.files, &job.user).await?;
        let inputs = substitute_inputs(job.inputs, &job.file_key, &job.files, &uploads);
        Ok((WorkflowRunRequest::new(inputs, mode, job.user), uploads))
    }
}

/// Replace `key` in `inputs` with references to the uploaded files.
pub fn substitute_inputs(
    mut inputs: Map<String, Value>,
    key: &str,
    binding: &FileBinding,
    uploads: &[FileUploadResponse],
) -> Map<String, Value> {
    inputs.remove(key);

    let mut references = uploads
        .iter()
        .map(|upload| FileReference::from_upload(upload).to_value());

    match binding {
        FileBinding::Single(_) => {
            if let Some(reference) = references.next() {
                inputs.insert(key.to_string(), reference);
            }
        }
        FileBinding::Multiple(_) => {
            inputs.insert(key.to_string(), Value::Array(references.collect()));
        }
    }

    inputs
}
