use std::sync::Arc;

use dify_client::ResponseMode;
use dify_relay_common::{AsyncRecord, AsyncRequest, AsyncStatus, WorkflowResponse};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::callback::CallbackNotifier;
use crate::pipeline::{Pipeline, WorkflowJob};
use crate::registry::AsyncRegistry;

pub(crate) const ACCEPTED_MESSAGE: &str = "request accepted, processing asynchronously";
const PROCESSING_MESSAGE: &str = "processing";
const COMPLETED_MESSAGE: &str = "processing complete";

/// Runs accepted async requests in the background and reports each outcome
/// through the registry and a callback.
///
/// At most `max_concurrent` tasks run the pipeline at once; the rest wait in
/// `pending` for a permit.
#[derive(Clone)]
pub struct AsyncRunner {
    registry: Arc<AsyncRegistry>,
    notifier: CallbackNotifier,
    permits: Arc<Semaphore>,
}

impl AsyncRunner {
    pub fn new(registry: Arc<AsyncRegistry>, notifier: CallbackNotifier, max_concurrent: usize) -> Self {
        Self {
            registry,
            notifier,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Register the request and start it in the background. Returns the
    /// `pending` record without waiting for any backend call.
    pub async fn process(&self, pipeline: Pipeline, job: WorkflowJob, request: AsyncRequest) -> AsyncRecord {
        let (record, _handle) = self.submit(pipeline, job, request).await;
        record
    }

    /// Like [`process`](Self::process), also handing back the task handle.
    pub async fn submit(
        &self,
        pipeline: Pipeline,
        job: WorkflowJob,
        request: AsyncRequest,
    ) -> (AsyncRecord, JoinHandle<()>) {
        let record = self
            .registry
            .register(request.request_id.as_deref(), ACCEPTED_MESSAGE)
            .await;

        info!(
            request_id = %record.request_id,
            callback_url = %request.callback_url,
            "Async request accepted"
        );

        let runner = self.clone();
        let request_id = record.request_id.clone();
        let handle = tokio::spawn(async move {
            runner
                .run_task(pipeline, job, request_id, request.callback_url)
                .await;
        });

        (record, handle)
    }

    async fn run_task(&self, pipeline: Pipeline, mut job: WorkflowJob, request_id: String, callback_url: String) {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                self.finish(&request_id, &callback_url, WorkflowResponse::failed(e.to_string()))
                    .await;
                return;
            }
        };

        self.registry
            .update_status(&request_id, AsyncStatus::Processing, PROCESSING_MESSAGE)
            .await;

        // The whole result is needed before the callback can be sent.
        job.response_mode = ResponseMode::Blocking;

        let result = match pipeline.run_blocking(job).await {
            Ok(response) => response,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Async workflow failed");
                WorkflowResponse::failed(e.to_string())
            }
        };
        drop(permit);

        self.finish(&request_id, &callback_url, result).await;
    }

    /// The single terminal transition of a task, followed by its callback.
    async fn finish(&self, request_id: &str, callback_url: &str, result: WorkflowResponse) {
        let (status, message) = if result.is_failure() {
            (AsyncStatus::Failed, result.error_message.clone().unwrap_or_default())
        } else {
            (AsyncStatus::Completed, COMPLETED_MESSAGE.to_string())
        };
        self.registry.update_status(request_id, status, message).await;

        if callback_url.trim().is_empty() {
            return;
        }
        if let Err(e) = self.notifier.deliver(callback_url, request_id, &result).await {
            warn!(request_id, callback_url, error = %e, "Callback delivery failed");
        }
    }
}
