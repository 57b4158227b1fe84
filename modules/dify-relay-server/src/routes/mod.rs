pub mod form;
pub mod status;
pub mod workflow;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use dify_client::DifyClient;
use dify_relay_common::{ApiResponse, AsyncRequest, Config};
use futures::TryStreamExt;
use tracing::warn;

use crate::callback::CallbackNotifier;
use crate::error::{RelayError, Result};
use crate::pipeline::{Pipeline, WorkflowJob, WorkflowOutcome};
use crate::registry::AsyncRegistry;
use crate::resolver::{FileResolver, HttpFileResolver};
use crate::runner::{AsyncRunner, ACCEPTED_MESSAGE};

pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub registry: Arc<AsyncRegistry>,
    pub runner: AsyncRunner,
    pub resolver: Arc<dyn FileResolver>,
}

impl AppState {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let resolver = Arc::new(HttpFileResolver::new(http.clone(), config.download_timeout));
        Self::with_resolver(config, http, resolver)
    }

    pub fn with_resolver(config: Config, http: reqwest::Client, resolver: Arc<dyn FileResolver>) -> Self {
        let registry = Arc::new(AsyncRegistry::new());
        let notifier = CallbackNotifier::new(http.clone(), config.callback_timeout);
        let runner = AsyncRunner::new(registry.clone(), notifier, config.max_concurrent_tasks);

        Self {
            config: Arc::new(config),
            http,
            registry,
            runner,
            resolver,
        }
    }

    /// Pipeline bound to one backend domain and API key.
    pub fn pipeline(&self, domain: &str, api_key: &str) -> Pipeline {
        let dify = DifyClient::with_client(self.http.clone(), domain, api_key)
            .with_timeout(self.config.api_timeout);
        Pipeline::new(dify, self.resolver.clone())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit();

    Router::new()
        .route("/health", get(health))
        .route("/dify/fileSingle/workflow", post(workflow::single_file))
        .route("/dify/files/workflow", post(workflow::multi_file))
        .route("/dify/fileSingle/formdata/workflow", post(form::single_file))
        .route("/dify/files/formdata/workflow", post(form::multi_file))
        .route("/dify/upload/url", post(workflow::upload_url))
        .route("/dify/async/{request_id}", get(status::async_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "server_time": chrono::Local::now().to_rfc3339(),
        "config": {
            "max_upload_files": state.config.max_upload_files,
            "max_file_size": state.config.max_file_size,
            "default_timeout": state.config.api_timeout.as_secs(),
        },
    }))
}

// --- Helpers shared by the handlers ---

/// API key from `Authorization`, with or without the `Bearer ` prefix.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim();
    let token = match raw {
        "Bearer" => "",
        _ => raw.strip_prefix("Bearer ").unwrap_or(raw).trim(),
    };

    if token.is_empty() {
        return Err(RelayError::Unauthorized("missing API key".to_string()));
    }
    Ok(token.to_string())
}

pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelayError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Route a validated job to the async runner, the SSE relay, or a blocking run.
pub(crate) async fn dispatch(
    state: &AppState,
    pipeline: Pipeline,
    job: WorkflowJob,
    async_request: Option<AsyncRequest>,
) -> Result<Response> {
    if let Some(request) = async_request.filter(AsyncRequest::is_enabled) {
        let record = state.runner.process(pipeline, job, request).await;
        let body = ApiResponse::new(StatusCode::ACCEPTED.as_u16(), ACCEPTED_MESSAGE, Some(record));
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    match pipeline.execute(job).await? {
        WorkflowOutcome::Completed(response) => {
            Ok(Json(ApiResponse::success("success", response)).into_response())
        }
        WorkflowOutcome::Streaming(stream) => {
            // Headers are already out once bytes flow; an error can only cut the body short.
            let stream = stream.inspect_err(|e| warn!(error = %e, "Workflow stream aborted"));
            Ok((
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(stream),
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        assert_eq!(bearer_token(&headers("Bearer app-123")).unwrap(), "app-123");
    }

    #[test]
    fn bare_key_is_accepted() {
        assert_eq!(bearer_token(&headers("app-123")).unwrap(), "app-123");
    }

    #[test]
    fn missing_or_empty_key_is_unauthorized() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(RelayError::Unauthorized(_))));
        assert!(matches!(bearer_token(&headers("Bearer ")), Err(RelayError::Unauthorized(_))));
    }
}
