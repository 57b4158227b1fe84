use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use dify_relay_common::{ApiResponse, AsyncRecord};

use super::AppState;
use crate::error::{RelayError, Result};

/// GET /dify/async/{request_id}
pub async fn async_status(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<ApiResponse<AsyncRecord>>> {
    let record = state
        .registry
        .get(&request_id)
        .await
        .ok_or_else(|| RelayError::NotFound(format!("no async request with id {request_id}")))?;

    Ok(Json(ApiResponse::success("success", record)))
}
