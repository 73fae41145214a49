//! The process-jobs endpoint.
//!
//! | action      | required             | `data` on reply                         |
//! |-------------|----------------------|-----------------------------------------|
//! | `get_next`  | -                    | leased job record or `null`             |
//! | `complete`  | `job_id`, `status`   | `{job_id, status}`                      |
//! | `retry`     | `job_id`             | `{job_id, retry_scheduled}`             |
//! | `heartbeat` | `job_id`             | `{job_id, heartbeat_updated}`           |
//!
//! `tenant_id`, `worker_id` and `action` are required for every call. A
//! store-level "did not apply" answers 400 with `success: false` and the
//! `data` object; validation failures answer 400 with `error`; anything
//! unexpected answers 500 `Internal server error`.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing, Router,
};
use relay_core::{errors::RelayError, TenantContext};
use relay_queue::{CompletionStatus, JobId, WorkerId};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    envelope::{non_empty, Envelope, ProcessJobsRequest},
    RelayAxumError, RelayState,
};

pub const MISSING_REQUIRED_FIELDS: &str = "Missing required fields: tenant_id, worker_id, action";
pub const MISSING_COMPLETE_FIELDS: &str = "Missing required fields for complete action: job_id, status";
pub const MISSING_RETRY_FIELD: &str = "Missing required field for retry action: job_id";
pub const MISSING_HEARTBEAT_FIELD: &str = "Missing required field for heartbeat action: job_id";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Worker actions understood by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetNext,
    Complete,
    Retry,
    Heartbeat,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "get_next" => Some(Self::GetNext),
            "complete" => Some(Self::Complete),
            "retry" => Some(Self::Retry),
            "heartbeat" => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

pub fn router(state: RelayState) -> Router<()> {
    Router::new()
        .route("/", routing::post(process_jobs).options(preflight))
        .with_state(state)
}

/// CORS pre-flight: empty 200. The CORS headers come from the app layers.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn process_jobs(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayAxumError> {
    let body: Value = serde_json::from_slice(&body).context("failed to parse process-jobs request body")?;
    let request = ProcessJobsRequest::from_body(body);

    let (Some(tenant_id), Some(worker_id), Some(action)) = (
        non_empty(&request.tenant_id),
        non_empty(&request.worker_id),
        non_empty(&request.action),
    ) else {
        return Err(RelayError::bad_request(MISSING_REQUIRED_FIELDS).into());
    };

    let Some(parsed) = Action::parse(action) else {
        return Err(RelayError::bad_request(format!("Unknown action: {action}")).into());
    };

    let mut ctx = TenantContext::new(tenant_id);
    if let Some(request_id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_request_id(request_id);
    }
    let worker_id = WorkerId::from(worker_id);

    debug!(
        tenant_id = %ctx.tenant_id,
        worker_id = %worker_id,
        action,
        request_id = ctx.request_id.as_deref().unwrap_or("-"),
        "process-jobs request"
    );

    let envelope = match parsed {
        Action::GetNext => get_next(&state, &ctx, &worker_id, &request).await?,
        Action::Complete => complete(&state, &ctx, &request).await?,
        Action::Retry => retry(&state, &ctx, &request).await?,
        Action::Heartbeat => heartbeat(&state, &ctx, &worker_id, &request).await?,
    };

    Ok(envelope.into_response())
}

async fn get_next(
    state: &RelayState,
    ctx: &TenantContext,
    worker_id: &WorkerId,
    request: &ProcessJobsRequest,
) -> Result<Envelope, RelayAxumError> {
    let job = state
        .gateway
        .get_next_job(ctx, worker_id, non_empty(&request.job_family))
        .await;

    let data = match job {
        Some(job) => serde_json::to_value(job).context("failed to encode leased job")?,
        None => Value::Null,
    };
    Ok(Envelope::data(true, data))
}

async fn complete(
    state: &RelayState,
    ctx: &TenantContext,
    request: &ProcessJobsRequest,
) -> Result<Envelope, RelayAxumError> {
    let (Some(job_id), Some(status)) = (non_empty(&request.job_id), non_empty(&request.status)) else {
        return Err(RelayError::bad_request(MISSING_COMPLETE_FIELDS).into());
    };
    let completion_status: CompletionStatus = status
        .parse()
        .map_err(|_| RelayError::bad_request(format!("Invalid status for complete action: {status}")))?;

    let success = state
        .gateway
        .complete_job(
            ctx,
            &JobId::from(job_id),
            completion_status,
            request.output_data.clone(),
            request.error_data.clone(),
        )
        .await;

    Ok(Envelope::data(success, json!({ "job_id": job_id, "status": status })))
}

async fn retry(
    state: &RelayState,
    ctx: &TenantContext,
    request: &ProcessJobsRequest,
) -> Result<Envelope, RelayAxumError> {
    let Some(job_id) = non_empty(&request.job_id) else {
        return Err(RelayError::bad_request(MISSING_RETRY_FIELD).into());
    };

    let scheduled = state.gateway.retry_job(ctx, &JobId::from(job_id), None).await;

    Ok(Envelope::data(scheduled, json!({ "job_id": job_id, "retry_scheduled": scheduled })))
}

async fn heartbeat(
    state: &RelayState,
    ctx: &TenantContext,
    worker_id: &WorkerId,
    request: &ProcessJobsRequest,
) -> Result<Envelope, RelayAxumError> {
    let Some(job_id) = non_empty(&request.job_id) else {
        return Err(RelayError::bad_request(MISSING_HEARTBEAT_FIELD).into());
    };

    let updated = state
        .gateway
        .update_heartbeat(ctx, &JobId::from(job_id), worker_id)
        .await;

    Ok(Envelope::data(updated, json!({ "job_id": job_id, "heartbeat_updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_exactly() {
        assert_eq!(Action::parse("get_next"), Some(Action::GetNext));
        assert_eq!(Action::parse("complete"), Some(Action::Complete));
        assert_eq!(Action::parse("retry"), Some(Action::Retry));
        assert_eq!(Action::parse("heartbeat"), Some(Action::Heartbeat));
        assert_eq!(Action::parse("GET_NEXT"), None);
        assert_eq!(Action::parse("bogus"), None);
    }
}
