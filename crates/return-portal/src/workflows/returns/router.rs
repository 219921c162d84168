use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ReturnId, ReturnStatus, ReturnSubmission, TenantId};
use super::error::{ErrorKind, ReturnServiceError};
use super::gateway::CommerceGateway;
use super::repository::{ReturnRecord, ReturnRepository, ReturnSummaryView};
use super::service::{BatchStatus, ReturnPortalService};
use super::workflow::RejectionReason;
use crate::rate_limit::{RateLimitExceeded, RateLimiter};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const CLIENT_HEADER: &str = "x-forwarded-for";
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Shared state behind the returns endpoints.
pub struct ReturnsState<R, G> {
    pub service: Arc<ReturnPortalService<R, G>>,
    pub limiter: Arc<dyn RateLimiter>,
    /// Bearer token for admin routes; `None` leaves them open.
    pub admin_token: Option<String>,
}

/// Router builder exposing the storefront and admin return endpoints.
pub fn returns_router<R, G>(state: ReturnsState<R, G>) -> Router
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    Router::new()
        .route("/api/v1/returns/lookup", post(lookup_handler::<R, G>))
        .route(
            "/api/v1/returns",
            post(submit_handler::<R, G>).get(list_handler::<R, G>),
        )
        .route("/api/v1/returns/:return_id", get(detail_handler::<R, G>))
        .route(
            "/api/v1/returns/:return_id/approve",
            post(approve_handler::<R, G>),
        )
        .route(
            "/api/v1/returns/:return_id/reject",
            post(reject_handler::<R, G>),
        )
        .route("/api/v1/returns/:return_id/flag", post(flag_handler::<R, G>))
        .route(
            "/api/v1/returns/:return_id/complete",
            post(complete_handler::<R, G>),
        )
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupRequest {
    pub order_number: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionRequest {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    pub reason: RejectionReason,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub(crate) async fn lookup_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LookupRequest>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(limited) = state.limiter.check(&client_key(&headers)) {
        return too_many_requests(limited);
    }

    let tenant = tenant_from(&headers);
    match state
        .service
        .lookup_order(&tenant, &request.order_number, &request.email)
        .await
    {
        Ok(lookup) => (StatusCode::OK, axum::Json(lookup)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<ReturnSubmission>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(limited) = state.limiter.check(&client_key(&headers)) {
        return too_many_requests(limited);
    }

    let tenant = tenant_from(&headers);
    match state.service.submit_return(&tenant, submission).await {
        Ok(outcome) => {
            let status = if outcome.requires_review() {
                StatusCode::ACCEPTED
            } else if outcome.status == BatchStatus::PartialSuccess {
                StatusCode::MULTI_STATUS
            } else {
                StatusCode::CREATED
            };
            let mut payload = json!({
                "return_id": outcome.record.id,
                "status": outcome.record.status.label(),
                "batch_status": outcome.status,
                "requires_review": outcome.requires_review(),
                "risk": outcome.record.risk,
                "items": outcome.items,
            });
            if outcome.requires_review() {
                payload["kind"] = json!(ErrorKind::FraudDetected);
                payload["risk_factors"] = json!(outcome.record.risk.labels());
            }
            (status, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let status = match query.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => match ReturnStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(ReturnServiceError::BadRequest(format!(
                    "unknown status filter '{raw}'"
                )))
            }
        },
    };

    match state.service.list(status) {
        Ok(records) => {
            let rows: Vec<ReturnSummaryView> =
                records.iter().map(ReturnRecord::summary_view).collect();
            (StatusCode::OK, axum::Json(rows)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn detail_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Path(return_id): Path<String>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    record_response(state.service.get(&ReturnId(return_id)))
}

pub(crate) async fn approve_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Path(return_id): Path<String>,
    body: Option<axum::Json<ActionRequest>>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    let result = state
        .service
        .approve(
            &ReturnId(return_id),
            actor_name(&request.actor),
            request.notes.as_deref(),
        )
        .await;
    record_response(result)
}

pub(crate) async fn flag_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Path(return_id): Path<String>,
    body: Option<axum::Json<ActionRequest>>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    let result = state
        .service
        .flag(
            &ReturnId(return_id),
            actor_name(&request.actor),
            request.notes.as_deref(),
        )
        .await;
    record_response(result)
}

pub(crate) async fn reject_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Path(return_id): Path<String>,
    axum::Json(request): axum::Json<RejectRequest>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let result = state
        .service
        .reject(
            &ReturnId(return_id),
            actor_name(&request.actor),
            request.reason,
            request.notes.as_deref(),
        )
        .await;
    record_response(result)
}

pub(crate) async fn complete_handler<R, G>(
    State(state): State<Arc<ReturnsState<R, G>>>,
    headers: HeaderMap,
    Path(return_id): Path<String>,
    body: Option<axum::Json<ActionRequest>>,
) -> Response
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    let result = state
        .service
        .complete(
            &ReturnId(return_id),
            actor_name(&request.actor),
            request.notes.as_deref(),
        )
        .await;
    record_response(result)
}

fn record_response(result: Result<ReturnRecord, ReturnServiceError>) -> Response {
    match result {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

fn actor_name(actor: &Option<String>) -> &str {
    actor
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("admin")
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::OrderNotEligible | ErrorKind::ItemNotReturnable => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::FraudDetected => StatusCode::ACCEPTED,
        ErrorKind::UpstreamServiceError => StatusCode::BAD_GATEWAY,
        ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: ReturnServiceError) -> Response {
    let kind = err.kind();
    if matches!(
        kind,
        ErrorKind::UpstreamServiceError | ErrorKind::InternalError
    ) {
        error!(kind = kind.code(), error = %err, "return request failed");
    }

    let mut payload = json!({
        "error": err.public_message(),
        "kind": kind,
    });
    if let ReturnServiceError::ItemsNotReturnable(items) = &err {
        payload["items"] = json!(items
            .iter()
            .map(|item| json!({
                "line_item_id": item.line_item_id,
                "title": item.title,
                "reason": item.reason.summary(),
            }))
            .collect::<Vec<_>>());
    }

    (status_for(kind), axum::Json(payload)).into_response()
}

fn too_many_requests(limited: RateLimitExceeded) -> Response {
    let payload = json!({
        "error": limited.to_string(),
        "kind": ErrorKind::TooManyRequests,
        "retry_after_secs": limited.retry_after_secs,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(payload)).into_response();
    if let Ok(value) = HeaderValue::from_str(&limited.retry_after_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

fn authorize<R, G>(state: &ReturnsState<R, G>, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if presented == Some(expected) {
        Ok(())
    } else {
        let payload = json!({
            "error": "admin authorization required",
            "kind": ErrorKind::Forbidden,
        });
        Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response())
    }
}

pub(crate) fn tenant_from(headers: &HeaderMap) -> TenantId {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .map(|tenant| TenantId(tenant.to_string()))
        .unwrap_or_else(TenantId::default_tenant)
}

pub(crate) fn client_key(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|client| !client.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}
