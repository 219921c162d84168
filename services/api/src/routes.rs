use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use return_portal::workflows::returns::{
    returns_router, CommerceGateway, ReturnRepository, ReturnsState,
};
use serde_json::json;

pub(crate) fn with_return_routes<R, G>(state: ReturnsState<R, G>) -> axum::Router
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    returns_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryReturnRepository;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use return_portal::commerce::InMemoryCommerceGateway;
    use return_portal::rate_limit::FixedWindowLimiter;
    use return_portal::workflows::returns::{ReturnPortalService, StaticPolicyResolver};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = ReturnPortalService::new(
            Arc::new(InMemoryReturnRepository::default()),
            Arc::new(InMemoryCommerceGateway::demo()),
            Arc::new(StaticPolicyResolver::default()),
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };

        with_return_routes(ReturnsState {
            service: Arc::new(service),
            limiter: Arc::new(FixedWindowLimiter::new(1, Duration::from_secs(60))),
            admin_token: Some("letmein".to_string()),
        })
        .layer(Extension(state))
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn demo_catalog_serves_lookups_and_guards_admin_routes() {
        let router = app(true);
        let lookup = Request::post("/api/v1/returns/lookup")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::from(
                json!({ "order_number": "1001", "email": "JAMIE@example.com" }).to_string(),
            ))
            .unwrap();
        let response = router.clone().oneshot(lookup).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let listing = Request::get("/api/v1/returns").body(Body::empty()).unwrap();
        let response = router.oneshot(listing).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
