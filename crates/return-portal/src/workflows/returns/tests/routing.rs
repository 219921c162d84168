use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::commerce::InMemoryCommerceGateway;
use crate::rate_limit::{RateLimiter, FixedWindowLimiter, Unlimited};
use crate::workflows::returns::policy::TenantPolicy;
use crate::workflows::returns::router::{returns_router, ReturnsState};

const TOKEN: &str = "s3cret";

fn router_with(
    service: Arc<TestService>,
    limiter: Arc<dyn RateLimiter>,
    admin_token: Option<&str>,
) -> Router {
    returns_router(ReturnsState {
        service,
        limiter,
        admin_token: admin_token.map(str::to_string),
    })
}

fn storefront() -> Router {
    let gateway = InMemoryCommerceGateway::new().with_order(recent_order(
        "o-1",
        "#7001",
        vec![line("a", 50.0, 1), line("b", 50.0, 1)],
    ));
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    router_with(service, Arc::new(Unlimited), Some(TOKEN))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn submission_body(order_number: &str) -> Value {
    json!({
        "order_number": order_number,
        "email": EMAIL,
        "items": [
            { "line_item_id": "a", "quantity": 1, "option": "return", "reason": "too small" }
        ]
    })
}

async fn submit(router: &Router, order_number: &str) -> Value {
    let response = router
        .clone()
        .oneshot(post_json("/api/v1/returns", submission_body(order_number)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json_body(response).await
}

#[tokio::test]
async fn lookup_route_returns_eligibility() {
    let response = storefront()
        .oneshot(post_json(
            "/api/v1/returns/lookup",
            json!({ "order_number": "7001", "email": "CASEY@example.com" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["order_number"], json!("#7001"));
    assert_eq!(payload["eligibility"]["order_level_eligible"], json!(true));
    assert_eq!(
        payload["eligibility"]["eligible_items"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn lookup_route_rejects_wrong_email() {
    let response = storefront()
        .oneshot(post_json(
            "/api/v1/returns/lookup",
            json!({ "order_number": "#7001", "email": "intruder@example.com" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("forbidden"));
}

#[tokio::test]
async fn submit_route_creates_approved_returns() {
    let router = storefront();
    let payload = submit(&router, "#7001").await;

    assert_eq!(payload["status"], json!("approved"));
    assert_eq!(payload["batch_status"], json!("success"));
    assert_eq!(payload["requires_review"], json!(false));
    assert!(payload["return_id"]
        .as_str()
        .is_some_and(|id| id.starts_with("RET-")));
}

#[tokio::test]
async fn submit_route_accepts_flagged_returns_for_review() {
    let mut order = recent_order("o-2", "#7002", vec![line("a", 50.0, 1), line("b", 50.0, 1)]);
    if let Some(billing) = order.billing_address.as_mut() {
        billing.zip = Some("10001".to_string());
    }
    let mut gateway = InMemoryCommerceGateway::new().with_order(order);
    for index in 0..4 {
        gateway = gateway.with_order(returned_order(&format!("r-{index}")));
    }
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    let router = router_with(service, Arc::new(Unlimited), None);

    let response = router
        .oneshot(post_json("/api/v1/returns", submission_body("#7002")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("flagged"));
    assert_eq!(payload["requires_review"], json!(true));
    assert_eq!(payload["risk"]["is_high_risk"], json!(true));
    assert_eq!(payload["kind"], json!("fraud_detected"));
    assert!(payload["risk_factors"]
        .as_array()
        .is_some_and(|factors| factors.contains(&json!("Address Mismatch"))));
}

#[tokio::test]
async fn partial_batches_use_multi_status() {
    let gateway = InMemoryCommerceGateway::new().with_order(recent_order(
        "o-3",
        "#7003",
        vec![line("a", 30.0, 1), line("b", 30.0, 1), line("c", 60.0, 1)],
    ));
    gateway.fail_returns_for("b");
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    let router = router_with(service, Arc::new(Unlimited), None);

    let body = json!({
        "order_number": "#7003",
        "email": EMAIL,
        "items": [
            { "line_item_id": "a", "quantity": 1, "option": "return" },
            { "line_item_id": "b", "quantity": 1, "option": "return" }
        ]
    });
    let response = router
        .oneshot(post_json("/api/v1/returns", body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let payload = read_json_body(response).await;
    assert_eq!(payload["batch_status"], json!("partial_success"));
    assert_eq!(payload["items"][1]["succeeded"], json!(false));
    assert_eq!(
        payload["items"][1]["error"]["kind"],
        json!("upstream_service_error")
    );
}

#[tokio::test]
async fn final_sale_items_report_their_reasons() {
    let gateway = InMemoryCommerceGateway::new().with_order(recent_order(
        "o-4",
        "#7004",
        vec![with_property(line("a", 30.0, 1), "Final Sale", "yes")],
    ));
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    let router = router_with(service, Arc::new(Unlimited), None);

    let response = router
        .oneshot(post_json("/api/v1/returns", submission_body("#7004")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("item_not_returnable"));
    assert_eq!(payload["items"][0]["line_item_id"], json!("a"));
    assert_eq!(payload["items"][0]["reason"], json!("item marked final sale"));
}

#[tokio::test]
async fn storefront_routes_are_rate_limited_per_client() {
    let gateway = InMemoryCommerceGateway::new().with_order(recent_order(
        "o-5",
        "#7005",
        vec![line("a", 50.0, 1), line("b", 50.0, 1)],
    ));
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    let limiter = Arc::new(FixedWindowLimiter::new(2, Duration::from_secs(60)));
    let router = router_with(service, limiter, None);

    let lookup = |client: &str| {
        let mut request = post_json(
            "/api/v1/returns/lookup",
            json!({ "order_number": "#7005", "email": EMAIL }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(lookup("203.0.113.9"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = router
        .clone()
        .oneshot(lookup("203.0.113.9, 10.0.0.1"))
        .await
        .expect("route executes");
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));

    let other = router
        .oneshot(lookup("198.51.100.4"))
        .await
        .expect("route executes");
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let router = storefront();
    let payload = submit(&router, "#7001").await;
    let id = payload["return_id"].as_str().expect("id").to_string();

    let anonymous = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/returns/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .clone()
        .oneshot(
            Request::get("/api/v1/returns")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let detail = router
        .oneshot(
            admin(Request::get(format!("/api/v1/returns/{id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(detail.status(), StatusCode::OK);
    let record = read_json_body(detail).await;
    assert_eq!(record["status"], json!("approved"));
    assert_eq!(record["order_number"], json!("#7001"));
}

#[tokio::test]
async fn unknown_returns_are_not_found() {
    let response = storefront()
        .oneshot(
            admin(Request::post("/api/v1/returns/RET-404404/approve"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reject_route_enforces_the_workflow() {
    let gateway = InMemoryCommerceGateway::new().with_order(recent_order(
        "o-6",
        "#7006",
        vec![line("a", 50.0, 1), line("b", 50.0, 1)],
    ));
    gateway.fail_history(Some(
        crate::workflows::returns::gateway::GatewayError::Transport("reset".to_string()),
    ));
    let (service, _, _) = build_service(gateway, TenantPolicy::default());
    let router = router_with(service, Arc::new(Unlimited), Some(TOKEN));

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/returns", submission_body("#7006")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("pending"));
    let id = payload["return_id"].as_str().expect("id").to_string();

    let reject = |body: Value| {
        admin(Request::post(format!("/api/v1/returns/{id}/reject")))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let blank = router
        .clone()
        .oneshot(reject(json!({ "reason": { "code": "other", "detail": " " } })))
        .await
        .expect("route executes");
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let rejected = router
        .clone()
        .oneshot(reject(json!({
            "reason": { "code": "item_damaged" },
            "actor": "dana@example.com",
            "notes": "crushed box"
        })))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::OK);
    let record = read_json_body(rejected).await;
    assert_eq!(record["status"], json!("rejected"));
    assert_eq!(record["history"][1]["user"], json!("dana@example.com"));

    let complete = router
        .oneshot(
            admin(Request::post(format!("/api/v1/returns/{id}/complete")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(complete.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_route_filters_and_validates_status() {
    let router = storefront();
    submit(&router, "#7001").await;

    let approved = router
        .clone()
        .oneshot(
            admin(Request::get("/api/v1/returns?status=approved"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);
    let rows = read_json_body(approved).await;
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["item_count"], json!(1));

    let bogus = router
        .oneshot(
            admin(Request::get("/api/v1/returns?status=shipped"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);
}
