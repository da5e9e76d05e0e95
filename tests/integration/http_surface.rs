//! Status mapping and request decoding of the HTTP surface.

mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use graphkb::schema;
use graphkb::server::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

use support::{edge, pool_over, resolvable, vertex, FakeBackend};

fn app(backend: FakeBackend) -> axum::Router {
    let state = Arc::new(AppState {
        pool: pool_over(Arc::new(backend)),
        registry: schema::graphkb().expect("schema"),
    });
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post(uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method("POST").uri(uri);
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

#[tokio::test]
async fn health_probe_reports_the_build_version() {
    let app = app(FakeBackend::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["status"], "ok");
}

#[tokio::test]
async fn omitted_body_returns_the_complete_ontology() {
    let backend = FakeBackend::new()
        .route(
            "FROM Disease WHERE deletedAt IS NULL",
            vec![vertex("#14:0", "Disease", "v0"), vertex("#14:1", "Disease", "v1")],
        )
        .route(
            "FROM SubClassOf WHERE",
            vec![edge("#30:0", "SubClassOf", "#14:0", "#14:1")],
        );
    let response = app(backend)
        .oneshot(post("/subgraphs/Disease", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    let graph = &payload["result"]["g"];
    assert_eq!(graph["nodes"].as_object().expect("nodes").len(), 2);
    assert_eq!(graph["edges"].as_object().expect("edges").len(), 1);
    assert!(payload["result"].get("v").is_none());
}

#[tokio::test]
async fn similar_to_round_trips_through_the_body() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:3]",
            vec![resolvable("#14:3", "Disease")],
        )
        .route(
            "TRAVERSE both(",
            vec![
                vertex("#14:3", "Disease", "v3"),
                vertex("#14:4", "Disease", "v4"),
                edge("#31:0", "AliasOf", "#14:3", "#14:4"),
            ],
        );
    let body = json!({
        "subgraphType": "similarTo",
        "base": ["#14:3"],
        "subgraph": "both",
    });
    let response = app(backend)
        .oneshot(post("/subgraphs/Disease", Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(
        payload["result"]["g"]["nodes"].as_object().expect("nodes").len(),
        2
    );
    assert_eq!(
        payload["result"]["v"]["vNodes"].as_object().expect("vnodes").len(),
        1
    );
}

#[tokio::test]
async fn unknown_ontology_maps_to_bad_request() {
    let response = app(FakeBackend::new())
        .oneshot(post("/subgraphs/NotAClass", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["name"], "ValidationError");
}

#[tokio::test]
async fn unknown_body_fields_map_to_bad_request() {
    let body = json!({ "subgraphTyp": "ancestors" });
    let response = app(FakeBackend::new())
        .oneshot(post("/subgraphs/Disease", Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_base_maps_to_bad_request() {
    let body = json!({ "subgraphType": "ancestors" });
    let response = app(FakeBackend::new())
        .oneshot(post("/subgraphs/Disease", Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unresolvable_seed_maps_to_not_found() {
    let body = json!({ "subgraphType": "ancestors", "base": ["#14:99"] });
    let response = app(FakeBackend::new())
        .oneshot(post("/subgraphs/Disease", Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["name"], "NotFoundError");
}
