use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use busbar_core::build_router;
use busbar_core::test_utils::create_test_app_state;
use serde_json::{json, Value};
use tower::ServiceExt;

fn json_request(method: &str, uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let app = build_router(create_test_app_state());
    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn flow_crud_roundtrip() {
    let state = create_test_app_state();

    let node = json!({
        "id": "n1",
        "type": "mcp-server",
        "position": {"x": 0, "y": 0},
        "data": {"label": "Server"}
    });
    let response = build_router(state.clone())
        .oneshot(json_request("POST", "/api/nodes", &node))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let edge = json!({"id": "e1", "source": "n1", "target": "n2"});
    let response = build_router(state.clone())
        .oneshot(json_request("POST", "/api/edges", &edge))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state.clone())
        .oneshot(empty_request("GET", "/api/flow"))
        .await
        .unwrap();
    let flow = body_json(response).await;
    assert_eq!(flow["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(flow["edges"].as_array().unwrap().len(), 1);

    let response = build_router(state.clone())
        .oneshot(empty_request("DELETE", "/api/flow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(empty_request("GET", "/api/flow"))
        .await
        .unwrap();
    let flow = body_json(response).await;
    assert!(flow["nodes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn server_catalog_crud() {
    let state = create_test_app_state();
    let config = json!({
        "id": "srv1",
        "name": "Weather",
        "description": "Forecast tools"
    });

    let response = build_router(state.clone())
        .oneshot(json_request("POST", "/api/mcp/server", &config))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state.clone())
        .oneshot(empty_request("GET", "/api/mcp/servers"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = build_router(state.clone())
        .oneshot(empty_request("GET", "/api/mcp/server/srv1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Weather");

    let response = build_router(state.clone())
        .oneshot(empty_request("DELETE", "/api/mcp/server/srv1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(empty_request("GET", "/api/mcp/server/srv1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn saving_config_without_id_is_rejected() {
    let app = build_router(create_test_app_state());
    let config = json!({"id": "", "name": "Anonymous"});
    let response = app
        .oneshot(json_request("POST", "/api/mcp/server", &config))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_produces_code_and_requirements() {
    let state = create_test_app_state();
    let config = json!({
        "id": "srv1",
        "name": "Weather",
        "tools": [{
            "id": "t1",
            "name": "ping",
            "description": "Echo a payload",
            "input_schema": {"type": "object", "properties": {}}
        }]
    });
    build_router(state.clone())
        .oneshot(json_request("POST", "/api/mcp/server", &config))
        .await
        .unwrap();

    let response = build_router(state)
        .oneshot(empty_request("POST", "/api/mcp/generate/srv1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let code = body["code"].as_str().unwrap();
    assert!(code.contains("async def call_tool"));
    assert!(code.contains("if name == \"ping\":"));
    assert!(body["requirements"].as_str().unwrap().contains("mcp>="));
}

#[tokio::test]
async fn generate_for_unknown_config_is_not_found() {
    let app = build_router(create_test_app_state());
    let response = app
        .oneshot(empty_request("POST", "/api/mcp/generate/ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn flow_to_server_converts_and_saves() {
    let state = create_test_app_state();
    let graph = json!({
        "nodes": [
            {"id": "s1", "type": "mcp-server", "position": {}, "data": {"config": {"name": "Weather"}}},
            {"id": "t1", "type": "mcp-tool", "position": {}, "data": {"config": {"name": "ping"}}}
        ],
        "edges": [{"id": "e1", "source": "s1", "target": "t1"}]
    });

    let response = build_router(state.clone())
        .oneshot(json_request("POST", "/api/mcp/flow-to-server", &graph))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let config = body_json(response).await;
    assert_eq!(config["id"], "s1");
    assert_eq!(config["tools"].as_array().unwrap().len(), 1);

    // The conversion result is saved in the catalog.
    let response = build_router(state)
        .oneshot(empty_request("GET", "/api/mcp/server/s1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn flow_without_server_node_is_a_bad_request() {
    let app = build_router(create_test_app_state());
    let graph = json!({"nodes": [], "edges": []});
    let response = app
        .oneshot(json_request("POST", "/api/mcp/flow-to-server", &graph))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_returns_a_zip_archive() {
    let state = create_test_app_state();
    let config = json!({"id": "srv1", "name": "Weather"});
    build_router(state.clone())
        .oneshot(json_request("POST", "/api/mcp/server", &config))
        .await
        .unwrap();

    let response = build_router(state)
        .oneshot(empty_request("POST", "/api/mcp/export/srv1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // Zip local-file-header magic
    assert_eq!(&bytes[..4], &b"PK\x03\x04"[..]);
}

#[tokio::test]
async fn deploying_an_unknown_config_is_not_found() {
    let app = build_router(create_test_app_state());
    let response = app
        .oneshot(empty_request("POST", "/api/mcp/deploy/ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stopping_an_unknown_server_is_not_found() {
    let app = build_router(create_test_app_state());
    let response = app
        .oneshot(empty_request("DELETE", "/api/mcp/deploy/ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn calling_a_tool_on_an_unknown_server_is_not_found() {
    let app = build_router(create_test_app_state());
    let payload = json!({"name": "ping", "arguments": {"n": 1}});
    let response = app
        .oneshot(json_request("POST", "/api/mcp/ghost/tools/call", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hosted_list_starts_empty() {
    let app = build_router(create_test_app_state());
    let response = app
        .oneshot(empty_request("GET", "/api/mcp/hosted"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}
