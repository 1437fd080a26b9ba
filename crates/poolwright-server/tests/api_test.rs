// HTTP API tests, run in-process against the full router
//
// Run with: cargo test -p poolwright-server --test api_test

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use poolwright_core::{ManagerConfig, PoolManager, TaskStatus};
use poolwright_server::{build_app, ServerConfig};

fn setup(config: ServerConfig) -> (Arc<PoolManager>, Router) {
    let manager = Arc::new(PoolManager::new(ManagerConfig::default()).unwrap());
    let app = build_app(manager.clone(), &config);
    (manager, app)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_pool(app: &Router, name: &str, max_workers: usize) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/pools",
        Some(json!({ "name": name, "max_workers": max_workers })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["pool_id"].as_str().unwrap().parse().unwrap()
}

async fn submit(app: &Router, pool_id: Uuid, name: &str, duration: Value) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/tasks",
        Some(json!({ "pool_id": pool_id, "task_name": name, "duration": duration })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["task_id"].as_str().unwrap().parse().unwrap()
}

#[test_log::test(tokio::test)]
async fn test_health() {
    let (_manager, app) = setup(ServerConfig::default());
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[test_log::test(tokio::test)]
async fn test_pool_crud() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "reports", 2).await;

    let (status, body) = send(&app, Method::GET, &format!("/v1/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "reports");
    assert_eq!(body["max_workers"], 2);
    assert_eq!(body["status"], "running");

    let (status, body) = send(&app, Method::GET, "/v1/pools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/pools",
        Some(json!({ "name": "reports" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("reports"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/pools",
        Some(json!({ "name": "empty", "max_workers": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/v1/pools/{pool_id}?wait=true"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["closed"], true);

    let (status, _) = send(&app, Method::GET, &format!("/v1/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_unknown_ids_are_not_found() {
    let (_manager, app) = setup(ServerConfig::default());
    let missing = Uuid::now_v7();

    for uri in [
        format!("/v1/pools/{missing}"),
        format!("/v1/pools/{missing}/resize-info"),
        format!("/v1/tasks/{missing}"),
    ] {
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/tasks",
        Some(json!({ "pool_id": missing })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    // Cancelling an unknown task is not an error
    let (status, body) = send(&app, Method::DELETE, &format!("/v1/tasks/{missing}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[test_log::test(tokio::test)]
async fn test_submit_demo_task() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "demo", 1).await;

    let task_id = submit(&app, pool_id, "quick", json!("0")).await;
    let value = manager
        .wait_task(task_id, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(value, json!("Task completed after 0 seconds"));

    let (status, body) = send(&app, Method::GET, &format!("/v1/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "quick");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["pool_id"], pool_id.to_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/tasks",
        Some(json!({ "pool_id": pool_id, "task_type": "shell" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported task type");

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_cancel_pending_task() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "busy", 1).await;
    let _running = submit(&app, pool_id, "long", json!(60)).await;
    let queued = submit(&app, pool_id, "queued", json!(60)).await;

    let (status, body) = send(&app, Method::DELETE, &format!("/v1/tasks/{queued}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    let pool = manager.get_pool(pool_id).unwrap();
    let task = pool.get_task(queued).unwrap();
    assert_eq!(task.status(), TaskStatus::Cancelled);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_resize_pool() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "elastic", 2).await;
    let uri = format!("/v1/pools/{pool_id}/resize");

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "max_workers": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["old_max_workers"], 2);
    assert_eq!(body["new_max_workers"], 4);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/pools/{pool_id}/resize-info"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_max_workers"], 4);
    assert_eq!(body["can_resize"], true);

    for bad in [json!({}), json!({ "max_workers": 0 }), json!({ "max_workers": -3 })] {
        let (status, body) = send(&app, Method::PUT, &uri, Some(bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad} -> {body}");
    }

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/v1/pools/{pool_id}?wait=false"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_resize_stopped_pool_conflicts() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "halted", 1).await;
    manager.get_pool(pool_id).unwrap().shutdown(false).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/v1/pools/{pool_id}/resize"),
        Some(json!({ "max_workers": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_task_listing_pagination() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "paged", 1).await;
    for i in 1..=12 {
        submit(&app, pool_id, &format!("t{:02}", i), json!(60)).await;
    }

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/tasks?pool_id={pool_id}&page=2&per_page=5"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["t06", "t07", "t08", "t09", "t10"]);
    assert_eq!(body["pagination"]["total_items"], 12);
    assert_eq!(body["pagination"]["total_pages"], 3);
    assert_eq!(body["pagination"]["start_item"], 6);
    assert_eq!(body["pagination"]["end_item"], 10);

    // Unparsable values fall back to the defaults
    let (status, body) = send(&app, Method::GET, "/v1/tasks?page=abc&per_page=xyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["current_page"], 1);
    assert_eq!(body["pagination"]["per_page"], 10);
    assert_eq!(body["items"].as_array().unwrap().len(), 10);

    // Out of range values are clamped
    let (_, body) = send(&app, Method::GET, "/v1/tasks?page=99&per_page=500", None).await;
    assert_eq!(body["pagination"]["current_page"], 1);
    assert_eq!(body["pagination"]["per_page"], 100);
    assert_eq!(body["pagination"]["has_next"], false);

    let (_, body) = send(&app, Method::GET, "/v1/tasks?page=99&per_page=5", None).await;
    assert_eq!(body["pagination"]["current_page"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::GET, "/v1/tasks?pool_id=not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_cancel_pending_and_force_close() {
    let (manager, app) = setup(ServerConfig::default());
    let pool_id = create_pool(&app, "doomed", 1).await;
    let running = submit(&app, pool_id, "long", json!(60)).await;
    for i in 0..3 {
        submit(&app, pool_id, &format!("queued-{i}"), json!(60)).await;
    }

    let task = manager.get_task(running).unwrap();
    for _ in 0..100 {
        if task.status() == TaskStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/pools/{pool_id}/cancel-pending"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 3);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/v1/pools/{pool_id}/force"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled_tasks"], json!([running.to_string()]));

    let (status, _) = send(&app, Method::GET, &format!("/v1/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("/v1/tasks/{running}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_stats() {
    let (manager, app) = setup(ServerConfig::default());
    let a = create_pool(&app, "a", 1).await;
    create_pool(&app, "b", 1).await;
    let task_id = submit(&app, a, "quick", json!(0)).await;
    manager.wait_task(task_id, None).await.unwrap();

    let (status, body) = send(&app, Method::GET, "/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_pools"], 2);
    assert_eq!(body["total_tasks"], 1);
    assert_eq!(body["active_tasks"], 0);
    assert_eq!(body["completed_tasks"], 1);

    manager.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_openapi_document() {
    let (_manager, app) = setup(ServerConfig::default());
    let (status, body) = send(&app, Method::GET, "/api-doc/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Poolwright API");
    assert!(body["paths"]["/v1/pools/{pool_id}/resize"].is_object());
}

#[test_log::test(tokio::test)]
async fn test_api_prefix() {
    let config = ServerConfig {
        api_prefix: "/api".to_string(),
        ..ServerConfig::default()
    };
    let (_manager, app) = setup(config);

    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, "/api/v1/pools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    let (status, _) = send(&app, Method::GET, "/v1/pools", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_cors_headers_when_configured() {
    let config = ServerConfig {
        cors_allowed_origins: vec!["https://ui.example.com".to_string()],
        ..ServerConfig::default()
    };
    let (_manager, app) = setup(config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/pools")
                .header(header::ORIGIN, "https://ui.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://ui.example.com"
    );
}
