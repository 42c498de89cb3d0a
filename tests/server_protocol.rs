mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_test::TestServer;
use base64::Engine;
use cache_relay::routes::app_router;
use common::{CREDENTIAL, PREFIX, create_test_state};
use tower::ServiceExt;

fn make_server(authentication: Option<&str>) -> TestServer {
    TestServer::new(app_router(create_test_state(authentication), PREFIX)).unwrap()
}

fn basic(credential: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credential)
    )
}

// ─── PUT / GET ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_put_then_get_returns_body_and_lifetime() {
    let server = make_server(None);

    server
        .put("/rest/orders/abc")
        .add_header("timeToLiveSeconds", "60")
        .add_header("maxIdleTimeSeconds", "30")
        .text("{\"total\":1}")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/rest/orders/abc").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "{\"total\":1}");
    assert_eq!(response.headers()["timetoliveseconds"], "60");
    assert_eq!(response.headers()["maxidletimeseconds"], "30");
}

#[tokio::test]
async fn test_put_without_lifetime_has_no_limit() {
    let server = make_server(None);

    server
        .put("/rest/orders/forever")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/rest/orders/forever").await;

    response.assert_status_ok();
    assert!(response.headers().get("timetoliveseconds").is_none());
    assert!(response.headers().get("maxidletimeseconds").is_none());
}

#[tokio::test]
async fn test_non_positive_lifetime_means_no_limit() {
    let server = make_server(None);

    server
        .put("/rest/orders/zero")
        .add_header("timeToLiveSeconds", "0")
        .add_header("maxIdleTimeSeconds", "-5")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/rest/orders/zero").await;
    response.assert_status_ok();
    assert!(response.headers().get("timetoliveseconds").is_none());
}

#[tokio::test]
async fn test_invalid_lifetime_header_is_rejected() {
    let server = make_server(None);

    let response = server
        .put("/rest/orders/bad")
        .add_header("timeToLiveSeconds", "soon")
        .text("v")
        .await;

    response.assert_status_bad_request();
    server.get("/rest/orders/bad").await.assert_status_not_found();
}

#[tokio::test]
async fn test_perform_async_write_is_visible_immediately() {
    let server = make_server(None);

    server
        .put("/rest/orders/async")
        .add_header("performAsync", "true")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/rest/orders/async").await.assert_status_ok();
}

#[tokio::test]
async fn test_get_missing_entry() {
    let server = make_server(None);

    let response = server.get("/rest/orders/missing").await;

    response.assert_status_not_found();
    let json = response.json::<serde_json::Value>();
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_entries_expire() {
    let server = make_server(None);

    server
        .put("/rest/orders/short")
        .add_header("timeToLiveSeconds", "0.05")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    server.get("/rest/orders/short").await.assert_status_not_found();
}

#[tokio::test]
async fn test_get_with_lifetime_headers_extends_entry() {
    let server = make_server(None);

    server
        .put("/rest/orders/renewed")
        .add_header("timeToLiveSeconds", "0.2")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get("/rest/orders/renewed")
        .add_header("timeToLiveSeconds", "60")
        .await;
    response.assert_status_ok();
    assert_eq!(response.headers()["timetoliveseconds"], "60");

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    server.get("/rest/orders/renewed").await.assert_status_ok();
}

#[tokio::test]
async fn test_get_without_lifetime_headers_keeps_expiry() {
    let server = make_server(None);

    server
        .put("/rest/orders/kept")
        .add_header("timeToLiveSeconds", "0.2")
        .text("v")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/rest/orders/kept").await.assert_status_ok();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    server.get("/rest/orders/kept").await.assert_status_not_found();
}

// ─── DELETE ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_entry() {
    let server = make_server(None);
    server.put("/rest/orders/a").text("1").await;

    server
        .delete("/rest/orders/a")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    // second delete finds nothing
    server.delete("/rest/orders/a").await.assert_status_not_found();
}

#[tokio::test]
async fn test_delete_namespace() {
    let server = make_server(None);
    server.put("/rest/orders/a").text("1").await;
    server.put("/rest/orders/b").text("2").await;
    server.put("/rest/users/a").text("3").await;

    server
        .delete("/rest/orders")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/rest/orders/a").await.assert_status_not_found();
    server.get("/rest/orders/b").await.assert_status_not_found();
    server.get("/rest/users/a").await.assert_status_ok();

    server.delete("/rest/orders").await.assert_status_not_found();
}

// ─── AUTH ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let server = make_server(Some(CREDENTIAL));

    let response = server.put("/rest/orders/a").text("1").await;

    response.assert_status_unauthorized();
    assert_eq!(response.headers()["www-authenticate"], "Basic");
}

#[tokio::test]
async fn test_wrong_credential_is_unauthorized() {
    let server = make_server(Some(CREDENTIAL));

    server
        .get("/rest/orders/a")
        .add_header("Authorization", basic("relay:wrong"))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_valid_credential_is_accepted() {
    let server = make_server(Some(CREDENTIAL));

    server
        .put("/rest/orders/a")
        .add_header("Authorization", basic(CREDENTIAL))
        .text("1")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get("/rest/orders/a")
        .add_header("Authorization", basic(CREDENTIAL))
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "1");
}

// ─── HEALTH ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_is_public() {
    let server = make_server(Some(CREDENTIAL));
    server.put("/rest/orders/a").text("1").await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"]["entries"], 0);
    assert_eq!(json["store"]["namespaces"], 0);
}

#[tokio::test]
async fn test_health_via_oneshot() {
    let app = app_router(create_test_state(None), PREFIX);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
