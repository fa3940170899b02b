mod common;
use common::utils::spawn_app;

#[tokio::test]
async fn backend_health_working() {
    let test_app = spawn_app().await;

    let response = test_app.get("/backend_health").await;

    assert!(response.status().is_success());

    let body = response.text().await.expect("Cannot read response body.");
    let json_response: serde_json::Value = serde_json::from_str(&body).expect("Cannot turn into a json.");

    assert_eq!(json_response, serde_json::json!({
        "status": "UP"
    }));
}

#[tokio::test]
async fn api_health_reports_server_running() {
    let test_app = spawn_app().await;

    let response = test_app.get("/api/health").await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Cannot turn into a json.");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Server is running");
}
