use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::utils::{spawn_app, spawn_app_with};
use common::wearable_helpers::{
    activity_item, auth_success_event, daily_item, data_event, link_user, mount_history_requests_ok,
};

#[tokio::test]
async fn auth_success_links_user_and_requests_backfill() {
    let test_app = spawn_app().await;
    mount_history_requests_ok(&test_app).await;

    let response = test_app
        .post_webhook(&auth_success_event("runner@example.com", "terra-user-1"))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let link = test_app
        .store
        .wearables
        .find_by_reference("runner@example.com")
        .await
        .unwrap()
        .expect("link should exist");
    assert_eq!(link.terra_user_id, "terra-user-1");
    assert_eq!(link.provider.as_str(), "GARMIN");
    assert_eq!(link.scopes.as_deref(), Some("activity,sleep,daily,body"));
    assert!(link.health_data.is_empty());
    assert!(link.pending_request.is_none());

    let requests = test_app.terra_server.received_requests().await.unwrap();
    let mut paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/activity", "/body", "/daily", "/sleep"]);
    for request in &requests {
        let query: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(query.contains(&("user_id".to_string(), "terra-user-1".to_string())));
    }
}

#[tokio::test]
async fn reauthentication_clears_previous_health_data() {
    let test_app = spawn_app().await;
    link_user(&test_app, "runner@example.com", "terra-user-1").await;

    let response = test_app
        .post_webhook(&data_event("activity", "terra-user-1", json!([activity_item("S1", 100)])))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = test_app
        .post_webhook(&auth_success_event("runner@example.com", "terra-user-2"))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let link = test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().unwrap();
    assert_eq!(link.terra_user_id, "terra-user-2");
    assert!(link.health_data.is_empty());
}

#[tokio::test]
async fn repeated_items_are_overwritten_by_their_key() {
    let test_app = spawn_app().await;
    link_user(&test_app, "runner@example.com", "terra-user-1").await;

    for calories in [100, 250] {
        let response = test_app
            .post_webhook(&data_event("activity", "terra-user-1", json!([activity_item("S1", calories)])))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }
    let response = test_app
        .post_webhook(&data_event("daily", "terra-user-1", json!([
            daily_item("2025-03-01T00:00:00+00:00", 8000),
            daily_item("2025-03-02T00:00:00+00:00", 12000)
        ])))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let link = test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().unwrap();
    assert_eq!(link.health_data.activity.len(), 1);
    assert_eq!(
        link.health_data.activity["S1"].payload["calories_data"]["total_burned_calories"],
        250
    );
    assert_eq!(link.health_data.daily.len(), 2);
    assert_eq!(
        link.health_data.daily["2025-03-02T00:00:00+00:00"].payload["distance_data"]["steps"],
        12000
    );
    assert!(link.health_data.sleep.is_empty());
}

#[tokio::test]
async fn data_for_unknown_user_is_acknowledged_and_dropped() {
    let test_app = spawn_app().await;
    link_user(&test_app, "runner@example.com", "terra-user-1").await;

    let response = test_app
        .post_webhook(&data_event("sleep", "someone-else", json!([{ "metadata": { "summary_id": "Z" } }])))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let link = test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().unwrap();
    assert!(link.health_data.is_empty());
    assert!(test_app.store.wearables.find_by_terra_user("someone-else").await.unwrap().is_none());
}

#[tokio::test]
async fn large_request_completes_after_declared_chunks() {
    let test_app = spawn_app().await;
    link_user(&test_app, "runner@example.com", "terra-user-1").await;

    let response = test_app
        .post_webhook(&json!({
            "type": "large_request_processing",
            "user": { "user_id": "terra-user-1", "provider": "GARMIN" },
            "message": "Large request is being processed"
        }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let link = test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().unwrap();
    assert_eq!(link.pending_request.unwrap().status.as_str(), "processing");

    let response = test_app
        .post_webhook(&json!({
            "type": "large_request_sending",
            "user": { "user_id": "terra-user-1", "provider": "GARMIN" },
            "number_of_payloads": 2
        }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let pending = test_app
        .store
        .wearables
        .find_by_reference("runner@example.com")
        .await
        .unwrap()
        .unwrap()
        .pending_request
        .unwrap();
    assert_eq!(pending.status.as_str(), "receiving");
    assert_eq!(pending.total_chunks, Some(2));
    assert_eq!(pending.chunks_received, 0);

    test_app
        .post_webhook(&data_event("activity", "terra-user-1", json!([activity_item("S1", 100)])))
        .await;
    let pending = test_app
        .store
        .wearables
        .find_by_reference("runner@example.com")
        .await
        .unwrap()
        .unwrap()
        .pending_request
        .unwrap();
    assert_eq!(pending.chunks_received, 1);
    assert_eq!(pending.status.as_str(), "receiving");

    test_app
        .post_webhook(&data_event("daily", "terra-user-1", json!([daily_item("2025-03-01T00:00:00+00:00", 5000)])))
        .await;
    let pending = test_app
        .store
        .wearables
        .find_by_reference("runner@example.com")
        .await
        .unwrap()
        .unwrap()
        .pending_request
        .unwrap();
    assert_eq!(pending.chunks_received, 2);
    assert_eq!(pending.status.as_str(), "completed");
}

#[tokio::test]
async fn auth_failure_and_unknown_events_are_acknowledged() {
    let test_app = spawn_app().await;

    let response = test_app
        .post_webhook(&json!({
            "type": "auth",
            "status": "error",
            "reference_id": "runner@example.com",
            "message": "User denied access"
        }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = test_app.post_webhook(&json!({ "type": "healthcheck", "status": "success" })).await;
    assert_eq!(response.status().as_u16(), 200);

    assert!(test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn events_without_user_are_rejected() {
    let test_app = spawn_app().await;

    let response = test_app
        .post_webhook(&json!({ "type": "activity", "data": [activity_item("S1", 100)] }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = test_app
        .post_webhook(&json!({ "type": "large_request_sending", "number_of_payloads": 3 }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let test_app = spawn_app().await;

    let response = test_app
        .api_client
        .post(&format!("{}/api/wearable/webhook", test_app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid webhook payload");
}

#[tokio::test]
async fn failed_backfill_after_auth_returns_server_error() {
    let test_app = spawn_app().await;

    Mock::given(method("GET"))
        .and(path("/activity"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "status": "error",
            "message": "Internal error"
        })))
        .mount(&test_app.terra_server)
        .await;
    mount_history_requests_ok(&test_app).await;

    let response = test_app
        .post_webhook(&auth_success_event("runner@example.com", "terra-user-1"))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Webhook processing failed");
    // The link itself was stored before the backfill was requested
    assert!(test_app.store.wearables.find_by_reference("runner@example.com").await.unwrap().is_some());
}

fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn signed_webhooks_are_verified_when_secret_configured() {
    let test_app = spawn_app_with(|settings| {
        settings.terra.webhook_secret = Some(SecretString::new("whsec_test".to_string().into_boxed_str()));
    })
    .await;
    let url = format!("{}/api/wearable/webhook", test_app.address);
    let body = serde_json::to_vec(&json!({ "type": "healthcheck" })).unwrap();

    let unsigned = test_app
        .api_client
        .post(&url)
        .header("Content-Type", "application/json")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status().as_u16(), 401);

    let wrong = test_app
        .api_client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("terra-signature", sign("other-secret", "1723808700", &body))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);

    let signed = test_app
        .api_client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("terra-signature", sign("whsec_test", "1723808700", &body))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(signed.status().as_u16(), 200);
}
