use serde_json::{json, Value};
use wiremock::matchers::{header, method, path_regex, query_param};
use wiremock::{Mock, ResponseTemplate};

use super::utils::{TestApp, TEST_TERRA_DEV_ID, TEST_TERRA_KEY};

/// Accepts every historical-data request the server makes to the aggregator.
pub async fn mount_history_requests_ok(app: &TestApp) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/(activity|daily|sleep|body)$"))
        .and(query_param("to_webhook", "true"))
        .and(header("dev-id", TEST_TERRA_DEV_ID))
        .and(header("x-api-key", TEST_TERRA_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Request received, data will be sent to your webhook"
        })))
        .mount(&app.terra_server)
        .await;
}

pub fn auth_success_event(reference_id: &str, terra_user_id: &str) -> Value {
    json!({
        "type": "auth",
        "status": "success",
        "reference_id": reference_id,
        "user": {
            "user_id": terra_user_id,
            "provider": "GARMIN",
            "scopes": "activity,sleep,daily,body",
            "reference_id": reference_id
        }
    })
}

pub fn data_event(category: &str, terra_user_id: &str, data: Value) -> Value {
    json!({
        "type": category,
        "user": {
            "user_id": terra_user_id,
            "provider": "GARMIN",
            "scopes": "activity,sleep,daily,body"
        },
        "data": data
    })
}

pub fn activity_item(summary_id: &str, calories: i64) -> Value {
    json!({
        "metadata": {
            "summary_id": summary_id,
            "start_time": "2025-03-01T08:00:00.000000+00:00",
            "end_time": "2025-03-01T09:00:00.000000+00:00",
            "type": 1
        },
        "calories_data": { "total_burned_calories": calories }
    })
}

pub fn daily_item(start_time: &str, steps: i64) -> Value {
    json!({
        "metadata": {
            "start_time": start_time,
            "end_time": start_time,
            "upload_type": 1
        },
        "distance_data": { "steps": steps }
    })
}

/// Links `reference_id` through an auth-success webhook and asserts it was accepted.
pub async fn link_user(app: &TestApp, reference_id: &str, terra_user_id: &str) {
    mount_history_requests_ok(app).await;
    let response = app.post_webhook(&auth_success_event(reference_id, terra_user_id)).await;
    assert_eq!(response.status().as_u16(), 200, "auth webhook should succeed");
}
