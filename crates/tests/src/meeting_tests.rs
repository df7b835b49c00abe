use crate::fixtures::test_app::TestApp;
use huddle_db::models::Meeting;
use huddle_services::UserRole;
use huddle_services::dao::MeetingStore;
use serde_json::Value;

#[tokio::test]
async fn create_meeting_returns_invite_code() {
    let app = TestApp::spawn().await;
    let tutor = app.seed_user(UserRole::Tutor);

    let meeting = app
        .create_meeting(&tutor, serde_json::json!({ "title": "Algebra 101" }))
        .await;

    assert_eq!(meeting["title"], "Algebra 101");
    assert_eq!(meeting["status"], "created");
    assert_eq!(meeting["invite_code"].as_str().unwrap().len(), 8);
    assert_eq!(meeting["original_host_id"], tutor.id.as_str());
    assert_eq!(meeting["current_host_id"], tutor.id.as_str());
    assert_eq!(meeting["participant_count"], 0);
    assert!(meeting.get("passcode_hash").is_none());
}

#[tokio::test]
async fn create_requires_authentication() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/meeting"))
        .json(&serde_json::json!({ "title": "Anonymous" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .auth_post("/api/meeting", "not-a-token")
        .json(&serde_json::json!({ "title": "Forged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn create_with_past_schedule_is_rejected() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Member);

    let resp = app
        .auth_post("/api/meeting", &host.access_token)
        .json(&serde_json::json!({ "title": "Yesterday", "scheduled_for": "2001-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "validation");
}

#[tokio::test]
async fn lifecycle_over_http() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Standup").await;
    let id = meeting["id"].as_str().unwrap();
    assert_eq!(meeting["status"], "live");
    assert!(meeting["actual_start_at"].is_string());

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/start"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    app.clock.advance_secs(15 * 60);
    let resp = app
        .auth_post(&format!("/api/meeting/{id}/end"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let ended: Value = resp.json().await.unwrap();
    assert_eq!(ended["status"], "ended");
    assert_eq!(ended["duration_min"], 15);

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/end"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn non_host_cannot_control_meeting() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let stranger = app.seed_user(UserRole::Member);
    let meeting = app
        .create_meeting(&host, serde_json::json!({ "title": "Private club" }))
        .await;
    let id = meeting["id"].as_str().unwrap();

    for action in ["start", "lock", "invite-code", "cancel"] {
        let resp = app
            .auth_post(&format!("/api/meeting/{id}/{action}"), &stranger.access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 403, "{action} should be forbidden");
    }

    let admin = app.seed_user(UserRole::Admin);
    let resp = app
        .auth_post(&format!("/api/meeting/{id}/start"), &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn unknown_or_malformed_meeting_is_not_found() {
    let app = TestApp::spawn().await;
    let user = app.seed_user(UserRole::Member);

    for id in ["not-an-id", "64b000000000000000000000"] {
        let resp = app
            .auth_get(&format!("/api/meeting/{id}"), &user.access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }
}

#[tokio::test]
async fn update_and_list_meetings() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let other = app.seed_user(UserRole::Tutor);
    let meeting = app
        .create_meeting(&host, serde_json::json!({ "title": "Draft" }))
        .await;
    app.create_meeting(&other, serde_json::json!({ "title": "Someone else" }))
        .await;
    let id = meeting["id"].as_str().unwrap();

    let resp = app
        .auth_put(&format!("/api/meeting/{id}"), &host.access_token)
        .json(&serde_json::json!({
            "title": "Final",
            "scheduled_for": "2999-06-01T12:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["status"], "scheduled");
    assert_eq!(updated["scheduled_for"], "2999-06-01T12:00:00Z");

    let resp = app
        .auth_get(
            &format!("/api/meeting?host_id={}&per_page=10", host.id),
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id);

    let resp = app
        .auth_get("/api/meeting?status=scheduled", &host.access_token)
        .send()
        .await
        .unwrap();
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn delete_meeting() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let live = app.live_meeting(&host, "Busy").await;
    let live_id = live["id"].as_str().unwrap();

    let resp = app
        .auth_delete(&format!("/api/meeting/{live_id}"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let idle = app
        .create_meeting(&host, serde_json::json!({ "title": "Idle" }))
        .await;
    let idle_id = idle["id"].as_str().unwrap();
    let resp = app
        .auth_delete(&format!("/api/meeting/{idle_id}"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app
        .auth_get(&format!("/api/meeting/{idle_id}"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn transfer_host_hands_over_control() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let successor = app.seed_user(UserRole::Member);
    let meeting = app
        .create_meeting(&host, serde_json::json!({ "title": "Handover" }))
        .await;
    let id = meeting["id"].as_str().unwrap();

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/transfer-host"), &host.access_token)
        .json(&serde_json::json!({ "new_host_id": successor.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["current_host_id"], successor.id.as_str());
    assert_eq!(json["original_host_id"], host.id.as_str());

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/start"), &successor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn legacy_meeting_reports_its_creator_as_current_host() {
    let app = TestApp::spawn().await;
    let creator = app.seed_user(UserRole::Tutor);
    let now = bson::DateTime::now();
    let legacy: Meeting = bson::from_document(bson::doc! {
        "title": "Imported lecture",
        "status": "scheduled",
        "original_host_id": creator.id.as_str(),
        "invite_code": "LEGACY42",
        "max_participants": 30,
        "created_at": now,
        "updated_at": now,
    })
    .unwrap();
    let stored = app.meetings.insert(&legacy).await.unwrap();
    let id = stored.id.unwrap().to_hex();

    let resp = app
        .auth_get(&format!("/api/meeting/{id}"), &creator.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["original_host_id"], creator.id.as_str());
    assert_eq!(json["current_host_id"], creator.id.as_str());

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/start"), &creator.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn health_check_is_public() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}
