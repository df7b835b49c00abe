use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use huddle_services::UserRole;
use serde_json::Value;

async fn recording_action(app: &TestApp, id: &str, action: &str, token: &str) -> reqwest::Response {
    app.auth_post(&format!("/api/meeting/{id}/recording/{action}"), token)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn record_pause_resume_stop() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();

    let resp = recording_action(&app, id, "start", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "recording");
    assert_eq!(json["is_recording"], true);
    let started = app.capture.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, id);

    app.clock.advance_secs(20);
    let resp = recording_action(&app, id, "pause", &host.access_token).await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "paused");
    assert!(json["paused_at"].is_string());

    app.clock.advance_secs(300);
    let resp = recording_action(&app, id, "resume", &host.access_token).await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "recording");
    assert_eq!(json["duration_sec"], 20);

    app.clock.advance_secs(25);
    let resp = recording_action(&app, id, "stop", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["is_recording"], false);
    assert_eq!(json["duration_sec"], 45);

    let registrations = app.vod.wait_for_registrations(1, Duration::from_secs(2)).await;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].meeting_id, id);

    let resp = app
        .auth_get(&format!("/api/meeting/{id}/recording"), &host.access_token)
        .send()
        .await
        .unwrap();
    let info: Value = resp.json().await.unwrap();
    assert_eq!(info["status"], "stopped");
    assert!(info["url"].as_str().unwrap().starts_with("https://media.example.test/"));
}

#[tokio::test]
async fn invalid_recording_transitions_conflict() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();

    let resp = recording_action(&app, id, "pause", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 409);
    let resp = recording_action(&app, id, "resume", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 409);
    let resp = recording_action(&app, id, "stop", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn capture_outage_surfaces_as_bad_gateway() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();
    app.capture.fail_start(true);

    let resp = recording_action(&app, id, "start", &host.access_token).await;
    assert_eq!(resp.status().as_u16(), 502);

    let resp = app
        .auth_get(&format!("/api/meeting/{id}/recording"), &host.access_token)
        .send()
        .await
        .unwrap();
    let info: Value = resp.json().await.unwrap();
    assert_eq!(info["status"], "none");
    assert_eq!(info["is_recording"], false);
}

#[tokio::test]
async fn recording_info_is_host_only() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let member = app.seed_user(UserRole::Member);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();

    let resp = app
        .auth_get(&format!("/api/meeting/{id}/recording"), &member.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = recording_action(&app, id, "start", &member.access_token).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn ending_meeting_stops_recording() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();

    recording_action(&app, id, "start", &host.access_token).await;
    let resp = app
        .auth_post(&format!("/api/meeting/{id}/end"), &host.access_token)
        .send()
        .await
        .unwrap();
    let ended: Value = resp.json().await.unwrap();
    assert_eq!(ended["recording"]["status"], "stopped");
    assert_eq!(app.capture.stopped().len(), 1);
}

#[tokio::test]
async fn purge_requires_admin() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let admin = app.seed_user(UserRole::Admin);
    let meeting = app.live_meeting(&host, "Lecture").await;
    let id = meeting["id"].as_str().unwrap();

    recording_action(&app, id, "start", &host.access_token).await;
    recording_action(&app, id, "stop", &host.access_token).await;

    let resp = app
        .auth_delete(&format!("/api/meeting/{id}/recording"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(&format!("/api/meeting/{id}/recording"), &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "none");
    assert!(json["url"].is_null());
    assert_eq!(app.vod.deleted().len(), 1);
}
