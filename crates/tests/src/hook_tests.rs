use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use huddle_services::UserRole;
use huddle_services::media::SIGNATURE_HEADER;
use serde_json::Value;

/// Starts a recording and returns `(meeting_id, capture_id)`.
async fn recording_meeting(app: &TestApp) -> (String, String) {
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Recorded").await;
    let id = meeting["id"].as_str().unwrap().to_string();
    let resp = app
        .auth_post(&format!("/api/meeting/{id}/recording/start"), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let capture_id = format!("cap-{}", app.capture.started().len());
    (id, capture_id)
}

#[tokio::test]
async fn unsigned_or_badly_signed_events_are_rejected() {
    let app = TestApp::spawn().await;
    let body = serde_json::json!({ "capture_id": "cap-1", "status": "completed" });

    let resp = app
        .client
        .post(app.url("/api/hooks/capture"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(app.url("/api/hooks/capture"))
        .header(SIGNATURE_HEADER, "deadbeef")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn completed_event_finalizes_recording_once() {
    let app = TestApp::spawn().await;
    let (id, capture_id) = recording_meeting(&app).await;
    let event = serde_json::json!({
        "capture_id": capture_id,
        "status": "completed",
        "ended_at": "2030-01-01T10:00:00Z",
        "file": {
            "location": "recordings/lecture.mp4",
            "size_bytes": 2048,
            "duration_sec": 61,
        },
    });

    let resp = app.send_capture_event(&event).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["disposition"], "applied");

    let replay = app.send_capture_event(&event).await;
    assert_eq!(replay.status().as_u16(), 200);
    let json: Value = replay.json().await.unwrap();
    assert_eq!(json["disposition"], "ignored");

    let meeting = app.state.meetings.get(&id).await.unwrap();
    assert_eq!(meeting.recording.duration_sec, 61);
    assert_eq!(meeting.recording.size_bytes, Some(2048));
    assert_eq!(
        meeting.recording.url.as_deref(),
        Some("https://media.example.test/recordings/lecture.mp4")
    );

    let registrations = app.vod.wait_for_registrations(1, Duration::from_secs(2)).await;
    assert_eq!(registrations.len(), 1);
}

#[tokio::test]
async fn failed_event_marks_recording_failed() {
    let app = TestApp::spawn().await;
    let (id, capture_id) = recording_meeting(&app).await;

    let resp = app
        .send_capture_event(&serde_json::json!({
            "capture_id": capture_id,
            "status": "failed",
            "error": "encoder crashed",
        }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let meeting = app.state.meetings.get(&id).await.unwrap();
    assert_eq!(meeting.recording.failure_reason.as_deref(), Some("encoder crashed"));
    assert!(!meeting.recording.is_recording);
}

#[tokio::test]
async fn unknown_capture_and_status_are_ignored() {
    let app = TestApp::spawn().await;

    let resp = app
        .send_capture_event(&serde_json::json!({ "capture_id": "ghost", "status": "completed" }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["disposition"], "ignored");

    let resp = app
        .send_capture_event(&serde_json::json!({ "capture_id": "ghost", "status": "uploading" }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let app = TestApp::spawn().await;
    let resp = app.send_capture_event(&serde_json::json!({ "nope": true })).await;
    assert_eq!(resp.status().as_u16(), 400);
}
