use crate::fixtures::test_app::TestApp;
use huddle_services::UserRole;
use serde_json::Value;

#[tokio::test]
async fn students_join_live_meeting_and_are_released_on_end() {
    let app = TestApp::spawn().await;
    let tutor = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&tutor, "Algebra 101").await;
    let id = meeting["id"].as_str().unwrap();
    let code = meeting["invite_code"].as_str().unwrap();

    for name in ["Ada", "Grace"] {
        let student = app.seed_user(UserRole::Member);
        let resp = app
            .join(code, Some(&student), serde_json::json!({ "display_name": name }))
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["participant"]["status"], "admitted");
        assert_eq!(json["participant"]["display_name"], name);
        assert_eq!(json["participant"]["sessions"].as_array().unwrap().len(), 1);
    }

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/end"), &tutor.access_token)
        .send()
        .await
        .unwrap();
    let ended: Value = resp.json().await.unwrap();
    assert_eq!(ended["participant_count"], 0);

    let resp = app
        .auth_get(&format!("/api/meeting/{id}/participant"), &tutor.access_token)
        .send()
        .await
        .unwrap();
    let participants: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(participants.len(), 2);
    for p in participants {
        assert_eq!(p["status"], "left");
        assert!(p["sessions"][0]["left_at"].is_string());
    }
}

#[tokio::test]
async fn guest_joins_with_lowercase_code() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Open house").await;
    let code = meeting["invite_code"].as_str().unwrap().to_lowercase();

    let resp = app.join(&code, None, serde_json::json!({})).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participant"]["display_name"], "Guest");
    assert!(json["participant"]["user_id"].is_null());
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let app = TestApp::spawn().await;
    let resp = app.join("ZZZZZZZZ", None, serde_json::json!({})).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn locked_room_and_passcode_are_enforced() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app
        .create_meeting(
            &host,
            serde_json::json!({ "title": "Board", "passcode": "s3cret" }),
        )
        .await;
    assert_eq!(meeting["is_private"], true);
    let id = meeting["id"].as_str().unwrap();
    let code = meeting["invite_code"].as_str().unwrap();
    let member = app.seed_user(UserRole::Member);

    let resp = app
        .join(code, Some(&member), serde_json::json!({ "passcode": "wrong" }))
        .await;
    assert_eq!(resp.status().as_u16(), 403);

    app.auth_post(&format!("/api/meeting/{id}/lock"), &host.access_token)
        .send()
        .await
        .unwrap();
    let resp = app
        .join(code, Some(&host), serde_json::json!({ "passcode": "s3cret" }))
        .await;
    assert_eq!(resp.status().as_u16(), 403);

    app.auth_post(&format!("/api/meeting/{id}/unlock"), &host.access_token)
        .send()
        .await
        .unwrap();
    let resp = app
        .join(code, Some(&member), serde_json::json!({ "passcode": "s3cret" }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participant"]["status"], "waiting");
}

#[tokio::test]
async fn rotated_code_invalidates_the_old_one() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app
        .create_meeting(&host, serde_json::json!({ "title": "Rotating" }))
        .await;
    let id = meeting["id"].as_str().unwrap();
    let old_code = meeting["invite_code"].as_str().unwrap();

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/invite-code"), &host.access_token)
        .send()
        .await
        .unwrap();
    let rotated: Value = resp.json().await.unwrap();
    let new_code = rotated["invite_code"].as_str().unwrap();
    assert_ne!(new_code, old_code);

    assert_eq!(app.join(old_code, None, serde_json::json!({})).await.status().as_u16(), 404);
    assert_eq!(app.join(new_code, None, serde_json::json!({})).await.status().as_u16(), 200);
}

#[tokio::test]
async fn host_admits_and_bans_participants() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app
        .create_meeting(&host, serde_json::json!({ "title": "Moderated" }))
        .await;
    let id = meeting["id"].as_str().unwrap();
    let code = meeting["invite_code"].as_str().unwrap();
    let member = app.seed_user(UserRole::Member);

    let resp = app.join(code, Some(&member), serde_json::json!({})).await;
    let joined: Value = resp.json().await.unwrap();
    let pid = joined["participant"]["id"].as_str().unwrap();

    let resp = app
        .auth_post(
            &format!("/api/meeting/{id}/participant/{pid}/admit"),
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let admitted: Value = resp.json().await.unwrap();
    assert_eq!(admitted["status"], "approved");

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/start"), &host.access_token)
        .send()
        .await
        .unwrap();
    let live: Value = resp.json().await.unwrap();
    assert_eq!(live["participant_count"], 1);

    let resp = app
        .auth_post(
            &format!("/api/meeting/{id}/participant/{pid}/remove"),
            &host.access_token,
        )
        .json(&serde_json::json!({ "ban": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let removed: Value = resp.json().await.unwrap();
    assert_eq!(removed["status"], "left");
    assert_eq!(app.signaling.removed(), vec![(id.to_string(), member.id.clone())]);

    let resp = app.join(code, Some(&member), serde_json::json!({})).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn leave_frees_the_seat() {
    let app = TestApp::spawn().await;
    let host = app.seed_user(UserRole::Tutor);
    let meeting = app.live_meeting(&host, "Drop-in").await;
    let id = meeting["id"].as_str().unwrap();
    let code = meeting["invite_code"].as_str().unwrap();
    let member = app.seed_user(UserRole::Member);

    app.join(code, Some(&member), serde_json::json!({})).await;
    app.clock.advance_secs(90);

    let resp = app
        .auth_post(&format!("/api/meeting/{id}/leave"), &member.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let left: Value = resp.json().await.unwrap();
    assert_eq!(left["status"], "left");
    assert_eq!(left["total_duration_sec"], 90);

    let resp = app
        .auth_get(&format!("/api/meeting/{id}"), &host.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participant_count"], 0);
}
