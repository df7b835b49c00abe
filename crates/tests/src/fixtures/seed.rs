use bson::oid::ObjectId;
use hmac::{Hmac, Mac};
use huddle_services::UserRole;
use huddle_services::media::SIGNATURE_HEADER;
use serde_json::Value;
use sha2::Sha256;

use super::test_app::TestApp;

pub struct SeededUser {
    pub id: String,
    pub access_token: String,
}

impl TestApp {
    /// Mints a token for a fresh user id, as the identity service would.
    pub fn seed_user(&self, role: UserRole) -> SeededUser {
        let id = ObjectId::new();
        let access_token = self
            .state
            .auth
            .issue_access_token(id, role)
            .expect("Failed to issue token");
        SeededUser {
            id: id.to_hex(),
            access_token,
        }
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Creates a meeting as `host` and returns its JSON.
    pub async fn create_meeting(&self, host: &SeededUser, body: Value) -> Value {
        let resp = self
            .auth_post("/api/meeting", &host.access_token)
            .json(&body)
            .send()
            .await
            .expect("Create meeting request failed");
        assert_eq!(
            resp.status().as_u16(),
            201,
            "Create meeting failed: {}",
            resp.text().await.unwrap_or_default()
        );
        resp.json().await.expect("Failed to parse meeting")
    }

    /// Creates and starts a meeting, returning the LIVE meeting JSON.
    pub async fn live_meeting(&self, host: &SeededUser, title: &str) -> Value {
        let meeting = self
            .create_meeting(host, serde_json::json!({ "title": title }))
            .await;
        let id = meeting["id"].as_str().unwrap();
        let resp = self
            .auth_post(&format!("/api/meeting/{id}/start"), &host.access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        resp.json().await.unwrap()
    }

    pub async fn join(&self, code: &str, user: Option<&SeededUser>, body: Value) -> reqwest::Response {
        let mut request = self.client.post(self.url(&format!("/api/join/{code}")));
        if let Some(user) = user {
            request = request.header("Authorization", format!("Bearer {}", user.access_token));
        }
        request.json(&body).send().await.expect("Join request failed")
    }

    /// Posts a capture event signed with the configured webhook secret.
    pub async fn send_capture_event(&self, event: &Value) -> reqwest::Response {
        let body = serde_json::to_vec(event).unwrap();
        let mut mac = Hmac::<Sha256>::new_from_slice(self.settings.capture.webhook_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(&body);
        let signature = hex::encode(mac.finalize().into_bytes());

        self.client
            .post(self.url("/api/hooks/capture"))
            .header(SIGNATURE_HEADER, signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Capture hook request failed")
    }
}
