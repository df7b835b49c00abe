use async_trait::async_trait;
use huddle_config::SignalingSettings;
use serde::Serialize;
use tracing::debug;

use super::{ExternalError, http_client, join_url, send};

const SERVICE: &str = "signaling";

/// Room lifecycle on the real-time media server.
#[async_trait]
pub trait SignalingService: Send + Sync {
    async fn create_room(&self, room_id: &str, max_participants: u32) -> Result<(), ExternalError>;

    async fn delete_room(&self, room_id: &str) -> Result<(), ExternalError>;

    async fn remove_participant(&self, room_id: &str, identity: &str) -> Result<(), ExternalError>;
}

#[derive(Debug, Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
    max_participants: u32,
}

pub struct HttpSignalingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSignalingClient {
    pub fn new(settings: &SignalingSettings) -> Result<Self, ExternalError> {
        Ok(Self {
            client: http_client(SERVICE, settings.timeout_secs)?,
            base_url: settings.base_url.clone(),
        })
    }
}

#[async_trait]
impl SignalingService for HttpSignalingClient {
    async fn create_room(&self, room_id: &str, max_participants: u32) -> Result<(), ExternalError> {
        let body = CreateRoomRequest {
            name: room_id,
            max_participants,
        };
        send(
            SERVICE,
            self.client.post(join_url(&self.base_url, "rooms")).json(&body),
        )
        .await?;
        debug!(room_id, "Signaling room created");
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), ExternalError> {
        let url = join_url(&self.base_url, &format!("rooms/{room_id}"));
        send(SERVICE, self.client.delete(url)).await?;
        debug!(room_id, "Signaling room deleted");
        Ok(())
    }

    async fn remove_participant(&self, room_id: &str, identity: &str) -> Result<(), ExternalError> {
        let url = join_url(
            &self.base_url,
            &format!("rooms/{room_id}/participants/{identity}"),
        );
        send(SERVICE, self.client.delete(url)).await?;
        Ok(())
    }
}
