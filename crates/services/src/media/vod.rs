use async_trait::async_trait;
use huddle_config::VodSettings;
use serde::{Deserialize, Serialize};

use super::{ExternalError, http_client, join_url, send};

const SERVICE: &str = "vod";

/// Durable media record created once a recording is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VodRegistration {
    pub meeting_id: String,
    pub recording_id: Option<String>,
    pub storage_ref: String,
    pub size_bytes: Option<i64>,
    pub duration_sec: i64,
    pub url: String,
}

#[async_trait]
pub trait VodService: Send + Sync {
    async fn register_recording(&self, registration: &VodRegistration) -> Result<(), ExternalError>;

    async fn delete_recording(&self, meeting_id: &str, storage_ref: &str) -> Result<(), ExternalError>;
}

pub struct HttpVodClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVodClient {
    pub fn new(settings: &VodSettings) -> Result<Self, ExternalError> {
        Ok(Self {
            client: http_client(SERVICE, settings.timeout_secs)?,
            base_url: settings.base_url.clone(),
        })
    }
}

#[async_trait]
impl VodService for HttpVodClient {
    async fn register_recording(&self, registration: &VodRegistration) -> Result<(), ExternalError> {
        send(
            SERVICE,
            self.client
                .post(join_url(&self.base_url, "recordings"))
                .json(registration),
        )
        .await?;
        Ok(())
    }

    async fn delete_recording(&self, meeting_id: &str, storage_ref: &str) -> Result<(), ExternalError> {
        send(
            SERVICE,
            self.client
                .delete(join_url(&self.base_url, "recordings"))
                .query(&[("meeting_id", meeting_id), ("storage_ref", storage_ref)]),
        )
        .await?;
        Ok(())
    }
}
