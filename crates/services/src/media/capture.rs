use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use huddle_config::CaptureSettings;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use super::{ExternalError, http_client, join_url, send};

const SERVICE: &str = "capture";

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "x-capture-signature";

/// The external recorder. It captures a signaling room into `output_target`.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Returns the capture id assigned by the recorder.
    async fn start_capture(&self, room_id: &str, output_target: &str) -> Result<String, ExternalError>;

    async fn stop_capture(&self, capture_id: &str) -> Result<(), ExternalError>;
}

#[derive(Debug, Serialize)]
struct StartCaptureRequest<'a> {
    room_id: &'a str,
    output_target: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartCaptureResponse {
    capture_id: String,
}

pub struct HttpCaptureClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCaptureClient {
    pub fn new(settings: &CaptureSettings) -> Result<Self, ExternalError> {
        Ok(Self {
            client: http_client(SERVICE, settings.timeout_secs)?,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl CaptureService for HttpCaptureClient {
    async fn start_capture(&self, room_id: &str, output_target: &str) -> Result<String, ExternalError> {
        let body = StartCaptureRequest {
            room_id,
            output_target,
        };
        let request = self.client.post(join_url(&self.base_url, "captures")).json(&body);
        let resp = send(SERVICE, self.authorized(request)).await?;
        let parsed: StartCaptureResponse = resp
            .json()
            .await
            .map_err(|source| ExternalError::Http { service: SERVICE, source })?;
        if parsed.capture_id.is_empty() {
            return Err(ExternalError::Rejected {
                service: SERVICE,
                reason: "empty capture id".into(),
            });
        }
        debug!(room_id, capture_id = %parsed.capture_id, "Capture started");
        Ok(parsed.capture_id)
    }

    async fn stop_capture(&self, capture_id: &str) -> Result<(), ExternalError> {
        let url = join_url(&self.base_url, &format!("captures/{capture_id}/stop"));
        send(SERVICE, self.authorized(self.client.post(url))).await?;
        debug!(capture_id, "Capture stopped");
        Ok(())
    }
}

/// Asynchronous notification posted by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub capture_id: String,
    pub status: CaptureEventStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file: Option<CaptureFile>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEventStatus {
    Started,
    Active,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureFile {
    /// Storage location the recorder wrote to.
    pub location: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration_sec: Option<i64>,
}

/// Checks `signature_hex` against the HMAC-SHA256 of `payload`.
pub fn verify_capture_signature(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
