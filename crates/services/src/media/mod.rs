pub mod capture;
pub mod signaling;
pub mod vod;

use std::time::Duration;

use thiserror::Error;

pub use capture::{
    CaptureEvent, CaptureEventStatus, CaptureFile, CaptureService, HttpCaptureClient,
    SIGNATURE_HEADER, verify_capture_signature,
};
pub use signaling::{HttpSignalingClient, SignalingService};
pub use vod::{HttpVodClient, VodRegistration, VodService};

/// Failure talking to one of the media collaborators.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },
}

pub(crate) fn http_client(service: &'static str, timeout_secs: u64) -> Result<reqwest::Client, ExternalError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|source| ExternalError::Http { service, source })
}

/// Sends the request and turns non-2xx replies into [`ExternalError::Status`].
pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ExternalError> {
    let resp = request
        .send()
        .await
        .map_err(|source| ExternalError::Http { service, source })?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ExternalError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
