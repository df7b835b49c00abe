use std::net::SocketAddr;
use std::sync::Arc;

use huddle_api::{build_router, state::AppState};
use huddle_config::Settings;
use huddle_services::clock::ManualClock;
use huddle_services::dao::MemoryMeetingStore;
use huddle_services::testing::{FakeCapture, FakeSignaling, FakeVod, Harness, test_settings};
use tokio::net::TcpListener;

/// A running test application over in-memory stores and fake media services.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
    pub state: AppState,
    pub meetings: Arc<MemoryMeetingStore>,
    pub capture: Arc<FakeCapture>,
    pub signaling: Arc<FakeSignaling>,
    pub vod: Arc<FakeVod>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    /// Spawn a new test server on an ephemeral port. Every instance has its
    /// own stores, so tests never see each other's meetings.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after defaults are applied.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let harness = Harness::new(&settings);
        let state = AppState::new(settings.clone(), harness.manager.clone());
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            settings,
            client,
            state,
            meetings: harness.meetings,
            capture: harness.capture,
            signaling: harness.signaling,
            vod: harness.vod,
            clock: harness.clock,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
