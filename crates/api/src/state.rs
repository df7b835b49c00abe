use std::sync::Arc;

use huddle_config::{Settings, StoreBackend};
use huddle_db::{connect, indexes::ensure_indexes};
use huddle_services::{
    AuthService, MeetingLifecycleManager, SystemClock,
    dao::{MeetingDao, MeetingStore, MemoryMeetingStore, MemoryParticipantStore, ParticipantDao, ParticipantStore},
    media::{HttpCaptureClient, HttpSignalingClient, HttpVodClient},
    meeting::Collaborators,
};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub meetings: Arc<MeetingLifecycleManager>,
}

impl AppState {
    pub fn new(settings: Settings, meetings: Arc<MeetingLifecycleManager>) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        Self {
            settings,
            auth,
            meetings,
        }
    }

    /// Wires the configured store backend and the HTTP collaborators.
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let (meetings, participants): (Arc<dyn MeetingStore>, Arc<dyn ParticipantStore>) =
            match settings.database.backend {
                StoreBackend::Mongo => {
                    let db = connect(&settings).await?;
                    ensure_indexes(&db).await?;
                    (Arc::new(MeetingDao::new(&db)), Arc::new(ParticipantDao::new(&db)))
                }
                StoreBackend::Memory => {
                    info!("Using in-memory meeting store");
                    (
                        Arc::new(MemoryMeetingStore::new()),
                        Arc::new(MemoryParticipantStore::new()),
                    )
                }
            };

        let collaborators = Collaborators {
            capture: Arc::new(HttpCaptureClient::new(&settings.capture)?),
            signaling: Arc::new(HttpSignalingClient::new(&settings.signaling)?),
            vod: Arc::new(HttpVodClient::new(&settings.vod)?),
        };
        let manager = MeetingLifecycleManager::new(
            meetings,
            participants,
            collaborators,
            Arc::new(SystemClock),
            &settings,
        );

        Ok(Self::new(settings, Arc::new(manager)))
    }
}
