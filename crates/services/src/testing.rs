//! In-process collaborators and a wired-up manager for unit and end-to-end
//! tests. Nothing here talks to the network or to MongoDB.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bson::DateTime;
use huddle_config::{
    AppSettings, CaptureSettings, DatabaseSettings, JwtSettings, MeetingSettings, Settings,
    SignalingSettings, StoreBackend, VodSettings,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::clock::ManualClock;
use crate::dao::{MemoryMeetingStore, MemoryParticipantStore};
use crate::media::{CaptureService, ExternalError, SignalingService, VodRegistration, VodService};
use crate::meeting::invite::InviteCodeGenerator;
use crate::meeting::{Collaborators, MeetingLifecycleManager};

fn injected(service: &'static str) -> ExternalError {
    ExternalError::Rejected {
        service,
        reason: "injected failure".into(),
    }
}

#[derive(Default)]
pub struct FakeCapture {
    next_id: AtomicU64,
    started: Mutex<Vec<(String, String)>>,
    stopped: Mutex<Vec<String>>,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
}

impl FakeCapture {
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    /// `(room_id, output_target)` of every successful start.
    pub fn started(&self) -> Vec<(String, String)> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }
}

#[async_trait]
impl CaptureService for FakeCapture {
    async fn start_capture(&self, room_id: &str, output_target: &str) -> Result<String, ExternalError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(injected("capture"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.started
            .lock()
            .push((room_id.to_string(), output_target.to_string()));
        Ok(format!("cap-{n}"))
    }

    async fn stop_capture(&self, capture_id: &str) -> Result<(), ExternalError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(injected("capture"));
        }
        self.stopped.lock().push(capture_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSignaling {
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    removed: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeSignaling {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn removed(&self) -> Vec<(String, String)> {
        self.removed.lock().clone()
    }

    fn check(&self) -> Result<(), ExternalError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(injected("signaling"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignalingService for FakeSignaling {
    async fn create_room(&self, room_id: &str, _max_participants: u32) -> Result<(), ExternalError> {
        self.check()?;
        self.created.lock().push(room_id.to_string());
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), ExternalError> {
        self.check()?;
        self.deleted.lock().push(room_id.to_string());
        Ok(())
    }

    async fn remove_participant(&self, room_id: &str, identity: &str) -> Result<(), ExternalError> {
        self.check()?;
        self.removed
            .lock()
            .push((room_id.to_string(), identity.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVod {
    registrations: Mutex<Vec<VodRegistration>>,
    deleted: Mutex<Vec<(String, String)>>,
    registered: Notify,
    fail: AtomicBool,
}

impl FakeVod {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn registrations(&self) -> Vec<VodRegistration> {
        self.registrations.lock().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().clone()
    }

    /// Registration happens in a spawned task; waits until `count` arrived
    /// or `timeout` elapsed and returns whatever is there.
    pub async fn wait_for_registrations(&self, count: usize, timeout: Duration) -> Vec<VodRegistration> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.registrations();
            if current.len() >= count {
                return current;
            }
            if tokio::time::timeout_at(deadline, self.registered.notified())
                .await
                .is_err()
            {
                return self.registrations();
            }
        }
    }
}

#[async_trait]
impl VodService for FakeVod {
    async fn register_recording(&self, registration: &VodRegistration) -> Result<(), ExternalError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(injected("vod"));
        }
        self.registrations.lock().push(registration.clone());
        self.registered.notify_one();
        Ok(())
    }

    async fn delete_recording(&self, meeting_id: &str, storage_ref: &str) -> Result<(), ExternalError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(injected("vod"));
        }
        self.deleted
            .lock()
            .push((meeting_id.to_string(), storage_ref.to_string()));
        Ok(())
    }
}

/// Settings for an in-memory deployment on an ephemeral port.
pub fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
        },
        database: DatabaseSettings {
            backend: StoreBackend::Memory,
            url: "mongodb://localhost:27017".into(),
            name: "huddle_test".into(),
            max_pool_size: None,
            min_pool_size: None,
        },
        jwt: JwtSettings {
            secret: "test-secret-key-for-testing-only".into(),
            issuer: "huddle-test".into(),
            access_token_ttl_secs: 3600,
        },
        meeting: MeetingSettings {
            default_max_participants: 100,
            max_participants_cap: 500,
        },
        capture: CaptureSettings {
            base_url: "http://capture.invalid".into(),
            api_key: None,
            webhook_secret: "capture-webhook-secret".into(),
            output_prefix: "recordings".into(),
            timeout_secs: 1,
        },
        signaling: SignalingSettings {
            base_url: "http://signaling.invalid".into(),
            timeout_secs: 1,
        },
        vod: VodSettings {
            base_url: "http://vod.invalid".into(),
            public_url: "https://media.example.test".into(),
            timeout_secs: 1,
        },
    }
}

/// A manager over in-memory stores, fake collaborators and a manual clock.
pub struct Harness {
    pub manager: Arc<MeetingLifecycleManager>,
    pub meetings: Arc<MemoryMeetingStore>,
    pub participants: Arc<MemoryParticipantStore>,
    pub capture: Arc<FakeCapture>,
    pub signaling: Arc<FakeSignaling>,
    pub vod: Arc<FakeVod>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(settings: &Settings) -> Self {
        Self::build(settings, None)
    }

    pub fn with_invite_codes(settings: &Settings, generator: InviteCodeGenerator) -> Self {
        Self::build(settings, Some(generator))
    }

    fn build(settings: &Settings, generator: Option<InviteCodeGenerator>) -> Self {
        let meetings = Arc::new(MemoryMeetingStore::new());
        let participants = Arc::new(MemoryParticipantStore::new());
        let capture = Arc::new(FakeCapture::default());
        let signaling = Arc::new(FakeSignaling::default());
        let vod = Arc::new(FakeVod::default());
        let clock = Arc::new(ManualClock::new(DateTime::now()));

        let mut manager = MeetingLifecycleManager::new(
            meetings.clone(),
            participants.clone(),
            Collaborators {
                capture: capture.clone(),
                signaling: signaling.clone(),
                vod: vod.clone(),
            },
            clock.clone(),
            settings,
        );
        if let Some(generator) = generator {
            manager = manager.with_invite_code_generator(generator);
        }

        Self {
            manager: Arc::new(manager),
            meetings,
            participants,
            capture,
            signaling,
            vod,
            clock,
        }
    }
}
