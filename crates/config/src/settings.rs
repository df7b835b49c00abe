use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub meeting: MeetingSettings,
    pub capture: CaptureSettings,
    pub signaling: SignalingSettings,
    pub vod: VodSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Which store implementation backs meetings and participants.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MeetingSettings {
    pub default_max_participants: u32,
    pub max_participants_cap: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub webhook_secret: String,
    /// Storage prefix handed to the capture service as the output target.
    pub output_prefix: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalingSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VodSettings {
    pub base_url: String,
    /// Public origin that finished recordings are served from.
    pub public_url: String,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("HUDDLE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.backend", "mongo")?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "huddle")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.issuer", "huddle")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("meeting.default_max_participants", 100)?
            .set_default("meeting.max_participants_cap", 1000)?
            .set_default("capture.base_url", "http://localhost:7880")?
            .set_default("capture.api_key", None::<String>)?
            .set_default("capture.webhook_secret", "change-me-in-production")?
            .set_default("capture.output_prefix", "recordings")?
            .set_default("capture.timeout_secs", 10)?
            .set_default("signaling.base_url", "http://localhost:7880")?
            .set_default("signaling.timeout_secs", 5)?
            .set_default("vod.base_url", "http://localhost:8090")?
            .set_default("vod.public_url", "http://localhost:9000/huddle")?
            .set_default("vod.timeout_secs", 10)?
            .build()?;

        config.try_deserialize()
    }
}
