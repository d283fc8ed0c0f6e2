use serde::Deserialize;
use std::{env, fs, path::Path};

pub const DEFAULT_LISTEN_PORT: u16 = 5150;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub dev_cors_origin: Option<String>,
    /// Hard expiry of an issued token.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// A session unused for this long is rejected even if its token is valid.
    #[serde(default = "default_session_idle_days")]
    pub session_idle_days: i64,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub push: Option<PushConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,
    pub vapid_public: Option<String>,
    pub vapid_private: Option<String>,
    /// `mailto:` or `https:` contact placed in the VAPID `sub` claim.
    pub contact_email: Option<String>,
    /// Deep link used when a notification does not carry its own.
    #[serde(default = "default_push_url")]
    pub default_url: String,
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_session_idle_days() -> i64 {
    14
}

fn default_channel_capacity() -> usize {
    256
}

fn default_keepalive_secs() -> u64 {
    25
}

fn default_push_url() -> String {
    "/".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The VAPID public key, when push is enabled and fully configured.
    pub fn vapid_public_key(&self) -> Option<&str> {
        let push = self.push.as_ref().filter(|p| p.enabled)?;
        push.vapid_public
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
