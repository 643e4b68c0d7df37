use std::time::Duration;

use serde::Deserialize;

/// Pipeline tuning shared by every orchestrator an [`InstanceCache`] builds.
///
/// [`InstanceCache`]: crate::InstanceCache
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Faces considered when authenticating a user in an image (default: 4).
    pub authentication_candidates: usize,
    /// Faces detected when identifying users in an image (default: 1).
    pub identification_faces: usize,
    /// Timeout in seconds for remote image fetches.
    pub http_timeout_secs: u64,
    /// User-Agent header sent with remote image fetches.
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authentication_candidates: 4,
            identification_faces: 1,
            http_timeout_secs: 30,
            user_agent: format!("facechain/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Load settings from `FACECHAIN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            authentication_candidates: env_usize(
                "FACECHAIN_AUTHENTICATION_CANDIDATES",
                defaults.authentication_candidates,
            ),
            identification_faces: env_usize(
                "FACECHAIN_IDENTIFICATION_FACES",
                defaults.identification_faces,
            ),
            http_timeout_secs: env_u64("FACECHAIN_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            user_agent: std::env::var("FACECHAIN_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Parse settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
