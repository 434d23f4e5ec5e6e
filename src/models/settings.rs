use serde::{Deserialize, Serialize};

pub const CLIENT_ID_VAR: &str = "TWITCH_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "TWITCH_CLIENT_SECRET";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    /// Origins echoed back in `Access-Control-Allow-Origin`. Anything else gets `*`.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct UpstreamSettings {
    pub auth_url: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64, // Per request, covers connect and body
    pub token_safety_margin_secs: i64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            auth_url: "https://id.twitch.tv/oauth2/token".to_string(),
            api_base_url: "https://api.twitch.tv/helix".to_string(),
            request_timeout_secs: 10,
            token_safety_margin_secs: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
}

/// Client credentials for the app access token exchange.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Read both secrets from the environment. `None` when either is missing or blank.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let client_id = lookup(CLIENT_ID_VAR).filter(|v| !v.trim().is_empty())?;
        let client_secret = lookup(CLIENT_SECRET_VAR).filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
