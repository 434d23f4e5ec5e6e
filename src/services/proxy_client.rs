use crate::error::{DirectoryError, DirectoryResult};
use crate::models::stream::Page;
use crate::services::PageSource;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

/// Error body written by the proxy endpoint for failed fetches.
#[derive(Deserialize)]
struct ProxyErrorBody {
    error: String,
    message: Option<String>,
}

/// Reads pages through this crate's own `GET /api/streams` proxy endpoint,
/// the way the browser front-end does. Holds no credentials.
pub struct ProxyClient {
    http: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn streams_url(&self, game_id: &str, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/streams?game_id={}",
            self.base_url,
            urlencoding::encode(game_id)
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }
        url
    }
}

/// Keep the proxy's error kind when the body carries one, otherwise report
/// the raw status and body.
fn rejection(status: u16, body: String) -> DirectoryError {
    match serde_json::from_str::<ProxyErrorBody>(&body) {
        Ok(ProxyErrorBody {
            error,
            message: Some(message),
        }) => DirectoryError::Remote {
            status,
            kind: error,
            message,
        },
        _ => DirectoryError::UpstreamFetch { status, body },
    }
}

#[async_trait]
impl PageSource for ProxyClient {
    async fn fetch_page(&self, game_id: &str, cursor: Option<&str>) -> DirectoryResult<Page> {
        let url = self.streams_url(game_id, cursor);
        debug!("[ProxyClient] GET {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("[ProxyClient] Proxy answered {} for game {}", status, game_id);
            return Err(rejection(status.as_u16(), body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}
