pub mod list;
pub mod serve;

use crate::models::settings::UpstreamSettings;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client; the timeout bounds every upstream and proxy request.
pub fn build_http_client(upstream: &UpstreamSettings) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(upstream.request_timeout_secs))
        .user_agent(concat!("streamscout/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
