use crate::commands::build_http_client;
use crate::models::settings::{Credentials, Settings, CLIENT_ID_VAR, CLIENT_SECRET_VAR};
use crate::services::helix_service::HelixFetcher;
use crate::services::proxy_server::{self, CorsPolicy, ProxyState};
use crate::services::token_service::{HelixCredentialExchange, TokenManager};
use anyhow::{Context, Result};
use log::warn;
use std::net::SocketAddr;
use std::sync::Arc;

/// Wire the token manager and Helix fetcher behind the proxy endpoint and run it.
pub async fn run_serve(settings: Settings, bind_override: Option<String>) -> Result<()> {
    let bind = bind_override.unwrap_or_else(|| settings.server.bind_address.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", bind))?;

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        warn!(
            "[Serve] {} / {} not set; every request will fail until they are",
            CLIENT_ID_VAR, CLIENT_SECRET_VAR
        );
    }

    let http = build_http_client(&settings.upstream)?;
    let exchange = Arc::new(HelixCredentialExchange::new(
        http.clone(),
        settings.upstream.auth_url.clone(),
    ));
    let tokens = Arc::new(TokenManager::new(
        credentials,
        exchange,
        settings.upstream.token_safety_margin_secs,
    ));
    let fetcher = Arc::new(HelixFetcher::new(
        http,
        tokens,
        settings.upstream.api_base_url.clone(),
    ));

    let state = Arc::new(ProxyState {
        source: fetcher,
        cors: CorsPolicy::new(settings.server.allowed_origins.clone()),
    });

    proxy_server::serve(state, addr).await;
    Ok(())
}
