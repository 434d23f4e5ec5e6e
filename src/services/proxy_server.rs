use crate::error::DirectoryError;
use crate::models::stream::Page;
use crate::services::PageSource;
use log::{error, info};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use warp::http::{Method, StatusCode};
use warp::{Filter, Reply};

/// Origins that get echoed back; every other origin is answered with `*`.
#[derive(Clone, Debug, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn allow_origin(&self, origin: Option<&str>) -> String {
        match origin {
            Some(origin) if self.allowed_origins.iter().any(|o| o == origin) => {
                origin.to_string()
            }
            _ => "*".to_string(),
        }
    }
}

pub struct ProxyState {
    pub source: Arc<dyn PageSource>,
    pub cors: CorsPolicy,
}

/// Outcome of one `/api/streams` request, before CORS headers are applied.
#[derive(Debug)]
pub enum ProxyResponse {
    Preflight,
    Page(Page),
    MissingGameId,
    MethodNotAllowed,
    Failed(DirectoryError),
}

impl ProxyResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyResponse::Preflight | ProxyResponse::Page(_) => StatusCode::OK,
            ProxyResponse::MissingGameId => StatusCode::BAD_REQUEST,
            ProxyResponse::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyResponse::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            ProxyResponse::Preflight => None,
            ProxyResponse::Page(page) => serde_json::to_value(page).ok(),
            ProxyResponse::MissingGameId => Some(json!({ "error": "game_id is required" })),
            ProxyResponse::MethodNotAllowed => Some(json!({ "error": "Method not allowed" })),
            ProxyResponse::Failed(e) => Some(json!({
                "error": e.kind(),
                "message": e.to_string(),
            })),
        }
    }

    pub fn into_reply(self, allow_origin: &str) -> warp::reply::Response {
        let mut response = match &self {
            ProxyResponse::Preflight => warp::reply().into_response(),
            // Serialised directly so field order matches the upstream payload
            ProxyResponse::Page(page) => warp::reply::json(page).into_response(),
            other => match other.body() {
                Some(body) => warp::reply::json(&body).into_response(),
                None => warp::reply().into_response(),
            },
        };
        *response.status_mut() = self.status();

        let headers = response.headers_mut();
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_str(allow_origin).unwrap_or(HeaderValue::from_static("*")),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        response
    }
}

/// Validate the request and forward it as a single page fetch.
pub async fn respond(
    method: &Method,
    query: &HashMap<String, String>,
    source: &dyn PageSource,
) -> ProxyResponse {
    if *method == Method::OPTIONS {
        return ProxyResponse::Preflight;
    }
    if *method != Method::GET {
        return ProxyResponse::MethodNotAllowed;
    }

    let game_id = match query.get("game_id").map(|s| s.trim()) {
        Some(id) if !id.is_empty() => id,
        _ => return ProxyResponse::MissingGameId,
    };
    let cursor = query
        .get("cursor")
        .map(String::as_str)
        .filter(|c| !c.is_empty());

    match source.fetch_page(game_id, cursor).await {
        Ok(page) => ProxyResponse::Page(page),
        Err(e) => {
            error!("[Proxy] Streams for game {} failed: {}", game_id, e);
            ProxyResponse::Failed(e)
        }
    }
}

async fn handle_streams(
    method: Method,
    query: HashMap<String, String>,
    origin: Option<String>,
    state: Arc<ProxyState>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let response = respond(&method, &query, state.source.as_ref()).await;
    info!(
        "[Proxy] {} /api/streams game_id={} -> {}",
        method,
        query.get("game_id").map(String::as_str).unwrap_or("-"),
        response.status().as_u16()
    );
    let allow_origin = state.cors.allow_origin(origin.as_deref());
    Ok(response.into_reply(&allow_origin))
}

pub fn routes(state: Arc<ProxyState>) -> BoxedFilter<(warp::reply::Response,)> {
    warp::path!("api" / "streams")
        .and(warp::method())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::optional::<String>("origin"))
        .and(warp::any().map(move || state.clone()))
        .and_then(handle_streams)
        .boxed()
}

pub async fn serve(state: Arc<ProxyState>, addr: SocketAddr) {
    info!("[Proxy] Listening on http://{}", addr);
    warp::serve(routes(state)).run(addr).await;
}
