use crate::error::{DirectoryError, DirectoryResult};
use crate::models::stream::Page;
use crate::services::token_service::TokenManager;
use crate::services::{PageSource, PAGE_SIZE};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::sync::Arc;

/// Fetches one page of `GET /helix/streams` for a category using the app token.
pub struct HelixFetcher {
    http: Client,
    tokens: Arc<TokenManager>,
    api_base_url: String,
}

impl HelixFetcher {
    pub fn new(http: Client, tokens: Arc<TokenManager>, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn streams_url(&self, game_id: &str, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/streams?game_id={}&first={}",
            self.api_base_url,
            urlencoding::encode(game_id),
            PAGE_SIZE
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&after={}", urlencoding::encode(cursor)));
        }
        url
    }
}

#[async_trait]
impl PageSource for HelixFetcher {
    async fn fetch_page(&self, game_id: &str, cursor: Option<&str>) -> DirectoryResult<Page> {
        let client_id = self.tokens.client_id()?;
        let token = self.tokens.get_token().await?;
        let url = self.streams_url(game_id, cursor);

        debug!(
            "[Helix] Fetching streams for game {} (cursor: {})",
            game_id,
            cursor.unwrap_or("none")
        );

        let response = self
            .http
            .get(&url)
            .header("Client-Id", client_id)
            .header(AUTHORIZATION, format!("Bearer {}", token.access_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Revoked or expired early; the next call exchanges again
                self.tokens.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            warn!("[Helix] Stream query for game {} failed: {}", game_id, status);
            return Err(DirectoryError::UpstreamFetch {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let page: Page = serde_json::from_str(&body)?;
        debug!(
            "[Helix] Game {} returned {} streams, more: {}",
            game_id,
            page.data.len(),
            page.next_cursor().is_some()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{spawn_stub, test_credentials, CountingExchange};
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Duration;
    use warp::filters::BoxedFilter;
    use warp::http::StatusCode;
    use warp::reply::Response;
    use warp::{Filter, Reply};

    fn fetcher(with_credentials: bool) -> (HelixFetcher, Arc<CountingExchange>) {
        let exchange = Arc::new(CountingExchange::new(3600));
        let credentials = with_credentials.then(test_credentials);
        let tokens = Arc::new(TokenManager::new(credentials, exchange.clone(), 60));
        (
            HelixFetcher::new(Client::new(), tokens, "https://api.twitch.tv/helix/"),
            exchange,
        )
    }

    #[test]
    fn test_first_page_url_has_no_cursor() {
        let (fetcher, _) = fetcher(true);
        assert_eq!(
            fetcher.streams_url("516575", None),
            "https://api.twitch.tv/helix/streams?game_id=516575&first=100"
        );
    }

    #[test]
    fn test_cursor_is_appended_and_encoded() {
        let (fetcher, _) = fetcher(true);
        assert_eq!(
            fetcher.streams_url("516575", Some("eyJi==")),
            "https://api.twitch.tv/helix/streams?game_id=516575&first=100&after=eyJi%3D%3D"
        );
    }

    type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

    /// Stub `GET /helix/streams` recording auth header, client id and query.
    fn helix_stub(status: StatusCode, body: &'static str, seen: Seen) -> BoxedFilter<(Response,)> {
        warp::path!("helix" / "streams")
            .and(warp::header::<String>("authorization"))
            .and(warp::header::<String>("client-id"))
            .and(warp::query::raw())
            .map(move |auth: String, client_id: String, query: String| {
                seen.lock().unwrap().push((auth, client_id, query));
                warp::reply::with_status(body, status).into_response()
            })
            .boxed()
    }

    fn fetcher_at(addr: SocketAddr, timeout: Duration) -> (HelixFetcher, Arc<CountingExchange>) {
        let exchange = Arc::new(CountingExchange::new(3600));
        let tokens = Arc::new(TokenManager::new(
            Some(test_credentials()),
            exchange.clone(),
            60,
        ));
        let http = Client::builder().timeout(timeout).build().unwrap();
        (
            HelixFetcher::new(http, tokens, format!("http://{}/helix", addr)),
            exchange,
        )
    }

    #[tokio::test]
    async fn test_page_parsed_with_auth_headers_and_cursor() {
        let seen = Seen::default();
        let body = r#"{"data": [{"id": "1", "user_name": "Afro", "title": "t", "viewer_count": 9}],
                       "pagination": {"cursor": "c2"}}"#;
        let addr = spawn_stub(helix_stub(StatusCode::OK, body, seen.clone())).await;
        let (fetcher, _) = fetcher_at(addr, Duration::from_secs(5));

        let page = fetcher.fetch_page("516575", Some("c1")).await.unwrap();

        assert_eq!(page.data[0].id, "1");
        assert_eq!(page.next_cursor(), Some("c2"));
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                "Bearer token-1".to_string(),
                "test-client".to_string(),
                "game_id=516575&first=100&after=c1".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_unauthorized_evicts_cached_token() {
        let seen = Seen::default();
        let addr = spawn_stub(helix_stub(StatusCode::UNAUTHORIZED, "bad token", seen.clone())).await;
        let (fetcher, exchange) = fetcher_at(addr, Duration::from_secs(5));

        for _ in 0..2 {
            match fetcher.fetch_page("516575", None).await {
                Err(DirectoryError::UpstreamFetch { status, body }) => {
                    assert_eq!(status, 401);
                    assert_eq!(body, "bad token");
                }
                other => panic!("expected UpstreamFetch, got {:?}", other),
            }
        }

        let auth: Vec<String> = seen.lock().unwrap().iter().map(|s| s.0.clone()).collect();
        assert_eq!(auth, vec!["Bearer token-1", "Bearer token-2"]);
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_error_keeps_cached_token() {
        let seen = Seen::default();
        let addr = spawn_stub(helix_stub(StatusCode::SERVICE_UNAVAILABLE, "busy", seen.clone())).await;
        let (fetcher, exchange) = fetcher_at(addr, Duration::from_secs(5));

        for _ in 0..2 {
            let err = fetcher.fetch_page("516575", None).await.unwrap_err();
            assert!(matches!(err, DirectoryError::UpstreamFetch { status: 503, .. }));
        }
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let addr = spawn_stub(helix_stub(StatusCode::OK, "<html>", Seen::default())).await;
        let (fetcher, _) = fetcher_at(addr, Duration::from_secs(5));

        let err = fetcher.fetch_page("516575", None).await.unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_as_network_error() {
        let slow = warp::any()
            .and_then(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok::<_, warp::Rejection>(warp::reply().into_response())
            })
            .boxed();
        let addr = spawn_stub(slow).await;
        let (fetcher, _) = fetcher_at(addr, Duration::from_millis(300));

        let err = fetcher.fetch_page("516575", None).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Network(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_the_request() {
        let (fetcher, exchange) = fetcher(false);
        let err = fetcher.fetch_page("516575", None).await.unwrap_err();
        assert!(matches!(err, DirectoryError::AuthConfig(_)));
        assert_eq!(exchange.calls(), 0);
    }
}
