// Scripted fakes shared by the service tests.
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::settings::Credentials;
use crate::models::stream::{Page, Pagination, StreamRecord};
use crate::services::token_service::{CredentialExchange, TokenGrant};
use crate::services::PageSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use warp::filters::BoxedFilter;

pub fn test_credentials() -> Credentials {
    Credentials {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
    }
}

/// Serve `filter` on an ephemeral local port for the rest of the test.
pub async fn spawn_stub(filter: BoxedFilter<(warp::reply::Response,)>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(warp::serve(filter).incoming(listener).run());
    addr
}

pub fn record(id: &str, user_name: &str, title: &str, viewer_count: u64) -> StreamRecord {
    StreamRecord {
        id: id.to_string(),
        user_id: format!("u{}", id),
        user_login: user_name.to_lowercase(),
        user_name: user_name.to_string(),
        game_id: "516575".to_string(),
        game_name: "VALORANT".to_string(),
        stream_type: "live".to_string(),
        title: title.to_string(),
        tags: Vec::new(),
        viewer_count,
        started_at: "2024-01-01T00:00:00Z".to_string(),
        language: "en".to_string(),
        thumbnail_url: "https://cdn/{width}x{height}.jpg".to_string(),
        is_mature: false,
        extra: serde_json::Map::new(),
    }
}

pub fn page(data: Vec<StreamRecord>, cursor: Option<&str>) -> Page {
    Page {
        data,
        pagination: Pagination {
            cursor: cursor.map(str::to_string),
        },
    }
}

/// `count` records with ids `{prefix}-{n}`, viewers descending from `count`.
pub fn records(prefix: &str, count: usize) -> Vec<StreamRecord> {
    (0..count)
        .map(|n| {
            record(
                &format!("{}-{}", prefix, n),
                &format!("user{}", n),
                "stream",
                (count - n) as u64,
            )
        })
        .collect()
}

pub struct CountingExchange {
    calls: AtomicUsize,
    expires_in: i64,
    rejection: Option<(u16, String)>,
    delay: Duration,
}

impl CountingExchange {
    pub fn new(expires_in: i64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            expires_in,
            rejection: None,
            delay: Duration::ZERO,
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            rejection: Some((status, body.to_string())),
            ..Self::new(0)
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialExchange for CountingExchange {
    async fn exchange(&self, _credentials: &Credentials) -> DirectoryResult<TokenGrant> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((status, body)) = &self.rejection {
            return Err(DirectoryError::UpstreamAuth {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(TokenGrant {
            access_token: format!("token-{}", n),
            expires_in: self.expires_in,
        })
    }
}

pub enum Step {
    Page(Page),
    Fail(u16),
}

/// Replays a fixed sequence of pages (or failures) per category and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<Step>>,
    endless: Option<usize>,
    delay: Duration,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, game_id: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(game_id.to_string(), steps);
        self
    }

    /// Every request returns `per_page` fresh records and another cursor.
    pub fn endless(per_page: usize) -> Self {
        Self {
            endless: Some(per_page),
            ..Self::default()
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, game_id: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == game_id)
            .count()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, game_id: &str, cursor: Option<&str>) -> DirectoryResult<Page> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push((game_id.to_string(), cursor.map(str::to_string)));
            requests.iter().filter(|(id, _)| id == game_id).count() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(per_page) = self.endless {
            let cursor = format!("cursor-{}", index + 1);
            return Ok(page(
                records(&format!("{}-p{}", game_id, index), per_page),
                Some(&cursor),
            ));
        }

        match self.scripts.get(game_id).and_then(|steps| steps.get(index)) {
            Some(Step::Page(p)) => Ok(p.clone()),
            Some(Step::Fail(status)) => Err(DirectoryError::UpstreamFetch {
                status: *status,
                body: "scripted failure".to_string(),
            }),
            None => Ok(Page::default()),
        }
    }
}
