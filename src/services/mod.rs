pub mod aggregation_service;
pub mod directory_service;
pub mod helix_service;
pub mod proxy_client;
pub mod proxy_server;
pub mod token_service;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::DirectoryResult;
use crate::models::stream::Page;
use async_trait::async_trait;

/// Upstream page size for `GET /helix/streams`.
pub const PAGE_SIZE: u32 = 100;

/// Anything that can return one page of live streams for a category.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, game_id: &str, cursor: Option<&str>) -> DirectoryResult<Page>;
}
