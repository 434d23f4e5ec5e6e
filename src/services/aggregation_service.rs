use crate::error::{DirectoryError, DirectoryResult};
use crate::models::stream::{Page, StreamRecord};
use crate::services::PageSource;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const MAX_PAGES: usize = 10;
const MAX_RAW_RECORDS: usize = 1000;
const PAGE_DELAY_MS: u64 = 100; // Self-imposed rate limit between page requests

/// Ceilings applied to a single load.
#[derive(Debug, Clone, Copy)]
pub struct PaginationLimits {
    pub max_pages: usize,
    pub max_raw_records: usize,
    pub page_delay: Duration,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            max_pages: MAX_PAGES,
            max_raw_records: MAX_RAW_RECORDS,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
        }
    }
}

/// Reported after every merged page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadProgress {
    pub pages_fetched: usize,
    pub raw_records: usize,
    pub unique_records: usize,
}

/// Accumulation owned by one load; never shared between loads.
#[derive(Default)]
struct AggregationState {
    records: HashMap<String, StreamRecord>,
    cursor: Option<String>,
    pages_fetched: usize,
    raw_records: usize,
}

impl AggregationState {
    /// Later observations of an id overwrite earlier ones.
    fn merge(&mut self, page: Page) {
        self.cursor = page.next_cursor().map(str::to_string);
        self.pages_fetched += 1;
        self.raw_records += page.data.len();
        for record in page.data {
            self.records.insert(record.id.clone(), record);
        }
    }

    fn has_more(&self, limits: &PaginationLimits) -> bool {
        self.cursor.is_some()
            && self.pages_fetched < limits.max_pages
            && self.raw_records < limits.max_raw_records
    }

    fn progress(&self) -> LoadProgress {
        LoadProgress {
            pages_fetched: self.pages_fetched,
            raw_records: self.raw_records,
            unique_records: self.records.len(),
        }
    }
}

/// Walks the cursor-paginated stream listing for one category, strictly
/// sequentially, and returns the deduplicated records in no particular order.
pub struct AggregationPipeline {
    source: Arc<dyn PageSource>,
    limits: PaginationLimits,
}

impl AggregationPipeline {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self::with_limits(source, PaginationLimits::default())
    }

    pub fn with_limits(source: Arc<dyn PageSource>, limits: PaginationLimits) -> Self {
        Self { source, limits }
    }

    pub async fn load_all(&self, game_id: &str) -> DirectoryResult<Vec<StreamRecord>> {
        self.load_all_with(game_id, || true, |_| {}).await
    }

    /// Full load with a supersession guard and a progress observer.
    ///
    /// `is_current` is consulted before every request and before the result
    /// is returned; once it reports `false` the load stops with `Superseded`.
    /// Any page failure aborts the whole load and the pages gathered so far
    /// are dropped.
    pub async fn load_all_with<G, P>(
        &self,
        game_id: &str,
        is_current: G,
        mut on_progress: P,
    ) -> DirectoryResult<Vec<StreamRecord>>
    where
        G: Fn() -> bool + Send + Sync,
        P: FnMut(LoadProgress) + Send,
    {
        let mut state = AggregationState::default();

        loop {
            if state.pages_fetched > 0 {
                tokio::time::sleep(self.limits.page_delay).await;
            }
            if !is_current() {
                debug!("[Aggregation] Load for game {} superseded", game_id);
                return Err(DirectoryError::Superseded);
            }

            let page = match self
                .source
                .fetch_page(game_id, state.cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "[Aggregation] Page {} for game {} failed, discarding {} records: {}",
                        state.pages_fetched + 1,
                        game_id,
                        state.records.len(),
                        e
                    );
                    return Err(e);
                }
            };

            state.merge(page);
            on_progress(state.progress());

            if !state.has_more(&self.limits) {
                break;
            }
        }

        if !is_current() {
            return Err(DirectoryError::Superseded);
        }

        info!(
            "[Aggregation] Game {}: {} pages, {} raw, {} unique streams",
            game_id,
            state.pages_fetched,
            state.raw_records,
            state.records.len()
        );
        Ok(state.records.into_values().collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterScope {
    #[default]
    Title,
    /// Title or display name.
    TitleUser,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

/// Case-insensitive substring filter. A blank query keeps everything.
pub fn filter_records(
    records: &[StreamRecord],
    query: &str,
    scope: FilterScope,
) -> Vec<StreamRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| {
            record.title.to_lowercase().contains(&needle)
                || (scope == FilterScope::TitleUser
                    && record.user_name.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Stable sort by viewer count; ties keep their relative order.
pub fn sort_by_viewers(records: &mut [StreamRecord], order: SortOrder) {
    match order {
        SortOrder::Descending => records.sort_by(|a, b| b.viewer_count.cmp(&a.viewer_count)),
        SortOrder::Ascending => records.sort_by(|a, b| a.viewer_count.cmp(&b.viewer_count)),
    }
}

pub fn present(
    records: &[StreamRecord],
    query: &str,
    scope: FilterScope,
    order: SortOrder,
) -> Vec<StreamRecord> {
    let mut visible = filter_records(records, query, scope);
    sort_by_viewers(&mut visible, order);
    visible
}
