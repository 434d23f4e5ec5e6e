use crate::error::DirectoryError;
use crate::models::stream::StreamRecord;
use crate::services::aggregation_service::{
    present, AggregationPipeline, FilterScope, LoadProgress, SortOrder,
};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::{AbortHandle, JoinHandle};

/// What the listing currently shows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DirectoryStatus {
    Idle,
    Loading {
        game_id: String,
        progress: Option<LoadProgress>,
    },
    Ready {
        game_id: String,
        records: Vec<StreamRecord>,
    },
    Failed {
        game_id: String,
        kind: String,
        message: String,
    },
}

/// Display state for the category listing.
///
/// Each category selection gets a new generation. The previous load task is
/// aborted, and any progress or result carrying an older generation is
/// dropped, so the shown list always belongs to the latest selection.
pub struct DirectoryService {
    pipeline: Arc<AggregationPipeline>,
    generation: Arc<AtomicU64>,
    status: Arc<Mutex<DirectoryStatus>>,
    in_flight: TokioMutex<InFlight>,
}

/// The running load task. `join` is handed to `wait`, while `abort` stays
/// behind so the next selection can still cancel the task.
#[derive(Default)]
struct InFlight {
    abort: Option<AbortHandle>,
    join: Option<JoinHandle<()>>,
}

impl DirectoryService {
    pub fn new(pipeline: AggregationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            generation: Arc::new(AtomicU64::new(0)),
            status: Arc::new(Mutex::new(DirectoryStatus::Idle)),
            in_flight: TokioMutex::new(InFlight::default()),
        }
    }

    /// Start loading `game_id`, superseding whatever load is running.
    /// Returns the generation assigned to the new load.
    pub async fn select_category(&self, game_id: &str) -> u64 {
        let mut in_flight = self.in_flight.lock().await;

        let generation = {
            let mut status = lock_status(&self.status);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = DirectoryStatus::Loading {
                game_id: game_id.to_string(),
                progress: None,
            };
            generation
        };

        if let Some(previous) = in_flight.abort.take() {
            previous.abort();
        }

        info!(
            "[Directory] Loading game {} (generation {})",
            game_id, generation
        );

        let pipeline = self.pipeline.clone();
        let current = self.generation.clone();
        let status = self.status.clone();
        let game_id = game_id.to_string();

        let handle = tokio::spawn(async move {
            let is_current = || current.load(Ordering::SeqCst) == generation;

            let result = pipeline
                .load_all_with(&game_id, is_current, |progress| {
                    apply_if_current(&status, &current, generation, || {
                        DirectoryStatus::Loading {
                            game_id: game_id.clone(),
                            progress: Some(progress),
                        }
                    });
                })
                .await;

            match result {
                Ok(records) => {
                    apply_if_current(&status, &current, generation, || DirectoryStatus::Ready {
                        game_id: game_id.clone(),
                        records,
                    });
                }
                Err(DirectoryError::Superseded) => {
                    debug!("[Directory] Generation {} superseded", generation);
                }
                Err(e) => {
                    error!("[Directory] Load for game {} failed: {}", game_id, e);
                    apply_if_current(&status, &current, generation, || DirectoryStatus::Failed {
                        game_id: game_id.clone(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        });

        in_flight.abort = Some(handle.abort_handle());
        in_flight.join = Some(handle);

        generation
    }

    /// Wait for the most recently started load to finish. Returns early when
    /// a newer selection aborts that load.
    pub async fn wait(&self) {
        let handle = self.in_flight.lock().await.join.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("[Directory] Load task panicked: {}", e);
                }
            }
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> DirectoryStatus {
        lock_status(&self.status).clone()
    }

    /// Records of the finished load, filtered and sorted for display.
    /// Empty unless the latest load succeeded.
    pub fn visible(&self, query: &str, scope: FilterScope, order: SortOrder) -> Vec<StreamRecord> {
        match &*lock_status(&self.status) {
            DirectoryStatus::Ready { records, .. } => present(records, query, scope, order),
            _ => Vec::new(),
        }
    }
}

fn lock_status(status: &Mutex<DirectoryStatus>) -> std::sync::MutexGuard<'_, DirectoryStatus> {
    // A poisoned lock still holds a complete status value
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply_if_current(
    status: &Mutex<DirectoryStatus>,
    current: &AtomicU64,
    generation: u64,
    next: impl FnOnce() -> DirectoryStatus,
) {
    let mut status = lock_status(status);
    if current.load(Ordering::SeqCst) == generation {
        *status = next();
    }
}
