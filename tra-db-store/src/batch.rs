//! Batch Writer
//!
//! Chunks bulk mutations at the store's 25-item batch limit, issues chunks
//! concurrently under a semaphore, and retries unprocessed items with
//! exponential backoff. Partial success is the expected shape of the result:
//! the store may legitimately throttle part of a batch, and items that stay
//! unprocessed past the retry ceiling come back in `failed` rather than
//! failing the whole call.
//!
//! Items handed to this writer must already have passed through the
//! populator; the writer moves bytes, it does not compute attributes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use tra_db_core::item::{Item, ItemKey};
use tra_db_core::StorageBackend;

/// Store-imposed ceiling on items per batch request
const MAX_BATCH_ITEMS: usize = 25;

/// Batch writer tuning
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Chunks in flight at once
    pub max_in_flight: usize,
    /// Retries of unprocessed items after the initial attempt
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub base_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let max_in_flight = std::env::var("TRA_DB_BATCH_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(4)
            .clamp(1, 32);
        Self {
            max_in_flight,
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of a bulk write
///
/// Every input item lands in exactly one of the two buckets.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Items durably written
    pub succeeded: Vec<Item>,
    /// Items still unprocessed after the retry ceiling, or whose chunk hit a
    /// non-retryable error
    pub failed: Vec<Item>,
}

impl BatchResult {
    /// Whether every item was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Concurrency-bounded, retrying bulk writer over a storage backend
#[derive(Debug)]
pub struct BatchWriter<B> {
    backend: Arc<B>,
    config: BatchConfig,
}

impl<B: StorageBackend> BatchWriter<B> {
    /// New writer with default tuning
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_config(backend, BatchConfig::default())
    }

    /// New writer with explicit tuning
    pub fn with_config(backend: Arc<B>, config: BatchConfig) -> Self {
        Self { backend, config }
    }

    /// Write all items, chunked and retried; never fails as a whole
    pub async fn put_all(&self, items: Vec<Item>) -> BatchResult {
        if items.is_empty() {
            return BatchResult::default();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let total = items.len();

        let mut in_flight = FuturesUnordered::new();
        for chunk in items.chunks(MAX_BATCH_ITEMS).map(<[Item]>::to_vec) {
            let semaphore = Arc::clone(&semaphore);
            in_flight.push(async move {
                let _permit = semaphore.acquire_owned().await;
                self.write_chunk(chunk).await
            });
        }

        let mut result = BatchResult::default();
        while let Some((succeeded, failed)) = in_flight.next().await {
            result.succeeded.extend(succeeded);
            result.failed.extend(failed);
        }

        tracing::debug!(
            total,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "batch write finished"
        );
        result
    }

    /// Drive one chunk to completion or its retry ceiling
    async fn write_chunk(&self, chunk: Vec<Item>) -> (Vec<Item>, Vec<Item>) {
        let mut pending = chunk;
        let mut succeeded = Vec::new();

        let mut attempt: u32 = 0;
        loop {
            match self.backend.batch_put(pending.clone()).await {
                Ok(unprocessed) => {
                    let unprocessed_keys: HashSet<(String, String)> = unprocessed
                        .iter()
                        .filter_map(|item| ItemKey::of(item).ok().map(|k| (k.pk, k.sk)))
                        .collect();
                    let (still_pending, written): (Vec<_>, Vec<_>) =
                        pending.into_iter().partition(|item| {
                            ItemKey::of(item)
                                .ok()
                                .is_some_and(|k| unprocessed_keys.contains(&(k.pk, k.sk)))
                        });
                    succeeded.extend(written);
                    pending = still_pending;

                    if pending.is_empty() {
                        break;
                    }
                }
                Err(e) if e.is_throttled() => {
                    // Whole chunk throttled; every item stays pending.
                    tracing::debug!(attempt, error = %e, "batch chunk throttled");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        items = pending.len(),
                        "batch chunk failed with non-retryable error"
                    );
                    return (succeeded, pending);
                }
            }

            if attempt >= self.config.max_retries {
                tracing::warn!(
                    items = pending.len(),
                    retries = self.config.max_retries,
                    "items unprocessed after retry ceiling"
                );
                break;
            }
            tokio::time::sleep(self.config.base_delay * 2u32.pow(attempt)).await;
            attempt += 1;
        }

        (succeeded, pending)
    }
}
