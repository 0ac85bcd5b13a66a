//! Storage backend trait
//!
//! The narrow contract between the repositories and the backing wide-column
//! store. Exactly one production implementation exists (`tra-db-dynamodb`);
//! `tra-db-memory` implements the same contract for tests. There is no
//! in-process fallback backend.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;
use crate::item::Item;
use crate::router::{IndexQuery, ScanPlan};

/// Condition attached to a single-item write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    /// Unconditional upsert
    None,
    /// Create only: fail with a conflict if the key already exists
    MustNotExist,
    /// Update only: fail with a conflict unless the stored `version` matches
    VersionIs(i64),
}

/// Adapter over the backing wide-column store
///
/// Primary-key reads are strongly consistent; secondary-index reads are
/// eventually consistent. Single-item writes are atomic. `batch_put` writes
/// up to 25 items and reports the subset the store left unprocessed —
/// throttling surfaces there as data, not as an error.
#[async_trait]
pub trait StorageBackend: Debug + Send + Sync {
    /// Upsert a single item, subject to the write guard
    ///
    /// Guard failures return [`crate::Error::Conflict`].
    async fn put_item(&self, item: Item, guard: WriteGuard) -> Result<()>;

    /// Primary-key point read; `Ok(None)` when the key is absent
    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>>;

    /// Read items through a secondary index
    ///
    /// Results are ordered by the index sort attribute, descending when
    /// `newest_first` is set. Paginates internally until exhaustion or the
    /// query's limit.
    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>>;

    /// Filtered full scan — expensive; only the legacy fallback path uses it
    async fn scan(&self, plan: &ScanPlan) -> Result<Vec<Item>>;

    /// Write up to 25 items; returns the items the store left unprocessed
    async fn batch_put(&self, items: Vec<Item>) -> Result<Vec<Item>>;
}
