//! In-memory storage backend for testing
//!
//! Implements the full [`StorageBackend`] contract against a `BTreeMap`
//! behind `Arc<RwLock>`, including write-guard semantics, secondary-index
//! simulation driven by the core schema, and unprocessed-item fault
//! injection for exercising batch retry behavior. Index reads here are
//! immediately consistent, unlike the production backend; tests that depend
//! on propagation lag cannot be written against this backend.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use tra_db_core::item::{Item, ItemExt, ItemKey};
use tra_db_core::router::{IndexQuery, KeyMatch, ScanPlan, SortCondition};
use tra_db_core::schema::ATTR_VERSION;
use tra_db_core::{Error, Result, StorageBackend, WriteGuard};

type KeyPair = (String, String);

/// In-memory storage backend
#[derive(Clone, Default)]
pub struct MemoryBackend {
    /// Items keyed by (pk, sk); BTreeMap keeps scan order deterministic
    items: Arc<RwLock<BTreeMap<KeyPair, Item>>>,
    /// Keys to report as unprocessed on batch writes, with remaining counts
    rejects: Arc<RwLock<HashMap<KeyPair, usize>>>,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("item_count", &self.items.read().len())
            .finish()
    }
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the backend holds no items
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Seed an item directly, bypassing guards
    ///
    /// Lets tests create legacy records that never went through the
    /// populator (missing projection attributes).
    pub fn insert_raw(&self, item: Item) -> Result<()> {
        let key = ItemKey::of(&item)?;
        self.items.write().insert((key.pk, key.sk), item);
        Ok(())
    }

    /// Report the next `times` batch writes of this key as unprocessed
    ///
    /// Pass `usize::MAX` for a key the store never accepts.
    pub fn reject_batch_puts(&self, pk: impl Into<String>, sk: impl Into<String>, times: usize) {
        self.rejects
            .write()
            .insert((pk.into(), sk.into()), times);
    }

}

fn partition_matches(value: &str, partition: &KeyMatch) -> bool {
    match partition {
        KeyMatch::Exact(expected) => value == expected,
        KeyMatch::Prefix(prefix) => value.starts_with(prefix.as_str()),
    }
}

fn sort_matches(value: &str, sort: &Option<SortCondition>) -> bool {
    match sort {
        None => true,
        Some(SortCondition::Eq(expected)) => value == expected,
        Some(SortCondition::BeginsWith(prefix)) => value.starts_with(prefix.as_str()),
    }
}

fn scan_matches(pk: &str, sk: &str, item: &Item, plan: &ScanPlan) -> bool {
    if let Some(prefix) = &plan.pk_prefix {
        if !pk.starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(prefix) = &plan.sk_prefix {
        if !sk.starts_with(prefix.as_str()) {
            return false;
        }
    }
    plan.equals
        .iter()
        .all(|(attr, value)| item.get_s(attr) == Some(value.as_str()))
        && plan
            .begins
            .iter()
            .all(|(attr, prefix)| {
                item.get_s(attr)
                    .is_some_and(|v| v.starts_with(prefix.as_str()))
            })
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put_item(&self, item: Item, guard: WriteGuard) -> Result<()> {
        let key = ItemKey::of(&item)?;
        let key_pair = (key.pk.clone(), key.sk);

        // Guard check and insert under one lock, like the store's atomic
        // conditional put.
        let mut items = self.items.write();
        match guard {
            WriteGuard::None => {}
            WriteGuard::MustNotExist => {
                if items.contains_key(&key_pair) {
                    return Err(Error::conflict(key.pk));
                }
            }
            WriteGuard::VersionIs(expected) => {
                let stored = items
                    .get(&key_pair)
                    .and_then(|item| item.get_i64(ATTR_VERSION));
                if stored != Some(expected) {
                    return Err(Error::conflict(key.pk));
                }
            }
        }

        items.insert(key_pair, item);
        Ok(())
    }

    async fn get_item(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        Ok(self
            .items
            .read()
            .get(&(pk.to_string(), sk.to_string()))
            .cloned())
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>> {
        let partition_attr = query.index.partition_attr();
        let sort_attr = query.index.sort_attr();

        // Sparse index: items missing either key attribute are invisible.
        let mut matched: Vec<(String, String, String, Item)> = self
            .items
            .read()
            .iter()
            .filter_map(|((pk, sk), item)| {
                let partition_value = item.get_s(partition_attr)?;
                let sort_value = item.get_s(sort_attr)?;
                (partition_matches(partition_value, &query.partition)
                    && sort_matches(sort_value, &query.sort))
                .then(|| (sort_value.to_string(), pk.clone(), sk.clone(), item.clone()))
            })
            .collect();

        matched.sort_by(|a, b| (&a.0, &a.1, &a.2).cmp(&(&b.0, &b.1, &b.2)));
        if query.newest_first {
            matched.reverse();
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched.into_iter().map(|(_, _, _, item)| item).collect())
    }

    async fn scan(&self, plan: &ScanPlan) -> Result<Vec<Item>> {
        Ok(self
            .items
            .read()
            .iter()
            .filter(|((pk, sk), item)| scan_matches(pk, sk, item, plan))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn batch_put(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let mut unprocessed = Vec::new();
        for item in items {
            let key = ItemKey::of(&item)?;
            let key_pair = (key.pk, key.sk);

            let rejected = {
                let mut rejects = self.rejects.write();
                match rejects.get_mut(&key_pair) {
                    Some(0) => false,
                    Some(remaining) => {
                        *remaining = remaining.saturating_sub(1);
                        true
                    }
                    None => false,
                }
            };

            if rejected {
                unprocessed.push(item);
            } else {
                self.items.write().insert(key_pair, item);
            }
        }
        Ok(unprocessed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tra_db_core::model::{Assessment, AssessmentState, Entity, Message, MessageRole};
    use tra_db_core::router::{resolve, QueryPlan, QueryShape};
    use tra_db_core::populate::populate;

    fn index_query(shape: &QueryShape, newest_first: bool) -> IndexQuery {
        match resolve(shape, newest_first) {
            QueryPlan::Index(q) => q,
            other => panic!("expected index plan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let backend = MemoryBackend::new();
        let mut a = Assessment::new("s-1");
        let item = populate(&mut a, None);
        let key = a.key();

        backend.put_item(item, WriteGuard::MustNotExist).await.unwrap();
        let stored = backend.get_item(&key.pk, &key.sk).await.unwrap().unwrap();
        assert_eq!(Assessment::decode(&stored).unwrap(), a);
    }

    #[tokio::test]
    async fn must_not_exist_guard_conflicts_on_second_create() {
        let backend = MemoryBackend::new();
        let mut a = Assessment::new("s-1");
        let item = populate(&mut a, None);

        backend
            .put_item(item.clone(), WriteGuard::MustNotExist)
            .await
            .unwrap();
        let err = backend
            .put_item(item, WriteGuard::MustNotExist)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn version_guard_requires_matching_stored_version() {
        let backend = MemoryBackend::new();
        let mut a = Assessment::new("s-1");
        let item = populate(&mut a, None);
        backend.put_item(item, WriteGuard::MustNotExist).await.unwrap();

        // Stored version is 1; a stale expectation must conflict.
        let meta = tra_db_core::StoredMeta {
            created_at: a.created_at,
            updated_at: a.updated_at,
            version: 1,
        };
        a.current_state = AssessmentState::InProgress;
        let updated = populate(&mut a, Some(&meta));
        backend
            .put_item(updated.clone(), WriteGuard::VersionIs(1))
            .await
            .unwrap();

        let err = backend
            .put_item(updated, WriteGuard::VersionIs(1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn query_respects_sparse_index_membership() {
        let backend = MemoryBackend::new();
        let mut a = Assessment::new("s-1");
        backend
            .put_item(populate(&mut a, None), WriteGuard::None)
            .await
            .unwrap();
        let mut m = Message::new("s-1", MessageRole::User, "hi");
        backend
            .put_item(populate(&mut m, None), WriteGuard::None)
            .await
            .unwrap();

        // The state index only contains items carrying current_state.
        let q = index_query(
            &QueryShape::AssessmentsByState {
                state: AssessmentState::Draft,
            },
            false,
        );
        let items = backend.query(&q).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get_s("entity_type"), Some("assessment"));

        // Both entities share the session, so the session index sees both.
        let q = index_query(
            &QueryShape::ItemsBySession {
                session_id: "s-1".into(),
                entity_type: None,
            },
            false,
        );
        assert_eq!(backend.query(&q).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_rejection_counts_down() {
        let backend = MemoryBackend::new();
        let mut m = Message::new("s-1", MessageRole::User, "hi");
        let item = populate(&mut m, None);
        let key = m.key();
        backend.reject_batch_puts(key.pk.clone(), key.sk.clone(), 1);

        let unprocessed = backend.batch_put(vec![item.clone()]).await.unwrap();
        assert_eq!(unprocessed.len(), 1);

        let unprocessed = backend.batch_put(unprocessed).await.unwrap();
        assert!(unprocessed.is_empty());
        assert!(backend.get_item(&key.pk, &key.sk).await.unwrap().is_some());
    }
}
