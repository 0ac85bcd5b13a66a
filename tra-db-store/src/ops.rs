//! Shared repository operations
//!
//! Listing, point reads, the legacy-scan merge, and the optimistic update
//! loop are identical across entity kinds; repositories delegate here.

use std::collections::HashSet;

use tra_db_core::item::{Item, ItemKey};
use tra_db_core::populate::{populate, StoredMeta};
use tra_db_core::router::{legacy_scan, resolve, QueryPlan, QueryShape};
use tra_db_core::{Entity, Error, Result, StorageBackend, WriteGuard};

/// Options shared by the `list_by_*` methods
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Also run the degraded scan path and merge in pre-index records
    pub include_legacy: bool,
    /// Return results newest first (descending index sort key)
    pub newest_first: bool,
}

impl ListOptions {
    /// Request recency ordering
    pub fn newest_first() -> Self {
        Self {
            newest_first: true,
            ..Self::default()
        }
    }

    /// Also merge in pre-index records via the fallback scan
    pub fn with_legacy(mut self) -> Self {
        self.include_legacy = true;
        self
    }
}

/// Execute the primary access path for a shape
///
/// `limit` only applies to index plans; point reads return at most one item
/// anyway and scan plans are only produced by the legacy path.
pub(crate) async fn run_primary<B: StorageBackend + ?Sized>(
    backend: &B,
    shape: &QueryShape,
    newest_first: bool,
    limit: Option<usize>,
) -> Result<Vec<Item>> {
    match resolve(shape, newest_first) {
        QueryPlan::Get { pk, sk } => {
            Ok(backend.get_item(&pk, &sk).await?.into_iter().collect())
        }
        QueryPlan::Index(mut query) => {
            query.limit = limit;
            backend.query(&query).await
        }
        QueryPlan::Scan(plan) => backend.scan(&plan).await,
    }
}

/// Execute a listing shape, optionally merging the legacy fallback path
pub(crate) async fn run_listing<B: StorageBackend + ?Sized>(
    backend: &B,
    shape: &QueryShape,
    opts: ListOptions,
) -> Result<Vec<Item>> {
    let mut items = run_primary(backend, shape, opts.newest_first, None).await?;

    if opts.include_legacy {
        if let Some(plan) = legacy_scan(shape) {
            tracing::warn!(
                shape = ?shape,
                "degraded read: merging filtered scan for pre-index records"
            );
            let fallback = backend.scan(&plan).await?;
            items = merge_dedup(items, fallback);
        }
    }

    Ok(items)
}

/// Merge the fallback-scan results into the primary results
///
/// De-duplicates by primary key with primary-path precedence. Fallback-only
/// additions are appended in key order so the union is stable across
/// repeated calls on unchanged data regardless of backend scan order.
pub(crate) fn merge_dedup(primary: Vec<Item>, fallback: Vec<Item>) -> Vec<Item> {
    let seen: HashSet<(String, String)> = primary
        .iter()
        .filter_map(|item| ItemKey::of(item).ok().map(|k| (k.pk, k.sk)))
        .collect();

    let mut additions: Vec<((String, String), Item)> = fallback
        .into_iter()
        .filter_map(|item| {
            let key = ItemKey::of(&item).ok()?;
            let pair = (key.pk, key.sk);
            (!seen.contains(&pair)).then_some((pair, item))
        })
        .collect();
    additions.sort_by(|a, b| a.0.cmp(&b.0));

    let mut merged = primary;
    merged.extend(additions.into_iter().map(|(_, item)| item));
    merged
}

/// Point read by primary key, decoded
pub(crate) async fn get_entity<B: StorageBackend + ?Sized, E: Entity>(
    backend: &B,
    pk: &str,
    sk: &str,
) -> Result<Option<E>> {
    let shape = QueryShape::ById {
        pk: pk.to_string(),
        sk: sk.to_string(),
    };
    let items = run_primary(backend, &shape, false, None).await?;
    items.first().map(E::decode).transpose()
}

/// Create an entity: populate, then write guarded against overwrites
pub(crate) async fn create_entity<B: StorageBackend + ?Sized, E: Entity>(
    backend: &B,
    mut entity: E,
) -> Result<E> {
    let item = populate(&mut entity, None);
    backend.put_item(item, WriteGuard::MustNotExist).await?;
    Ok(entity)
}

/// Read-modify-write attempts before an update surfaces its conflict
const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Optimistic-lock update cycle
///
/// Reads the current record, applies the mutation, repopulates, and writes
/// conditioned on the version observed at read time. A concurrent writer
/// fails the guard; the whole cycle retries against the fresh record, so
/// neither writer's changes are silently discarded.
pub(crate) async fn update_entity<B, E, F>(
    backend: &B,
    pk: &str,
    sk: &str,
    mut mutate: F,
) -> Result<E>
where
    B: StorageBackend + ?Sized,
    E: Entity,
    F: FnMut(&mut E) + Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let stored = backend
            .get_item(pk, sk)
            .await?
            .ok_or_else(|| Error::not_found(pk.to_string()))?;
        let meta = StoredMeta::from_item(&stored)?;
        let mut entity = E::decode(&stored)?;
        mutate(&mut entity);

        let item = populate(&mut entity, Some(&meta));
        match backend
            .put_item(item, WriteGuard::VersionIs(meta.version))
            .await
        {
            Ok(()) => return Ok(entity),
            Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                tracing::debug!(pk, attempt, "update conflict, retrying read-modify-write");
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::conflict(pk.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tra_db_core::item::AttrValue;
    use tra_db_core::schema::{ATTR_PK, ATTR_SK};

    fn item(pk: &str, sk: &str) -> Item {
        let mut item = Item::new();
        item.insert(ATTR_PK.into(), AttrValue::s(pk));
        item.insert(ATTR_SK.into(), AttrValue::s(sk));
        item
    }

    #[test]
    fn merge_prefers_primary_and_sorts_additions() {
        let primary = vec![item("DOC#b", "METADATA"), item("DOC#a", "METADATA")];
        let fallback = vec![
            item("DOC#z", "METADATA"),
            item("DOC#b", "METADATA"), // duplicate of a primary result
            item("DOC#c", "METADATA"),
        ];

        let merged = merge_dedup(primary, fallback);
        let keys: Vec<_> = merged
            .iter()
            .map(|i| ItemKey::of(i).unwrap().pk)
            .collect();
        assert_eq!(keys, ["DOC#b", "DOC#a", "DOC#c", "DOC#z"]);
    }

    #[test]
    fn merge_of_empty_fallback_is_identity() {
        let primary = vec![item("DOC#a", "METADATA")];
        let merged = merge_dedup(primary.clone(), Vec::new());
        assert_eq!(merged, primary);
    }
}
