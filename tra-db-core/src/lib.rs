//! Core types for the TRA entity store
//!
//! Four entity kinds (assessments, documents, events, chat messages) share a
//! single wide-column table addressed by composite primary key and five
//! secondary indexes. This crate holds everything backend-independent:
//!
//! - [`model`]: the entity structs, their enums, and item codecs
//! - [`populate`]: the attribute populator — the only writer of
//!   index-projection attributes
//! - [`router`]: the closed query-shape union and its index routing
//! - [`backend`]: the [`StorageBackend`] trait the store adapters implement
//! - [`schema`]: attribute names, key prefixes, and index definitions
//!
//! Backends live in sibling crates: `tra-db-dynamodb` (production) and
//! `tra-db-memory` (tests). Repositories over this trait live in
//! `tra-db-store`.

pub mod backend;
pub mod error;
pub mod id;
pub mod item;
pub mod model;
pub mod populate;
pub mod router;
pub mod schema;

pub use backend::{StorageBackend, WriteGuard};
pub use error::{Error, Result};
pub use id::{new_entity_id, AssessmentId};
pub use item::{AttrValue, Item, ItemExt, ItemKey};
pub use model::{
    Assessment, AssessmentState, Document, Entity, EntityType, Event, EventType, IngestStatus,
    LinkedDocument, Message, MessageRole,
};
pub use populate::{populate, StoredMeta};
pub use router::{legacy_scan, resolve, IndexQuery, KeyMatch, QueryPlan, QueryShape, ScanPlan, SortCondition};
pub use schema::SecondaryIndex;
