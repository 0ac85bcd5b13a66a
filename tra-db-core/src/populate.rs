//! Attribute Populator
//!
//! The single place index-projection attributes are computed. Every write —
//! single or batched — goes through [`populate`] before it reaches a storage
//! backend, so a stored item's projection attributes can never disagree with
//! its business fields. A wrongly projected attribute would not fail loudly;
//! it would silently break a query path, which is why this stays a pure
//! function with no other writers.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::item::{AttrValue, Item, ItemExt};
use crate::model::{format_timestamp, now_micros, parse_timestamp, Entity};
use crate::schema::*;

/// Write metadata read off a previously stored item
///
/// Carried through a read-modify-write cycle so the populator can preserve
/// `created_at`, clamp `updated_at` monotonically, and step `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMeta {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl StoredMeta {
    /// Extract write metadata from a stored item
    pub fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            created_at: parse_timestamp(item.require_s(ATTR_CREATED_AT)?)?,
            updated_at: parse_timestamp(item.require_s(ATTR_UPDATED_AT)?)?,
            version: item.get_i64(ATTR_VERSION).unwrap_or(1),
        })
    }
}

/// Enrich an entity with every projection attribute its kind requires and
/// return the wire item to store.
///
/// Stamps the entity's write metadata in place: `updated_at` becomes the
/// current time (bumped past the prior write's timestamp so it is strictly
/// increasing per entity), `created_at` is preserved from the prior record,
/// and `version` steps by one (1 on create). Absent optional fields yield
/// absent attributes, never errors.
pub fn populate<E: Entity>(entity: &mut E, prior: Option<&StoredMeta>) -> Item {
    let now = now_micros();
    let (created_at, updated_at, version) = match prior {
        Some(meta) => {
            // Strictly increasing per entity: a rewrite within the same
            // microsecond (or under a backwards wall clock) still gets a
            // later sort key than the write it replaces.
            let updated_at = if now > meta.updated_at {
                now
            } else {
                meta.updated_at + chrono::Duration::microseconds(1)
            };
            (meta.created_at, updated_at, meta.version + 1)
        }
        None => (now, now, 1),
    };
    entity.set_meta(created_at, updated_at, version);

    let key = entity.key();
    let mut item = Item::new();
    item.insert(ATTR_PK.into(), AttrValue::s(key.pk));
    item.insert(ATTR_SK.into(), AttrValue::s(key.sk));
    item.insert(ATTR_ENTITY_TYPE.into(), AttrValue::s(E::KIND.as_str()));
    item.insert(
        ATTR_CREATED_AT.into(),
        AttrValue::s(format_timestamp(created_at)),
    );
    item.insert(
        ATTR_UPDATED_AT.into(),
        AttrValue::s(format_timestamp(updated_at)),
    );
    item.insert(ATTR_VERSION.into(), AttrValue::n_i64(version));

    if let Some(session_id) = entity.session_id() {
        item.insert(ATTR_SESSION_ID.into(), AttrValue::s(session_id));
    }
    if let Some(assessment_id) = entity.assessment_id() {
        item.insert(ATTR_ASSESSMENT_ID.into(), AttrValue::s(assessment_id));
    }
    if let Some(event_type) = entity.event_type_wire() {
        item.insert(ATTR_EVENT_TYPE.into(), AttrValue::s(event_type));
    }
    if let Some(state) = entity.state_wire() {
        item.insert(ATTR_CURRENT_STATE.into(), AttrValue::s(state));
    }
    if let Some(title) = entity.title() {
        item.insert(ATTR_TITLE_LOWER.into(), AttrValue::s(title.to_lowercase()));
    }

    entity.encode_business(&mut item);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assessment, AssessmentState, Document, Message, MessageRole};

    #[test]
    fn projection_attributes_track_business_fields() {
        let mut a = Assessment::new("session-9");
        a.title = Some("Azure Migration Review".into());
        a.current_state = AssessmentState::InProgress;

        let item = populate(&mut a, None);
        assert_eq!(item.get_s(ATTR_ENTITY_TYPE), Some("assessment"));
        assert_eq!(item.get_s(ATTR_SESSION_ID), Some("session-9"));
        assert_eq!(item.get_s(ATTR_CURRENT_STATE), Some("in_progress"));
        assert_eq!(
            item.get_s(ATTR_TITLE_LOWER),
            Some("azure migration review")
        );
        assert_eq!(
            item.get_s(ATTR_ASSESSMENT_ID),
            Some(a.assessment_id.as_str())
        );
        assert_eq!(item.get_i64(ATTR_VERSION), Some(1));
    }

    #[test]
    fn missing_title_yields_absent_attribute() {
        let mut a = Assessment::new("session-9");
        let item = populate(&mut a, None);
        assert!(item.get_s(ATTR_TITLE_LOWER).is_none());
        assert!(item.get_s(ATTR_TITLE).is_none());
    }

    #[test]
    fn title_lowercase_is_assessment_only() {
        let mut d = Document::new("s", "REPORT.PDF", 1, "application/pdf", "k");
        let item = populate(&mut d, None);
        assert!(item.get_s(ATTR_TITLE_LOWER).is_none());

        let mut m = Message::new("s", MessageRole::User, "hi");
        let item = populate(&mut m, None);
        assert!(item.get_s(ATTR_TITLE_LOWER).is_none());
    }

    #[test]
    fn update_steps_version_and_preserves_created_at() {
        let mut a = Assessment::new("session-9");
        let first = populate(&mut a, None);
        let meta = StoredMeta::from_item(&first).unwrap();

        a.current_state = AssessmentState::InProgress;
        let second = populate(&mut a, Some(&meta));

        assert_eq!(second.get_i64(ATTR_VERSION), Some(2));
        assert_eq!(
            second.get_s(ATTR_CREATED_AT),
            first.get_s(ATTR_CREATED_AT)
        );
        assert!(second.get_s(ATTR_UPDATED_AT) >= first.get_s(ATTR_UPDATED_AT));
    }

    #[test]
    fn updated_at_never_runs_backwards() {
        let mut a = Assessment::new("session-9");
        let first = populate(&mut a, None);
        let mut meta = StoredMeta::from_item(&first).unwrap();
        // Simulate a prior write from a clock ahead of ours
        meta.updated_at += chrono::Duration::seconds(3600);

        let second = populate(&mut a, Some(&meta));
        assert!(a.updated_at > meta.updated_at);
        assert!(second.get_s(ATTR_UPDATED_AT).unwrap() > format_timestamp(meta.updated_at).as_str());
    }
}
