//! Table schema constants
//!
//! Defines the attribute names, key prefixes, and secondary-index layout of
//! the single TRA table.
//!
//! ```text
//! Table: tra-assessments (configurable)
//!
//! Primary Key:
//!   - pk (String, Partition Key): e.g., "ASSESSMENT#TRA-2025-A1B2C3"
//!   - sk (String, Sort Key): e.g., "METADATA", "EVENT#<event_id>"
//!
//! Projection attributes (stamped on every write by the populator):
//!   - entity_type: String - "assessment" | "document" | "event" | "message"
//!   - session_id: String (optional)
//!   - assessment_id: String (optional)
//!   - event_type: String (events only)
//!   - current_state: String (assessments only)
//!   - title_lowercase: String (assessments with a title only)
//!   - created_at: String (RFC 3339, microseconds, Z)
//!   - updated_at: String (RFC 3339, microseconds, Z)
//!   - version: Number - successful write count, guards conditional updates
//!
//! Secondary indexes (all sparse, full-item projection):
//!   - gsi-session-entity: session_id / entity_type
//!   - gsi-assessment-event: assessment_id / event_type
//!   - gsi-state-updated: current_state / updated_at
//!   - gsi-title-created: title_lowercase / created_at
//!   - gsi-entity-updated: entity_type / updated_at
//! ```

/// Default table name
pub const DEFAULT_TABLE_NAME: &str = "tra-assessments";

/// Partition key attribute
pub const ATTR_PK: &str = "pk";

/// Sort key attribute
pub const ATTR_SK: &str = "sk";

/// Entity kind discriminant ("assessment" | "document" | "event" | "message")
pub const ATTR_ENTITY_TYPE: &str = "entity_type";

/// Owning session identifier
pub const ATTR_SESSION_ID: &str = "session_id";

/// Owning assessment identifier
pub const ATTR_ASSESSMENT_ID: &str = "assessment_id";

/// Event kind discriminant (events only)
pub const ATTR_EVENT_TYPE: &str = "event_type";

/// Assessment lifecycle state (assessments only)
pub const ATTR_CURRENT_STATE: &str = "current_state";

/// Case-folded title (assessments with a title only)
pub const ATTR_TITLE_LOWER: &str = "title_lowercase";

/// Creation timestamp (RFC 3339)
pub const ATTR_CREATED_AT: &str = "created_at";

/// Last-write timestamp (RFC 3339)
pub const ATTR_UPDATED_AT: &str = "updated_at";

/// Successful-write counter, guards conditional updates
pub const ATTR_VERSION: &str = "version";

// ---------------------------------------------------------------------------
// Business attributes
// ---------------------------------------------------------------------------

pub const ATTR_TITLE: &str = "title";
pub const ATTR_DESCRIPTION: &str = "description";
pub const ATTR_TECHNOLOGY_TYPE: &str = "technology_type";
pub const ATTR_REQUESTOR_NAME: &str = "requestor_name";
pub const ATTR_REQUESTOR_EMAIL: &str = "requestor_email";
pub const ATTR_ANSWERS: &str = "answers";
pub const ATTR_COMPLETION_PERCENTAGE: &str = "completion_percentage";
pub const ATTR_LINKED_DOCUMENTS: &str = "linked_documents";

pub const ATTR_DOCUMENT_ID: &str = "document_id";
pub const ATTR_FILENAME: &str = "filename";
pub const ATTR_FILE_SIZE: &str = "file_size";
pub const ATTR_CONTENT_TYPE: &str = "content_type";
pub const ATTR_STORAGE_KEY: &str = "storage_key";
pub const ATTR_CONTENT_SUMMARY: &str = "content_summary";
pub const ATTR_TAGS: &str = "tags";
pub const ATTR_PROCESSING_STATUS: &str = "processing_status";
pub const ATTR_ERROR_MESSAGE: &str = "error_message";

pub const ATTR_EVENT_ID: &str = "event_id";
pub const ATTR_ACTOR: &str = "actor";
pub const ATTR_PAYLOAD: &str = "payload";
pub const ATTR_OCCURRED_AT: &str = "occurred_at";

pub const ATTR_MESSAGE_ID: &str = "message_id";
pub const ATTR_ROLE: &str = "role";
pub const ATTR_CONTENT: &str = "content";
pub const ATTR_PROCESSED: &str = "processed";
pub const ATTR_SENT_AT: &str = "sent_at";

// ---------------------------------------------------------------------------
// Key prefixes
// ---------------------------------------------------------------------------

/// Assessment partition prefix (also the partition of its events)
pub const PK_ASSESSMENT: &str = "ASSESSMENT#";

/// Document partition prefix
pub const PK_DOCUMENT: &str = "DOC#";

/// Session partition prefix (messages)
pub const PK_SESSION: &str = "SESSION#";

/// Metadata record sort key (assessments, documents)
pub const SK_METADATA: &str = "METADATA";

/// Event record sort-key prefix
pub const SK_EVENT: &str = "EVENT#";

/// Message record sort-key prefix
pub const SK_MESSAGE: &str = "MSG#";

// ---------------------------------------------------------------------------
// Secondary indexes
// ---------------------------------------------------------------------------

/// Index name: session_id / entity_type
pub const INDEX_SESSION_ENTITY: &str = "gsi-session-entity";

/// Index name: assessment_id / event_type
pub const INDEX_ASSESSMENT_EVENT: &str = "gsi-assessment-event";

/// Index name: current_state / updated_at
pub const INDEX_STATE_UPDATED: &str = "gsi-state-updated";

/// Index name: title_lowercase / created_at
pub const INDEX_TITLE_CREATED: &str = "gsi-title-created";

/// Index name: entity_type / updated_at
pub const INDEX_ENTITY_UPDATED: &str = "gsi-entity-updated";

/// The five secondary indexes of the table
///
/// Each index is a (partition-attribute, sort-attribute) pair with full-item
/// projection. Items missing either attribute are absent from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryIndex {
    /// session_id / entity_type
    SessionEntity,
    /// assessment_id / event_type
    AssessmentEvent,
    /// current_state / updated_at
    StateUpdated,
    /// title_lowercase / created_at
    TitleCreated,
    /// entity_type / updated_at
    EntityUpdated,
}

impl SecondaryIndex {
    /// Store-side index name
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionEntity => INDEX_SESSION_ENTITY,
            Self::AssessmentEvent => INDEX_ASSESSMENT_EVENT,
            Self::StateUpdated => INDEX_STATE_UPDATED,
            Self::TitleCreated => INDEX_TITLE_CREATED,
            Self::EntityUpdated => INDEX_ENTITY_UPDATED,
        }
    }

    /// Partition key attribute of this index
    pub fn partition_attr(&self) -> &'static str {
        match self {
            Self::SessionEntity => ATTR_SESSION_ID,
            Self::AssessmentEvent => ATTR_ASSESSMENT_ID,
            Self::StateUpdated => ATTR_CURRENT_STATE,
            Self::TitleCreated => ATTR_TITLE_LOWER,
            Self::EntityUpdated => ATTR_ENTITY_TYPE,
        }
    }

    /// Sort key attribute of this index
    pub fn sort_attr(&self) -> &'static str {
        match self {
            Self::SessionEntity => ATTR_ENTITY_TYPE,
            Self::AssessmentEvent => ATTR_EVENT_TYPE,
            Self::StateUpdated => ATTR_UPDATED_AT,
            Self::TitleCreated => ATTR_CREATED_AT,
            Self::EntityUpdated => ATTR_UPDATED_AT,
        }
    }
}
