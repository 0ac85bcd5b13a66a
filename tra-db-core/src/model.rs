//! Entity model for the TRA keyspace
//!
//! Four entity kinds share one physical table: assessments, their uploaded
//! documents, lifecycle events, and chat messages. Each entity knows its
//! primary key and how to encode/decode its business fields; projection
//! attributes are stamped by [`crate::populate`].

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{new_entity_id, AssessmentId};
use crate::item::{AttrValue, Item, ItemExt, ItemKey};
use crate::schema::*;

/// Current time at the precision of the stored wire form
///
/// Timestamps are truncated to microseconds everywhere so a value survives
/// an encode/decode cycle unchanged.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp in the stored wire form
///
/// Fixed microsecond precision with a `Z` suffix, so lexicographic order on
/// a sort attribute equals chronological order.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::corrupt(format!("bad timestamp {s:?}: {e}")))
}

/// Entity kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Assessment,
    Document,
    Event,
    Message,
}

impl EntityType {
    /// Wire string stored in the `entity_type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assessment => "assessment",
            Self::Document => "document",
            Self::Event => "event",
            Self::Message => "message",
        }
    }

    /// Parse a wire string
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "assessment" => Ok(Self::Assessment),
            "document" => Ok(Self::Document),
            "event" => Ok(Self::Event),
            "message" => Ok(Self::Message),
            other => Err(Error::invalid_id(format!("unknown entity type {other:?}"))),
        }
    }
}

/// Assessment workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentState {
    Draft,
    InProgress,
    Complete,
    Archived,
}

impl AssessmentState {
    /// Wire string stored in the `current_state` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Archived => "archived",
        }
    }

    /// Parse a wire string
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "archived" => Ok(Self::Archived),
            other => Err(Error::invalid_id(format!("unknown state {other:?}"))),
        }
    }
}

/// Document ingestion status (`uploading` → `processing` → `ready` | `failed`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(Error::invalid_id(format!("unknown ingest status {other:?}"))),
        }
    }
}

/// Audit-trail event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AssessmentCreated,
    StateChanged,
    QuestionAnswered,
    DocumentUploaded,
    DocumentProcessed,
    AssessmentReview,
    ExportGenerated,
}

impl EventType {
    /// Wire string stored in the `event_type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssessmentCreated => "assessment_created",
            Self::StateChanged => "state_changed",
            Self::QuestionAnswered => "question_answered",
            Self::DocumentUploaded => "document_uploaded",
            Self::DocumentProcessed => "document_processed",
            Self::AssessmentReview => "assessment_review",
            Self::ExportGenerated => "export_generated",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "assessment_created" => Ok(Self::AssessmentCreated),
            "state_changed" => Ok(Self::StateChanged),
            "question_answered" => Ok(Self::QuestionAnswered),
            "document_uploaded" => Ok(Self::DocumentUploaded),
            "document_processed" => Ok(Self::DocumentProcessed),
            "assessment_review" => Ok(Self::AssessmentReview),
            "export_generated" => Ok(Self::ExportGenerated),
            other => Err(Error::invalid_id(format!("unknown event type {other:?}"))),
        }
    }
}

/// Chat message sender role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(Error::invalid_id(format!("unknown role {other:?}"))),
        }
    }
}

/// A stored entity that the populator and repositories can handle generically
///
/// `encode_business` writes only the business fields; key, discriminant, and
/// projection attributes are stamped by [`crate::populate::populate`].
pub trait Entity: Sized + Send + Sync {
    /// Kind discriminant for this entity type
    const KIND: EntityType;

    /// Primary key of this entity
    fn key(&self) -> ItemKey;

    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn version(&self) -> i64;

    /// Stamp write metadata (called by the populator, never directly)
    fn set_meta(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64);

    /// Owning session, if any
    fn session_id(&self) -> Option<&str> {
        None
    }

    /// Owning assessment, if any
    fn assessment_id(&self) -> Option<&str> {
        None
    }

    /// Event-kind wire string (events only)
    fn event_type_wire(&self) -> Option<&'static str> {
        None
    }

    /// Lifecycle-state wire string (assessments only)
    fn state_wire(&self) -> Option<&'static str> {
        None
    }

    /// Title (assessments only; drives `title_lowercase`)
    fn title(&self) -> Option<&str> {
        None
    }

    /// Write business fields into the item
    fn encode_business(&self, item: &mut Item);

    /// Decode a stored item back into the entity
    fn decode(item: &Item) -> Result<Self>;
}

/// Read the shared write metadata off a stored item
fn decode_meta(item: &Item) -> Result<(DateTime<Utc>, DateTime<Utc>, i64)> {
    let created_at = parse_timestamp(item.require_s(ATTR_CREATED_AT)?)?;
    let updated_at = parse_timestamp(item.require_s(ATTR_UPDATED_AT)?)?;
    let version = item.get_i64(ATTR_VERSION).unwrap_or(1);
    Ok((created_at, updated_at, version))
}

/// Summary of a document linked to an assessment
///
/// Maintained by the link pass so consumers can read an assessment's
/// documents off the assessment record without an extra index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedDocument {
    pub document_id: String,
    pub filename: String,
    #[serde(default)]
    pub content_summary: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Technology risk assessment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_id: AssessmentId,
    pub session_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub technology_type: Option<String>,
    pub requestor_name: Option<String>,
    pub requestor_email: Option<String>,
    /// Question-id → answer
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub completion_percentage: f64,
    pub current_state: AssessmentState,
    pub linked_documents: Vec<LinkedDocument>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    /// New draft assessment owned by a session, with a generated identifier
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = now_micros();
        Self {
            assessment_id: AssessmentId::generate(),
            session_id: session_id.into(),
            title: None,
            description: None,
            technology_type: None,
            requestor_name: None,
            requestor_email: None,
            answers: serde_json::Map::new(),
            completion_percentage: 0.0,
            current_state: AssessmentState::Draft,
            linked_documents: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Partition key for an assessment id
    pub fn pk_for(id: &AssessmentId) -> String {
        format!("{PK_ASSESSMENT}{id}")
    }
}

impl Entity for Assessment {
    const KIND: EntityType = EntityType::Assessment;

    fn key(&self) -> ItemKey {
        ItemKey::new(Self::pk_for(&self.assessment_id), SK_METADATA)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_meta(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64) {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.version = version;
    }

    fn session_id(&self) -> Option<&str> {
        Some(&self.session_id)
    }

    fn assessment_id(&self) -> Option<&str> {
        Some(self.assessment_id.as_str())
    }

    fn state_wire(&self) -> Option<&'static str> {
        Some(self.current_state.as_str())
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn encode_business(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.insert(ATTR_TITLE.into(), AttrValue::s(title));
        }
        if let Some(desc) = &self.description {
            item.insert(ATTR_DESCRIPTION.into(), AttrValue::s(desc));
        }
        if let Some(tech) = &self.technology_type {
            item.insert(ATTR_TECHNOLOGY_TYPE.into(), AttrValue::s(tech));
        }
        if let Some(name) = &self.requestor_name {
            item.insert(ATTR_REQUESTOR_NAME.into(), AttrValue::s(name));
        }
        if let Some(email) = &self.requestor_email {
            item.insert(ATTR_REQUESTOR_EMAIL.into(), AttrValue::s(email));
        }
        if !self.answers.is_empty() {
            let answers = serde_json::Value::Object(self.answers.clone());
            item.insert(ATTR_ANSWERS.into(), AttrValue::from_json(&answers));
        }
        item.insert(
            ATTR_COMPLETION_PERCENTAGE.into(),
            AttrValue::n_f64(self.completion_percentage),
        );
        if !self.linked_documents.is_empty() {
            // Infallible: LinkedDocument serializes to plain JSON
            if let Ok(docs) = serde_json::to_value(&self.linked_documents) {
                item.insert(ATTR_LINKED_DOCUMENTS.into(), AttrValue::from_json(&docs));
            }
        }
    }

    fn decode(item: &Item) -> Result<Self> {
        let assessment_id = AssessmentId::parse(item.require_s(ATTR_ASSESSMENT_ID)?)?;
        let session_id = item.require_s(ATTR_SESSION_ID)?.to_string();
        let current_state = AssessmentState::parse(item.require_s(ATTR_CURRENT_STATE)?)?;
        let (created_at, updated_at, version) = decode_meta(item)?;

        let answers = match item.get_json(ATTR_ANSWERS) {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let linked_documents = match item.get_json(ATTR_LINKED_DOCUMENTS) {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };

        Ok(Self {
            assessment_id,
            session_id,
            title: item.get_s(ATTR_TITLE).map(str::to_string),
            description: item.get_s(ATTR_DESCRIPTION).map(str::to_string),
            technology_type: item.get_s(ATTR_TECHNOLOGY_TYPE).map(str::to_string),
            requestor_name: item.get_s(ATTR_REQUESTOR_NAME).map(str::to_string),
            requestor_email: item.get_s(ATTR_REQUESTOR_EMAIL).map(str::to_string),
            answers,
            completion_percentage: item.get_f64(ATTR_COMPLETION_PERCENTAGE).unwrap_or(0.0),
            current_state,
            linked_documents,
            version,
            created_at,
            updated_at,
        })
    }
}

/// Uploaded document metadata
///
/// The document payload itself lives in object storage; only the
/// `storage_key` pointer is persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub session_id: String,
    pub assessment_id: Option<AssessmentId>,
    pub filename: String,
    pub file_size: i64,
    pub content_type: String,
    pub storage_key: String,
    pub content_summary: String,
    pub tags: Vec<String>,
    pub status: IngestStatus,
    pub error_message: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// New document record in the `uploading` state
    pub fn new(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = now_micros();
        Self {
            document_id: new_entity_id(),
            session_id: session_id.into(),
            assessment_id: None,
            filename: filename.into(),
            file_size,
            content_type: content_type.into(),
            storage_key: storage_key.into(),
            content_summary: String::new(),
            tags: Vec::new(),
            status: IngestStatus::Uploading,
            error_message: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Partition key for a document id
    pub fn pk_for(document_id: &str) -> String {
        format!("{PK_DOCUMENT}{document_id}")
    }
}

impl Entity for Document {
    const KIND: EntityType = EntityType::Document;

    fn key(&self) -> ItemKey {
        ItemKey::new(Self::pk_for(&self.document_id), SK_METADATA)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_meta(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64) {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.version = version;
    }

    fn session_id(&self) -> Option<&str> {
        Some(&self.session_id)
    }

    fn assessment_id(&self) -> Option<&str> {
        self.assessment_id.as_ref().map(AssessmentId::as_str)
    }

    fn encode_business(&self, item: &mut Item) {
        item.insert(ATTR_DOCUMENT_ID.into(), AttrValue::s(&self.document_id));
        item.insert(ATTR_FILENAME.into(), AttrValue::s(&self.filename));
        item.insert(ATTR_FILE_SIZE.into(), AttrValue::n_i64(self.file_size));
        item.insert(ATTR_CONTENT_TYPE.into(), AttrValue::s(&self.content_type));
        item.insert(ATTR_STORAGE_KEY.into(), AttrValue::s(&self.storage_key));
        item.insert(
            ATTR_CONTENT_SUMMARY.into(),
            AttrValue::s(&self.content_summary),
        );
        if !self.tags.is_empty() {
            item.insert(
                ATTR_TAGS.into(),
                AttrValue::L(self.tags.iter().map(AttrValue::s).collect()),
            );
        }
        item.insert(
            ATTR_PROCESSING_STATUS.into(),
            AttrValue::s(self.status.as_str()),
        );
        if let Some(err) = &self.error_message {
            item.insert(ATTR_ERROR_MESSAGE.into(), AttrValue::s(err));
        }
    }

    fn decode(item: &Item) -> Result<Self> {
        let (created_at, updated_at, version) = decode_meta(item)?;
        let assessment_id = match item.get_s(ATTR_ASSESSMENT_ID) {
            Some(id) => Some(AssessmentId::parse(id)?),
            None => None,
        };
        let tags = match item.get(ATTR_TAGS) {
            Some(AttrValue::L(list)) => list
                .iter()
                .filter_map(|v| v.as_s().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            document_id: item.require_s(ATTR_DOCUMENT_ID)?.to_string(),
            session_id: item.require_s(ATTR_SESSION_ID)?.to_string(),
            assessment_id,
            filename: item.require_s(ATTR_FILENAME)?.to_string(),
            file_size: item.get_i64(ATTR_FILE_SIZE).unwrap_or(0),
            content_type: item.get_s(ATTR_CONTENT_TYPE).unwrap_or_default().to_string(),
            storage_key: item.get_s(ATTR_STORAGE_KEY).unwrap_or_default().to_string(),
            content_summary: item
                .get_s(ATTR_CONTENT_SUMMARY)
                .unwrap_or_default()
                .to_string(),
            tags,
            status: IngestStatus::parse(item.require_s(ATTR_PROCESSING_STATUS)?)?,
            error_message: item.get_s(ATTR_ERROR_MESSAGE).map(str::to_string),
            version,
            created_at,
            updated_at,
        })
    }
}

/// Immutable audit-trail event, stored in its assessment's partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub assessment_id: AssessmentId,
    pub session_id: Option<String>,
    pub event_type: EventType,
    pub description: String,
    pub actor: Option<String>,
    /// Event-specific data
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// New event against an assessment, timestamped now
    pub fn new(
        assessment_id: AssessmentId,
        event_type: EventType,
        description: impl Into<String>,
    ) -> Self {
        let now = now_micros();
        Self {
            event_id: new_entity_id(),
            assessment_id,
            session_id: None,
            event_type,
            description: description.into(),
            actor: None,
            payload: serde_json::Value::Object(serde_json::Map::new()),
            occurred_at: now,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Event {
    const KIND: EntityType = EntityType::Event;

    fn key(&self) -> ItemKey {
        ItemKey::new(
            Assessment::pk_for(&self.assessment_id),
            format!("{SK_EVENT}{}", self.event_id),
        )
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_meta(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64) {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.version = version;
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn assessment_id(&self) -> Option<&str> {
        Some(self.assessment_id.as_str())
    }

    fn event_type_wire(&self) -> Option<&'static str> {
        Some(self.event_type.as_str())
    }

    fn encode_business(&self, item: &mut Item) {
        item.insert(ATTR_EVENT_ID.into(), AttrValue::s(&self.event_id));
        item.insert(ATTR_DESCRIPTION.into(), AttrValue::s(&self.description));
        if let Some(actor) = &self.actor {
            item.insert(ATTR_ACTOR.into(), AttrValue::s(actor));
        }
        if !self.payload.is_null() {
            item.insert(ATTR_PAYLOAD.into(), AttrValue::from_json(&self.payload));
        }
        item.insert(
            ATTR_OCCURRED_AT.into(),
            AttrValue::s(format_timestamp(self.occurred_at)),
        );
    }

    fn decode(item: &Item) -> Result<Self> {
        let (created_at, updated_at, version) = decode_meta(item)?;
        Ok(Self {
            event_id: item.require_s(ATTR_EVENT_ID)?.to_string(),
            assessment_id: AssessmentId::parse(item.require_s(ATTR_ASSESSMENT_ID)?)?,
            session_id: item.get_s(ATTR_SESSION_ID).map(str::to_string),
            event_type: EventType::parse(item.require_s(ATTR_EVENT_TYPE)?)?,
            description: item.get_s(ATTR_DESCRIPTION).unwrap_or_default().to_string(),
            actor: item.get_s(ATTR_ACTOR).map(str::to_string),
            payload: item
                .get_json(ATTR_PAYLOAD)
                .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
            occurred_at: parse_timestamp(item.require_s(ATTR_OCCURRED_AT)?)?,
            version,
            created_at,
            updated_at,
        })
    }
}

/// Chat message within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub assessment_id: Option<AssessmentId>,
    pub role: MessageRole,
    pub content: String,
    pub processed: bool,
    pub sent_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// New message in a session, timestamped now
    pub fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        let now = now_micros();
        Self {
            message_id: new_entity_id(),
            session_id: session_id.into(),
            assessment_id: None,
            role,
            content: content.into(),
            processed: false,
            sent_at: now,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Partition key for a session id
    pub fn pk_for(session_id: &str) -> String {
        format!("{PK_SESSION}{session_id}")
    }
}

impl Entity for Message {
    const KIND: EntityType = EntityType::Message;

    fn key(&self) -> ItemKey {
        ItemKey::new(
            Self::pk_for(&self.session_id),
            format!("{SK_MESSAGE}{}", self.message_id),
        )
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_meta(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64) {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.version = version;
    }

    fn session_id(&self) -> Option<&str> {
        Some(&self.session_id)
    }

    fn assessment_id(&self) -> Option<&str> {
        self.assessment_id.as_ref().map(AssessmentId::as_str)
    }

    fn encode_business(&self, item: &mut Item) {
        item.insert(ATTR_MESSAGE_ID.into(), AttrValue::s(&self.message_id));
        item.insert(ATTR_ROLE.into(), AttrValue::s(self.role.as_str()));
        item.insert(ATTR_CONTENT.into(), AttrValue::s(&self.content));
        item.insert(ATTR_PROCESSED.into(), AttrValue::Bool(self.processed));
        item.insert(
            ATTR_SENT_AT.into(),
            AttrValue::s(format_timestamp(self.sent_at)),
        );
    }

    fn decode(item: &Item) -> Result<Self> {
        let (created_at, updated_at, version) = decode_meta(item)?;
        let assessment_id = match item.get_s(ATTR_ASSESSMENT_ID) {
            Some(id) => Some(AssessmentId::parse(id)?),
            None => None,
        };
        Ok(Self {
            message_id: item.require_s(ATTR_MESSAGE_ID)?.to_string(),
            session_id: item.require_s(ATTR_SESSION_ID)?.to_string(),
            assessment_id,
            role: MessageRole::parse(item.require_s(ATTR_ROLE)?)?,
            content: item.get_s(ATTR_CONTENT).unwrap_or_default().to_string(),
            processed: item.get_bool(ATTR_PROCESSED).unwrap_or(false),
            sent_at: parse_timestamp(item.require_s(ATTR_SENT_AT)?)?,
            version,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::populate;

    #[test]
    fn timestamp_wire_form_sorts_chronologically() {
        let early = Utc::now();
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_timestamp(early) < format_timestamp(late));
    }

    #[test]
    fn assessment_round_trips_through_item() {
        let mut a = Assessment::new("session-1");
        a.title = Some("Azure Migration Review".into());
        a.completion_percentage = 12.5;
        a.answers
            .insert("q1".into(), serde_json::json!("public cloud"));
        let item = populate(&mut a, None);

        let decoded = Assessment::decode(&item).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn document_round_trips_through_item() {
        let mut d = Document::new("session-1", "report.pdf", 4096, "application/pdf", "u/1.pdf");
        d.tags = vec!["cloud".into()];
        d.status = IngestStatus::Ready;
        let item = populate(&mut d, None);

        let decoded = Document::decode(&item).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn event_round_trips_through_item() {
        let id = AssessmentId::parse("TRA-2025-A1B2C3").unwrap();
        let mut e = Event::new(id, EventType::AssessmentReview, "review saved");
        e.actor = Some("assessor-7".into());
        e.payload = serde_json::json!({"risk_rating": 3});
        let item = populate(&mut e, None);

        let decoded = Event::decode(&item).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn message_round_trips_through_item() {
        let mut m = Message::new("session-1", MessageRole::User, "hello");
        let item = populate(&mut m, None);

        let decoded = Message::decode(&item).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn event_key_lives_in_assessment_partition() {
        let id = AssessmentId::parse("TRA-2025-A1B2C3").unwrap();
        let e = Event::new(id, EventType::StateChanged, "state change");
        let key = e.key();
        assert_eq!(key.pk, "ASSESSMENT#TRA-2025-A1B2C3");
        assert!(key.sk.starts_with("EVENT#"));
    }
}
