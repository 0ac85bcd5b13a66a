//! Event repository
//!
//! Events are append-only audit records; there is no update path. They live
//! in their assessment's partition, so the full trail is also reachable by
//! primary key.

use std::sync::Arc;

use tra_db_core::model::{Assessment, Event, EventType};
use tra_db_core::router::QueryShape;
use tra_db_core::schema::SK_EVENT;
use tra_db_core::{AssessmentId, Entity, Result, StorageBackend};

use crate::ops::{self, ListOptions};

/// Typed access to audit events
#[derive(Debug, Clone)]
pub struct EventRepository<B> {
    backend: Arc<B>,
}

impl<B: StorageBackend> EventRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Append an event to its assessment's trail
    pub async fn record(&self, event: Event) -> Result<Event> {
        let recorded = ops::create_entity(self.backend.as_ref(), event).await?;
        tracing::debug!(
            assessment_id = %recorded.assessment_id,
            event_type = recorded.event_type.as_str(),
            "event recorded"
        );
        Ok(recorded)
    }

    /// Point read; `Ok(None)` when the event does not exist
    pub async fn get(
        &self,
        assessment_id: &AssessmentId,
        event_id: &str,
    ) -> Result<Option<Event>> {
        ops::get_entity(
            self.backend.as_ref(),
            &Assessment::pk_for(assessment_id),
            &format!("{SK_EVENT}{event_id}"),
        )
        .await
    }

    /// Events for an assessment, optionally narrowed to one kind
    pub async fn list_by_assessment(
        &self,
        assessment_id: &AssessmentId,
        event_type: Option<EventType>,
        opts: ListOptions,
    ) -> Result<Vec<Event>> {
        let shape = QueryShape::EventsByAssessment {
            assessment_id: assessment_id.to_string(),
            event_type_prefix: event_type.map(|et| et.as_str().to_string()),
        };
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        items.iter().map(Event::decode).collect()
    }

    /// Review events for an assessment
    pub async fn list_reviews(
        &self,
        assessment_id: &AssessmentId,
        opts: ListOptions,
    ) -> Result<Vec<Event>> {
        self.list_by_assessment(assessment_id, Some(EventType::AssessmentReview), opts)
            .await
    }
}
