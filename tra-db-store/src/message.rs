//! Message repository

use std::sync::Arc;

use tra_db_core::model::{EntityType, Message};
use tra_db_core::router::QueryShape;
use tra_db_core::schema::SK_MESSAGE;
use tra_db_core::{Entity, Result, StorageBackend};

use crate::ops::{self, ListOptions};

/// Typed access to chat messages
#[derive(Debug, Clone)]
pub struct MessageRepository<B> {
    backend: Arc<B>,
}

impl<B: StorageBackend> MessageRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Append a message to its session
    pub async fn append(&self, message: Message) -> Result<Message> {
        ops::create_entity(self.backend.as_ref(), message).await
    }

    /// Point read; `Ok(None)` when the message does not exist
    pub async fn get(&self, session_id: &str, message_id: &str) -> Result<Option<Message>> {
        ops::get_entity(
            self.backend.as_ref(),
            &Message::pk_for(session_id),
            &format!("{SK_MESSAGE}{message_id}"),
        )
        .await
    }

    /// Mark a message as processed
    pub async fn mark_processed(&self, session_id: &str, message_id: &str) -> Result<Message> {
        ops::update_entity(
            self.backend.as_ref(),
            &Message::pk_for(session_id),
            &format!("{SK_MESSAGE}{message_id}"),
            |message: &mut Message| message.processed = true,
        )
        .await
    }

    /// A session's messages in conversation order
    ///
    /// The session index sorts by entity kind, not time, so chronological
    /// order is restored client-side from `sent_at`.
    pub async fn list_by_session(
        &self,
        session_id: &str,
        opts: ListOptions,
    ) -> Result<Vec<Message>> {
        let shape = QueryShape::ItemsBySession {
            session_id: session_id.to_string(),
            entity_type: Some(EntityType::Message),
        };
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        let mut messages = items
            .iter()
            .map(Message::decode)
            .collect::<Result<Vec<Message>>>()?;
        messages.sort_by(|a, b| (a.sent_at, &a.message_id).cmp(&(b.sent_at, &b.message_id)));
        Ok(messages)
    }
}
