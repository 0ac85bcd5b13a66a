//! Document repository
//!
//! Persists upload metadata only; the payload lives in object storage under
//! the record's `storage_key`.

use std::sync::Arc;

use tra_db_core::model::{Document, EntityType};
use tra_db_core::router::QueryShape;
use tra_db_core::schema::SK_METADATA;
use tra_db_core::{Entity, Result, StorageBackend};

use crate::ops::{self, ListOptions};

/// Typed access to document records
#[derive(Debug, Clone)]
pub struct DocumentRepository<B> {
    backend: Arc<B>,
}

impl<B: StorageBackend> DocumentRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Persist a new document record
    pub async fn create(&self, document: Document) -> Result<Document> {
        let created = ops::create_entity(self.backend.as_ref(), document).await?;
        tracing::debug!(
            document_id = %created.document_id,
            filename = %created.filename,
            "document created"
        );
        Ok(created)
    }

    /// Point read; `Ok(None)` when the document does not exist
    pub async fn get(&self, document_id: &str) -> Result<Option<Document>> {
        ops::get_entity(
            self.backend.as_ref(),
            &Document::pk_for(document_id),
            SK_METADATA,
        )
        .await
    }

    /// Read-modify-write under the optimistic version guard
    pub async fn update<F>(&self, document_id: &str, mutate: F) -> Result<Document>
    where
        F: FnMut(&mut Document) + Send,
    {
        ops::update_entity(
            self.backend.as_ref(),
            &Document::pk_for(document_id),
            SK_METADATA,
            mutate,
        )
        .await
    }

    /// Replace the derived summary and extend tags
    pub async fn set_summary(
        &self,
        document_id: &str,
        summary: &str,
        tags: Vec<String>,
    ) -> Result<Document> {
        self.update(document_id, |doc| {
            doc.content_summary = summary.to_string();
            for tag in &tags {
                if !doc.tags.contains(tag) {
                    doc.tags.push(tag.clone());
                }
            }
        })
        .await
    }

    /// Documents uploaded in a session
    pub async fn list_by_session(
        &self,
        session_id: &str,
        opts: ListOptions,
    ) -> Result<Vec<Document>> {
        let shape = QueryShape::ItemsBySession {
            session_id: session_id.to_string(),
            entity_type: Some(EntityType::Document),
        };
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        items.iter().map(Document::decode).collect()
    }
}
