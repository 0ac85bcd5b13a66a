//! Entity repositories for the TRA store
//!
//! The public write/read surface over a [`StorageBackend`]: one typed
//! repository per entity kind, a concurrency-bounded [`BatchWriter`], and
//! the [`TraStore`] facade that owns all of them.
//!
//! Writes flow repository → populator → backend, so no item reaches the
//! store without its projection attributes. Reads flow repository → index
//! router → backend, with an explicitly requested fallback scan for records
//! that predate an index.
//!
//! ## Usage
//!
//! ```ignore
//! use tra_db_store::TraStore;
//!
//! let store = TraStore::new(backend);
//! let assessment = store.assessments.create(Assessment::new("session-1")).await?;
//! store
//!     .assessments
//!     .update(&assessment.assessment_id, |a| {
//!         a.current_state = AssessmentState::InProgress;
//!     })
//!     .await?;
//! ```

mod assessment;
mod batch;
mod document;
mod event;
mod message;
mod ops;

pub use assessment::AssessmentRepository;
pub use batch::{BatchConfig, BatchResult, BatchWriter};
pub use document::DocumentRepository;
pub use event::EventRepository;
pub use message::MessageRepository;
pub use ops::ListOptions;

use std::collections::HashSet;
use std::sync::Arc;

use tra_db_core::item::ItemExt;
use tra_db_core::model::LinkedDocument;
use tra_db_core::populate::{populate, StoredMeta};
use tra_db_core::schema::ATTR_DOCUMENT_ID;
use tra_db_core::{AssessmentId, Error, Result, StorageBackend};

/// Outcome of a document link pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    /// Documents newly stamped with the assessment id
    pub linked: usize,
    /// Documents whose batch write did not go through
    pub failed: usize,
}

/// Facade owning the four repositories and the batch writer
#[derive(Debug)]
pub struct TraStore<B> {
    pub assessments: AssessmentRepository<B>,
    pub documents: DocumentRepository<B>,
    pub events: EventRepository<B>,
    pub messages: MessageRepository<B>,
    batch: BatchWriter<B>,
}

impl<B: StorageBackend> TraStore<B> {
    /// Build a store over a backend with default batch tuning
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_batch_config(backend, BatchConfig::default())
    }

    /// Build a store with explicit batch tuning
    pub fn with_batch_config(backend: Arc<B>, config: BatchConfig) -> Self {
        Self {
            assessments: AssessmentRepository::new(Arc::clone(&backend)),
            documents: DocumentRepository::new(Arc::clone(&backend)),
            events: EventRepository::new(Arc::clone(&backend)),
            messages: MessageRepository::new(Arc::clone(&backend)),
            batch: BatchWriter::with_config(backend, config),
        }
    }

    /// The bulk writer, for callers with their own pre-populated items
    pub fn batch(&self) -> &BatchWriter<B> {
        &self.batch
    }

    /// Link every document of a session to an assessment
    ///
    /// Stamps `assessment_id` on each session document through the batch
    /// writer, then refreshes the assessment's `linked_documents` summaries
    /// (merged by document id, so re-running the pass is idempotent).
    /// Partial failure is reported, not raised: documents whose write was
    /// dropped by the store stay unlinked and count as `failed`.
    pub async fn link_session_documents(
        &self,
        session_id: &str,
        assessment_id: &AssessmentId,
    ) -> Result<LinkReport> {
        if self.assessments.get(assessment_id).await?.is_none() {
            return Err(Error::not_found(assessment_id.to_string()));
        }

        let documents = self
            .documents
            .list_by_session(session_id, ListOptions::default())
            .await?;
        if documents.is_empty() {
            return Ok(LinkReport {
                linked: 0,
                failed: 0,
            });
        }

        let mut already_linked = Vec::new();
        let mut to_write = Vec::new();
        let mut pending_docs = Vec::new();
        for mut document in documents {
            if document.assessment_id.as_ref() == Some(assessment_id) {
                already_linked.push(document);
                continue;
            }
            let meta = StoredMeta {
                created_at: document.created_at,
                updated_at: document.updated_at,
                version: document.version,
            };
            document.assessment_id = Some(assessment_id.clone());
            to_write.push(populate(&mut document, Some(&meta)));
            pending_docs.push(document);
        }

        let outcome = self.batch.put_all(to_write).await;
        if !outcome.failed.is_empty() {
            tracing::warn!(
                session_id,
                assessment_id = %assessment_id,
                failed = outcome.failed.len(),
                "some documents could not be linked"
            );
        }

        let written_ids: HashSet<&str> = outcome
            .succeeded
            .iter()
            .filter_map(|item| item.get_s(ATTR_DOCUMENT_ID))
            .collect();
        let linked = written_ids.len();

        let summaries: Vec<LinkedDocument> = pending_docs
            .iter()
            .filter(|doc| written_ids.contains(doc.document_id.as_str()))
            .chain(already_linked.iter())
            .map(|doc| LinkedDocument {
                document_id: doc.document_id.clone(),
                filename: doc.filename.clone(),
                content_summary: doc.content_summary.clone(),
                uploaded_at: doc.created_at,
            })
            .collect();

        if !summaries.is_empty() {
            self.assessments
                .update(assessment_id, |assessment| {
                    for summary in &summaries {
                        if !assessment
                            .linked_documents
                            .iter()
                            .any(|d| d.document_id == summary.document_id)
                        {
                            assessment.linked_documents.push(summary.clone());
                        }
                    }
                })
                .await?;
        }

        Ok(LinkReport {
            linked,
            failed: outcome.failed.len(),
        })
    }
}
