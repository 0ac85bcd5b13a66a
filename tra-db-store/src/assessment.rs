//! Assessment repository

use std::sync::Arc;

use tra_db_core::model::{Assessment, AssessmentState, EntityType};
use tra_db_core::router::QueryShape;
use tra_db_core::schema::SK_METADATA;
use tra_db_core::{AssessmentId, Entity, Result, StorageBackend};

use crate::ops::{self, ListOptions};

/// How many recent assessments the contains-search inspects
const SEARCH_WINDOW: usize = 100;

/// Typed access to assessment records
#[derive(Debug, Clone)]
pub struct AssessmentRepository<B> {
    backend: Arc<B>,
}

impl<B: StorageBackend> AssessmentRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Persist a new assessment; fails on identifier collision
    pub async fn create(&self, assessment: Assessment) -> Result<Assessment> {
        let created = ops::create_entity(self.backend.as_ref(), assessment).await?;
        tracing::debug!(assessment_id = %created.assessment_id, "assessment created");
        Ok(created)
    }

    /// Point read; `Ok(None)` when the assessment does not exist
    pub async fn get(&self, id: &AssessmentId) -> Result<Option<Assessment>> {
        ops::get_entity(self.backend.as_ref(), &Assessment::pk_for(id), SK_METADATA).await
    }

    /// Read-modify-write under the optimistic version guard
    ///
    /// The mutation closure may run more than once if a concurrent writer
    /// wins the version race; keep it free of side effects.
    pub async fn update<F>(&self, id: &AssessmentId, mutate: F) -> Result<Assessment>
    where
        F: FnMut(&mut Assessment) + Send,
    {
        ops::update_entity(
            self.backend.as_ref(),
            &Assessment::pk_for(id),
            SK_METADATA,
            mutate,
        )
        .await
    }

    /// Assessments in a lifecycle state
    pub async fn list_by_state(
        &self,
        state: AssessmentState,
        opts: ListOptions,
    ) -> Result<Vec<Assessment>> {
        let shape = QueryShape::AssessmentsByState { state };
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        items.iter().map(Assessment::decode).collect()
    }

    /// Assessments whose case-folded title starts with `prefix`
    ///
    /// With `include_legacy`, records written before the title index lack
    /// `title_lowercase`, so the prefix predicate is re-applied client-side
    /// over the merged results.
    pub async fn list_by_title_prefix(
        &self,
        prefix: &str,
        opts: ListOptions,
    ) -> Result<Vec<Assessment>> {
        let shape = QueryShape::AssessmentsByTitlePrefix {
            prefix: prefix.to_string(),
        };
        let prefix_lower = prefix.to_lowercase();
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        let assessments: Result<Vec<Assessment>> =
            items.iter().map(Assessment::decode).collect();
        Ok(assessments?
            .into_iter()
            .filter(|a| {
                a.title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().starts_with(&prefix_lower))
            })
            .collect())
    }

    /// Assessments owned by a session
    pub async fn list_by_session(
        &self,
        session_id: &str,
        opts: ListOptions,
    ) -> Result<Vec<Assessment>> {
        let shape = QueryShape::ItemsBySession {
            session_id: session_id.to_string(),
            entity_type: Some(EntityType::Assessment),
        };
        let items = ops::run_listing(self.backend.as_ref(), &shape, opts).await?;
        items.iter().map(Assessment::decode).collect()
    }

    /// Contains-match search over recent assessments
    ///
    /// Scans the most recently updated [`SEARCH_WINDOW`] assessments and
    /// keeps those whose title or identifier contains `query`,
    /// case-insensitively, newest first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Assessment>> {
        let shape = QueryShape::ItemsByType {
            entity_type: EntityType::Assessment,
        };
        let items =
            ops::run_primary(self.backend.as_ref(), &shape, true, Some(SEARCH_WINDOW)).await?;
        let query_lower = query.to_lowercase();

        let mut matches = Vec::new();
        for item in &items {
            let assessment = Assessment::decode(item)?;
            let title_hit = assessment
                .title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&query_lower));
            let id_hit = assessment
                .assessment_id
                .as_str()
                .to_lowercase()
                .contains(&query_lower);
            if title_hit || id_hit {
                matches.push(assessment);
                if matches.len() >= limit {
                    break;
                }
            }
        }
        Ok(matches)
    }
}
