//! Index Router
//!
//! Maps each logical query shape onto the single secondary index that serves
//! it. The mapping is a fixed exhaustive match, not a cost model: no shape
//! can be served by more than one index, so there is nothing to choose
//! between. Legacy records written before an index existed are reached
//! through a separate, explicitly requested scan plan whose predicates use
//! the key layout and business attributes such records do carry.

use crate::model::{AssessmentState, EntityType};
use crate::schema::*;

/// The closed set of logical queries the store answers
#[derive(Debug, Clone, PartialEq)]
pub enum QueryShape {
    /// All items of a session, optionally narrowed to one entity kind
    ItemsBySession {
        session_id: String,
        entity_type: Option<EntityType>,
    },
    /// Events for an assessment, optionally narrowed by event-type prefix
    EventsByAssessment {
        assessment_id: String,
        event_type_prefix: Option<String>,
    },
    /// Assessments in a lifecycle state
    AssessmentsByState { state: AssessmentState },
    /// Assessments whose case-folded title starts with a prefix
    AssessmentsByTitlePrefix { prefix: String },
    /// All items of one entity kind
    ItemsByType { entity_type: EntityType },
    /// Point lookup by primary key
    ById { pk: String, sk: String },
}

/// Partition-key condition of an index query
///
/// `Prefix` is only produced for the title index; a wide-column Query
/// requires partition equality, so backends serve prefix partitions by
/// scanning the index with a begins-with filter.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMatch {
    Exact(String),
    Prefix(String),
}

/// Sort-key condition of an index query
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Eq(String),
    BeginsWith(String),
}

/// A query against one secondary index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub index: SecondaryIndex,
    pub partition: KeyMatch,
    pub sort: Option<SortCondition>,
    /// Descending sort-key order (recency ordering) when set
    pub newest_first: bool,
    pub limit: Option<usize>,
}

/// A filtered full scan — the degraded path for pre-index records
///
/// Predicates reference the primary-key layout and business attributes,
/// never projection attributes (which legacy records lack by definition).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanPlan {
    pub pk_prefix: Option<String>,
    pub sk_prefix: Option<String>,
    /// attribute = value predicates, all of which must hold
    pub equals: Vec<(&'static str, String)>,
    /// attribute begins-with predicates, all of which must hold
    pub begins: Vec<(&'static str, String)>,
}

/// Resolved access path for a query shape
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Primary-key point read (strongly consistent)
    Get { pk: String, sk: String },
    /// Secondary-index query
    Index(IndexQuery),
    /// Filtered full scan
    Scan(ScanPlan),
}

/// Key-layout predicates that select exactly one entity kind on a scan
fn kind_predicates(entity_type: EntityType) -> (Option<String>, Option<String>) {
    match entity_type {
        // Assessments and their events share the ASSESSMENT# partition;
        // the sort key tells them apart.
        EntityType::Assessment => (Some(PK_ASSESSMENT.into()), Some(SK_METADATA.into())),
        EntityType::Document => (Some(PK_DOCUMENT.into()), Some(SK_METADATA.into())),
        EntityType::Event => (Some(PK_ASSESSMENT.into()), Some(SK_EVENT.into())),
        EntityType::Message => (Some(PK_SESSION.into()), Some(SK_MESSAGE.into())),
    }
}

/// Resolve a query shape to its access path
///
/// `newest_first` requests recency ordering on the shapes whose index sorts
/// by a timestamp; it is ignored for point reads.
pub fn resolve(shape: &QueryShape, newest_first: bool) -> QueryPlan {
    match shape {
        QueryShape::ById { pk, sk } => QueryPlan::Get {
            pk: pk.clone(),
            sk: sk.clone(),
        },
        QueryShape::ItemsBySession {
            session_id,
            entity_type,
        } => QueryPlan::Index(IndexQuery {
            index: SecondaryIndex::SessionEntity,
            partition: KeyMatch::Exact(session_id.clone()),
            sort: entity_type
                .map(|et| SortCondition::Eq(et.as_str().to_string())),
            newest_first,
            limit: None,
        }),
        QueryShape::EventsByAssessment {
            assessment_id,
            event_type_prefix,
        } => QueryPlan::Index(IndexQuery {
            index: SecondaryIndex::AssessmentEvent,
            partition: KeyMatch::Exact(assessment_id.clone()),
            sort: event_type_prefix
                .as_ref()
                .map(|p| SortCondition::BeginsWith(p.clone())),
            newest_first,
            limit: None,
        }),
        QueryShape::AssessmentsByState { state } => QueryPlan::Index(IndexQuery {
            index: SecondaryIndex::StateUpdated,
            partition: KeyMatch::Exact(state.as_str().to_string()),
            sort: None,
            newest_first,
            limit: None,
        }),
        QueryShape::AssessmentsByTitlePrefix { prefix } => QueryPlan::Index(IndexQuery {
            index: SecondaryIndex::TitleCreated,
            partition: KeyMatch::Prefix(prefix.to_lowercase()),
            sort: None,
            newest_first,
            limit: None,
        }),
        QueryShape::ItemsByType { entity_type } => QueryPlan::Index(IndexQuery {
            index: SecondaryIndex::EntityUpdated,
            partition: KeyMatch::Exact(entity_type.as_str().to_string()),
            sort: None,
            newest_first,
            limit: None,
        }),
    }
}

/// Fallback plan for records that predate the relevant index
///
/// Returns `None` for point reads (the primary key is always present).
/// For title search the plan is the bare assessment kind scan: legacy
/// records lack `title_lowercase` entirely, so the caller case-folds
/// stored titles client-side over the scan results.
pub fn legacy_scan(shape: &QueryShape) -> Option<ScanPlan> {
    match shape {
        QueryShape::ById { .. } => None,
        QueryShape::ItemsBySession {
            session_id,
            entity_type,
        } => {
            let (pk_prefix, sk_prefix) = match entity_type {
                Some(et) => kind_predicates(*et),
                None => (None, None),
            };
            Some(ScanPlan {
                pk_prefix,
                sk_prefix,
                equals: vec![(ATTR_SESSION_ID, session_id.clone())],
                begins: Vec::new(),
            })
        }
        QueryShape::EventsByAssessment {
            assessment_id,
            event_type_prefix,
        } => {
            // Legacy events are reachable by key layout alone.
            let mut begins = Vec::new();
            if let Some(prefix) = event_type_prefix {
                begins.push((ATTR_EVENT_TYPE, prefix.clone()));
            }
            Some(ScanPlan {
                pk_prefix: Some(format!("{PK_ASSESSMENT}{assessment_id}")),
                sk_prefix: Some(SK_EVENT.into()),
                equals: Vec::new(),
                begins,
            })
        }
        QueryShape::AssessmentsByState { state } => {
            let (pk_prefix, sk_prefix) = kind_predicates(EntityType::Assessment);
            Some(ScanPlan {
                pk_prefix,
                sk_prefix,
                equals: vec![(ATTR_CURRENT_STATE, state.as_str().to_string())],
                begins: Vec::new(),
            })
        }
        QueryShape::AssessmentsByTitlePrefix { .. } | QueryShape::ItemsByType { .. } => {
            let entity_type = match shape {
                QueryShape::ItemsByType { entity_type } => *entity_type,
                _ => EntityType::Assessment,
            };
            let (pk_prefix, sk_prefix) = kind_predicates(entity_type);
            Some(ScanPlan {
                pk_prefix,
                sk_prefix,
                equals: Vec::new(),
                begins: Vec::new(),
            })
        }
    }
}
