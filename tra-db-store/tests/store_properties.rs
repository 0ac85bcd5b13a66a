//! End-to-end properties of the entity store over the in-memory backend

use std::sync::Arc;
use std::time::Duration;

use tra_db_core::item::{AttrValue, Item, ItemExt};
use tra_db_core::model::{
    format_timestamp, now_micros, Assessment, AssessmentState, Document, Entity, Event, EventType,
    IngestStatus, Message, MessageRole,
};
use tra_db_core::populate::populate;
use tra_db_core::schema::*;
use tra_db_core::{Error, StorageBackend};
use tra_db_memory::MemoryBackend;
use tra_db_store::{BatchConfig, ListOptions, TraStore};

fn store() -> (Arc<MemoryBackend>, TraStore<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let config = BatchConfig {
        max_in_flight: 4,
        max_retries: 3,
        base_delay: Duration::from_millis(1),
    };
    let store = TraStore::with_batch_config(Arc::clone(&backend), config);
    (backend, store)
}

fn titled_assessment(session: &str, title: &str) -> Assessment {
    let mut a = Assessment::new(session);
    a.title = Some(title.to_string());
    a
}

/// A document record as it was written before the secondary indexes existed:
/// business attributes only, no entity_type or other projection attributes.
fn legacy_document_item(document_id: &str, session_id: &str) -> Item {
    let now = format_timestamp(now_micros());
    let mut item = Item::new();
    item.insert(ATTR_PK.into(), AttrValue::s(format!("DOC#{document_id}")));
    item.insert(ATTR_SK.into(), AttrValue::s(SK_METADATA));
    item.insert(ATTR_DOCUMENT_ID.into(), AttrValue::s(document_id));
    item.insert(ATTR_SESSION_ID.into(), AttrValue::s(session_id));
    item.insert(ATTR_FILENAME.into(), AttrValue::s("legacy.pdf"));
    item.insert(ATTR_PROCESSING_STATUS.into(), AttrValue::s("ready"));
    item.insert(ATTR_CREATED_AT.into(), AttrValue::s(now.clone()));
    item.insert(ATTR_UPDATED_AT.into(), AttrValue::s(now));
    item
}

#[tokio::test]
async fn create_then_get_round_trips_business_fields() {
    let (_, store) = store();
    let mut a = titled_assessment("s-1", "Azure Migration Review");
    a.description = Some("migration of the billing stack".into());
    a.completion_percentage = 37.5;
    a.answers.insert("q1".into(), serde_json::json!("eu-west-1"));

    let created = store.assessments.create(a).await.unwrap();
    let fetched = store
        .assessments
        .get(&created.assessment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_of_absent_id_is_none_not_error() {
    let (_, store) = store();
    let id = tra_db_core::AssessmentId::parse("TRA-2025-0000AA").unwrap();
    assert!(store.assessments.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn stored_projection_attributes_match_business_fields() {
    let (backend, store) = store();
    let created = store
        .assessments
        .create(titled_assessment("s-1", "Azure Migration Review"))
        .await
        .unwrap();

    let updated = store
        .assessments
        .update(&created.assessment_id, |a| {
            a.current_state = AssessmentState::InProgress;
            a.title = Some("Azure Migration REVIEW (phase 2)".into());
        })
        .await
        .unwrap();

    let key = updated.key();
    let item = backend.get_item(&key.pk, &key.sk).await.unwrap().unwrap();
    assert_eq!(item.get_s(ATTR_ENTITY_TYPE), Some("assessment"));
    assert_eq!(item.get_s(ATTR_CURRENT_STATE), Some("in_progress"));
    assert_eq!(
        item.get_s(ATTR_TITLE_LOWER),
        Some("azure migration review (phase 2)")
    );
    assert_eq!(item.get_s(ATTR_SESSION_ID), Some("s-1"));
    assert_eq!(
        item.get_s(ATTR_UPDATED_AT),
        Some(format_timestamp(updated.updated_at).as_str())
    );
    assert_eq!(item.get_i64(ATTR_VERSION), Some(2));
}

#[tokio::test]
async fn successive_updates_have_increasing_timestamps_and_versions() {
    let (_, store) = store();
    let created = store
        .assessments
        .create(Assessment::new("s-1"))
        .await
        .unwrap();

    let first = store
        .assessments
        .update(&created.assessment_id, |a| a.completion_percentage = 10.0)
        .await
        .unwrap();
    let second = store
        .assessments
        .update(&created.assessment_id, |a| a.completion_percentage = 20.0)
        .await
        .unwrap();

    assert!(first.updated_at > created.updated_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(created.version, 1);
    assert_eq!(first.version, 2);
    assert_eq!(second.version, 3);
    assert_eq!(second.created_at, created.created_at);
}

#[tokio::test]
async fn list_by_state_is_complete_and_recency_ordered() {
    let (_, store) = store();
    let mut draft_ids = Vec::new();
    for i in 0..3 {
        let a = store
            .assessments
            .create(titled_assessment("s-1", &format!("draft {i}")))
            .await
            .unwrap();
        draft_ids.push(a.assessment_id.clone());
        // Keep updated_at values distinct so recency order is unambiguous.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let moved = store
        .assessments
        .create(titled_assessment("s-1", "already moving"))
        .await
        .unwrap();
    store
        .assessments
        .update(&moved.assessment_id, |a| {
            a.current_state = AssessmentState::InProgress;
        })
        .await
        .unwrap();

    let drafts = store
        .assessments
        .list_by_state(AssessmentState::Draft, ListOptions::newest_first())
        .await
        .unwrap();

    let listed: Vec<_> = drafts.iter().map(|a| a.assessment_id.clone()).collect();
    let mut expected = draft_ids.clone();
    expected.reverse(); // newest first
    assert_eq!(listed, expected);
    assert!(drafts.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
}

#[tokio::test]
async fn state_transition_moves_between_listings_with_later_timestamp() {
    let (_, store) = store();
    let created = store
        .assessments
        .create(titled_assessment("s-1", "Azure Migration Review"))
        .await
        .unwrap();

    let in_draft = store
        .assessments
        .list_by_state(AssessmentState::Draft, ListOptions::newest_first())
        .await
        .unwrap();
    assert!(in_draft
        .iter()
        .any(|a| a.assessment_id == created.assessment_id));

    let updated = store
        .assessments
        .update(&created.assessment_id, |a| {
            a.current_state = AssessmentState::InProgress;
        })
        .await
        .unwrap();

    let in_draft = store
        .assessments
        .list_by_state(AssessmentState::Draft, ListOptions::newest_first())
        .await
        .unwrap();
    assert!(!in_draft
        .iter()
        .any(|a| a.assessment_id == created.assessment_id));

    let in_progress = store
        .assessments
        .list_by_state(AssessmentState::InProgress, ListOptions::newest_first())
        .await
        .unwrap();
    assert!(in_progress
        .iter()
        .any(|a| a.assessment_id == created.assessment_id));
    assert!(updated.updated_at > created.updated_at);
}

#[tokio::test]
async fn title_prefix_search_is_case_insensitive() {
    let (_, store) = store();
    for title in ["Azure Migration Review", "AZURE Cost Audit", "GCP Review"] {
        store
            .assessments
            .create(titled_assessment("s-1", title))
            .await
            .unwrap();
    }

    let hits = store
        .assessments
        .list_by_title_prefix("azure", ListOptions::default())
        .await
        .unwrap();
    let mut titles: Vec<_> = hits.iter().map(|a| a.title.clone().unwrap()).collect();
    titles.sort();
    assert_eq!(titles, ["AZURE Cost Audit", "Azure Migration Review"]);
}

#[tokio::test]
async fn contains_search_matches_title_and_id() {
    let (_, store) = store();
    let a = store
        .assessments
        .create(titled_assessment("s-1", "Payment Gateway Risk Review"))
        .await
        .unwrap();
    store
        .assessments
        .create(titled_assessment("s-1", "Unrelated"))
        .await
        .unwrap();

    let by_title = store.assessments.search("gateway", 5).await.unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].assessment_id, a.assessment_id);

    let id_fragment = a.assessment_id.as_str()[9..].to_lowercase();
    let by_id = store.assessments.search(&id_fragment, 5).await.unwrap();
    assert!(by_id.iter().any(|hit| hit.assessment_id == a.assessment_id));
}

#[tokio::test]
async fn session_listing_merges_legacy_records_idempotently() {
    let (backend, store) = store();
    backend
        .insert_raw(legacy_document_item("legacy-1", "s-1"))
        .unwrap();
    let modern = store
        .documents
        .create(Document::new("s-1", "new.pdf", 10, "application/pdf", "k/new"))
        .await
        .unwrap();

    // The index path alone cannot see the legacy record.
    let index_only = store
        .documents
        .list_by_session("s-1", ListOptions::default())
        .await
        .unwrap();
    assert_eq!(index_only.len(), 1);
    assert_eq!(index_only[0].document_id, modern.document_id);

    // With the fallback merged in, both appear, without duplicates.
    let opts = ListOptions::default().with_legacy();
    let merged = store.documents.list_by_session("s-1", opts).await.unwrap();
    let ids: Vec<_> = merged.iter().map(|d| d.document_id.clone()).collect();
    assert_eq!(merged.len(), 2);
    assert!(ids.contains(&"legacy-1".to_string()));
    assert!(ids.contains(&modern.document_id));

    // Stable across repeated calls on unchanged data.
    let again = store.documents.list_by_session("s-1", opts).await.unwrap();
    assert_eq!(
        merged.iter().map(|d| &d.document_id).collect::<Vec<_>>(),
        again.iter().map(|d| &d.document_id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn events_listing_supports_kind_filter_and_reviews() {
    let (_, store) = store();
    let a = store
        .assessments
        .create(Assessment::new("s-1"))
        .await
        .unwrap();

    store
        .events
        .record(Event::new(
            a.assessment_id.clone(),
            EventType::AssessmentCreated,
            "assessment created",
        ))
        .await
        .unwrap();
    let mut review = Event::new(
        a.assessment_id.clone(),
        EventType::AssessmentReview,
        "review saved",
    );
    review.actor = Some("assessor-7".into());
    review.payload = serde_json::json!({"risk_rating": 4});
    store.events.record(review).await.unwrap();

    let all = store
        .events
        .list_by_assessment(&a.assessment_id, None, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let reviews = store
        .events
        .list_reviews(&a.assessment_id, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].event_type, EventType::AssessmentReview);
    assert_eq!(reviews[0].payload["risk_rating"], serde_json::json!(4));
}

#[tokio::test]
async fn messages_come_back_in_conversation_order() {
    let (_, store) = store();
    for (role, text) in [
        (MessageRole::User, "what is left to answer?"),
        (MessageRole::Assistant, "two questions on data residency"),
        (MessageRole::User, "answer them from the uploaded doc"),
    ] {
        store
            .messages
            .append(Message::new("s-1", role, text))
            .await
            .unwrap();
    }

    let messages = store
        .messages
        .list_by_session("s-1", ListOptions::default())
        .await
        .unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    assert_eq!(messages[0].content, "what is left to answer?");
}

#[tokio::test]
async fn mark_processed_round_trips() {
    let (_, store) = store();
    let m = store
        .messages
        .append(Message::new("s-1", MessageRole::User, "hello"))
        .await
        .unwrap();
    assert!(!m.processed);

    let updated = store
        .messages
        .mark_processed("s-1", &m.message_id)
        .await
        .unwrap();
    assert!(updated.processed);
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn document_status_walks_ingestion_lifecycle() {
    let (_, store) = store();
    let d = store
        .documents
        .create(Document::new("s-1", "arch.pdf", 2048, "application/pdf", "k/a"))
        .await
        .unwrap();
    assert_eq!(d.status, IngestStatus::Uploading);

    let d = store
        .documents
        .update(&d.document_id, |doc| doc.status = IngestStatus::Processing)
        .await
        .unwrap();
    let d = store
        .documents
        .set_summary(&d.document_id, "reference architecture", vec!["cloud".into()])
        .await
        .unwrap();
    let d = store
        .documents
        .update(&d.document_id, |doc| doc.status = IngestStatus::Ready)
        .await
        .unwrap();

    assert_eq!(d.status, IngestStatus::Ready);
    assert_eq!(d.content_summary, "reference architecture");
    assert_eq!(d.tags, vec!["cloud".to_string()]);
    assert_eq!(d.version, 4);
}

#[tokio::test]
async fn batch_put_retries_unprocessed_items_to_success() {
    let (backend, store) = store();

    let mut items = Vec::new();
    let mut keys = Vec::new();
    for i in 0..30 {
        let mut m = Message::new("s-batch", MessageRole::User, format!("message {i}"));
        items.push(populate(&mut m, None));
        keys.push(m.key());
    }
    // Items 5 and 17 bounce once, then go through.
    backend.reject_batch_puts(keys[5].pk.clone(), keys[5].sk.clone(), 1);
    backend.reject_batch_puts(keys[17].pk.clone(), keys[17].sk.clone(), 1);

    let result = store.batch().put_all(items).await;
    assert_eq!(result.succeeded.len(), 30);
    assert!(result.failed.is_empty());
    for key in &keys {
        assert!(backend.get_item(&key.pk, &key.sk).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn batch_put_reports_permanently_rejected_items_as_failed() {
    let (backend, store) = store();

    let mut items = Vec::new();
    let mut keys = Vec::new();
    for i in 0..10 {
        let mut m = Message::new("s-batch", MessageRole::User, format!("message {i}"));
        items.push(populate(&mut m, None));
        keys.push(m.key());
    }
    backend.reject_batch_puts(keys[3].pk.clone(), keys[3].sk.clone(), usize::MAX);

    let result = store.batch().put_all(items).await;
    assert_eq!(result.succeeded.len(), 9);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(
        result.failed[0].get_s(ATTR_MESSAGE_ID),
        keys[3].sk.strip_prefix(SK_MESSAGE).map(|s| s.to_string()).as_deref()
    );
}

#[tokio::test]
async fn concurrent_updates_both_land_via_version_retry() {
    let (_, store) = store();
    let created = store
        .assessments
        .create(Assessment::new("s-1"))
        .await
        .unwrap();
    let store = Arc::new(store);

    let id_a = created.assessment_id.clone();
    let store_a = Arc::clone(&store);
    let task_a = tokio::spawn(async move {
        store_a
            .assessments
            .update(&id_a, |a| a.completion_percentage = 50.0)
            .await
    });
    let id_b = created.assessment_id.clone();
    let store_b = Arc::clone(&store);
    let task_b = tokio::spawn(async move {
        store_b
            .assessments
            .update(&id_b, |a| {
                a.title = Some("concurrently titled".into());
            })
            .await
    });

    task_a.await.unwrap().unwrap();
    task_b.await.unwrap().unwrap();

    let merged = store
        .assessments
        .get(&created.assessment_id)
        .await
        .unwrap()
        .unwrap();
    // Neither writer's change was silently discarded.
    assert_eq!(merged.completion_percentage, 50.0);
    assert_eq!(merged.title.as_deref(), Some("concurrently titled"));
    assert_eq!(merged.version, 3);
}

#[tokio::test]
async fn create_twice_with_same_id_conflicts() {
    let (_, store) = store();
    let a = store
        .assessments
        .create(Assessment::new("s-1"))
        .await
        .unwrap();

    let mut clone = Assessment::new("s-1");
    clone.assessment_id = a.assessment_id.clone();
    let err = store.assessments.create(clone).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn update_of_missing_entity_is_not_found() {
    let (_, store) = store();
    let id = tra_db_core::AssessmentId::parse("TRA-2025-0000AA").unwrap();
    let err = store
        .assessments
        .update(&id, |a| a.completion_percentage = 1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn link_pass_stamps_documents_and_refreshes_summaries() {
    let (_, store) = store();
    let assessment = store
        .assessments
        .create(titled_assessment("s-1", "Azure Migration Review"))
        .await
        .unwrap();
    let d1 = store
        .documents
        .create(Document::new("s-1", "arch.pdf", 1, "application/pdf", "k/1"))
        .await
        .unwrap();
    let d2 = store
        .documents
        .create(Document::new("s-1", "dataflow.png", 2, "image/png", "k/2"))
        .await
        .unwrap();

    let report = store
        .link_session_documents("s-1", &assessment.assessment_id)
        .await
        .unwrap();
    assert_eq!(report.linked, 2);
    assert_eq!(report.failed, 0);

    for id in [&d1.document_id, &d2.document_id] {
        let doc = store.documents.get(id).await.unwrap().unwrap();
        assert_eq!(doc.assessment_id.as_ref(), Some(&assessment.assessment_id));
    }

    let refreshed = store
        .assessments
        .get(&assessment.assessment_id)
        .await
        .unwrap()
        .unwrap();
    let mut linked: Vec<_> = refreshed
        .linked_documents
        .iter()
        .map(|d| d.filename.clone())
        .collect();
    linked.sort();
    assert_eq!(linked, ["arch.pdf", "dataflow.png"]);

    // Re-running the pass is a no-op, not a duplication.
    let report = store
        .link_session_documents("s-1", &assessment.assessment_id)
        .await
        .unwrap();
    assert_eq!(report.linked, 0);
    let refreshed = store
        .assessments
        .get(&assessment.assessment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.linked_documents.len(), 2);
}
