// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Feedback adapter: immutable annotations on other entities, resolved by
//! creating a new feedback record rather than mutating the original, and
//! threaded via `resolvesFeedbackId`.

use std::sync::Arc;

use futures::future::BoxFuture;
use gg_bus::{EventBus, GovernanceEvent};
use gg_core::{generate_id, EntityType, FeedbackRecord, FeedbackStatus, FeedbackType, Header, Record, RecordKind};
use gg_error::{FieldError, GovernanceError};
use gg_identity::IdentityAdapter;
use gg_store::FileRecordStore;
use serde_json::json;
use tracing::info;

/// A feedback record and its thread of direct and indirect replies.
#[derive(Debug, Clone)]
pub struct FeedbackThreadNode {
    /// The feedback at this node.
    pub feedback: Record<FeedbackRecord>,
    /// Replies (feedback whose `entityType=feedback` targets this node).
    pub children: Vec<FeedbackThreadNode>,
}

/// Feedback adapter.
pub struct FeedbackAdapter {
    store: FileRecordStore<FeedbackRecord>,
    identity: Arc<IdentityAdapter>,
    bus: Arc<EventBus>,
}

impl FeedbackAdapter {
    /// Open the adapter, rooting feedback records at `dir`.
    pub async fn open(
        dir: impl Into<std::path::PathBuf>,
        identity: Arc<IdentityAdapter>,
        bus: Arc<EventBus>,
    ) -> Result<Self, GovernanceError> {
        let identity_for_resolver = identity.clone();
        let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
            let identity = identity_for_resolver.clone();
            Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
        });
        let store = FileRecordStore::open(dir, RecordKind::Feedback, resolver).await?;
        Ok(Self { store, identity, bus })
    }

    fn validate(entity_id: &str, content: &str) -> Result<(), GovernanceError> {
        let mut errors = Vec::new();
        if content.trim().is_empty() {
            errors.push(FieldError::new("content", "must not be empty"));
        }
        if entity_id.trim().is_empty() {
            errors.push(FieldError::new("entityId", "must not be empty"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(errors))
        }
    }

    /// `true` if `candidate` is an assignment still awaiting resolution: no
    /// later feedback both resolves it and carries `status=resolved`.
    fn is_open(candidate: &FeedbackRecord, all: &[Record<FeedbackRecord>]) -> bool {
        candidate.status == FeedbackStatus::Open
            && !all.iter().any(|r| {
                r.payload.resolves_feedback_id.as_deref() == Some(candidate.id.as_str())
                    && r.payload.status == FeedbackStatus::Resolved
            })
    }

    /// Create a feedback record. Rejects a duplicate *open* assignment of
    /// the same task to the same actor.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        feedback_type: FeedbackType,
        content: &str,
        assignee: Option<String>,
        priority: Option<String>,
        tags: Option<Vec<String>>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<FeedbackRecord>, GovernanceError> {
        Self::validate(entity_id, content)?;

        if feedback_type == FeedbackType::Assignment {
            if let Some(assignee_id) = &assignee {
                let existing = self.store.list_records().await?;
                let duplicate = existing.iter().any(|r| {
                    r.payload.entity_id == entity_id
                        && r.payload.feedback_type == FeedbackType::Assignment
                        && r.payload.assignee.as_deref() == Some(assignee_id.as_str())
                        && Self::is_open(&r.payload, &existing)
                });
                if duplicate {
                    return Err(GovernanceError::DuplicateAssignmentError {
                        task_id: entity_id.to_string(),
                        actor_id: assignee_id.clone(),
                    });
                }
            }
        }

        let id = generate_id(RecordKind::Feedback, &slugify(content), timestamp_seconds(timestamp));
        let payload = FeedbackRecord {
            id: id.clone(),
            entity_type,
            entity_id: entity_id.to_string(),
            feedback_type,
            status: FeedbackStatus::Open,
            content: content.to_string(),
            assignee,
            resolves_feedback_id: None,
            priority,
            tags,
        };
        let record = self.sign_and_put(payload, actor_id, role, timestamp).await?;
        self.bus.publish(GovernanceEvent::new(
            "feedback.created",
            "gg-feedback",
            json!({
                "feedbackId": id,
                "entityType": record.payload.entity_type,
                "entityId": record.payload.entity_id,
                "type": record.payload.feedback_type,
                "resolvesFeedbackId": serde_json::Value::Null,
            }),
            timestamp,
        ));
        info!(feedback_id = %id, "feedback created");
        Ok(record)
    }

    /// Resolve `original_id` by creating a new feedback record that points
    /// back at it. Fails if `original_id` does not exist.
    pub async fn resolve(
        &self,
        original_id: &str,
        content: Option<String>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<FeedbackRecord>, GovernanceError> {
        let original = self.store.get(original_id).await?;
        let id = generate_id(RecordKind::Feedback, &slugify(original_id), timestamp_seconds(timestamp));
        let payload = FeedbackRecord {
            id: id.clone(),
            entity_type: EntityType::Feedback,
            entity_id: original_id.to_string(),
            feedback_type: original.payload.feedback_type,
            status: FeedbackStatus::Resolved,
            content: content.unwrap_or_else(|| "Resolved.".to_string()),
            assignee: None,
            resolves_feedback_id: Some(original_id.to_string()),
            priority: None,
            tags: None,
        };
        let record = self.sign_and_put(payload, actor_id, role, timestamp).await?;
        self.bus.publish(GovernanceEvent::new(
            "feedback.created",
            "gg-feedback",
            json!({
                "feedbackId": id,
                "entityType": "feedback",
                "entityId": original_id,
                "resolvesFeedbackId": original_id,
            }),
            timestamp,
        ));
        Ok(record)
    }

    /// Fetch a feedback record by id.
    pub async fn get_feedback(&self, id: &str) -> Result<Record<FeedbackRecord>, GovernanceError> {
        self.store.get(id).await
    }

    /// All feedback targeting `entity_id`, regardless of entity type.
    pub async fn get_feedback_by_entity(&self, entity_id: &str) -> Result<Vec<Record<FeedbackRecord>>, GovernanceError> {
        let all = self.store.list_records().await?;
        Ok(all.into_iter().filter(|r| r.payload.entity_id == entity_id).collect())
    }

    /// Every feedback record currently on disk.
    pub async fn get_all_feedback(&self) -> Result<Vec<Record<FeedbackRecord>>, GovernanceError> {
        self.store.list_records().await
    }

    /// Build the resolution thread rooted at `root_id`: every feedback with
    /// `entityType=feedback` and `entityId=root_id`, recursively, bounded by
    /// `max_depth` (`None` for unbounded).
    pub async fn get_feedback_thread(
        &self,
        root_id: &str,
        max_depth: Option<usize>,
    ) -> Result<FeedbackThreadNode, GovernanceError> {
        let root = self.store.get(root_id).await?;
        let all = self.store.list_records().await?;
        Ok(Self::build_thread(root, &all, max_depth))
    }

    fn build_thread(node: Record<FeedbackRecord>, all: &[Record<FeedbackRecord>], depth_left: Option<usize>) -> FeedbackThreadNode {
        let children = if depth_left == Some(0) {
            Vec::new()
        } else {
            let next_depth = depth_left.map(|d| d - 1);
            all.iter()
                .filter(|r| r.payload.entity_type == EntityType::Feedback && r.payload.entity_id == node.payload.id)
                .cloned()
                .map(|child| Self::build_thread(child, all, next_depth))
                .collect()
        };
        FeedbackThreadNode { feedback: node, children }
    }

    async fn sign_and_put(
        &self,
        payload: FeedbackRecord,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<FeedbackRecord>, GovernanceError> {
        let id = payload.id.clone();
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signatures = self.identity.sign_record(vec![], &payload_value, actor_id, role, None, timestamp).await?;
        let record = Record {
            header: Header::new(RecordKind::Feedback, checksum, signatures),
            payload,
        };
        self.store.put(&id, &record).await?;
        Ok(record)
    }
}

fn slugify(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed: String = slug.split('-').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-");
    let truncated = trimmed.chars().take(32).collect::<String>();
    if truncated.is_empty() {
        "item".to_string()
    } else {
        truncated
    }
}

fn timestamp_seconds(rfc3339: &str) -> u64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.timestamp().max(0) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gg_core::ActorType;

    async fn adapter(dir: &std::path::Path) -> (FeedbackAdapter, Arc<IdentityAdapter>, String) {
        let identity = Arc::new(
            IdentityAdapter::open(dir.join("identity"), dir.join(".session.json"), Arc::new(EventBus::new()))
                .await
                .unwrap(),
        );
        let actor = identity
            .create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let feedback = FeedbackAdapter::open(dir.join("feedback"), identity.clone(), Arc::new(EventBus::new()))
            .await
            .unwrap();
        (feedback, identity, actor.payload.id)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        let record = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Suggestion,
                "Consider renaming this.",
                None,
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        let fetched = feedback.get_feedback(&record.payload.id).await.unwrap();
        assert_eq!(fetched.payload.content, "Consider renaming this.");
    }

    #[tokio::test]
    async fn duplicate_open_assignment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Assignment,
                "Assigned to bob.",
                Some("human:bob".into()),
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        let err = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Assignment,
                "Assigned to bob again.",
                Some("human:bob".into()),
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:01:00Z",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::DuplicateAssignmentError { .. }));
    }

    #[tokio::test]
    async fn resolving_assignment_allows_reassignment() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        let assignment = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Assignment,
                "Assigned to bob.",
                Some("human:bob".into()),
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        feedback
            .resolve(&assignment.payload.id, None, &actor_id, "author", "2024-01-01T00:02:00Z")
            .await
            .unwrap();
        let again = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Assignment,
                "Assigned to bob again.",
                Some("human:bob".into()),
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:03:00Z",
            )
            .await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn resolve_missing_feedback_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        let err = feedback
            .resolve("1700000000-feedback-ghost", None, &actor_id, "author", "2024-01-01T00:00:00Z")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::RecordNotFoundError { .. }));
    }

    #[tokio::test]
    async fn thread_builds_nested_replies() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        let root = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Question,
                "Why this approach?",
                None,
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        let reply = feedback
            .create(
                EntityType::Feedback,
                &root.payload.id,
                FeedbackType::Clarification,
                "Because of legacy constraints.",
                None,
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:01:00Z",
            )
            .await
            .unwrap();
        let thread = feedback.get_feedback_thread(&root.payload.id, None).await.unwrap();
        assert_eq!(thread.children.len(), 1);
        assert_eq!(thread.children[0].feedback.payload.id, reply.payload.id);
    }

    #[tokio::test]
    async fn thread_depth_limit_stops_recursion() {
        let dir = tempfile::tempdir().unwrap();
        let (feedback, _identity, actor_id) = adapter(dir.path()).await;
        let root = feedback
            .create(
                EntityType::Task,
                "1700000000-task-a",
                FeedbackType::Question,
                "Why this approach?",
                None,
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        feedback
            .create(
                EntityType::Feedback,
                &root.payload.id,
                FeedbackType::Clarification,
                "Because reasons.",
                None,
                None,
                None,
                &actor_id,
                "author",
                "2024-01-01T00:01:00Z",
            )
            .await
            .unwrap();
        let thread = feedback.get_feedback_thread(&root.payload.id, Some(0)).await.unwrap();
        assert!(thread.children.is_empty());
    }

    #[test]
    fn slugify_truncates_and_strips_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("???"), "item");
    }
}
