// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Execution adapter: an append-only log of work performed against a task.
//!
//! Execution records are never edited or deleted once written; progress is
//! always a new record, never a mutation of a prior one.

use std::sync::Arc;

use futures::future::BoxFuture;
use gg_bus::{EventBus, GovernanceEvent};
use gg_core::{generate_id, ExecutionRecord, Header, Record, RecordKind, TaskRecord};
use gg_error::{FieldError, GovernanceError};
use gg_identity::IdentityAdapter;
use gg_store::FileRecordStore;
use serde_json::json;
use tracing::info;

const MIN_RESULT_LEN: usize = 10;

/// Execution adapter.
pub struct ExecutionAdapter {
    store: FileRecordStore<ExecutionRecord>,
    task_store: Option<Arc<FileRecordStore<TaskRecord>>>,
    identity: Arc<IdentityAdapter>,
    bus: Arc<EventBus>,
}

impl ExecutionAdapter {
    /// Open the adapter, rooting execution records at `dir`.
    ///
    /// `task_store`, if given, is consulted to validate `taskId` on create;
    /// without it the existence check is skipped rather than failing (a
    /// task store is not always in scope for a standalone execution log).
    pub async fn open(
        dir: impl Into<std::path::PathBuf>,
        identity: Arc<IdentityAdapter>,
        bus: Arc<EventBus>,
        task_store: Option<Arc<FileRecordStore<TaskRecord>>>,
    ) -> Result<Self, GovernanceError> {
        let identity_for_resolver = identity.clone();
        let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
            let identity = identity_for_resolver.clone();
            Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
        });
        let store = FileRecordStore::open(dir, RecordKind::Execution, resolver).await?;
        Ok(Self { store, task_store, identity, bus })
    }

    fn validate(task_id: &str, result: &str) -> Result<(), GovernanceError> {
        let mut errors = Vec::new();
        if task_id.trim().is_empty() {
            errors.push(FieldError::new("taskId", "must not be empty"));
        }
        if result.chars().count() < MIN_RESULT_LEN {
            errors.push(FieldError::new("result", format!("must be at least {MIN_RESULT_LEN} characters")).with_value(result));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(errors))
        }
    }

    /// Create an execution record against `task_id`.
    ///
    /// If a task store was supplied, `task_id` must resolve to an existing
    /// task; otherwise the check is skipped. Publishes `execution.created`
    /// with `isFirstExecution` true iff this is the only execution on file
    /// for `task_id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        task_id: &str,
        result: &str,
        execution_type: &str,
        title: &str,
        notes: Option<String>,
        references: Option<Vec<String>>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<ExecutionRecord>, GovernanceError> {
        Self::validate(task_id, result)?;

        if let Some(task_store) = &self.task_store {
            task_store.get(task_id).await?;
        }

        let id = generate_id(RecordKind::Execution, &slugify(title), timestamp_seconds(timestamp));
        let payload = ExecutionRecord {
            id: id.clone(),
            task_id: task_id.to_string(),
            result: result.to_string(),
            execution_type: execution_type.to_string(),
            title: title.to_string(),
            notes,
            references,
        };

        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signatures = self.identity.sign_record(vec![], &payload_value, actor_id, role, None, timestamp).await?;
        let record = Record {
            header: Header::new(RecordKind::Execution, checksum, signatures),
            payload,
        };
        self.store.put(&id, &record).await?;

        let existing_for_task = self.get_executions_by_task(task_id).await?;
        let is_first_execution = existing_for_task.len() == 1;

        self.bus.publish(GovernanceEvent::new(
            "execution.created",
            "gg-execution",
            json!({
                "executionId": id,
                "taskId": task_id,
                "isFirstExecution": is_first_execution,
            }),
            timestamp,
        ));
        info!(execution_id = %id, task_id, is_first_execution, "execution created");
        Ok(record)
    }

    /// Fetch an execution record by id.
    pub async fn get_execution(&self, id: &str) -> Result<Record<ExecutionRecord>, GovernanceError> {
        self.store.get(id).await
    }

    /// Every execution recorded against `task_id`, in unspecified order.
    pub async fn get_executions_by_task(&self, task_id: &str) -> Result<Vec<Record<ExecutionRecord>>, GovernanceError> {
        let all = self.store.list_records().await?;
        Ok(all.into_iter().filter(|r| r.payload.task_id == task_id).collect())
    }

    /// Every execution record currently on disk.
    pub async fn get_all_executions(&self) -> Result<Vec<Record<ExecutionRecord>>, GovernanceError> {
        self.store.list_records().await
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
        "execution".to_string()
    } else {
        truncated
    }
}

fn timestamp_seconds(rfc3339: &str) -> u64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.timestamp().max(0) as u64)
        .unwrap_or(0)
}
