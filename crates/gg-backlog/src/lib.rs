// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Backlog adapter: the task/cycle state machine and the reactions that
//! other adapters' events trigger against it.
//!
//! [`gg_bus::EventBus`] dispatch is deliberately synchronous (see gg-bus),
//! so the cross-entity reactions named in the task lifecycle — pause on
//! blocking feedback, resume when the last blocking feedback resolves,
//! activate on first execution, archive on changelog — are not wired as
//! bus subscriptions here (that would mean running async file I/O from
//! inside a synchronous callback). Instead [`BacklogAdapter`] exposes them
//! as explicit async methods callers invoke after the triggering adapter
//! publishes its event; `open` still subscribes a logging-only handler to
//! each event so the bus wiring is genuinely exercised.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use gg_bus::{EventBus, GovernanceEvent};
use gg_changelog::ChangelogAdapter;
use gg_config::SessionStore;
use gg_core::{
    generate_id, ChangelogRecord, CycleRecord, CycleStatus, EntityType, ExecutionRecord, FeedbackRecord, FeedbackType,
    Header, Record, RecordKind, TaskRecord, TaskStatus,
};
use gg_error::{FieldError, GovernanceError};
use gg_execution::ExecutionAdapter;
use gg_feedback::FeedbackAdapter;
use gg_identity::IdentityAdapter;
use gg_rules::{default_cycle_transitions, default_task_transitions, TransitionContext, TransitionTable};
use gg_store::FileRecordStore;
use serde_json::json;
use tracing::{debug, info};

fn task_status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Draft => "draft",
        TaskStatus::Review => "review",
        TaskStatus::Ready => "ready",
        TaskStatus::Active => "active",
        TaskStatus::Paused => "paused",
        TaskStatus::Done => "done",
        TaskStatus::Archived => "archived",
        TaskStatus::Discarded => "discarded",
    }
}

fn cycle_status_str(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Planning => "planning",
        CycleStatus::Active => "active",
        CycleStatus::Completed => "completed",
        CycleStatus::Archived => "archived",
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

/// A task's health as seen from outside the backlog's own store — only
/// the blocking-feedback count is specified; richer scoring is left to
/// whatever implementation is wired in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskHealth {
    /// Number of still-open blocking feedback records against the task.
    pub blocking_feedbacks: usize,
}

/// External task-health scoring, consulted by `resumeTask`. The backlog
/// adapter depends on this trait rather than computing health itself, so
/// richer scoring can be swapped in without touching the state machine.
#[async_trait]
pub trait MetricsAdapter: Send + Sync {
    /// Compute the current health of `task_id`.
    async fn get_task_health(&self, task_id: &str) -> Result<TaskHealth, GovernanceError>;
}

/// Default [`MetricsAdapter`]: counts open blocking feedback directly off
/// the feedback store.
struct FeedbackMetricsAdapter {
    feedback: Arc<FeedbackAdapter>,
}

#[async_trait]
impl MetricsAdapter for FeedbackMetricsAdapter {
    async fn get_task_health(&self, task_id: &str) -> Result<TaskHealth, GovernanceError> {
        let all = self.feedback.get_feedback_by_entity(task_id).await?;
        let blocking_feedbacks = all
            .iter()
            .filter(|f| f.payload.feedback_type == FeedbackType::Blocking)
            .filter(|candidate| {
                candidate.payload.status == gg_core::FeedbackStatus::Open
                    && !all.iter().any(|r| {
                        r.payload.resolves_feedback_id.as_deref() == Some(candidate.payload.id.as_str())
                            && r.payload.status == gg_core::FeedbackStatus::Resolved
                    })
            })
            .count();
        Ok(TaskHealth { blocking_feedbacks })
    }
}

/// Backlog adapter: task/cycle CRUD, the lifecycle state machine, and the
/// reactions other adapters' events trigger against it.
pub struct BacklogAdapter {
    task_store: FileRecordStore<TaskRecord>,
    cycle_store: FileRecordStore<CycleRecord>,
    feedback: Arc<FeedbackAdapter>,
    execution: Arc<ExecutionAdapter>,
    changelog: Arc<ChangelogAdapter>,
    identity: Arc<IdentityAdapter>,
    session: SessionStore,
    task_rules: TransitionTable,
    cycle_rules: TransitionTable,
    bus: Arc<EventBus>,
    metrics: Arc<dyn MetricsAdapter>,
}

impl BacklogAdapter {
    /// Open the adapter, rooting task/cycle records at `dir` (`tasks/`,
    /// `cycles/` subdirectories) and the session document at `session_path`.
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        dir: impl Into<std::path::PathBuf>,
        session_path: impl Into<std::path::PathBuf>,
        identity: Arc<IdentityAdapter>,
        bus: Arc<EventBus>,
        feedback: Arc<FeedbackAdapter>,
        execution: Arc<ExecutionAdapter>,
        changelog: Arc<ChangelogAdapter>,
    ) -> Result<Self, GovernanceError> {
        let dir = dir.into();
        let identity_for_resolver = identity.clone();
        let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
            let identity = identity_for_resolver.clone();
            Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
        });
        let task_store = FileRecordStore::open(dir.join("tasks"), RecordKind::Task, resolver.clone()).await?;
        let cycle_store = FileRecordStore::open(dir.join("cycles"), RecordKind::Cycle, resolver).await?;

        for event_type in [
            "feedback.created",
            "execution.created",
            "changelog.created",
            "cycle.status.changed",
            "system.daily_tick",
        ] {
            bus.subscribe(
                event_type,
                Box::new(|event: &GovernanceEvent| {
                    debug!(event_type = %event.event_type, "backlog observed event");
                }),
            );
        }

        let metrics: Arc<dyn MetricsAdapter> = Arc::new(FeedbackMetricsAdapter { feedback: feedback.clone() });

        Ok(Self {
            task_store,
            cycle_store,
            feedback,
            execution,
            changelog,
            identity,
            session: SessionStore::new(session_path),
            task_rules: default_task_transitions(),
            cycle_rules: default_cycle_transitions(),
            bus,
            metrics,
        })
    }

    /// Replace the health-scoring backend consulted by `resumeTask`.
    pub fn set_metrics_adapter(&mut self, metrics: Arc<dyn MetricsAdapter>) {
        self.metrics = metrics;
    }

    async fn actor_roles(&self, actor_id: &str) -> Result<Vec<String>, GovernanceError> {
        Ok(self.identity.get_actor(actor_id).await?.payload.roles)
    }

    async fn set_session_task(&self, actor_id: &str, task_id: Option<&str>) -> Result<(), GovernanceError> {
        let task_id = task_id.map(str::to_string);
        self.session
            .update(|doc| {
                let state = doc.actor_state.entry(actor_id.to_string()).or_default();
                state.active_task_id = task_id;
            })
            .await
            .map_err(|e| GovernanceError::Io(e.to_string()))
    }

    async fn set_session_cycle(&self, actor_id: &str, cycle_id: Option<&str>) -> Result<(), GovernanceError> {
        let cycle_id = cycle_id.map(str::to_string);
        self.session
            .update(|doc| {
                let state = doc.actor_state.entry(actor_id.to_string()).or_default();
                state.active_cycle_id = cycle_id;
            })
            .await
            .map_err(|e| GovernanceError::Io(e.to_string()))
    }

    // ---- Task CRUD ----------------------------------------------------

    /// Author a new task in `draft`.
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: &str,
        tags: Vec<String>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<TaskRecord>, GovernanceError> {
        if title.trim().is_empty() {
            return Err(GovernanceError::validation(vec![FieldError::new("title", "must not be empty")]));
        }
        let id = generate_id(RecordKind::Task, &slugify(title), timestamp_seconds(timestamp));
        let payload = TaskRecord {
            id: id.clone(),
            title: title.to_string(),
            status: TaskStatus::Draft,
            priority: priority.to_string(),
            description: description.to_string(),
            tags,
            cycle_ids: vec![],
            notes: None,
            metadata: None,
        };
        let record = self.sign_and_put_task(payload, vec![], actor_id, role, timestamp).await?;
        self.bus.publish(GovernanceEvent::new(
            "task.created",
            "gg-backlog",
            json!({ "taskId": id }),
            timestamp,
        ));
        info!(task_id = %id, "task created");
        Ok(record)
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, task_id: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        self.task_store.get(task_id).await
    }

    /// All tasks currently on disk.
    pub async fn get_all_tasks(&self) -> Result<Vec<Record<TaskRecord>>, GovernanceError> {
        self.task_store.list_records().await
    }

    /// Mutate a non-terminal task's editable fields (title, description,
    /// priority, tags, notes, metadata) via `mutate`.
    pub async fn update_task(
        &self,
        task_id: &str,
        actor_id: &str,
        role: &str,
        timestamp: &str,
        mutate: impl FnOnce(&mut TaskRecord),
    ) -> Result<Record<TaskRecord>, GovernanceError> {
        let record = self.task_store.get(task_id).await?;
        if record.payload.status.is_terminal() {
            return Err(GovernanceError::ProtocolViolationError {
                kind: "task".into(),
                id: task_id.into(),
                from: task_status_str(record.payload.status).into(),
                to: "update".into(),
            });
        }
        let previous_signatures = record.header.signatures;
        let mut payload = record.payload;
        mutate(&mut payload);
        self.sign_and_put_task(payload, previous_signatures, actor_id, role, timestamp).await
    }

    async fn sign_and_put_task(
        &self,
        payload: TaskRecord,
        previous_signatures: Vec<gg_crypto::Signature>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<TaskRecord>, GovernanceError> {
        let id = payload.id.clone();
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signatures = self.identity.sign_record(previous_signatures, &payload_value, actor_id, role, None, timestamp).await?;
        let record = Record {
            header: Header::new(RecordKind::Task, checksum, signatures),
            payload,
        };
        self.task_store.put(&id, &record).await?;
        Ok(record)
    }

    fn publish_task_status_changed(&self, task_id: &str, old: TaskStatus, new: TaskStatus, timestamp: &str) {
        self.bus.publish(GovernanceEvent::new(
            "task.status.changed",
            "gg-backlog",
            json!({ "taskId": task_id, "oldStatus": task_status_str(old), "newStatus": task_status_str(new) }),
            timestamp,
        ));
    }

    async fn authorize_task_transition(
        &self,
        task_id: &str,
        to: TaskStatus,
        actor_id: &str,
        command: Option<&str>,
    ) -> Result<TaskStatus, GovernanceError> {
        let record = self.task_store.get(task_id).await?;
        let from = record.payload.status;
        let roles = self.actor_roles(actor_id).await?;
        let mut context = TransitionContext::for_actor(roles);
        if let Some(cmd) = command {
            context = context.with_command(cmd);
        }
        let from_str = task_status_str(from);
        let to_str = task_status_str(to);
        if !self.task_rules.is_authorized(RecordKind::Task, from_str, to_str, &context) {
            return Err(GovernanceError::ProtocolViolationError {
                kind: "task".into(),
                id: task_id.into(),
                from: from_str.into(),
                to: to_str.into(),
            });
        }
        Ok(from)
    }

    /// `draft` → `review`, authored by `author`.
    pub async fn submit_task(&self, task_id: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Review, actor_id, Some("submitTask")).await?;
        let result = self.update_task(task_id, actor_id, "author", timestamp, |t| t.status = TaskStatus::Review).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Review, timestamp);
        Ok(result)
    }

    /// `review` → `ready`, approved by `approver:product`.
    pub async fn approve_task(&self, task_id: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Ready, actor_id, Some("approveTask")).await?;
        let result = self.update_task(task_id, actor_id, "approver:product", timestamp, |t| t.status = TaskStatus::Ready).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Ready, timestamp);
        Ok(result)
    }

    /// `ready` → `active`, directly commanded by an `executor` (as opposed
    /// to the automatic activation on first execution; see
    /// [`Self::handle_execution_created`]).
    pub async fn activate_task(&self, task_id: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Active, actor_id, Some("activateTask")).await?;
        let result = self.update_task(task_id, actor_id, "executor", timestamp, |t| t.status = TaskStatus::Active).await?;
        self.set_session_task(actor_id, Some(task_id)).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Active, timestamp);
        Ok(result)
    }

    /// `active` → `paused`, with `reason` recorded in `notes`.
    pub async fn pause_task(&self, task_id: &str, reason: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Paused, actor_id, Some("pauseTask")).await?;
        let result = self
            .update_task(task_id, actor_id, "pauser", timestamp, |t| {
                t.status = TaskStatus::Paused;
                append_note(&mut t.notes, &format!("[PAUSED] {timestamp}: {reason}"));
            })
            .await?;
        self.set_session_task(actor_id, None).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Paused, timestamp);
        Ok(result)
    }

    /// `paused` → `active`. Refuses to resume while blocking feedback is
    /// still open unless `force` is set.
    pub async fn resume_task(&self, task_id: &str, force: bool, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        if !force {
            let open_count = self.metrics.get_task_health(task_id).await?.blocking_feedbacks;
            if open_count > 0 {
                return Err(GovernanceError::BlockingFeedbackError {
                    task_id: task_id.to_string(),
                    open_count,
                });
            }
        }
        let from = self.authorize_task_transition(task_id, TaskStatus::Active, actor_id, Some("resumeTask")).await?;
        let result = self.update_task(task_id, actor_id, "resumer", timestamp, |t| t.status = TaskStatus::Active).await?;
        self.set_session_task(actor_id, Some(task_id)).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Active, timestamp);
        Ok(result)
    }

    /// `active` → `done`, approved by `approver:quality`.
    pub async fn complete_task(&self, task_id: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Done, actor_id, Some("completeTask")).await?;
        let result = self.update_task(task_id, actor_id, "approver:quality", timestamp, |t| t.status = TaskStatus::Done).await?;
        self.set_session_task(actor_id, None).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Done, timestamp);
        Ok(result)
    }

    /// `{ready,active,review}` → `discarded`, approved by `approver:product`
    /// or `approver:quality`. Prepends `[REJECTED]` to `notes` if the task
    /// was in `review`, `[CANCELLED]` if it was `ready` or `active`.
    pub async fn discard_task(&self, task_id: &str, reason: &str, actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Discarded, actor_id, Some("discardTask")).await?;
        let tag = if from == TaskStatus::Review { "[REJECTED]" } else { "[CANCELLED]" };
        let result = self
            .update_task(task_id, actor_id, "approver:product", timestamp, |t| {
                t.status = TaskStatus::Discarded;
                append_note(&mut t.notes, &format!("{tag} {timestamp}: {reason}"));
            })
            .await?;
        self.set_session_task(actor_id, None).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Discarded, timestamp);
        Ok(result)
    }

    /// Physically delete a `draft` task. Only its author may do this.
    pub async fn delete_task(&self, task_id: &str, actor_id: &str) -> Result<(), GovernanceError> {
        let record = self.task_store.get(task_id).await?;
        if record.payload.status != TaskStatus::Draft {
            return Err(GovernanceError::ProtocolViolationError {
                kind: "task".into(),
                id: task_id.into(),
                from: task_status_str(record.payload.status).into(),
                to: "deleted".into(),
            });
        }
        let roles = self.actor_roles(actor_id).await?;
        if !roles.iter().any(|r| r == "author") {
            return Err(GovernanceError::ProtocolViolationError {
                kind: "task".into(),
                id: task_id.into(),
                from: "draft".into(),
                to: "deleted".into(),
            });
        }
        self.task_store.delete(task_id).await
    }

    // ---- Cross-entity reactions ----------------------------------------

    /// React to a feedback record just created: pause an active task hit by
    /// new blocking feedback, or resume a paused task whose last blocking
    /// feedback was just resolved.
    pub async fn handle_feedback_created(&self, feedback: &Record<FeedbackRecord>, system_actor_id: &str, timestamp: &str) -> Result<(), GovernanceError> {
        if feedback.payload.entity_type != EntityType::Task {
            return Ok(());
        }
        if feedback.payload.feedback_type == FeedbackType::Blocking && feedback.payload.status == gg_core::FeedbackStatus::Open {
            let task = self.task_store.get(&feedback.payload.entity_id).await?;
            if task.payload.status == TaskStatus::Active {
                self.system_pause_task(&feedback.payload.entity_id, "blocking feedback opened", system_actor_id, timestamp)
                    .await?;
            }
            return Ok(());
        }
        if feedback.payload.is_resolution() {
            let Some(original_id) = &feedback.payload.resolves_feedback_id else {
                return Ok(());
            };
            let original = self.feedback.get_feedback(original_id).await?;
            if original.payload.entity_type == EntityType::Task && original.payload.feedback_type == FeedbackType::Blocking {
                let task_id = original.payload.entity_id.clone();
                if self.metrics.get_task_health(&task_id).await?.blocking_feedbacks == 0 {
                    let task = self.task_store.get(&task_id).await?;
                    if task.payload.status == TaskStatus::Paused {
                        self.system_resume_task(&task_id, system_actor_id, timestamp).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// React to an execution record just created: activate a `ready` task
    /// on its first execution.
    pub async fn handle_execution_created(&self, execution: &Record<ExecutionRecord>, is_first_execution: bool, system_actor_id: &str, timestamp: &str) -> Result<(), GovernanceError> {
        if !is_first_execution {
            return Ok(());
        }
        let task = self.task_store.get(&execution.payload.task_id).await?;
        if task.payload.status == TaskStatus::Ready {
            self.authorize_task_transition(&execution.payload.task_id, TaskStatus::Active, system_actor_id, None).await?;
            self.update_task(&execution.payload.task_id, system_actor_id, "system", timestamp, |t| t.status = TaskStatus::Active)
                .await?;
            self.publish_task_status_changed(&execution.payload.task_id, TaskStatus::Ready, TaskStatus::Active, timestamp);
        }
        Ok(())
    }

    /// React to a changelog record just created: archive every `done` task
    /// it references.
    pub async fn handle_changelog_created(&self, changelog: &Record<ChangelogRecord>, system_actor_id: &str, timestamp: &str) -> Result<(), GovernanceError> {
        for task_id in &changelog.payload.related_tasks {
            let task = self.task_store.get(task_id).await?;
            if task.payload.status == TaskStatus::Done {
                self.authorize_task_transition(task_id, TaskStatus::Archived, system_actor_id, None).await?;
                self.update_task(task_id, system_actor_id, "system", timestamp, |t| t.status = TaskStatus::Archived)
                    .await?;
                self.publish_task_status_changed(task_id, TaskStatus::Done, TaskStatus::Archived, timestamp);
            }
        }
        Ok(())
    }

    /// No-op hook for a periodic tick; reserved for future housekeeping.
    pub async fn on_daily_tick(&self) {}

    async fn system_pause_task(&self, task_id: &str, reason: &str, system_actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Paused, system_actor_id, None).await?;
        let result = self
            .update_task(task_id, system_actor_id, "system", timestamp, |t| {
                t.status = TaskStatus::Paused;
                append_note(&mut t.notes, &format!("[PAUSED] {timestamp}: {reason}"));
            })
            .await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Paused, timestamp);
        Ok(result)
    }

    async fn system_resume_task(&self, task_id: &str, system_actor_id: &str, timestamp: &str) -> Result<Record<TaskRecord>, GovernanceError> {
        let from = self.authorize_task_transition(task_id, TaskStatus::Active, system_actor_id, None).await?;
        let result = self.update_task(task_id, system_actor_id, "system", timestamp, |t| t.status = TaskStatus::Active).await?;
        self.publish_task_status_changed(task_id, from, TaskStatus::Active, timestamp);
        Ok(result)
    }

    // ---- Stubs -----------------------------------------------------------

    /// Deliberately unimplemented: static analysis over the backlog.
    pub async fn lint(&self) -> Result<(), GovernanceError> {
        Err(GovernanceError::NotImplementedError { operation: "lint".into() })
    }

    /// Deliberately unimplemented: cross-record consistency audit.
    pub async fn audit(&self) -> Result<(), GovernanceError> {
        Err(GovernanceError::NotImplementedError { operation: "audit".into() })
    }

    /// Deliberately unimplemented: bulk change ingestion.
    pub async fn process_changes(&self) -> Result<(), GovernanceError> {
        Err(GovernanceError::NotImplementedError { operation: "processChanges".into() })
    }

    // ---- Cycle CRUD -----------------------------------------------------

    /// Create a new cycle in `planning`.
    pub async fn create_cycle(&self, title: &str, tags: Option<Vec<String>>, actor_id: &str, role: &str, timestamp: &str) -> Result<Record<CycleRecord>, GovernanceError> {
        if title.trim().is_empty() {
            return Err(GovernanceError::validation(vec![FieldError::new("title", "must not be empty")]));
        }
        let id = generate_id(RecordKind::Cycle, &slugify(title), timestamp_seconds(timestamp));
        let payload = CycleRecord {
            id: id.clone(),
            title: title.to_string(),
            status: CycleStatus::Planning,
            task_ids: vec![],
            child_cycle_ids: None,
            tags,
            notes: None,
            metadata: None,
        };
        self.sign_and_put_cycle(payload, vec![], actor_id, role, timestamp).await
    }

    /// Fetch a cycle by id.
    pub async fn get_cycle(&self, cycle_id: &str) -> Result<Record<CycleRecord>, GovernanceError> {
        self.cycle_store.get(cycle_id).await
    }

    /// All cycles currently on disk.
    pub async fn get_all_cycles(&self) -> Result<Vec<Record<CycleRecord>>, GovernanceError> {
        self.cycle_store.list_records().await
    }

    async fn sign_and_put_cycle(
        &self,
        payload: CycleRecord,
        previous_signatures: Vec<gg_crypto::Signature>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<CycleRecord>, GovernanceError> {
        let id = payload.id.clone();
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signatures = self.identity.sign_record(previous_signatures, &payload_value, actor_id, role, None, timestamp).await?;
        let record = Record {
            header: Header::new(RecordKind::Cycle, checksum, signatures),
            payload,
        };
        self.cycle_store.put(&id, &record).await?;
        Ok(record)
    }

    /// Update a non-terminal cycle's fields and, optionally, its status.
    /// Moving to `completed` clears the acting actor's session
    /// `activeCycleId` and propagates completion to the parent cycle if
    /// every sibling is now terminal; moving to `active` sets it.
    pub async fn update_cycle(
        &self,
        cycle_id: &str,
        new_status: Option<CycleStatus>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
        mutate: impl FnOnce(&mut CycleRecord),
    ) -> Result<Record<CycleRecord>, GovernanceError> {
        let record = self.cycle_store.get(cycle_id).await?;
        let from = record.payload.status;
        let previous_signatures = record.header.signatures;
        let mut payload = record.payload;
        mutate(&mut payload);

        if let Some(to) = new_status {
            let from_str = cycle_status_str(from);
            let to_str = cycle_status_str(to);
            let roles = self.actor_roles(actor_id).await?;
            let context = TransitionContext::for_actor(roles);
            if !self.cycle_rules.is_authorized(RecordKind::Cycle, from_str, to_str, &context) {
                return Err(GovernanceError::ProtocolViolationError {
                    kind: "cycle".into(),
                    id: cycle_id.into(),
                    from: from_str.into(),
                    to: to_str.into(),
                });
            }
            payload.status = to;
        }

        let updated = self.sign_and_put_cycle(payload, previous_signatures, actor_id, role, timestamp).await?;

        if let Some(to) = new_status {
            match to {
                CycleStatus::Completed => {
                    self.set_session_cycle(actor_id, None).await?;
                    self.bus.publish(GovernanceEvent::new(
                        "cycle.status.changed",
                        "gg-backlog",
                        json!({ "cycleId": cycle_id, "status": "completed" }),
                        timestamp,
                    ));
                    self.propagate_cycle_completion(cycle_id, actor_id, role, timestamp).await?;
                }
                CycleStatus::Active => {
                    self.set_session_cycle(actor_id, Some(cycle_id)).await?;
                }
                _ => {}
            }
        }
        Ok(updated)
    }

    async fn find_parent_cycle(&self, child_id: &str) -> Result<Option<Record<CycleRecord>>, GovernanceError> {
        let all = self.cycle_store.list_records().await?;
        Ok(all
            .into_iter()
            .find(|c| c.payload.child_cycle_ids.as_ref().is_some_and(|children| children.iter().any(|id| id == child_id))))
    }

    async fn propagate_cycle_completion(&self, just_completed_id: &str, actor_id: &str, role: &str, timestamp: &str) -> Result<(), GovernanceError> {
        let mut current = just_completed_id.to_string();
        loop {
            let Some(parent) = self.find_parent_cycle(&current).await? else {
                return Ok(());
            };
            let children = parent.payload.child_cycle_ids.clone().unwrap_or_default();
            let mut all_terminal = true;
            for child_id in &children {
                let child = self.cycle_store.get(child_id).await?;
                if !child.payload.status.is_terminal() {
                    all_terminal = false;
                    break;
                }
            }
            if !all_terminal || parent.payload.status.is_terminal() {
                return Ok(());
            }
            Box::pin(self.update_cycle(&parent.payload.id, Some(CycleStatus::Completed), actor_id, role, timestamp, |_| {}))
                .await?;
            current = parent.payload.id;
        }
    }

    /// Add `task_id` to `cycle_id`, keeping both sides of the relationship
    /// in sync.
    pub async fn add_task_to_cycle(&self, cycle_id: &str, task_id: &str, actor_id: &str, role: &str, timestamp: &str) -> Result<(), GovernanceError> {
        self.task_store.get(task_id).await?;
        let cycle = self.cycle_store.get(cycle_id).await?;
        let previous_signatures = cycle.header.signatures;
        let mut cycle_payload = cycle.payload;
        if !cycle_payload.task_ids.iter().any(|t| t == task_id) {
            cycle_payload.task_ids.push(task_id.to_string());
        }
        self.sign_and_put_cycle(cycle_payload, previous_signatures, actor_id, role, timestamp).await?;

        self.update_task(task_id, actor_id, role, timestamp, |t| {
            if !t.cycle_ids.iter().any(|c| c == cycle_id) {
                t.cycle_ids.push(cycle_id.to_string());
            }
        })
        .await?;
        Ok(())
    }

    /// Remove `task_ids` from `cycle_id`, keeping both sides in sync.
    pub async fn remove_tasks_from_cycle(&self, cycle_id: &str, task_ids: &[String], actor_id: &str, role: &str, timestamp: &str) -> Result<(), GovernanceError> {
        let cycle = self.cycle_store.get(cycle_id).await?;
        let previous_signatures = cycle.header.signatures;
        let mut cycle_payload = cycle.payload;
        cycle_payload.task_ids.retain(|t| !task_ids.contains(t));
        self.sign_and_put_cycle(cycle_payload, previous_signatures, actor_id, role, timestamp).await?;

        for task_id in task_ids {
            self.update_task(task_id, actor_id, role, timestamp, |t| {
                t.cycle_ids.retain(|c| c != cycle_id);
            })
            .await?;
        }
        Ok(())
    }

    /// Move `task_ids` from `source_cycle_id` to `target_cycle_id`,
    /// all-or-nothing. Rejects if the cycles are the same, any task is not
    /// currently a member of `source_cycle_id`, or any task is in a
    /// terminal state (which `update_task` would refuse mid-move, after
    /// the source cycle's membership had already been written), before
    /// performing any write.
    pub async fn move_tasks_between_cycles(
        &self,
        source_cycle_id: &str,
        target_cycle_id: &str,
        task_ids: &[String],
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<(), GovernanceError> {
        if source_cycle_id == target_cycle_id {
            return Err(GovernanceError::AtomicOperationError {
                reason: "source and target cycle must differ".into(),
            });
        }
        let source = self.cycle_store.get(source_cycle_id).await?;
        self.cycle_store.get(target_cycle_id).await?;
        for task_id in task_ids {
            if !source.payload.task_ids.iter().any(|t| t == task_id) {
                return Err(GovernanceError::AtomicOperationError {
                    reason: format!("task {task_id} is not a member of source cycle {source_cycle_id}"),
                });
            }
            let task = self.task_store.get(task_id).await?;
            if task.payload.status.is_terminal() {
                return Err(GovernanceError::AtomicOperationError {
                    reason: format!("task {task_id} is in a terminal state and cannot be moved"),
                });
            }
        }

        self.remove_tasks_from_cycle(source_cycle_id, task_ids, actor_id, role, timestamp).await?;
        for task_id in task_ids {
            self.add_task_to_cycle(target_cycle_id, task_id, actor_id, role, timestamp).await?;
        }
        Ok(())
    }
}

fn append_note(notes: &mut Option<String>, line: &str) {
    *notes = Some(match notes.take() {
        Some(existing) if !existing.is_empty() => format!("{line}\n{existing}"),
        _ => line.to_string(),
    });
}
