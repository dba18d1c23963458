// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Record model for the gitgov governance kernel.
//!
//! Every persisted object is a [`Record`]: a `header` carrying schema
//! version, record kind, payload checksum, and signatures, plus a typed
//! `payload`. This crate defines the header/record envelope, the per-kind
//! payload shapes, id generation, succession-chain resolution
//! ([`succession`]), and the handful of structural checks every per-kind
//! validator shares ([`validate`]).
//!
//! ```
//! use gg_core::{Header, Record, RecordKind, TaskRecord, TaskStatus};
//!
//! let payload = TaskRecord {
//!     id: "1700000000-task-ship-it".into(),
//!     title: "Ship it".into(),
//!     status: TaskStatus::Draft,
//!     priority: "medium".into(),
//!     description: "Ship the thing".into(),
//!     tags: vec![],
//!     cycle_ids: vec![],
//!     notes: None,
//!     metadata: None,
//! };
//! let checksum = gg_crypto::canonical_checksum(&serde_json::to_value(&payload).unwrap());
//! let header = Header::new(RecordKind::Task, checksum, vec![]);
//! let record = Record { header, payload };
//! assert_eq!(record.payload.title, "Ship it");
//! ```

pub mod succession;
pub mod validate;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const RECORD_SCHEMA_VERSION: &str = "1.0";

/// The kind of record, used for directory names, id prefixes, and the
/// `header.type` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A cryptographic identity.
    Actor,
    /// An automated actor's engine/trigger configuration.
    Agent,
    /// A unit of backlog work.
    Task,
    /// A container of tasks and child cycles.
    Cycle,
    /// An immutable annotation on another entity.
    Feedback,
    /// An append-only log entry recording work on a task.
    Execution,
    /// An append-only release/change record.
    Changelog,
}

impl RecordKind {
    /// The `header.type` string for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Agent => "agent",
            Self::Task => "task",
            Self::Cycle => "cycle",
            Self::Feedback => "feedback",
            Self::Execution => "execution",
            Self::Changelog => "changelog",
        }
    }

    /// The id-grammar prefix for this kind (`exec`, not `execution`, per
    /// the record id grammar in §6).
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Agent => "agent",
            Self::Task => "task",
            Self::Cycle => "cycle",
            Self::Feedback => "feedback",
            Self::Execution => "exec",
            Self::Changelog => "changelog",
        }
    }

    /// Parse a `header.type` string back into a [`RecordKind`].
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "actor" => Self::Actor,
            "agent" => Self::Agent,
            "task" => Self::Task,
            "cycle" => Self::Cycle,
            "feedback" => Self::Feedback,
            "execution" => Self::Execution,
            "changelog" => Self::Changelog,
            _ => return None,
        })
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a record id of the form `"{unixSeconds}-{kind}-{slug}"`.
///
/// Only valid for the five kinds that carry a timestamped id (`task`,
/// `cycle`, `feedback`, `exec`, `changelog`); actor/agent ids use the
/// `{human|agent}:{slug}` grammar instead and are built by the identity
/// adapter directly.
#[must_use]
pub fn generate_id(kind: RecordKind, slug: &str, unix_seconds: u64) -> String {
    format!("{unix_seconds}-{}-{slug}", kind.id_prefix())
}

/// Build an actor/agent id: `"{human|agent}:{slug}[-v{n}]"`.
#[must_use]
pub fn generate_actor_id(actor_type: ActorType, slug: &str, version: Option<u32>) -> String {
    match version {
        Some(n) => format!("{}:{slug}-v{n}", actor_type.as_str()),
        None => format!("{}:{slug}", actor_type.as_str()),
    }
}

/// Validate a record id against `^[0-9]{10,}-(task|cycle|feedback|exec|changelog)-[a-z0-9-]+$`.
#[must_use]
pub fn is_valid_record_id(id: &str) -> bool {
    let Some((ts, rest)) = id.split_once('-') else {
        return false;
    };
    if ts.len() < 10 || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some((kind, slug)) = rest.split_once('-') else {
        return false;
    };
    let known_kind = matches!(kind, "task" | "cycle" | "feedback" | "exec" | "changelog");
    known_kind && !slug.is_empty() && slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Validate an actor/agent id against `^(human|agent):[a-z0-9-]+(-v[0-9]+)?$`.
#[must_use]
pub fn is_valid_actor_id(id: &str) -> bool {
    let Some((prefix, rest)) = id.split_once(':') else {
        return false;
    };
    if prefix != "human" && prefix != "agent" {
        return false;
    }
    if rest.is_empty() {
        return false;
    }
    let slug = match rest.rsplit_once("-v") {
        Some((base, version)) if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => rest,
    };
    !slug.is_empty() && slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Record header: schema version, kind, payload checksum, and signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Record schema version (`"1.0"` for every kind currently defined).
    pub version: String,
    /// Discriminant; matches the record's [`RecordKind`].
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Hex SHA-256 of the canonical serialization of the payload.
    #[serde(rename = "payloadChecksum")]
    pub payload_checksum: String,
    /// Non-empty ordered sequence of signatures; the first is the author.
    pub signatures: Vec<gg_crypto::Signature>,
}

impl Header {
    /// Build a header with the current schema version.
    #[must_use]
    pub fn new(kind: RecordKind, payload_checksum: String, signatures: Vec<gg_crypto::Signature>) -> Self {
        Self {
            version: RECORD_SCHEMA_VERSION.to_string(),
            kind,
            payload_checksum,
            signatures,
        }
    }
}

/// A persisted `{header, payload}` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<T> {
    /// Envelope metadata.
    pub header: Header,
    /// The typed payload.
    pub payload: T,
}

/// Whether an actor identity is human-operated or an automated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    /// A human operator.
    Human,
    /// An automated agent.
    Agent,
}

impl ActorType {
    /// The id-grammar prefix (`human` or `agent`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }
}

/// Lifecycle status of an [`ActorRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorStatus {
    /// May currently sign records.
    Active,
    /// Superseded or retired; signatures still verify via succession.
    Revoked,
}

/// A cryptographic identity, human or agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRecord {
    /// `"{human|agent}:{slug}[-v{n}]"`.
    pub id: String,
    /// Human or agent.
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    /// Display name shown in UIs and logs.
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Base64-encoded Ed25519 public key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Capability roles this actor holds (`author`, `approver:quality`, ...).
    pub roles: Vec<String>,
    /// Active or revoked.
    pub status: ActorStatus,
    /// If revoked, the id of the actor that supersedes this one.
    #[serde(default, rename = "supersededBy", skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

/// Configuration for an automated actor's runtime engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Matches an `ActorRecord.id` with `type=agent`.
    pub id: String,
    /// Name of the engine that executes this agent.
    pub engine: String,
    /// Free-form lifecycle status string (engine-defined).
    pub status: String,
    /// Event types that trigger this agent.
    pub triggers: Vec<String>,
    /// Ids of knowledge sources this agent depends on.
    #[serde(default, rename = "knowledge_dependencies")]
    pub knowledge_dependencies: Vec<String>,
    /// Engine-specific prompt/runtime requirements.
    #[serde(default, rename = "prompt_engine_requirements")]
    pub prompt_engine_requirements: Value,
}

/// Status domain for a [`TaskRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Authored, not yet submitted.
    Draft,
    /// Submitted for approval.
    Review,
    /// Approved, awaiting activation.
    Ready,
    /// Being worked.
    Active,
    /// Paused, typically by blocking feedback.
    Paused,
    /// Completed.
    Done,
    /// Terminal: archived after a changelog references it.
    Archived,
    /// Terminal: discarded by an approver.
    Discarded,
}

impl TaskStatus {
    /// `true` for the two terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Discarded)
    }
}

/// A unit of backlog work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// `"{unixSeconds}-task-{slug}"`.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Free-form priority label (`low`, `medium`, `high`, ...).
    pub priority: String,
    /// Full description.
    pub description: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ids of cycles this task belongs to; symmetric with `cycle.taskIds`.
    #[serde(rename = "cycleIds", default)]
    pub cycle_ids: Vec<String>,
    /// Free-text notes, prefixed by the backlog adapter on discard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Caller-defined metadata bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Status domain for a [`CycleRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    /// Being planned; tasks may still be added/removed freely.
    Planning,
    /// In progress.
    Active,
    /// Terminal: all child cycles/tasks finished.
    Completed,
    /// Terminal: archived.
    Archived,
}

impl CycleStatus {
    /// `true` for the two terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }
}

/// A container of tasks and optional child cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    /// `"{unixSeconds}-cycle-{slug}"`.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Current lifecycle state.
    pub status: CycleStatus,
    /// Ids of tasks in this cycle; symmetric with `task.cycleIds`.
    #[serde(rename = "taskIds", default)]
    pub task_ids: Vec<String>,
    /// Ids of child cycles forming the project hierarchy.
    #[serde(default, rename = "childCycleIds", skip_serializing_if = "Option::is_none")]
    pub child_cycle_ids: Option<Vec<String>>,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Caller-defined metadata bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// What kind of entity a [`FeedbackRecord`] is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Attached to a task.
    Task,
    /// Attached to a cycle.
    Cycle,
    /// Attached to an execution.
    Execution,
    /// Attached to a changelog.
    Changelog,
    /// Attached to another feedback (resolution thread).
    Feedback,
}

/// The communicative intent of a [`FeedbackRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    /// Prevents the target task from remaining active.
    Blocking,
    /// Non-blocking improvement idea.
    Suggestion,
    /// Requests clarification.
    Question,
    /// Sign-off.
    Approval,
    /// Provides the requested clarification.
    Clarification,
    /// Assigns the entity to an actor.
    Assignment,
}

/// Lifecycle status of a [`FeedbackRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    /// Newly created, unaddressed.
    Open,
    /// Seen but not yet resolved.
    Acknowledged,
    /// Addressed by a resolution record.
    Resolved,
    /// Explicitly will not be addressed.
    Wontfix,
}

/// An immutable annotation on another entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// `"{unixSeconds}-feedback-{slug}"`.
    pub id: String,
    /// Kind of entity this feedback targets.
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    /// Id of the targeted entity.
    #[serde(rename = "entityId")]
    pub entity_id: String,
    /// Communicative intent.
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    /// Current status.
    pub status: FeedbackStatus,
    /// Body text.
    pub content: String,
    /// Actor this feedback assigns work to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Id of the feedback this one resolves, forming a resolution thread.
    #[serde(default, rename = "resolvesFeedbackId", skip_serializing_if = "Option::is_none")]
    pub resolves_feedback_id: Option<String>,
    /// Optional priority label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl FeedbackRecord {
    /// `true` if this record is itself a resolution of another feedback.
    #[must_use]
    pub fn is_resolution(&self) -> bool {
        self.resolves_feedback_id.is_some() && self.status == FeedbackStatus::Resolved
    }
}

/// An append-only log entry recording work on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// `"{unixSeconds}-exec-{slug}"`.
    pub id: String,
    /// Task this execution reports on.
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// Outcome description; must be at least 10 characters.
    pub result: String,
    /// Execution kind (`progress`, ...).
    #[serde(rename = "type")]
    pub execution_type: String,
    /// Short title.
    pub title: String,
    /// Free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// External references (commit hashes, URLs, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
}

/// An append-only release/change record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogRecord {
    /// `"{unixSeconds}-changelog-{slug}"`.
    pub id: String,
    /// Title; must be at least 10 characters.
    pub title: String,
    /// Description; must be at least 20 characters.
    pub description: String,
    /// Ids of tasks this changelog covers; must be non-empty and each must exist.
    #[serde(rename = "relatedTasks")]
    pub related_tasks: Vec<String>,
    /// RFC3339 completion timestamp.
    #[serde(rename = "completedAt")]
    pub completed_at: String,
    /// Ids of cycles this changelog covers.
    #[serde(default, rename = "relatedCycles", skip_serializing_if = "Option::is_none")]
    pub related_cycles: Option<Vec<String>>,
    /// Ids of executions this changelog covers.
    #[serde(default, rename = "relatedExecutions", skip_serializing_if = "Option::is_none")]
    pub related_executions: Option<Vec<String>>,
    /// Release version label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Commit hashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<String>>,
    /// Touched file paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
