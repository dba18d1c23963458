// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Tagged error catalog for the gitgov governance kernel.
//!
//! Every externally visible error uses a tagged variant name recognizable
//! by callers (see `spec.md` §6 "Error surface"). Adapters never invent ad
//! hoc error strings; they construct one of these variants so the CLI and
//! tool-server layers can map each tag to a distinct user-visible outcome.

use std::collections::BTreeMap;
use std::fmt;

/// A single `(field, message, value)` validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
    /// String form of the offending value, if available.
    pub value: Option<String>,
}

impl FieldError {
    /// Construct a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Attach the offending value's string representation.
    #[must_use]
    pub fn with_value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(v) = &self.value {
            write!(f, " (got {v:?})")?;
        }
        Ok(())
    }
}

/// The tagged error catalog. The variant name itself **is** the external
/// tag; do not rename variants across patch releases.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// A record failed factory/store validation. Carries every failure
    /// found, not just the first (validators accumulate, per spec §4.3).
    #[error("validation failed: {0:?}")]
    DetailedValidationError(Vec<FieldError>),

    /// No record of the requested kind/id exists in the store.
    #[error("record not found: {kind} {id}")]
    RecordNotFoundError {
        /// Record kind (`task`, `cycle`, ...).
        kind: String,
        /// Requested id.
        id: String,
    },

    /// A state transition was attempted from a state that does not permit it.
    #[error("protocol violation: cannot transition {kind} {id} from {from} to {to}")]
    ProtocolViolationError {
        /// Record kind.
        kind: String,
        /// Record id.
        id: String,
        /// Source status.
        from: String,
        /// Requested destination status.
        to: String,
    },

    /// The same (task, actor) pair already has an unresolved open assignment.
    #[error("duplicate open assignment of task {task_id} to actor {actor_id}")]
    DuplicateAssignmentError {
        /// Task id.
        task_id: String,
        /// Actor id.
        actor_id: String,
    },

    /// A transition was rejected because blocking feedback is still open.
    #[error("task {task_id} has {open_count} open blocking feedback item(s)")]
    BlockingFeedbackError {
        /// Task id.
        task_id: String,
        /// Number of still-open blocking feedback records.
        open_count: usize,
    },

    /// A feedback/record referenced an entity type that is not valid here.
    #[error("invalid entity type {entity_type:?} for {context}")]
    InvalidEntityTypeError {
        /// The offending entity type string.
        entity_type: String,
        /// Where the check was performed.
        context: String,
    },

    /// A record's `payloadChecksum` does not match its recomputed hash.
    #[error("checksum mismatch for {kind} {id}")]
    ChecksumMismatchError {
        /// Record kind.
        kind: String,
        /// Record id.
        id: String,
    },

    /// A signature failed to verify against the resolved actor's public key.
    #[error("signature verification failed for key {key_id}")]
    SignatureError {
        /// The `keyId` whose signature failed to verify.
        key_id: String,
    },

    /// A multi-write operation could not be committed atomically and was
    /// rolled back in full.
    #[error("atomic operation failed: {reason}")]
    AtomicOperationError {
        /// Human-readable description of what was rolled back and why.
        reason: String,
    },

    /// The operation is a specified but deliberately unimplemented stub.
    #[error("not implemented: {operation}")]
    NotImplementedError {
        /// Name of the unimplemented operation.
        operation: String,
    },

    /// An I/O error surfaced unwrapped from the filesystem boundary.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GovernanceError {
    /// Stable machine-readable tag for this error, matching the variant name.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DetailedValidationError(_) => "DetailedValidationError",
            Self::RecordNotFoundError { .. } => "RecordNotFoundError",
            Self::ProtocolViolationError { .. } => "ProtocolViolationError",
            Self::DuplicateAssignmentError { .. } => "DuplicateAssignmentError",
            Self::BlockingFeedbackError { .. } => "BlockingFeedbackError",
            Self::InvalidEntityTypeError { .. } => "InvalidEntityTypeError",
            Self::ChecksumMismatchError { .. } => "ChecksumMismatchError",
            Self::SignatureError { .. } => "SignatureError",
            Self::AtomicOperationError { .. } => "AtomicOperationError",
            Self::NotImplementedError { .. } => "NotImplementedError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Build a [`Self::DetailedValidationError`] from a list of field errors.
    #[must_use]
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::DetailedValidationError(errors)
    }

    /// Context pairs useful for structured logging, keyed deterministically.
    #[must_use]
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        match self {
            Self::RecordNotFoundError { kind, id } => {
                ctx.insert("kind".into(), kind.clone());
                ctx.insert("id".into(), id.clone());
            }
            Self::ProtocolViolationError {
                kind,
                id,
                from,
                to,
            } => {
                ctx.insert("kind".into(), kind.clone());
                ctx.insert("id".into(), id.clone());
                ctx.insert("from".into(), from.clone());
                ctx.insert("to".into(), to.clone());
            }
            Self::DuplicateAssignmentError { task_id, actor_id } => {
                ctx.insert("task_id".into(), task_id.clone());
                ctx.insert("actor_id".into(), actor_id.clone());
            }
            Self::BlockingFeedbackError {
                task_id,
                open_count,
            } => {
                ctx.insert("task_id".into(), task_id.clone());
                ctx.insert("open_count".into(), open_count.to_string());
            }
            _ => {}
        }
        ctx
    }
}

impl From<std::io::Error> for GovernanceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_variant_names() {
        let e = GovernanceError::RecordNotFoundError {
            kind: "task".into(),
            id: "1-task-a".into(),
        };
        assert_eq!(e.tag(), "RecordNotFoundError");
    }

    #[test]
    fn validation_error_carries_all_failures() {
        let errs = vec![
            FieldError::new("title", "too short").with_value("x"),
            FieldError::new("status", "unknown status"),
        ];
        let e = GovernanceError::validation(errs.clone());
        match e {
            GovernanceError::DetailedValidationError(v) => assert_eq!(v, errs),
            other => panic!("expected DetailedValidationError, got {other:?}"),
        }
    }

    #[test]
    fn field_error_display_includes_value() {
        let e = FieldError::new("result", "too short").with_value("hi");
        let s = e.to_string();
        assert!(s.contains("result"));
        assert!(s.contains("hi"));
    }

    #[test]
    fn context_extracts_structured_fields() {
        let e = GovernanceError::ProtocolViolationError {
            kind: "task".into(),
            id: "1-task-a".into(),
            from: "draft".into(),
            to: "active".into(),
        };
        let ctx = e.context();
        assert_eq!(ctx.get("from").map(String::as_str), Some("draft"));
        assert_eq!(ctx.get("to").map(String::as_str), Some("active"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::other("disk full");
        let e: GovernanceError = io.into();
        assert_eq!(e.tag(), "IoError");
    }

    #[test]
    fn blocking_feedback_context() {
        let e = GovernanceError::BlockingFeedbackError {
            task_id: "1-task-z".into(),
            open_count: 2,
        };
        assert_eq!(
            e.context().get("open_count").map(String::as_str),
            Some("2")
        );
    }
}
