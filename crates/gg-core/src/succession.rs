// SPDX-License-Identifier: MIT OR Apache-2.0
//! Succession-chain resolution across actor key rotations.
//!
//! Mirrors the shape of a hash-chain walk: each revoked actor names its
//! successor via `supersededBy`, and resolution follows that chain to the
//! end. Cycle detection is bounded by the number of actors visited, the
//! same defense a receipt chain uses against a malformed or tampered link.

use crate::{ActorRecord, ActorStatus};

/// Failure modes when walking a succession chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuccessionError {
    /// The chain revisited an id already seen, indicating a cycle.
    #[error("succession chain contains a cycle starting at {start}")]
    Cycle {
        /// The id resolution started from.
        start: String,
    },
    /// The chain pointed at an actor id that does not exist.
    #[error("succession chain broken: {missing} does not exist")]
    Broken {
        /// The missing actor id.
        missing: String,
    },
}

/// Resolve `actor_id` to the final `active` actor in its succession chain.
///
/// `lookup` resolves an actor id to its record, if one exists. Walks
/// `supersededBy` links until an `active` actor is found or the chain
/// ends without one (`Broken`). Revisiting an id already seen in this
/// walk is reported as `Cycle` rather than looping forever.
pub fn resolve_current_actor_id(
    actor_id: &str,
    lookup: impl Fn(&str) -> Option<ActorRecord>,
) -> Result<String, SuccessionError> {
    let mut seen = std::collections::HashSet::new();
    let mut current = actor_id.to_string();
    loop {
        if !seen.insert(current.clone()) {
            return Err(SuccessionError::Cycle {
                start: actor_id.to_string(),
            });
        }
        let Some(record) = lookup(&current) else {
            return Err(SuccessionError::Broken { missing: current });
        };
        match record.status {
            ActorStatus::Active => return Ok(record.id),
            ActorStatus::Revoked => match record.superseded_by {
                Some(next) => current = next,
                None => return Err(SuccessionError::Broken { missing: record.id }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorType;
    use std::collections::HashMap;

    fn actor(id: &str, status: ActorStatus, superseded_by: Option<&str>) -> ActorRecord {
        ActorRecord {
            id: id.to_string(),
            actor_type: ActorType::Human,
            display_name: id.to_string(),
            public_key: "base64key".into(),
            roles: vec!["author".into()],
            status,
            superseded_by: superseded_by.map(str::to_string),
        }
    }

    #[test]
    fn resolves_active_actor_directly() {
        let alice = actor("human:alice", ActorStatus::Active, None);
        let result = resolve_current_actor_id("human:alice", |id| {
            (id == "human:alice").then(|| alice.clone())
        });
        assert_eq!(result.unwrap(), "human:alice");
    }

    #[test]
    fn follows_one_rotation() {
        let mut table = HashMap::new();
        table.insert(
            "human:alice".to_string(),
            actor("human:alice", ActorStatus::Revoked, Some("human:alice-v2")),
        );
        table.insert(
            "human:alice-v2".to_string(),
            actor("human:alice-v2", ActorStatus::Active, None),
        );
        let result = resolve_current_actor_id("human:alice", |id| table.get(id).cloned());
        assert_eq!(result.unwrap(), "human:alice-v2");
    }

    #[test]
    fn detects_cycle() {
        let mut table = HashMap::new();
        table.insert(
            "human:a".to_string(),
            actor("human:a", ActorStatus::Revoked, Some("human:b")),
        );
        table.insert(
            "human:b".to_string(),
            actor("human:b", ActorStatus::Revoked, Some("human:a")),
        );
        let result = resolve_current_actor_id("human:a", |id| table.get(id).cloned());
        assert!(matches!(result, Err(SuccessionError::Cycle { .. })));
    }

    #[test]
    fn reports_broken_chain_for_missing_actor() {
        let result = resolve_current_actor_id("human:ghost", |_| None);
        assert!(matches!(result, Err(SuccessionError::Broken { .. })));
    }

    #[test]
    fn reports_broken_chain_for_dangling_supersession() {
        let mut table = HashMap::new();
        table.insert(
            "human:a".to_string(),
            actor("human:a", ActorStatus::Revoked, Some("human:b")),
        );
        let result = resolve_current_actor_id("human:a", |id| table.get(id).cloned());
        assert!(matches!(result, Err(SuccessionError::Broken { .. })));
    }
}
