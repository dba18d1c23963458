// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Workflow methodology: a configurable rules engine deciding which
//! record-kind state transitions are legal and which capabilities
//! authorize them.
//!
//! A pure function over configuration, not storage: [`TransitionTable`]
//! holds no references to records or stores, only `(kind, from, to)`
//! capability requirements. The backlog adapter consults it before every
//! status change.

use std::collections::HashMap;

use gg_core::RecordKind;
use serde::{Deserialize, Serialize};

/// A composable predicate evaluated against a [`TransitionContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    /// Always authorized.
    Always,
    /// Never authorized (useful for explicitly-closed edges in config).
    Never,
    /// The acting actor must hold this capability role.
    Role(String),
    /// The triggering command must be exactly this label.
    Command(String),
    /// At least `count` distinct approvals of `role` must be present.
    MinApprovals {
        /// Required approver role.
        role: String,
        /// Minimum distinct approval count.
        count: u32,
    },
    /// All child conditions must hold.
    And(Vec<TransitionCondition>),
    /// At least one child condition must hold.
    Or(Vec<TransitionCondition>),
    /// Negates the inner condition.
    Not(Box<TransitionCondition>),
}

impl TransitionCondition {
    /// Evaluate this condition against `context`.
    #[must_use]
    pub fn matches(&self, context: &TransitionContext) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Role(role) => context.actor_roles.iter().any(|r| r == role),
            Self::Command(cmd) => context.command.as_deref() == Some(cmd.as_str()),
            Self::MinApprovals { role, count } => {
                context.approval_roles.iter().filter(|r| *r == role).count() >= *count as usize
            }
            Self::And(conds) => conds.iter().all(|c| c.matches(context)),
            Self::Or(conds) => conds.iter().any(|c| c.matches(context)),
            Self::Not(inner) => !inner.matches(context),
        }
    }
}

/// Everything a [`TransitionCondition`] needs to decide authorization.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// Capability roles held by the acting actor.
    pub actor_roles: Vec<String>,
    /// Command label that triggered the transition, if any
    /// (`"submitTask"`, `"activateTask"`, ...). `None` for event-triggered
    /// transitions (e.g. the backlog adapter's own reactive handlers).
    pub command: Option<String>,
    /// Roles of actors who have approved this transition so far.
    pub approval_roles: Vec<String>,
}

impl TransitionContext {
    /// Build a context for a single acting actor with no approvals yet.
    #[must_use]
    pub fn for_actor(roles: Vec<String>) -> Self {
        Self {
            actor_roles: roles,
            command: None,
            approval_roles: vec![],
        }
    }

    /// Attach the command label that triggered this transition.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attach accumulated approval roles.
    #[must_use]
    pub fn with_approvals(mut self, approval_roles: Vec<String>) -> Self {
        self.approval_roles = approval_roles;
        self
    }
}

/// A single legal `(from, to)` edge and the condition that authorizes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Source status label.
    pub from: String,
    /// Destination status label.
    pub to: String,
    /// Condition an actor/context must satisfy to take this transition.
    pub condition: TransitionCondition,
}

/// Maps `(RecordKind, from, to)` to the rule authorizing that edge.
///
/// `null` (a missing entry) means "reject" per spec §4.6: an edge that
/// was never registered is not a legal transition, regardless of context.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    rules: HashMap<(RecordKind, String, String), TransitionRule>,
}

impl TransitionTable {
    /// An empty table with no legal transitions registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a legal transition edge.
    pub fn add_rule(&mut self, kind: RecordKind, rule: TransitionRule) {
        let key = (kind, rule.from.clone(), rule.to.clone());
        self.rules.insert(key, rule);
    }

    /// Look up the rule authorizing `kind`'s `from -> to` edge, if any.
    #[must_use]
    pub fn get_transition_rule(&self, kind: RecordKind, from: &str, to: &str) -> Option<&TransitionRule> {
        self.rules.get(&(kind, from.to_string(), to.to_string()))
    }

    /// All rules for `kind` whose source state is `from`, in no particular
    /// order.
    #[must_use]
    pub fn get_available_transitions(&self, kind: RecordKind, from: &str) -> Vec<&TransitionRule> {
        self.rules
            .iter()
            .filter(|((k, f, _), _)| *k == kind && f == from)
            .map(|(_, rule)| rule)
            .collect()
    }

    /// `true` if `context` authorizes the registered `from -> to` edge.
    /// `false` if no such edge is registered at all.
    #[must_use]
    pub fn is_authorized(&self, kind: RecordKind, from: &str, to: &str, context: &TransitionContext) -> bool {
        self.get_transition_rule(kind, from, to)
            .is_some_and(|rule| rule.condition.matches(context))
    }

    /// Convenience authorization check against a bare signer role, useful
    /// when the caller has already resolved the signature to a role and
    /// just needs a yes/no without building a full [`TransitionContext`].
    #[must_use]
    pub fn validate_signature(&self, kind: RecordKind, from: &str, to: &str, signer_role: &str) -> bool {
        self.is_authorized(
            kind,
            from,
            to,
            &TransitionContext::for_actor(vec![signer_role.to_string()]),
        )
    }

    /// Number of registered edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` if no edges are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Seed a [`TransitionTable`] with the task state machine from spec §4.10.
///
/// `"system"` is the role used for event-triggered transitions the backlog
/// adapter performs on behalf of a reactive handler rather than a direct
/// command (first execution, changelog archival, feedback pause/resume).
#[must_use]
pub fn default_task_transitions() -> TransitionTable {
    use TransitionCondition::{Or, Role};
    let mut table = TransitionTable::new();
    let mut add = |from: &str, to: &str, condition: TransitionCondition| {
        table.add_rule(
            RecordKind::Task,
            TransitionRule {
                from: from.to_string(),
                to: to.to_string(),
                condition,
            },
        );
    };
    add("draft", "review", Role("author".into()));
    add("review", "ready", Role("approver:product".into()));
    add("ready", "active", Or(vec![Role("executor".into()), Role("system".into())]));
    add("active", "paused", Or(vec![Role("pauser".into()), Role("system".into())]));
    add("paused", "active", Or(vec![Role("resumer".into()), Role("system".into())]));
    add("active", "done", Role("approver:quality".into()));
    add("done", "archived", Role("system".into()));
    add(
        "ready",
        "discarded",
        Or(vec![Role("approver:product".into()), Role("approver:quality".into())]),
    );
    add(
        "active",
        "discarded",
        Or(vec![Role("approver:product".into()), Role("approver:quality".into())]),
    );
    add(
        "review",
        "discarded",
        Or(vec![Role("approver:product".into()), Role("approver:quality".into())]),
    );
    table
}

/// Seed a [`TransitionTable`] with the cycle state machine from spec §4.10.
///
/// The spec leaves cycle capability gates unspecified beyond "any actor may
/// mutate a non-terminal cycle"; terminal-state rejection is enforced by
/// the backlog adapter (`ProtocolViolationError` on any edge out of a
/// terminal state), not by this table, so every non-terminal edge here is
/// `Always`.
#[must_use]
pub fn default_cycle_transitions() -> TransitionTable {
    use TransitionCondition::Always;
    let mut table = TransitionTable::new();
    let mut add = |from: &str, to: &str| {
        table.add_rule(
            RecordKind::Cycle,
            TransitionRule {
                from: from.to_string(),
                to: to.to_string(),
                condition: Always,
            },
        );
    };
    add("planning", "active");
    add("active", "completed");
    add("planning", "archived");
    add("active", "archived");
    add("completed", "archived");
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_edge_is_rejected() {
        let table = default_task_transitions();
        let ctx = TransitionContext::for_actor(vec!["author".into()]);
        assert!(!table.is_authorized(RecordKind::Task, "draft", "active", &ctx));
    }

    #[test]
    fn role_gate_allows_matching_role() {
        let table = default_task_transitions();
        let ctx = TransitionContext::for_actor(vec!["author".into()]);
        assert!(table.is_authorized(RecordKind::Task, "draft", "review", &ctx));
    }

    #[test]
    fn role_gate_rejects_missing_role() {
        let table = default_task_transitions();
        let ctx = TransitionContext::for_actor(vec!["executor".into()]);
        assert!(!table.is_authorized(RecordKind::Task, "draft", "review", &ctx));
    }

    #[test]
    fn system_role_authorizes_event_triggered_activation() {
        let table = default_task_transitions();
        let ctx = TransitionContext::for_actor(vec!["system".into()]);
        assert!(table.is_authorized(RecordKind::Task, "ready", "active", &ctx));
    }

    #[test]
    fn min_approvals_requires_distinct_count() {
        let mut table = TransitionTable::new();
        table.add_rule(
            RecordKind::Task,
            TransitionRule {
                from: "review".into(),
                to: "ready".into(),
                condition: TransitionCondition::MinApprovals {
                    role: "approver:product".into(),
                    count: 2,
                },
            },
        );
        let one = TransitionContext::for_actor(vec![]).with_approvals(vec!["approver:product".into()]);
        let two = TransitionContext::for_actor(vec![])
            .with_approvals(vec!["approver:product".into(), "approver:product".into()]);
        assert!(!table.is_authorized(RecordKind::Task, "review", "ready", &one));
        assert!(table.is_authorized(RecordKind::Task, "review", "ready", &two));
    }

    #[test]
    fn validate_signature_checks_bare_role() {
        let table = default_task_transitions();
        assert!(table.validate_signature(RecordKind::Task, "active", "done", "approver:quality"));
        assert!(!table.validate_signature(RecordKind::Task, "active", "done", "author"));
    }

    #[test]
    fn available_transitions_lists_every_outgoing_edge() {
        let table = default_task_transitions();
        let from_active = table.get_available_transitions(RecordKind::Task, "active");
        let destinations: Vec<&str> = from_active.iter().map(|r| r.to.as_str()).collect();
        assert!(destinations.contains(&"paused"));
        assert!(destinations.contains(&"done"));
        assert!(destinations.contains(&"discarded"));
    }

    #[test]
    fn cycle_terminal_edges_are_not_prerejected_by_the_table() {
        let table = default_cycle_transitions();
        let ctx = TransitionContext::default();
        assert!(table.is_authorized(RecordKind::Cycle, "completed", "archived", &ctx));
    }

    #[test]
    fn task_and_cycle_tables_do_not_collide() {
        let tasks = default_task_transitions();
        let cycles = default_cycle_transitions();
        assert!(tasks.get_transition_rule(RecordKind::Cycle, "planning", "active").is_none());
        assert!(cycles.get_transition_rule(RecordKind::Task, "draft", "review").is_none());
    }

    #[test]
    fn not_condition_inverts() {
        let cond = TransitionCondition::Not(Box::new(TransitionCondition::Role("banned".into())));
        let ctx = TransitionContext::for_actor(vec!["author".into()]);
        assert!(cond.matches(&ctx));
    }
}
