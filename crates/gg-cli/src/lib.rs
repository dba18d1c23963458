// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Library half of the `gg` command-line interface: adapter wiring and
//! command bodies, kept separate from `main` so they can be exercised
//! without spawning the binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use gg_backlog::BacklogAdapter;
use gg_bus::EventBus;
use gg_changelog::ChangelogAdapter;
use gg_core::{RecordKind, TaskRecord};
use gg_error::GovernanceError;
use gg_execution::ExecutionAdapter;
use gg_feedback::FeedbackAdapter;
use gg_identity::IdentityAdapter;
use gg_store::FileRecordStore;

/// Every adapter the CLI drives, opened over one `.gitgov` directory.
/// Commands call straight through to these — the CLI never re-implements
/// adapter logic.
#[derive(Debug)]
pub struct GitgovContext {
    /// Root directory containing `.gitgov`.
    pub root: PathBuf,
    /// Identity adapter.
    pub identity: Arc<IdentityAdapter>,
    /// Feedback adapter.
    pub feedback: Arc<FeedbackAdapter>,
    /// Execution adapter.
    pub execution: Arc<ExecutionAdapter>,
    /// Changelog adapter.
    pub changelog: Arc<ChangelogAdapter>,
    /// Backlog adapter (tasks and cycles).
    pub backlog: BacklogAdapter,
}

impl GitgovContext {
    /// Open every adapter rooted at `<root>/.gitgov`. Fails with
    /// `GovernanceError::RecordNotFoundError` if the directory hasn't been
    /// initialized (use `gg init` first).
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, GovernanceError> {
        let root = root.as_ref().to_path_buf();
        let gitgov_dir = root.join(".gitgov");
        if !tokio::fs::try_exists(gitgov_dir.join("config.json")).await.unwrap_or(false) {
            return Err(GovernanceError::RecordNotFoundError {
                kind: "project".into(),
                id: root.display().to_string(),
            });
        }

        let bus = Arc::new(EventBus::new());
        let identity = Arc::new(IdentityAdapter::open(gitgov_dir.join("identity"), gitgov_dir.join(".session.json"), bus.clone()).await?);

        let identity_for_resolver = identity.clone();
        let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
            let identity = identity_for_resolver.clone();
            Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
        });
        let shared_task_store = Arc::new(FileRecordStore::<TaskRecord>::open(gitgov_dir.join("backlog").join("tasks"), RecordKind::Task, resolver).await?);

        let feedback = Arc::new(FeedbackAdapter::open(gitgov_dir.join("feedback"), identity.clone(), bus.clone()).await?);
        let execution = Arc::new(ExecutionAdapter::open(gitgov_dir.join("executions"), identity.clone(), bus.clone(), Some(shared_task_store.clone())).await?);
        let changelog = Arc::new(ChangelogAdapter::open(gitgov_dir.join("changelogs"), identity.clone(), bus.clone(), shared_task_store.clone(), None).await?);
        let backlog = BacklogAdapter::open(
            gitgov_dir.join("backlog"),
            gitgov_dir.join(".session.json"),
            identity.clone(),
            bus.clone(),
            feedback.clone(),
            execution.clone(),
            changelog.clone(),
        )
        .await?;

        Ok(Self {
            root,
            identity,
            feedback,
            execution,
            changelog,
            backlog,
        })
    }
}

/// Map a [`GovernanceError`] to a stable process exit code. Codes start at
/// 10 so they never collide with clap's own usage-error code (2).
#[must_use]
pub fn exit_code_for(err: &GovernanceError) -> i32 {
    match err {
        GovernanceError::DetailedValidationError(_) => 10,
        GovernanceError::RecordNotFoundError { .. } => 11,
        GovernanceError::ProtocolViolationError { .. } => 12,
        GovernanceError::DuplicateAssignmentError { .. } => 13,
        GovernanceError::BlockingFeedbackError { .. } => 14,
        GovernanceError::InvalidEntityTypeError { .. } => 15,
        GovernanceError::ChecksumMismatchError { .. } => 16,
        GovernanceError::SignatureError { .. } => 17,
        GovernanceError::AtomicOperationError { .. } => 18,
        GovernanceError::NotImplementedError { .. } => 19,
        GovernanceError::Io(_) => 20,
        GovernanceError::Serialization(_) => 21,
    }
}
