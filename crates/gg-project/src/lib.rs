// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Project adapter: trust-root bootstrap, template seeding, and environment
//! validation for a new `.gitgov` working copy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use gg_backlog::BacklogAdapter;
use gg_bus::EventBus;
use gg_changelog::ChangelogAdapter;
use gg_config::{save_config, LastSession, ProjectConfig, SessionStore};
use gg_core::{ActorType, RecordKind, TaskRecord};
use gg_error::GovernanceError;
use gg_execution::ExecutionAdapter;
use gg_feedback::FeedbackAdapter;
use gg_identity::IdentityAdapter;
use gg_store::FileRecordStore;
use tracing::info;

const DEFAULT_AGENT_PROMPT: &str = "# Gitgov agent prompt\n\nFollow the task's acceptance criteria and sign every record you write.\n";

fn slugify(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed: String = slug.split('-').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-");
    let truncated = trimmed.chars().take(32).collect::<String>();
    if truncated.is_empty() {
        "project".to_string()
    } else {
        truncated
    }
}

fn timestamp_seconds(rfc3339: &str) -> u64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.timestamp().max(0) as u64)
        .unwrap_or(0)
}

/// A cycle to seed during [`ProjectAdapter::initialize_project`].
#[derive(Debug, Clone)]
pub struct CycleSeed {
    /// Cycle title.
    pub title: String,
    /// Tags to attach.
    pub tags: Option<Vec<String>>,
}

/// A task to seed during [`ProjectAdapter::initialize_project`], optionally
/// placed into one of the template's seeded cycles by index.
#[derive(Debug, Clone)]
pub struct TaskSeed {
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Task priority.
    pub priority: String,
    /// Tags to attach.
    pub tags: Vec<String>,
    /// Index into [`ProjectTemplate::cycles`] to add this task to, if any.
    pub cycle_index: Option<usize>,
}

/// A named bundle of cycle/task seed payloads applied after bootstrap,
/// each run through the backlog adapter's own validating factory.
#[derive(Debug, Clone, Default)]
pub struct ProjectTemplate {
    /// Cycles to create.
    pub cycles: Vec<CycleSeed>,
    /// Tasks to create.
    pub tasks: Vec<TaskSeed>,
}

/// Options for [`ProjectAdapter::initialize_project`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Human-readable project name.
    pub name: String,
    /// Display name of the human actor bootstrapped as the project's
    /// trust root.
    pub actor_name: String,
    /// Optional cycle/task seed bundle.
    pub template: Option<ProjectTemplate>,
}

/// Outcome of a successful [`ProjectAdapter::initialize_project`] call.
#[derive(Debug, Clone)]
pub struct InitResult {
    /// The generated project id.
    pub project_id: String,
    /// The bootstrap actor's id.
    pub bootstrap_actor_id: String,
    /// `true` iff the bootstrap actor was, at the moment it was created,
    /// the only actor on file (always true for a fresh project).
    pub is_bootstrap: bool,
    /// The root cycle's id.
    pub root_cycle_id: String,
    /// The persisted project configuration.
    pub config: ProjectConfig,
    /// Ids of any cycles created from the template, in template order.
    pub seeded_cycle_ids: Vec<String>,
    /// Ids of any tasks created from the template, in template order.
    pub seeded_task_ids: Vec<String>,
}

/// A filesystem artifact created during an in-progress
/// [`ProjectAdapter::initialize_project`] call, recorded so it can be
/// undone on failure.
#[derive(Debug, Clone)]
pub enum RollbackAction {
    /// A directory (and everything under it) to remove.
    Directory(PathBuf),
    /// A single file to remove.
    File(PathBuf),
}

/// Environment validation and rollback, injected so [`ProjectAdapter`]
/// stays storage-agnostic about what "clean" and "undo" mean.
#[async_trait]
pub trait ProjectInitializer: Send + Sync {
    /// Check that `root` is a valid place to initialize a new project
    /// (e.g. not already initialized).
    async fn validate_environment(&self, root: &Path) -> Result<(), GovernanceError>;
    /// Undo every artifact in `actions`, most recent first.
    async fn rollback(&self, actions: &[RollbackAction]) -> Result<(), GovernanceError>;
}

/// Plain-filesystem [`ProjectInitializer`]: rejects a `root` that already
/// has a `.gitgov/config.json`, and rolls back by removing whatever it's
/// told to.
#[derive(Debug, Clone, Default)]
pub struct FsProjectInitializer;

#[async_trait]
impl ProjectInitializer for FsProjectInitializer {
    async fn validate_environment(&self, root: &Path) -> Result<(), GovernanceError> {
        if tokio::fs::try_exists(root.join(".gitgov").join("config.json")).await.unwrap_or(false) {
            return Err(GovernanceError::AtomicOperationError {
                reason: format!("{} is already an initialized gitgov project", root.display()),
            });
        }
        Ok(())
    }

    async fn rollback(&self, actions: &[RollbackAction]) -> Result<(), GovernanceError> {
        for action in actions.iter().rev() {
            match action {
                RollbackAction::Directory(dir) => {
                    let _ = tokio::fs::remove_dir_all(dir).await;
                }
                RollbackAction::File(file) => {
                    let _ = tokio::fs::remove_file(file).await;
                }
            }
        }
        Ok(())
    }
}

/// VCS integration hook. Only an abstract seam is specified: no concrete
/// VCS client lives in this crate.
#[async_trait]
pub trait StateBranchSync: Send + Sync {
    /// Called once a project has been fully initialized, naming the branch
    /// recorded in its configuration.
    async fn on_project_initialized(&self, root: &Path, branch: &str) -> Result<(), GovernanceError>;
}

/// A [`StateBranchSync`] that does nothing; the default when no VCS
/// integration is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopStateBranchSync;

#[async_trait]
impl StateBranchSync for NoopStateBranchSync {
    async fn on_project_initialized(&self, _root: &Path, _branch: &str) -> Result<(), GovernanceError> {
        Ok(())
    }
}

/// Project adapter: orchestrates `initializeProject` over the identity,
/// backlog, feedback, execution, and changelog adapters.
pub struct ProjectAdapter<I: ProjectInitializer> {
    root: PathBuf,
    initializer: I,
    sync: Arc<dyn StateBranchSync>,
}

impl<I: ProjectInitializer> ProjectAdapter<I> {
    /// Build an adapter rooted at `root`, with no VCS sync hook.
    pub fn new(root: impl Into<PathBuf>, initializer: I) -> Self {
        Self {
            root: root.into(),
            initializer,
            sync: Arc::new(NoopStateBranchSync),
        }
    }

    /// Build an adapter with an explicit VCS sync hook.
    pub fn with_sync(root: impl Into<PathBuf>, initializer: I, sync: Arc<dyn StateBranchSync>) -> Self {
        Self {
            root: root.into(),
            initializer,
            sync,
        }
    }

    /// Validate the environment, then bootstrap a new project: directories,
    /// agent-prompt, trust-root actor, root cycle, optional template
    /// seeding, configuration, and session. Any failure triggers
    /// `rollback()` over everything created so far.
    pub async fn initialize_project(&self, options: InitOptions, timestamp: &str) -> Result<InitResult, GovernanceError> {
        self.initializer.validate_environment(&self.root).await?;

        let mut actions = Vec::new();
        match self.initialize_inner(&options, timestamp, &mut actions).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if let Err(rollback_err) = self.initializer.rollback(&actions).await {
                    tracing::error!(error = %rollback_err, "rollback failed after initialize_project error");
                }
                Err(err)
            }
        }
    }

    async fn initialize_inner(
        &self,
        options: &InitOptions,
        timestamp: &str,
        actions: &mut Vec<RollbackAction>,
    ) -> Result<InitResult, GovernanceError> {
        let gitgov_dir = self.root.join(".gitgov");
        tokio::fs::create_dir_all(&gitgov_dir).await?;
        actions.push(RollbackAction::Directory(gitgov_dir.clone()));

        let agent_prompts_dir = gitgov_dir.join("agent-prompts");
        tokio::fs::create_dir_all(&agent_prompts_dir).await?;
        let prompt_path = agent_prompts_dir.join("default.md");
        tokio::fs::write(&prompt_path, DEFAULT_AGENT_PROMPT).await?;

        let bus = Arc::new(EventBus::new());
        let identity = Arc::new(IdentityAdapter::open(gitgov_dir.join("identity"), gitgov_dir.join(".session.json"), bus.clone()).await?);
        let bootstrap_actor = identity
            .create_actor(
                ActorType::Human,
                &slugify(&options.actor_name),
                &options.actor_name,
                vec!["admin".into(), "author".into(), "approver:product".into(), "approver:quality".into(), "developer".into()],
                timestamp,
            )
            .await?;
        let is_bootstrap = identity.list_actors().await?.len() == 1;
        let actor_id = bootstrap_actor.payload.id.clone();

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

        let root_cycle = backlog.create_cycle("root", None, &actor_id, "admin", timestamp).await?;

        let mut seeded_cycle_ids = Vec::new();
        let mut seeded_task_ids = Vec::new();
        if let Some(template) = &options.template {
            for cycle_seed in &template.cycles {
                let cycle = backlog.create_cycle(&cycle_seed.title, cycle_seed.tags.clone(), &actor_id, "admin", timestamp).await?;
                seeded_cycle_ids.push(cycle.payload.id);
            }
            for task_seed in &template.tasks {
                let task = backlog
                    .create_task(&task_seed.title, &task_seed.description, &task_seed.priority, task_seed.tags.clone(), &actor_id, "author", timestamp)
                    .await?;
                if let Some(cycle_id) = task_seed.cycle_index.and_then(|idx| seeded_cycle_ids.get(idx)) {
                    backlog.add_task_to_cycle(cycle_id, &task.payload.id, &actor_id, "admin", timestamp).await?;
                }
                seeded_task_ids.push(task.payload.id);
            }
        }

        let project_id = format!("{}-{}", slugify(&options.name), timestamp_seconds(timestamp));
        let config = ProjectConfig::new(project_id.clone(), options.name.clone(), root_cycle.payload.id.clone());
        let config_path = gitgov_dir.join("config.json");
        save_config(&config_path, &config).await.map_err(|e| GovernanceError::Io(e.to_string()))?;

        let session = SessionStore::new(gitgov_dir.join(".session.json"));
        session
            .update(|doc| {
                doc.last_session = Some(LastSession {
                    actor_id: actor_id.clone(),
                    timestamp: timestamp.to_string(),
                });
            })
            .await
            .map_err(|e| GovernanceError::Io(e.to_string()))?;

        self.sync.on_project_initialized(&self.root, &config.state.branch).await?;

        info!(project_id = %project_id, actor_id = %actor_id, "project initialized");
        Ok(InitResult {
            project_id,
            bootstrap_actor_id: actor_id,
            is_bootstrap,
            root_cycle_id: root_cycle.payload.id,
            config,
            seeded_cycle_ids,
            seeded_task_ids,
        })
    }

    /// Deliberately unimplemented: updating an already-initialized
    /// project's configuration in place.
    pub async fn update_project_config(&self) -> Result<(), GovernanceError> {
        Err(GovernanceError::NotImplementedError {
            operation: "updateProjectConfig".into(),
        })
    }

    /// Deliberately unimplemented: a human-readable project health report.
    pub async fn generate_project_report(&self) -> Result<(), GovernanceError> {
        Err(GovernanceError::NotImplementedError {
            operation: "generateProjectReport".into(),
        })
    }
}
