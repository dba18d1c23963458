// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end acceptance scenarios spanning the full adapter stack: a
//! fresh project bootstrap, a task's whole lifecycle, cross-entity
//! reactions (feedback, execution, changelog), cycle-completion
//! propagation, and key rotation.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use gg_backlog::BacklogAdapter;
use gg_bus::{EventBus, GovernanceEvent};
use gg_changelog::ChangelogAdapter;
use gg_config::SessionStore;
use gg_core::{ActorType, CycleStatus, EntityType, FeedbackType, RecordKind, TaskRecord, TaskStatus};
use gg_execution::ExecutionAdapter;
use gg_feedback::FeedbackAdapter;
use gg_identity::IdentityAdapter;
use gg_project::{FsProjectInitializer, InitOptions, ProjectAdapter};
use gg_store::FileRecordStore;

/// A recorder that subscribes to every event type it's given and keeps a
/// flat, registration-order log of `(event_type, payload)` pairs.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(String, serde_json::Value)>>>);

impl Recorder {
    fn attach(&self, bus: &EventBus, event_type: &'static str) {
        let log = self.0.clone();
        bus.subscribe(event_type, Box::new(move |event: &GovernanceEvent| {
            log.lock().unwrap().push((event.event_type.clone(), event.payload.clone()));
        }));
    }

    fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, event_type: &str) -> usize {
        self.events().iter().filter(|(t, _)| t == event_type).count()
    }
}

/// Every adapter opened over one working directory, built the same way
/// `gg-project` and `gg-cli` build it, with a shared `bus` handle kept
/// around so tests can attach event recorders.
struct Harness {
    bus: Arc<EventBus>,
    identity: Arc<IdentityAdapter>,
    feedback: Arc<FeedbackAdapter>,
    execution: Arc<ExecutionAdapter>,
    #[allow(dead_code)]
    changelog: Arc<ChangelogAdapter>,
    backlog: BacklogAdapter,
}

async fn open_harness(dir: &std::path::Path) -> Harness {
    let bus = Arc::new(EventBus::new());
    let identity = Arc::new(
        IdentityAdapter::open(dir.join("identity"), dir.join(".session.json"), bus.clone())
            .await
            .unwrap(),
    );

    let identity_for_resolver = identity.clone();
    let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
        let identity = identity_for_resolver.clone();
        Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
    });
    let shared_task_store = Arc::new(FileRecordStore::<TaskRecord>::open(dir.join("backlog/tasks"), RecordKind::Task, resolver).await.unwrap());

    let feedback = Arc::new(FeedbackAdapter::open(dir.join("feedback"), identity.clone(), bus.clone()).await.unwrap());
    let execution = Arc::new(ExecutionAdapter::open(dir.join("executions"), identity.clone(), bus.clone(), Some(shared_task_store.clone())).await.unwrap());
    let changelog = Arc::new(ChangelogAdapter::open(dir.join("changelogs"), identity.clone(), bus.clone(), shared_task_store.clone(), None).await.unwrap());
    let backlog = BacklogAdapter::open(
        dir.join("backlog"),
        dir.join(".session.json"),
        identity.clone(),
        bus.clone(),
        feedback.clone(),
        execution.clone(),
        changelog.clone(),
    )
    .await
    .unwrap();

    Harness { bus, identity, feedback, execution, changelog, backlog }
}

/// Scenario 1: bootstrapping a brand-new project creates exactly one
/// human actor holding `author`, one cycle titled `root`, and a
/// configuration file whose `rootCycle` names that cycle.
#[tokio::test]
async fn bootstrap_and_first_task() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = ProjectAdapter::new(dir.path(), FsProjectInitializer);
    let result = adapter
        .initialize_project(
            InitOptions { name: "demo".into(), actor_name: "Owner".into(), template: None },
            "2024-01-01T00:00:00Z",
        )
        .await
        .unwrap();

    assert!(result.is_bootstrap);
    assert_eq!(result.config.root_cycle, result.root_cycle_id);

    let harness = open_harness(&dir.path().join(".gitgov")).await;
    let actors = harness.identity.list_actors().await.unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].payload.actor_type, ActorType::Human);
    assert!(actors[0].payload.roles.iter().any(|r| r == "author"));

    let cycle = harness.backlog.get_cycle(&result.root_cycle_id).await.unwrap();
    assert_eq!(cycle.payload.title, "root");

    let task = harness
        .backlog
        .create_task("First task", "Kick off the project", "medium", vec![], &result.bootstrap_actor_id, "author", "2024-01-01T00:01:00Z")
        .await
        .unwrap();
    assert_eq!(task.payload.status, TaskStatus::Draft);
}

/// Scenario 2: a blocking feedback pauses an active task and its
/// resolution resumes it, each transition raising one `task.status.changed`.
#[tokio::test]
async fn pause_and_resume_via_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let h = open_harness(dir.path()).await;
    let recorder = Recorder::default();
    recorder.attach(&h.bus, "task.status.changed");

    let author = h.identity.create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let approver = h.identity.create_actor(ActorType::Human, "bob", "Bob", vec!["approver:product".into(), "approver:quality".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let executor = h.identity.create_actor(ActorType::Human, "carol", "Carol", vec!["executor".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let system = h.identity.create_actor(ActorType::Agent, "gitgov", "Gitgov System", vec!["system".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;

    let task = h.backlog.create_task("T1", "Do the thing", "medium", vec![], &author, "author", "2024-01-01T00:01:00Z").await.unwrap();
    let task_id = task.payload.id;
    h.backlog.submit_task(&task_id, &author, "2024-01-01T00:02:00Z").await.unwrap();
    h.backlog.approve_task(&task_id, &approver, "2024-01-01T00:03:00Z").await.unwrap();
    h.backlog.activate_task(&task_id, &executor, "2024-01-01T00:04:00Z").await.unwrap();

    let blocking = h
        .feedback
        .create(EntityType::Task, &task_id, FeedbackType::Blocking, "Needs design review", None, None, None, &approver, "approver:quality", "2024-01-01T00:05:00Z")
        .await
        .unwrap();
    h.backlog.handle_feedback_created(&blocking, &system, "2024-01-01T00:05:00Z").await.unwrap();
    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Paused);

    let resolution = h.feedback.resolve(&blocking.payload.id, None, &approver, "approver:quality", "2024-01-01T00:06:00Z").await.unwrap();
    h.backlog.handle_feedback_created(&resolution, &system, "2024-01-01T00:06:00Z").await.unwrap();
    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Active);

    // submit, approve, activate, the system pause, and the system resume.
    let events = recorder.events();
    assert_eq!(events.len(), 5);
    let pause_event = &events[3].1;
    assert_eq!(pause_event["oldStatus"], "active");
    assert_eq!(pause_event["newStatus"], "paused");
    let resume_event = &events[4].1;
    assert_eq!(resume_event["oldStatus"], "paused");
    assert_eq!(resume_event["newStatus"], "active");
}

/// Scenario 3: a task's first logged execution flips it from `ready` to
/// `active` and raises one `task.status.changed`.
#[tokio::test]
async fn first_execution_activates_ready_task() {
    let dir = tempfile::tempdir().unwrap();
    let h = open_harness(dir.path()).await;
    let recorder = Recorder::default();
    recorder.attach(&h.bus, "task.status.changed");

    let author = h.identity.create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let approver = h.identity.create_actor(ActorType::Human, "bob", "Bob", vec!["approver:product".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let executor = h.identity.create_actor(ActorType::Human, "carol", "Carol", vec!["executor".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let system = h.identity.create_actor(ActorType::Agent, "gitgov", "Gitgov System", vec!["system".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;

    let task = h.backlog.create_task("T2", "Do the thing", "medium", vec![], &author, "author", "2024-01-01T00:01:00Z").await.unwrap();
    let task_id = task.payload.id;
    h.backlog.submit_task(&task_id, &author, "2024-01-01T00:02:00Z").await.unwrap();
    h.backlog.approve_task(&task_id, &approver, "2024-01-01T00:03:00Z").await.unwrap();
    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Ready);

    let execution = h
        .execution
        .create(&task_id, "first run OK", "progress", "First run", None, None, &executor, "executor", "2024-01-01T00:04:00Z")
        .await
        .unwrap();
    h.backlog.handle_execution_created(&execution, true, &system, "2024-01-01T00:04:00Z").await.unwrap();

    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Active);
    // submit, approve, and the execution-triggered activation.
    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].1["oldStatus"], "ready");
    assert_eq!(events[2].1["newStatus"], "active");
}

/// Scenario 4: publishing a changelog that names a `done` task archives it.
#[tokio::test]
async fn changelog_archives_task() {
    let dir = tempfile::tempdir().unwrap();
    let h = open_harness(dir.path()).await;

    let author = h.identity.create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let approver = h.identity.create_actor(ActorType::Human, "bob", "Bob", vec!["approver:product".into(), "approver:quality".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let executor = h.identity.create_actor(ActorType::Human, "carol", "Carol", vec!["executor".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let system = h.identity.create_actor(ActorType::Agent, "gitgov", "Gitgov System", vec!["system".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;

    let task = h.backlog.create_task("T3", "Do the thing", "medium", vec![], &author, "author", "2024-01-01T00:01:00Z").await.unwrap();
    let task_id = task.payload.id;
    h.backlog.submit_task(&task_id, &author, "2024-01-01T00:02:00Z").await.unwrap();
    h.backlog.approve_task(&task_id, &approver, "2024-01-01T00:03:00Z").await.unwrap();
    h.backlog.activate_task(&task_id, &executor, "2024-01-01T00:04:00Z").await.unwrap();
    h.backlog.complete_task(&task_id, &approver, "2024-01-01T00:05:00Z").await.unwrap();
    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Done);

    let changelog = h
        .changelog
        .create(
            "Release 1",
            "initial release shipped",
            vec![task_id.clone()],
            "2024-01-01T00:06:00Z",
            None,
            None,
            None,
            None,
            None,
            &approver,
            "approver:quality",
            "2024-01-01T00:06:00Z",
        )
        .await
        .unwrap();
    h.backlog.handle_changelog_created(&changelog, &system, "2024-01-01T00:06:00Z").await.unwrap();

    assert_eq!(h.backlog.get_task(&task_id).await.unwrap().payload.status, TaskStatus::Archived);
}

/// Scenario 5: completing the last of a cycle's children propagates
/// completion to the parent, one `cycle.status.changed` per direct update
/// plus one for the propagated parent transition.
#[tokio::test]
async fn cycle_completion_propagates_to_parent() {
    let dir = tempfile::tempdir().unwrap();
    let h = open_harness(dir.path()).await;
    let recorder = Recorder::default();
    recorder.attach(&h.bus, "cycle.status.changed");

    let admin = h.identity.create_actor(ActorType::Human, "alice", "Alice", vec!["admin".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;

    let parent = h.backlog.create_cycle("C0", None, &admin, "admin", "2024-01-01T00:01:00Z").await.unwrap();
    let child_a = h.backlog.create_cycle("C1", None, &admin, "admin", "2024-01-01T00:01:00Z").await.unwrap();
    let child_b = h.backlog.create_cycle("C2", None, &admin, "admin", "2024-01-01T00:01:00Z").await.unwrap();
    let parent_id = parent.payload.id;
    let child_a_id = child_a.payload.id;
    let child_b_id = child_b.payload.id;

    {
        let child_a_id = child_a_id.clone();
        let child_b_id = child_b_id.clone();
        h.backlog
            .update_cycle(&parent_id, None, &admin, "admin", "2024-01-01T00:02:00Z", move |c| {
                c.child_cycle_ids = Some(vec![child_a_id, child_b_id]);
            })
            .await
            .unwrap();
    }

    // Cycles must pass through `active` before they can reach `completed`.
    for id in [&parent_id, &child_a_id, &child_b_id] {
        h.backlog.update_cycle(id, Some(CycleStatus::Active), &admin, "admin", "2024-01-01T00:03:00Z", |_| {}).await.unwrap();
    }

    h.backlog.update_cycle(&child_a_id, Some(CycleStatus::Completed), &admin, "admin", "2024-01-01T00:04:00Z", |_| {}).await.unwrap();
    assert_eq!(h.backlog.get_cycle(&parent_id).await.unwrap().payload.status, CycleStatus::Active);

    h.backlog.update_cycle(&child_b_id, Some(CycleStatus::Completed), &admin, "admin", "2024-01-01T00:05:00Z", |_| {}).await.unwrap();
    assert_eq!(h.backlog.get_cycle(&parent_id).await.unwrap().payload.status, CycleStatus::Completed);

    // One change per child completion, plus one for the propagated parent.
    assert_eq!(recorder.count("cycle.status.changed"), 3);
}

/// Scenario 6: rotating an actor's key preserves the authorship chain —
/// records signed under the old id keep verifying, the old id resolves
/// forward to the new one, and the session remembers the new id.
#[tokio::test]
async fn key_rotation_preserves_authorship() {
    let dir = tempfile::tempdir().unwrap();
    let h = open_harness(dir.path()).await;

    let author = h.identity.create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z").await.unwrap().payload.id;
    let task = h.backlog.create_task("T4", "Do the thing", "medium", vec![], &author, "author", "2024-01-01T00:01:00Z").await.unwrap();
    h.backlog.submit_task(&task.payload.id, &author, "2024-01-01T00:02:00Z").await.unwrap();

    let rotated = h.identity.rotate_actor_key(&author, "2024-01-01T00:03:00Z").await.unwrap();
    let new_id = rotated.payload.id;
    assert_ne!(new_id, author);

    // The task, signed under the old id, still checksum/signature-verifies.
    let reread = h.backlog.get_task(&task.payload.id).await.unwrap();
    assert_eq!(reread.payload.id, task.payload.id);

    let resolved = h.identity.resolve_current_actor_id(&author).await.unwrap();
    assert_eq!(resolved, new_id);

    h.identity.set_current_actor(&new_id, "2024-01-01T00:04:00Z").await.unwrap();
    let session = SessionStore::new(dir.path().join(".session.json")).load().await.unwrap();
    assert_eq!(session.last_session.unwrap().actor_id, new_id);
}
