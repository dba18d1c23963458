// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gg_cli::{exit_code_for, GitgovContext};
use gg_error::GovernanceError;
use gg_project::{FsProjectInitializer, InitOptions, ProjectAdapter};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gg", version, about = "Gitgov governance kernel CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root containing (or to contain) `.gitgov`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new project at `--root`.
    Init {
        /// Project name.
        #[arg(long)]
        name: String,
        /// Display name of the bootstrap actor.
        #[arg(long)]
        actor_name: String,
    },

    /// Task lifecycle operations.
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Cycle lifecycle operations.
    Cycle {
        #[command(subcommand)]
        command: CycleCommands,
    },

    /// Feedback operations.
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },

    /// Execution log operations.
    Execution {
        #[command(subcommand)]
        command: ExecutionCommands,
    },

    /// Changelog operations.
    Changelog {
        #[command(subcommand)]
        command: ChangelogCommands,
    },

    /// Actor (identity) operations.
    Actor {
        #[command(subcommand)]
        command: ActorCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommands {
    /// Author a new task in `draft`.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        actor: String,
    },
    /// `draft` -> `review`.
    Submit {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// `review` -> `ready`.
    Approve {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// `ready` -> `active`.
    Activate {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// `active` -> `paused`.
    Pause {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: String,
    },
    /// `paused` -> `active`.
    Resume {
        id: String,
        #[arg(long)]
        actor: String,
        /// Resume even while blocking feedback is open.
        #[arg(long)]
        force: bool,
    },
    /// `active` -> `done`.
    Complete {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// Discard a task, tagging the reason.
    Discard {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: String,
    },
    /// Physically delete a `draft` task.
    Delete {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// Show a task as JSON.
    Show { id: String },
    /// List every task as JSON.
    List,
}

#[derive(Subcommand, Debug)]
enum CycleCommands {
    /// Create a new cycle.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        actor: String,
    },
    /// Add a task to a cycle.
    AddTask {
        #[arg(long)]
        cycle: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        actor: String,
    },
    /// Move tasks from one cycle to another.
    Move {
        #[arg(long = "task")]
        tasks: Vec<String>,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        actor: String,
    },
    /// Show a cycle as JSON.
    Show { id: String },
    /// List every cycle as JSON.
    List,
}

#[derive(Subcommand, Debug)]
enum FeedbackCommands {
    /// Attach feedback to an entity.
    Create {
        /// `task` | `cycle` | `execution` | `changelog` | `feedback`.
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        entity_id: String,
        /// `blocking` | `suggestion` | `question` | `approval` | `clarification` | `assignment`.
        #[arg(long)]
        feedback_type: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        actor: String,
    },
    /// Resolve an open feedback item.
    Resolve {
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
enum ExecutionCommands {
    /// Log an execution against a task.
    Log {
        #[arg(long)]
        task: String,
        #[arg(long)]
        result: String,
        #[arg(long)]
        execution_type: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "reference")]
        references: Vec<String>,
        #[arg(long)]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
enum ChangelogCommands {
    /// Publish a changelog entry.
    Publish {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "task")]
        related_tasks: Vec<String>,
        #[arg(long)]
        completed_at: String,
        #[arg(long = "cycle")]
        related_cycles: Vec<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "commit")]
        commits: Vec<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long)]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
enum ActorCommands {
    /// Create a new actor.
    Create {
        /// `human` | `agent`.
        #[arg(long)]
        actor_type: String,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        display_name: String,
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// Rotate an actor's signing key.
    Rotate { id: String },
    /// List every actor as JSON.
    List,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: &str, kind: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase())).with_context(|| format!("'{value}' is not a valid {kind}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("gg=debug") } else { EnvFilter::new("gg=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        let code = err.downcast_ref::<GovernanceError>().map(exit_code_for).unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { name, actor_name } => {
            let adapter = ProjectAdapter::new(&cli.root, FsProjectInitializer);
            let result = adapter.initialize_project(InitOptions { name, actor_name, template: None }, &now()).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "projectId": result.project_id,
                "bootstrapActorId": result.bootstrap_actor_id,
                "isBootstrap": result.is_bootstrap,
                "rootCycleId": result.root_cycle_id,
            }))?);
            Ok(())
        }
        Commands::Task { command } => run_task(&cli.root, command).await,
        Commands::Cycle { command } => run_cycle(&cli.root, command).await,
        Commands::Feedback { command } => run_feedback(&cli.root, command).await,
        Commands::Execution { command } => run_execution(&cli.root, command).await,
        Commands::Changelog { command } => run_changelog(&cli.root, command).await,
        Commands::Actor { command } => run_actor(&cli.root, command).await,
    }
}

async fn run_task(root: &std::path::Path, command: TaskCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        TaskCommands::Create { title, description, priority, tags, actor } => {
            let task = ctx.backlog.create_task(&title, &description, &priority, tags, &actor, "author", &ts).await?;
            print_json(&task)
        }
        TaskCommands::Submit { id, actor } => print_json(&ctx.backlog.submit_task(&id, &actor, &ts).await?),
        TaskCommands::Approve { id, actor } => print_json(&ctx.backlog.approve_task(&id, &actor, &ts).await?),
        TaskCommands::Activate { id, actor } => print_json(&ctx.backlog.activate_task(&id, &actor, &ts).await?),
        TaskCommands::Pause { id, reason, actor } => print_json(&ctx.backlog.pause_task(&id, &reason, &actor, &ts).await?),
        TaskCommands::Resume { id, actor, force } => print_json(&ctx.backlog.resume_task(&id, force, &actor, &ts).await?),
        TaskCommands::Complete { id, actor } => print_json(&ctx.backlog.complete_task(&id, &actor, &ts).await?),
        TaskCommands::Discard { id, reason, actor } => print_json(&ctx.backlog.discard_task(&id, &reason, &actor, &ts).await?),
        TaskCommands::Delete { id, actor } => {
            ctx.backlog.delete_task(&id, &actor).await?;
            Ok(())
        }
        TaskCommands::Show { id } => print_json(&ctx.backlog.get_task(&id).await?),
        TaskCommands::List => print_json(&ctx.backlog.get_all_tasks().await?),
    }
}

async fn run_cycle(root: &std::path::Path, command: CycleCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        CycleCommands::Create { title, tags, actor } => {
            let tags = if tags.is_empty() { None } else { Some(tags) };
            print_json(&ctx.backlog.create_cycle(&title, tags, &actor, "admin", &ts).await?)
        }
        CycleCommands::AddTask { cycle, task, actor } => {
            ctx.backlog.add_task_to_cycle(&cycle, &task, &actor, "admin", &ts).await?;
            Ok(())
        }
        CycleCommands::Move { tasks, from, to, actor } => {
            ctx.backlog.move_tasks_between_cycles(&from, &to, &tasks, &actor, "admin", &ts).await?;
            Ok(())
        }
        CycleCommands::Show { id } => print_json(&ctx.backlog.get_cycle(&id).await?),
        CycleCommands::List => print_json(&ctx.backlog.get_all_cycles().await?),
    }
}

async fn run_feedback(root: &std::path::Path, command: FeedbackCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        FeedbackCommands::Create { entity_type, entity_id, feedback_type, content, assignee, priority, tags, actor } => {
            let entity_type = parse_enum(&entity_type, "entity type")?;
            let feedback_type = parse_enum(&feedback_type, "feedback type")?;
            let tags = if tags.is_empty() { None } else { Some(tags) };
            let record = ctx.feedback.create(entity_type, &entity_id, feedback_type, &content, assignee, priority, tags, &actor, "reviewer", &ts).await?;
            print_json(&record)
        }
        FeedbackCommands::Resolve { id, content, actor } => print_json(&ctx.feedback.resolve(&id, content, &actor, "reviewer", &ts).await?),
    }
}

async fn run_execution(root: &std::path::Path, command: ExecutionCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        ExecutionCommands::Log { task, result, execution_type, title, notes, references, actor } => {
            let references = if references.is_empty() { None } else { Some(references) };
            let record = ctx.execution.create(&task, &result, &execution_type, &title, notes, references, &actor, "developer", &ts).await?;
            print_json(&record)
        }
    }
}

async fn run_changelog(root: &std::path::Path, command: ChangelogCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        ChangelogCommands::Publish {
            title,
            description,
            related_tasks,
            completed_at,
            related_cycles,
            version,
            tags,
            commits,
            files,
            actor,
        } => {
            let related_cycles = if related_cycles.is_empty() { None } else { Some(related_cycles) };
            let tags = if tags.is_empty() { None } else { Some(tags) };
            let commits = if commits.is_empty() { None } else { Some(commits) };
            let files = if files.is_empty() { None } else { Some(files) };
            let record = ctx
                .changelog
                .create(&title, &description, related_tasks, &completed_at, related_cycles, version, tags, commits, files, &actor, "admin", &ts)
                .await?;
            print_json(&record)
        }
    }
}

async fn run_actor(root: &std::path::Path, command: ActorCommands) -> Result<()> {
    let ctx = GitgovContext::open(root).await?;
    let ts = now();
    match command {
        ActorCommands::Create { actor_type, slug, display_name, roles } => {
            let actor_type = parse_enum(&actor_type, "actor type")?;
            print_json(&ctx.identity.create_actor(actor_type, &slug, &display_name, roles, &ts).await?)
        }
        ActorCommands::Rotate { id } => print_json(&ctx.identity.rotate_actor_key(&id, &ts).await?),
        ActorCommands::List => print_json(&ctx.identity.list_actors().await?),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
