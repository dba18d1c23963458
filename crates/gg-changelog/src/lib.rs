// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Changelog adapter: append-only release/change records that reference the
//! tasks (and optionally cycles) they cover.

use std::sync::Arc;

use futures::future::BoxFuture;
use gg_bus::{EventBus, GovernanceEvent};
use gg_core::{generate_id, ChangelogRecord, CycleRecord, Header, Record, RecordKind, TaskRecord};
use gg_error::{FieldError, GovernanceError};
use gg_identity::IdentityAdapter;
use gg_store::FileRecordStore;
use serde_json::json;
use tracing::info;

const MIN_TITLE_LEN: usize = 10;
const MIN_DESCRIPTION_LEN: usize = 20;

/// Sort key for [`ChangelogAdapter::get_all_changelogs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelogSortBy {
    /// Sort by `completedAt` (the default).
    CompletedAt,
    /// Sort by `title`.
    Title,
}

/// Sort direction for [`ChangelogAdapter::get_all_changelogs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending (the default).
    Desc,
}

/// Filter/sort options for [`ChangelogAdapter::get_all_changelogs`].
#[derive(Debug, Clone, Default)]
pub struct ChangelogQuery {
    /// Keep only changelogs carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    /// Keep only changelogs with this exact version label.
    pub version: Option<String>,
    /// Cap the number of results returned after sorting.
    pub limit: Option<usize>,
    /// Sort key; defaults to [`ChangelogSortBy::CompletedAt`].
    pub sort_by: Option<ChangelogSortBy>,
    /// Sort direction; defaults to [`SortOrder::Desc`].
    pub sort_order: Option<SortOrder>,
}

/// Changelog adapter.
pub struct ChangelogAdapter {
    store: FileRecordStore<ChangelogRecord>,
    task_store: Arc<FileRecordStore<TaskRecord>>,
    cycle_store: Option<Arc<FileRecordStore<CycleRecord>>>,
    identity: Arc<IdentityAdapter>,
    bus: Arc<EventBus>,
}

impl ChangelogAdapter {
    /// Open the adapter, rooting changelog records at `dir`.
    ///
    /// `task_store` is required: every changelog must reference existing
    /// tasks. `cycle_store` is only consulted when a create call supplies
    /// `related_cycles`.
    pub async fn open(
        dir: impl Into<std::path::PathBuf>,
        identity: Arc<IdentityAdapter>,
        bus: Arc<EventBus>,
        task_store: Arc<FileRecordStore<TaskRecord>>,
        cycle_store: Option<Arc<FileRecordStore<CycleRecord>>>,
    ) -> Result<Self, GovernanceError> {
        let identity_for_resolver = identity.clone();
        let resolver: gg_store::IdentityResolver = Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
            let identity = identity_for_resolver.clone();
            Box::pin(async move { identity.get_actor_public_key(&key_id).await.ok() })
        });
        let store = FileRecordStore::open(dir, RecordKind::Changelog, resolver).await?;
        Ok(Self { store, task_store, cycle_store, identity, bus })
    }

    fn validate(title: &str, description: &str, related_tasks: &[String]) -> Result<(), GovernanceError> {
        let mut errors = Vec::new();
        if title.chars().count() < MIN_TITLE_LEN {
            errors.push(FieldError::new("title", format!("must be at least {MIN_TITLE_LEN} characters")).with_value(title));
        }
        if description.chars().count() < MIN_DESCRIPTION_LEN {
            errors.push(FieldError::new("description", format!("must be at least {MIN_DESCRIPTION_LEN} characters")));
        }
        if related_tasks.is_empty() {
            errors.push(FieldError::new("relatedTasks", "must reference at least one task"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(errors))
        }
    }

    /// Create a changelog record. Every id in `related_tasks` (and, if
    /// given, `related_cycles`) must resolve to an existing record.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        related_tasks: Vec<String>,
        completed_at: &str,
        related_cycles: Option<Vec<String>>,
        version: Option<String>,
        tags: Option<Vec<String>>,
        commits: Option<Vec<String>>,
        files: Option<Vec<String>>,
        actor_id: &str,
        role: &str,
        timestamp: &str,
    ) -> Result<Record<ChangelogRecord>, GovernanceError> {
        Self::validate(title, description, &related_tasks)?;

        for task_id in &related_tasks {
            self.task_store.get(task_id).await?;
        }
        if let Some(cycle_ids) = &related_cycles {
            let Some(cycle_store) = &self.cycle_store else {
                return Err(GovernanceError::InvalidEntityTypeError {
                    entity_type: "cycle".into(),
                    context: "changelog.create: relatedCycles given but no cycle store configured".into(),
                });
            };
            for cycle_id in cycle_ids {
                cycle_store.get(cycle_id).await?;
            }
        }

        let id = generate_id(RecordKind::Changelog, &slugify(title), timestamp_seconds(completed_at));
        let payload = ChangelogRecord {
            id: id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            related_tasks,
            completed_at: completed_at.to_string(),
            related_cycles,
            related_executions: None,
            version,
            tags,
            commits,
            files,
            notes: None,
        };
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signatures = self.identity.sign_record(vec![], &payload_value, actor_id, role, None, timestamp).await?;
        let record = Record {
            header: Header::new(RecordKind::Changelog, checksum, signatures),
            payload,
        };
        self.store.put(&id, &record).await?;

        self.bus.publish(GovernanceEvent::new(
            "changelog.created",
            "gg-changelog",
            json!({
                "changelogId": id,
                "relatedTasks": record.payload.related_tasks,
            }),
            timestamp,
        ));
        info!(changelog_id = %id, "changelog created");
        Ok(record)
    }

    /// Fetch a changelog record by id.
    pub async fn get_changelog(&self, id: &str) -> Result<Record<ChangelogRecord>, GovernanceError> {
        self.store.get(id).await
    }

    /// Every changelog that lists `task_id` in `relatedTasks`.
    pub async fn get_changelogs_by_task(&self, task_id: &str) -> Result<Vec<Record<ChangelogRecord>>, GovernanceError> {
        let all = self.store.list_records().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.payload.related_tasks.iter().any(|t| t == task_id))
            .collect())
    }

    /// All changelog records, filtered and sorted per `query`.
    pub async fn get_all_changelogs(&self, query: &ChangelogQuery) -> Result<Vec<Record<ChangelogRecord>>, GovernanceError> {
        let mut records = self.store.list_records().await?;

        if let Some(tags) = &query.tags {
            records.retain(|r| {
                r.payload
                    .tags
                    .as_ref()
                    .is_some_and(|record_tags| record_tags.iter().any(|t| tags.contains(t)))
            });
        }
        if let Some(version) = &query.version {
            records.retain(|r| r.payload.version.as_deref() == Some(version.as_str()));
        }

        let sort_by = query.sort_by.unwrap_or(ChangelogSortBy::CompletedAt);
        let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
        records.sort_by(|a, b| {
            let ordering = match sort_by {
                ChangelogSortBy::CompletedAt => a.payload.completed_at.cmp(&b.payload.completed_at),
                ChangelogSortBy::Title => a.payload.title.cmp(&b.payload.title),
            };
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// The `limit` most recently completed changelogs.
    pub async fn get_recent_changelogs(&self, limit: usize) -> Result<Vec<Record<ChangelogRecord>>, GovernanceError> {
        self.get_all_changelogs(&ChangelogQuery {
            limit: Some(limit),
            ..Default::default()
        })
        .await
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
        "changelog".to_string()
    } else {
        truncated
    }
}

fn timestamp_seconds(rfc3339: &str) -> u64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.timestamp().max(0) as u64)
        .unwrap_or(0)
}
