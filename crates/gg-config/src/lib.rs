// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Project configuration (`.gitgov/config.json`) and session state
//! (`.gitgov/.session.json`) loading, validation, merging, and persistence.
//!
//! Mirrors `abp-config`'s `load`/`validate`/`merge` three-function shape,
//! adapted from TOML backend definitions to the project's JSON schema (§6
//! mandates JSON on disk, not TOML).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from loading, parsing, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file content is not valid JSON for this schema.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse failure detail.
        reason: String,
    },
    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
    /// An I/O error occurred while reading or writing the file.
    #[error("config I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Advisory issues that do not block loading but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A field carries a value outside the values this kernel actively uses.
    UnrecognizedValue {
        /// Name of the field.
        field: String,
        /// The value encountered.
        value: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            Self::UnrecognizedValue { field, value } => {
                write!(f, "field '{field}' has unrecognized value '{value}'")
            }
        }
    }
}

const CURRENT_PROTOCOL_VERSION: &str = "1.0";

/// State-sync settings nested under `config.state.sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the configured VCS hook should run automatically.
    #[serde(default)]
    pub enabled: bool,
    /// Remote name/URL the sync hook pushes to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// Project-wide defaults nested under `config.state.defaults`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Priority assigned to tasks created without an explicit one.
    #[serde(default = "default_priority")]
    pub default_priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
        }
    }
}

/// `config.state` — branch tracking plus sync and default sub-sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// VCS branch this working copy tracks.
    #[serde(default)]
    pub branch: String,
    /// Sync settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Project-wide defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `.gitgov/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Record/protocol schema version this project was initialized with.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Stable project identifier.
    #[serde(rename = "projectId")]
    pub project_id: String,
    /// Human-readable project name.
    #[serde(rename = "projectName")]
    pub project_name: String,
    /// Id of the project's root cycle.
    #[serde(rename = "rootCycle")]
    pub root_cycle: String,
    /// Branch/sync/defaults sub-section.
    pub state: StateConfig,
}

impl ProjectConfig {
    /// Build a fresh config for a newly initialized project.
    #[must_use]
    pub fn new(project_id: impl Into<String>, project_name: impl Into<String>, root_cycle: impl Into<String>) -> Self {
        Self {
            protocol_version: CURRENT_PROTOCOL_VERSION.to_string(),
            project_id: project_id.into(),
            project_name: project_name.into(),
            root_cycle: root_cycle.into(),
            state: StateConfig::default(),
        }
    }
}

/// Load a [`ProjectConfig`] from `path`, applying environment overrides.
pub async fn load_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let mut config = parse_json(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a JSON string into a [`ProjectConfig`].
pub fn parse_json(content: &str) -> Result<ProjectConfig, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

/// Persist `config` to `path` atomically (temp file plus rename), matching
/// the discipline the record store uses for record files.
pub async fn save_config(path: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    let bytes = serde_json::to_vec_pretty(config).map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;
    atomic_write(path, &bytes).await
}

/// Environment variables recognized by [`apply_env_overrides`]:
/// `GITGOV_PROJECT_NAME`, `GITGOV_STATE_BRANCH`.
pub fn apply_env_overrides(config: &mut ProjectConfig) {
    if let Ok(val) = std::env::var("GITGOV_PROJECT_NAME") {
        config.project_name = val;
    }
    if let Ok(val) = std::env::var("GITGOV_STATE_BRANCH") {
        config.state.branch = val;
    }
}

/// Validate a parsed config, returning advisory warnings.
///
/// Hard errors (empty required identifiers, unknown protocol version) come
/// back as [`ConfigError::ValidationError`]; soft issues as warnings.
pub fn validate_config(config: &ProjectConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.project_id.trim().is_empty() {
        errors.push("projectId must not be empty".to_string());
    }
    if config.project_name.trim().is_empty() {
        errors.push("projectName must not be empty".to_string());
    }
    if config.root_cycle.trim().is_empty() {
        errors.push("rootCycle must not be empty".to_string());
    }
    if config.protocol_version != CURRENT_PROTOCOL_VERSION {
        warnings.push(ConfigWarning::UnrecognizedValue {
            field: "protocolVersion".into(),
            value: config.protocol_version.clone(),
        });
    }
    if config.state.branch.trim().is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "state.branch".into(),
            hint: "VCS sync hooks will have no tracked branch".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Merge two configs; fields from `overlay` win over `base` when both are
/// non-default. Used to layer environment-specific overrides on top of the
/// persisted project config.
#[must_use]
pub fn merge_configs(base: ProjectConfig, overlay: ProjectConfig) -> ProjectConfig {
    ProjectConfig {
        protocol_version: overlay.protocol_version,
        project_id: base.project_id,
        project_name: overlay.project_name,
        root_cycle: base.root_cycle,
        state: StateConfig {
            branch: if overlay.state.branch.is_empty() {
                base.state.branch
            } else {
                overlay.state.branch
            },
            sync: overlay.state.sync,
            defaults: overlay.state.defaults,
        },
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// `.gitgov/.session.json`: last-logged actor plus per-actor active state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Last actor to act in this working copy, if any.
    #[serde(default, rename = "lastSession", skip_serializing_if = "Option::is_none")]
    pub last_session: Option<LastSession>,
    /// Per-actor active task/cycle state.
    #[serde(default, rename = "actorState")]
    pub actor_state: BTreeMap<String, ActorSessionState>,
}

/// The most recently logged actor and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSession {
    /// Id of the actor that last acted.
    #[serde(rename = "actorId")]
    pub actor_id: String,
    /// RFC3339 timestamp of that action.
    pub timestamp: String,
}

/// Per-actor ephemeral session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSessionState {
    /// Task this actor most recently activated/resumed, if any.
    #[serde(default, rename = "activeTaskId", skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<String>,
    /// Cycle this actor most recently made active, if any.
    #[serde(default, rename = "activeCycleId", skip_serializing_if = "Option::is_none")]
    pub active_cycle_id: Option<String>,
    /// RFC3339 timestamp of the last sync, if any.
    #[serde(default, rename = "lastSync", skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
}

/// Single-document, read-modify-write store for `.session.json`.
///
/// Never held open across commands (§9): every operation opens, mutates,
/// and atomically rewrites the whole document.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Point a session store at `path` (typically `.gitgov/.session.json`).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the session document, or an empty default if the file does not
    /// yet exist (a brand-new project has no session history).
    pub async fn load(&self) -> Result<SessionDocument, ConfigError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ConfigError::ParseError { reason: e.to_string() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically overwrite the session document.
    pub async fn save(&self, document: &SessionDocument) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;
        atomic_write(&self.path, &bytes).await
    }

    /// Load, apply `mutate`, and atomically save back. Returns whatever
    /// `mutate` returns, to let callers pass through a derived value.
    pub async fn update<F, R>(&self, mutate: F) -> Result<R, ConfigError>
    where
        F: FnOnce(&mut SessionDocument) -> R,
    {
        let mut document = self.load().await?;
        let result = mutate(&mut document);
        self.save(&document).await?;
        Ok(result)
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    use std::io::Write as _;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> Result<(), ConfigError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| ConfigError::Io(format!("write task panicked: {e}")))?
}
