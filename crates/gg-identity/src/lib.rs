// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Actor/agent identity: keystore, signing, succession-aware verification,
//! and the current-session actor.
//!
//! [`IdentityAdapter`] is the only place that turns a private key into a
//! [`gg_crypto::Signature`]. Everything downstream works with actor ids and
//! already-produced signatures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use gg_bus::{EventBus, GovernanceEvent};
use gg_config::SessionStore;
use gg_core::{
    generate_actor_id, ActorRecord, ActorStatus, ActorType, AgentRecord, Header, Record, RecordKind,
};
use gg_error::GovernanceError;
use gg_store::{FileRecordStore, IdentityResolver};
use serde_json::json;
use tracing::info;

/// Owner-only on-disk store for actor private keys.
///
/// Keys are loaded on demand for every signing operation and never cached
/// in memory past the call that needed them (§5).
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    /// Open (creating if absent) a keystore rooted at `dir`, restricting it
    /// to owner access.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, GovernanceError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        set_owner_only(&dir, 0o700).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, actor_id: &str) -> PathBuf {
        self.dir.join(format!("{}.key", actor_id.replace(':', "_")))
    }

    /// Persist `private_key` for `actor_id`, restricted to owner read/write.
    pub async fn store_key(&self, actor_id: &str, private_key: &gg_crypto::PrivateKey) -> Result<(), GovernanceError> {
        let path = self.path_for(actor_id);
        let encoded = gg_crypto::encode_private_key(private_key);
        tokio::fs::write(&path, encoded).await?;
        set_owner_only(&path, 0o600).await?;
        Ok(())
    }

    /// Load the private key for `actor_id`.
    pub async fn load_key(&self, actor_id: &str) -> Result<gg_crypto::PrivateKey, GovernanceError> {
        let path = self.path_for(actor_id);
        let encoded = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GovernanceError::RecordNotFoundError {
                    kind: "keystore-entry".into(),
                    id: actor_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        gg_crypto::decode_private_key(encoded.trim()).map_err(|e| GovernanceError::SignatureError {
            key_id: format!("{actor_id}: {e}"),
        })
    }

    /// `true` if a key is currently stored for `actor_id`.
    pub async fn has_key(&self, actor_id: &str) -> bool {
        tokio::fs::try_exists(self.path_for(actor_id)).await.unwrap_or(false)
    }
}

#[cfg(unix)]
async fn set_owner_only(path: &Path, mode: u32) -> Result<(), GovernanceError> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode(mode);
    tokio::fs::set_permissions(path, permissions).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_owner_only(_path: &Path, _mode: u32) -> Result<(), GovernanceError> {
    Ok(())
}

/// Build an [`IdentityResolver`] that reads an actor's public key directly
/// off disk, bypassing [`FileRecordStore::get`].
///
/// The actor store's own signature verification needs this resolver, and
/// actor records are routinely self-signed — going through the fully
/// validated `get()` path would recurse into verifying the very signature
/// being verified. A raw read of the `publicKey` field breaks that cycle;
/// it trusts the file's structure but still refuses a file whose id on
/// disk does not decode, rather than silently resolving to a wrong key.
#[must_use]
pub fn actor_identity_resolver(actor_dir: impl Into<PathBuf>) -> IdentityResolver {
    let actor_dir = actor_dir.into();
    Arc::new(move |key_id: String| -> BoxFuture<'static, Option<gg_crypto::PublicKey>> {
        let path = actor_dir.join(format!("{key_id}.json"));
        Box::pin(async move {
            let bytes = tokio::fs::read(&path).await.ok()?;
            let record: Record<ActorRecord> = serde_json::from_slice(&bytes).ok()?;
            gg_crypto::decode_public_key(&record.payload.public_key).ok()
        })
    })
}

fn parse_actor_id(id: &str) -> Option<(ActorType, String, Option<u32>)> {
    let (prefix, rest) = id.split_once(':')?;
    let actor_type = match prefix {
        "human" => ActorType::Human,
        "agent" => ActorType::Agent,
        _ => return None,
    };
    match rest.rsplit_once("-v") {
        Some((slug, version)) if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) => {
            Some((actor_type, slug.to_string(), version.parse().ok()))
        }
        _ => Some((actor_type, rest.to_string(), None)),
    }
}

/// Identity adapter: actor/agent CRUD, signing, succession resolution, and
/// the session's current actor.
pub struct IdentityAdapter {
    actor_store: FileRecordStore<ActorRecord>,
    agent_store: FileRecordStore<AgentRecord>,
    keystore: Keystore,
    session: SessionStore,
    bus: Arc<EventBus>,
}

impl IdentityAdapter {
    /// Open the adapter, rooting actor/agent records and the keystore under
    /// `root` (`actors/`, `agents/`, `keys/` subdirectories) and the session
    /// document at `session_path`.
    pub async fn open(
        root: impl AsRef<Path>,
        session_path: impl Into<PathBuf>,
        bus: Arc<EventBus>,
    ) -> Result<Self, GovernanceError> {
        let root = root.as_ref();
        let actor_dir = root.join("actors");
        let resolver = actor_identity_resolver(&actor_dir);
        let actor_store = FileRecordStore::open(&actor_dir, RecordKind::Actor, resolver.clone()).await?;
        let agent_store = FileRecordStore::open(root.join("agents"), RecordKind::Agent, resolver).await?;
        let keystore = Keystore::open(root.join("keys")).await?;
        Ok(Self {
            actor_store,
            agent_store,
            keystore,
            session: SessionStore::new(session_path),
            bus,
        })
    }

    /// Create a new human or agent actor identity, generating its keypair
    /// and self-signing the resulting record.
    pub async fn create_actor(
        &self,
        actor_type: ActorType,
        slug: &str,
        display_name: &str,
        roles: Vec<String>,
        timestamp: &str,
    ) -> Result<Record<ActorRecord>, GovernanceError> {
        let id = generate_actor_id(actor_type, slug, None);
        let (public_key, private_key) = gg_crypto::generate_keys();
        let payload = ActorRecord {
            id: id.clone(),
            actor_type,
            display_name: display_name.to_string(),
            public_key: gg_crypto::encode_public_key(&public_key),
            roles,
            status: ActorStatus::Active,
            superseded_by: None,
        };
        let record = self.sign_and_build(payload, &private_key, &id, "self", timestamp, RecordKind::Actor)?;
        self.actor_store.put(&id, &record).await?;
        self.keystore.store_key(&id, &private_key).await?;
        self.bus.publish(GovernanceEvent::new(
            "identity.actor.created",
            "gg-identity",
            json!({ "actorId": id, "actorType": actor_type.as_str() }),
            timestamp,
        ));
        info!(actor_id = %id, "actor created");
        Ok(record)
    }

    /// Fetch an actor record by its exact id (no succession resolution).
    pub async fn get_actor(&self, actor_id: &str) -> Result<Record<ActorRecord>, GovernanceError> {
        self.actor_store.get(actor_id).await
    }

    /// All actor records currently on disk (best-effort; corrupt ones are
    /// skipped and logged, per `FileRecordStore::list_records`).
    pub async fn list_actors(&self) -> Result<Vec<Record<ActorRecord>>, GovernanceError> {
        self.actor_store.list_records().await
    }

    /// Sign `payload` with `actor_id`'s currently-held private key, merging
    /// the result into `existing_signatures`.
    ///
    /// If no private key is stored for `actor_id` this produces a
    /// [`gg_crypto::placeholder_signature`] instead of failing, so records
    /// can be authored or transitioned by actors not yet issued real keys
    /// (dev/test, or an agent whose key hasn't rotated in yet). A
    /// placeholder already held for this `actor_id`/`role` is replaced in
    /// place once a real signature is available; any other existing
    /// signature is left untouched and the new one is appended alongside
    /// it, supporting multi-signature co-approvals.
    pub async fn sign_record(
        &self,
        existing_signatures: Vec<gg_crypto::Signature>,
        payload: &serde_json::Value,
        actor_id: &str,
        role: &str,
        notes: Option<String>,
        timestamp: &str,
    ) -> Result<Vec<gg_crypto::Signature>, GovernanceError> {
        let signature = if self.keystore.has_key(actor_id).await {
            let private_key = self.keystore.load_key(actor_id).await?;
            gg_crypto::sign_payload(payload, &private_key, actor_id, role, notes, timestamp)
        } else {
            gg_crypto::placeholder_signature(actor_id, role, timestamp)
        };
        let mut signatures = existing_signatures;
        let slot = signatures
            .iter()
            .position(|s| s.key_id == signature.key_id && s.role == signature.role && s.signature == gg_crypto::PlaceholderMarker::VALUE);
        match slot {
            Some(idx) => signatures[idx] = signature,
            None => signatures.push(signature),
        }
        Ok(signatures)
    }

    /// Revoke `actor_id` without rotating to a successor (a standalone
    /// offboarding, not a key rotation).
    pub async fn revoke_actor(&self, actor_id: &str, timestamp: &str) -> Result<Record<ActorRecord>, GovernanceError> {
        let record = self.actor_store.get(actor_id).await?;
        let mut payload = record.payload;
        payload.status = ActorStatus::Revoked;
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let private_key = self.keystore.load_key(actor_id).await?;
        let signature = gg_crypto::sign_payload(&payload_value, &private_key, actor_id, "self-revoke", None, timestamp);
        let updated = Record {
            header: Header::new(RecordKind::Actor, checksum, vec![signature]),
            payload,
        };
        self.actor_store.put(actor_id, &updated).await?;
        self.bus.publish(GovernanceEvent::new(
            "identity.actor.revoked",
            "gg-identity",
            json!({ "actorId": actor_id }),
            timestamp,
        ));
        info!(actor_id, "actor revoked");
        Ok(updated)
    }

    /// Rotate `actor_id`'s key: mint a successor actor with a fresh keypair,
    /// mark the predecessor revoked with `supersededBy` pointing at it, and
    /// have the successor countersign the predecessor's update so the
    /// supersession itself carries a verifiable signature.
    pub async fn rotate_actor_key(
        &self,
        actor_id: &str,
        timestamp: &str,
    ) -> Result<Record<ActorRecord>, GovernanceError> {
        let old = self.actor_store.get(actor_id).await?;
        let (actor_type, slug, version) = parse_actor_id(actor_id).ok_or_else(|| GovernanceError::DetailedValidationError(vec![
            gg_error::FieldError::new("actorId", "not a valid actor id").with_value(actor_id),
        ]))?;
        let next_version = version.unwrap_or(1) + 1;
        let new_id = generate_actor_id(actor_type, &slug, Some(next_version));

        let (new_public, new_private) = gg_crypto::generate_keys();
        let new_payload = ActorRecord {
            id: new_id.clone(),
            actor_type,
            display_name: old.payload.display_name.clone(),
            public_key: gg_crypto::encode_public_key(&new_public),
            roles: old.payload.roles.clone(),
            status: ActorStatus::Active,
            superseded_by: None,
        };
        let new_record = self.sign_and_build(new_payload, &new_private, &new_id, "self", timestamp, RecordKind::Actor)?;
        self.actor_store.put(&new_id, &new_record).await?;
        self.keystore.store_key(&new_id, &new_private).await?;

        let mut old_payload = old.payload;
        old_payload.status = ActorStatus::Revoked;
        old_payload.superseded_by = Some(new_id.clone());
        let payload_value = serde_json::to_value(&old_payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signature = gg_crypto::sign_payload(&payload_value, &new_private, &new_id, "rotation", None, timestamp);
        let old_updated = Record {
            header: Header::new(RecordKind::Actor, checksum, vec![signature]),
            payload: old_payload,
        };
        self.actor_store.put(actor_id, &old_updated).await?;

        self.bus.publish(GovernanceEvent::new(
            "identity.actor.revoked",
            "gg-identity",
            json!({ "actorId": actor_id, "supersededBy": new_id }),
            timestamp,
        ));
        self.bus.publish(GovernanceEvent::new(
            "identity.actor.created",
            "gg-identity",
            json!({ "actorId": new_id, "rotatedFrom": actor_id }),
            timestamp,
        ));
        info!(old = actor_id, new = %new_id, "actor key rotated");
        Ok(new_record)
    }

    /// Resolve `actor_id` to the current (non-superseded) actor id by
    /// walking `supersededBy`, loading every actor record once up front.
    pub async fn resolve_current_actor_id(&self, actor_id: &str) -> Result<String, GovernanceError> {
        let records = self.actor_store.list_records().await?;
        let by_id: HashMap<String, ActorRecord> =
            records.into_iter().map(|r| (r.payload.id.clone(), r.payload)).collect();
        gg_core::succession::resolve_current_actor_id(actor_id, |id| by_id.get(id).cloned()).map_err(|e| match e {
            gg_core::succession::SuccessionError::Broken { missing } => GovernanceError::RecordNotFoundError {
                kind: "actor".into(),
                id: missing,
            },
            gg_core::succession::SuccessionError::Cycle { start } => GovernanceError::AtomicOperationError {
                reason: format!("succession cycle detected starting at {start}"),
            },
        })
    }

    /// The actor currently logged in per the session document, succession
    /// resolved, or `None` if no actor has ever logged a session.
    pub async fn get_current_actor(&self) -> Result<Option<Record<ActorRecord>>, GovernanceError> {
        let session = self.session.load().await.map_err(|e| GovernanceError::Io(e.to_string()))?;
        let Some(last) = session.last_session else {
            return Ok(None);
        };
        let current_id = self.resolve_current_actor_id(&last.actor_id).await?;
        Ok(Some(self.get_actor(&current_id).await?))
    }

    /// Record `actor_id` as the session's last-acting actor.
    pub async fn set_current_actor(&self, actor_id: &str, timestamp: &str) -> Result<(), GovernanceError> {
        self.session
            .update(|doc| {
                doc.last_session = Some(gg_config::LastSession {
                    actor_id: actor_id.to_string(),
                    timestamp: timestamp.to_string(),
                });
            })
            .await
            .map_err(|e| GovernanceError::Io(e.to_string()))
    }

    /// Decode `actor_id`'s current public key.
    pub async fn get_actor_public_key(&self, actor_id: &str) -> Result<gg_crypto::PublicKey, GovernanceError> {
        let record = self.get_actor(actor_id).await?;
        gg_crypto::decode_public_key(&record.payload.public_key).map_err(|e| GovernanceError::SignatureError {
            key_id: format!("{actor_id}: {e}"),
        })
    }

    /// Register an automated agent: a paired [`ActorRecord`] (type `agent`)
    /// plus its [`AgentRecord`] engine configuration.
    pub async fn create_agent(
        &self,
        slug: &str,
        display_name: &str,
        engine: &str,
        triggers: Vec<String>,
        roles: Vec<String>,
        timestamp: &str,
    ) -> Result<Record<AgentRecord>, GovernanceError> {
        let actor = self.create_actor(ActorType::Agent, slug, display_name, roles, timestamp).await?;
        let private_key = self.keystore.load_key(&actor.payload.id).await?;
        let payload = AgentRecord {
            id: actor.payload.id.clone(),
            engine: engine.to_string(),
            status: "active".to_string(),
            triggers,
            knowledge_dependencies: vec![],
            prompt_engine_requirements: serde_json::Value::Null,
        };
        let record = self.sign_and_build(payload, &private_key, &actor.payload.id, "self", timestamp, RecordKind::Agent)?;
        self.agent_store.put(&actor.payload.id, &record).await?;
        self.bus.publish(GovernanceEvent::new(
            "identity.agent.registered",
            "gg-identity",
            json!({ "agentId": actor.payload.id, "engine": engine }),
            timestamp,
        ));
        info!(agent_id = %actor.payload.id, engine, "agent registered");
        Ok(record)
    }

    /// Fetch an agent's engine configuration record.
    pub async fn get_agent(&self, agent_id: &str) -> Result<Record<AgentRecord>, GovernanceError> {
        self.agent_store.get(agent_id).await
    }

    /// All agent records currently on disk (best-effort).
    pub async fn list_agents(&self) -> Result<Vec<Record<AgentRecord>>, GovernanceError> {
        self.agent_store.list_records().await
    }

    /// Update an agent's free-form engine-defined status string.
    pub async fn update_agent_status(
        &self,
        agent_id: &str,
        status: &str,
        timestamp: &str,
    ) -> Result<Record<AgentRecord>, GovernanceError> {
        let record = self.agent_store.get(agent_id).await?;
        let mut payload = record.payload;
        payload.status = status.to_string();
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let private_key = self.keystore.load_key(agent_id).await?;
        let signature = gg_crypto::sign_payload(&payload_value, &private_key, agent_id, "self-update", None, timestamp);
        let updated = Record {
            header: Header::new(RecordKind::Agent, checksum, vec![signature]),
            payload,
        };
        self.agent_store.put(agent_id, &updated).await?;
        Ok(updated)
    }

    fn sign_and_build<T: serde::Serialize>(
        &self,
        payload: T,
        private_key: &gg_crypto::PrivateKey,
        key_id: &str,
        role: &str,
        timestamp: &str,
        kind: RecordKind,
    ) -> Result<Record<T>, GovernanceError> {
        let payload_value = serde_json::to_value(&payload)?;
        let checksum = gg_crypto::canonical_checksum(&payload_value);
        let signature = gg_crypto::sign_payload(&payload_value, private_key, key_id, role, None, timestamp);
        Ok(Record {
            header: Header::new(kind, checksum, vec![signature]),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn adapter(root: &Path) -> IdentityAdapter {
        IdentityAdapter::open(root, root.join(".session.json"), Arc::new(EventBus::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_actor_round_trips_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let record = identity
            .create_actor(ActorType::Human, "alice", "Alice", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let fetched = identity.get_actor(&record.payload.id).await.unwrap();
        assert_eq!(fetched.payload.display_name, "Alice");
    }

    #[tokio::test]
    async fn sign_record_produces_verifiable_signature() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let record = identity
            .create_actor(ActorType::Human, "bob", "Bob", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let payload = json!({"title": "do a thing"});
        let signatures = identity
            .sign_record(vec![], &payload, &record.payload.id, "author", None, "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let pk = identity.get_actor_public_key(&record.payload.id).await.unwrap();
        assert_eq!(signatures.len(), 1);
        assert!(gg_crypto::verify_signature(&signatures[0], &pk, &payload).unwrap());
    }

    #[tokio::test]
    async fn sign_record_falls_back_to_placeholder_without_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let payload = json!({"title": "do a thing"});
        let signatures = identity
            .sign_record(vec![], &payload, "agent-no-key", "author", None, "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].signature, gg_crypto::PlaceholderMarker::VALUE);
    }

    #[tokio::test]
    async fn sign_record_replaces_placeholder_once_a_key_is_available() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let record = identity
            .create_actor(ActorType::Agent, "reviewer", "Reviewer", vec!["approver:quality".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let payload = json!({"title": "do a thing"});
        let placeholder = gg_crypto::placeholder_signature(&record.payload.id, "approver:quality", "2024-01-01T00:00:00Z");
        let signatures = identity
            .sign_record(vec![placeholder], &payload, &record.payload.id, "approver:quality", None, "2024-01-01T00:01:00Z")
            .await
            .unwrap();
        assert_eq!(signatures.len(), 1);
        assert_ne!(signatures[0].signature, gg_crypto::PlaceholderMarker::VALUE);
    }

    #[tokio::test]
    async fn rotate_actor_key_supersedes_and_preserves_authorship() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let original = identity
            .create_actor(ActorType::Human, "carol", "Carol", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        let rotated = identity
            .rotate_actor_key(&original.payload.id, "2024-02-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(rotated.payload.id, "human:carol-v2");

        let old = identity.get_actor(&original.payload.id).await.unwrap();
        assert_eq!(old.payload.status, ActorStatus::Revoked);
        assert_eq!(old.payload.superseded_by.as_deref(), Some("human:carol-v2"));

        let resolved = identity.resolve_current_actor_id(&original.payload.id).await.unwrap();
        assert_eq!(resolved, "human:carol-v2");
    }

    #[tokio::test]
    async fn revoke_actor_sets_status_without_successor() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let actor = identity
            .create_actor(ActorType::Human, "dave", "Dave", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        identity.revoke_actor(&actor.payload.id, "2024-01-02T00:00:00Z").await.unwrap();
        let fetched = identity.get_actor(&actor.payload.id).await.unwrap();
        assert_eq!(fetched.payload.status, ActorStatus::Revoked);
        assert!(fetched.payload.superseded_by.is_none());
    }

    #[tokio::test]
    async fn current_actor_tracks_session() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        assert!(identity.get_current_actor().await.unwrap().is_none());

        let actor = identity
            .create_actor(ActorType::Human, "erin", "Erin", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        identity.set_current_actor(&actor.payload.id, "2024-01-01T00:01:00Z").await.unwrap();
        let current = identity.get_current_actor().await.unwrap().unwrap();
        assert_eq!(current.payload.id, actor.payload.id);
    }

    #[tokio::test]
    async fn current_actor_resolves_through_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let actor = identity
            .create_actor(ActorType::Human, "frank", "Frank", vec!["author".into()], "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        identity.set_current_actor(&actor.payload.id, "2024-01-01T00:01:00Z").await.unwrap();
        identity.rotate_actor_key(&actor.payload.id, "2024-02-01T00:00:00Z").await.unwrap();

        let current = identity.get_current_actor().await.unwrap().unwrap();
        assert_eq!(current.payload.id, "human:frank-v2");
    }

    #[tokio::test]
    async fn create_agent_registers_actor_and_agent_records() {
        let dir = tempfile::tempdir().unwrap();
        let identity = adapter(dir.path()).await;
        let agent = identity
            .create_agent(
                "scribe",
                "Scribe",
                "claude-code",
                vec!["task.created".into()],
                vec!["author".into()],
                "2024-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        assert_eq!(agent.payload.engine, "claude-code");
        let actor = identity.get_actor(&agent.payload.id).await.unwrap();
        assert_eq!(actor.payload.actor_type, ActorType::Agent);
    }

    #[tokio::test]
    async fn keystore_round_trips_owner_only_key() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).await.unwrap();
        let (_, sk) = gg_crypto::generate_keys();
        keystore.store_key("human:gina", &sk).await.unwrap();
        assert!(keystore.has_key("human:gina").await);
        let loaded = keystore.load_key("human:gina").await.unwrap();
        assert_eq!(loaded.to_bytes(), sk.to_bytes());
    }
}
