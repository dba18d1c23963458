// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! One-file-per-record content store.
//!
//! [`FileRecordStore`] is the sole filesystem I/O boundary for a given
//! [`gg_core::RecordKind`]. Every write recomputes and checks the payload
//! checksum before touching disk and lands atomically via a temp file plus
//! rename; every read re-verifies the checksum and every signature before
//! handing a record back to its caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use gg_core::{Header, Record, RecordKind};
use gg_error::GovernanceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

/// Resolves an actor's current public key for signature verification,
/// given the `keyId` recorded on a [`gg_core::Signature`]-equivalent.
///
/// Implementations typically wrap the identity adapter's succession-aware
/// lookup so a record signed before a key rotation still verifies.
pub type IdentityResolver =
    Arc<dyn Fn(String) -> BoxFuture<'static, Option<gg_crypto::PublicKey>> + Send + Sync>;

/// A one-file-per-record store for a single [`RecordKind`].
pub struct FileRecordStore<T> {
    dir: PathBuf,
    kind: RecordKind,
    identity_resolver: IdentityResolver,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> FileRecordStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Open (creating if absent) a store rooted at `dir` for records of
    /// `kind`, resolving signer keys through `identity_resolver`.
    pub async fn open(
        dir: impl Into<PathBuf>,
        kind: RecordKind,
        identity_resolver: IdentityResolver,
    ) -> Result<Self, GovernanceError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            kind,
            identity_resolver,
            _marker: std::marker::PhantomData,
        })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist `record` atomically under `id`.
    ///
    /// Recomputes the payload checksum and rejects the write with
    /// [`GovernanceError::ChecksumMismatchError`] if it does not match
    /// `record.header.payload_checksum` — the canonical bytes hashed are
    /// exactly the bytes written to disk.
    pub async fn put(&self, id: &str, record: &Record<T>) -> Result<(), GovernanceError> {
        let payload_value = serde_json::to_value(&record.payload)?;
        let expected = gg_crypto::canonical_checksum(&payload_value);
        if expected != record.header.payload_checksum {
            return Err(GovernanceError::ChecksumMismatchError {
                kind: self.kind.as_str().to_string(),
                id: id.to_string(),
            });
        }
        let full_value = serde_json::json!({
            "header": record.header,
            "payload": record.payload,
        });
        let bytes = gg_crypto::canonical_json(&full_value).into_bytes();
        let dir = self.dir.clone();
        let path = self.path_for(id);
        tokio::task::spawn_blocking(move || atomic_write(&dir, &path, &bytes))
            .await
            .map_err(|e| GovernanceError::AtomicOperationError {
                reason: format!("write task panicked: {e}"),
            })??;
        info!(kind = %self.kind, id, "record written");
        Ok(())
    }

    /// Read, parse, and fully re-validate the record stored under `id`.
    pub async fn get(&self, id: &str) -> Result<Record<T>, GovernanceError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GovernanceError::RecordNotFoundError {
                    kind: self.kind.as_str().to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let record: Record<T> = serde_json::from_slice(&bytes)?;
        self.validate_on_read(id, &record).await?;
        Ok(record)
    }

    async fn validate_on_read(&self, id: &str, record: &Record<T>) -> Result<(), GovernanceError> {
        let payload_value = serde_json::to_value(&record.payload)?;
        let expected = gg_crypto::canonical_checksum(&payload_value);
        if expected != record.header.payload_checksum {
            return Err(GovernanceError::ChecksumMismatchError {
                kind: self.kind.as_str().to_string(),
                id: id.to_string(),
            });
        }
        if record.header.signatures.is_empty() {
            return Err(GovernanceError::SignatureError {
                key_id: String::new(),
            });
        }
        for signature in &record.header.signatures {
            let Some(public_key) = (self.identity_resolver)(signature.key_id.clone()).await else {
                return Err(GovernanceError::SignatureError {
                    key_id: signature.key_id.clone(),
                });
            };
            let verified = gg_crypto::verify_signature(signature, &public_key, &payload_value)
                .map_err(|_| GovernanceError::SignatureError {
                    key_id: signature.key_id.clone(),
                })?;
            if !verified {
                return Err(GovernanceError::SignatureError {
                    key_id: signature.key_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Enumerate ids of records currently present, in unspecified order.
    pub async fn list(&self) -> Result<Vec<String>, GovernanceError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Best-effort read of every currently present record.
    ///
    /// A record that fails to parse or re-validate is logged and omitted
    /// rather than failing the whole listing (§7: "a corrupt record ...
    /// is omitted from the list").
    pub async fn list_records(&self) -> Result<Vec<Record<T>>, GovernanceError> {
        let ids = self.list().await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(kind = %self.kind, id, error = %e, "skipping corrupt record during list");
                    warn!(kind = %self.kind, id, "record omitted from listing");
                }
            }
        }
        Ok(records)
    }

    /// `true` if a record with `id` is currently present.
    pub async fn exists(&self, id: &str) -> bool {
        tokio::fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }

    /// Remove the record stored under `id`.
    pub async fn delete(&self, id: &str) -> Result<(), GovernanceError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                info!(kind = %self.kind, id, "record deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GovernanceError::RecordNotFoundError {
                    kind: self.kind.as_str().to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to `path` atomically via a temp file in `dir` plus rename.
fn atomic_write(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), GovernanceError> {
    use std::io::Write as _;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        GovernanceError::AtomicOperationError {
            reason: format!("failed to create temp file: {e}"),
        }
    })?;
    tmp.write_all(bytes).map_err(|e| GovernanceError::AtomicOperationError {
        reason: format!("failed to write temp file: {e}"),
    })?;
    tmp.flush().map_err(|e| GovernanceError::AtomicOperationError {
        reason: format!("failed to flush temp file: {e}"),
    })?;
    tmp.persist(path).map_err(|e| GovernanceError::AtomicOperationError {
        reason: format!("failed to persist temp file over {}: {}", path.display(), e.error),
    })?;
    Ok(())
}

/// Mock [`IdentityResolver`] that resolves nothing; useful for tests that
/// only exercise unsigned/placeholder-signed fixtures.
#[must_use]
pub fn no_resolver() -> IdentityResolver {
    Arc::new(|_key_id| Box::pin(async { None }))
}

/// [`IdentityResolver`] that resolves every `keyId` to the same fixed key;
/// useful for single-actor test fixtures.
#[must_use]
pub fn fixed_resolver(public_key: gg_crypto::PublicKey) -> IdentityResolver {
    Arc::new(move |_key_id| {
        let key = public_key;
        Box::pin(async move { Some(key) })
    })
}
