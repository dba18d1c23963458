// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Ed25519 signing, verification, and canonical payload hashing.
//!
//! This crate is the sole place in the kernel that touches cryptographic
//! primitives. Everything above it works with hex/base64 strings and the
//! [`Signature`] record shape, never raw key material.

use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A verifying (public) key. Re-exported under a domain name so call sites
/// read `PublicKey`/`PrivateKey` instead of the dalek vocabulary.
pub type PublicKey = VerifyingKey;
/// A signing (private) key.
pub type PrivateKey = SigningKey;

/// Errors raised by key decoding, signing, or verification.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A base64-decoded or raw key did not decode to a valid Ed25519 key.
    #[error("invalid public/private key bytes: {0}")]
    InvalidKeyBytes(String),

    /// A base64-decoded or raw signature did not decode to 64 bytes.
    #[error("invalid signature bytes: {0}")]
    InvalidSignatureBytes(String),

    /// A signature failed cryptographic verification.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Payload serialization failed while computing a canonical checksum.
    #[error("canonical json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single signature entry attached to a record header.
///
/// `signature` is the base64 encoding of an Ed25519 signature over the
/// UTF-8 bytes of the *hex string* `payloadChecksum` — the checksum and
/// the signature cover identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Id of the actor key that produced this signature.
    #[serde(rename = "keyId")]
    pub key_id: String,
    /// Role the signer claims to act in (`author`, `approver:quality`, ...).
    pub role: String,
    /// Free-text signer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Base64-encoded Ed25519 signature bytes.
    pub signature: String,
    /// RFC3339 timestamp of signing.
    pub timestamp: String,
}

/// Sentinel value used in place of `signature` for dev/test signing when no
/// private key is available. Never produced for a real verification path.
#[derive(Debug)]
pub struct PlaceholderMarker;

impl PlaceholderMarker {
    /// The literal sentinel signature string.
    pub const VALUE: &'static str = "PLACEHOLDER";
}

/// Generate a fresh Ed25519 keypair using the OS RNG.
#[must_use]
pub fn generate_keys() -> (PublicKey, PrivateKey) {
    use rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}

/// Base64-encode a public key (§3: `publicKey (base64)`).
#[must_use]
pub fn encode_public_key(key: &PublicKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
}

/// Decode a base64-encoded public key.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidKeyBytes(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyBytes("expected 32 bytes".into()))?;
    PublicKey::from_bytes(&arr).map_err(|e| CryptoError::InvalidKeyBytes(e.to_string()))
}

/// Base64-encode a private key. Callers persist this to the keystore file.
#[must_use]
pub fn encode_private_key(key: &PrivateKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.to_bytes())
}

/// Decode a base64-encoded private key.
pub fn decode_private_key(encoded: &str) -> Result<PrivateKey, CryptoError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidKeyBytes(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyBytes("expected 32 bytes".into()))?;
    Ok(PrivateKey::from_bytes(&arr))
}

/// Recursively sort object keys and reserialize with no insignificant
/// whitespace. Not a full JCS implementation but stable for our record
/// types: every key at every nesting level is ordered lexicographically.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_value(value)).expect("sorted value always serializes")
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_value(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// SHA-256 over arbitrary bytes, hex-encoded lowercase.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String never fails");
    }
    out
}

/// `canonicalChecksum(payload)`: SHA-256 hex of the canonical serialization.
#[must_use]
pub fn canonical_checksum(payload: &Value) -> String {
    sha256_hex(canonical_json(payload).as_bytes())
}

/// Sign the hex-string bytes of a payload's checksum.
///
/// `signPayload(payload, privateKey, keyId, role, notes)`: recomputes the
/// checksum from `payload`, signs its UTF-8 bytes, and returns the
/// resulting [`Signature`]. `timestamp` must be supplied by the caller
/// (this crate never reads the clock).
pub fn sign_payload(
    payload: &Value,
    private_key: &PrivateKey,
    key_id: impl Into<String>,
    role: impl Into<String>,
    notes: Option<String>,
    timestamp: impl Into<String>,
) -> Signature {
    let checksum = canonical_checksum(payload);
    let sig = private_key.sign(checksum.as_bytes());
    Signature {
        key_id: key_id.into(),
        role: role.into(),
        notes,
        signature: base64::engine::general_purpose::STANDARD.encode(sig.to_bytes()),
        timestamp: timestamp.into(),
    }
}

/// Verify a [`Signature`] against `payload` and the claimed `public_key`.
///
/// Returns `Ok(true)`/`Ok(false)` rather than propagating dalek's error so
/// callers can distinguish "malformed signature bytes" ([`CryptoError`])
/// from "well-formed but does not verify" (`Ok(false)`).
pub fn verify_signature(
    signature: &Signature,
    public_key: &PublicKey,
    payload: &Value,
) -> Result<bool, CryptoError> {
    if signature.signature == PlaceholderMarker::VALUE {
        return Ok(false);
    }
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(&signature.signature)
        .map_err(|e| CryptoError::InvalidSignatureBytes(e.to_string()))?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureBytes("expected 64 bytes".into()))?;
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&sig_arr);
    let checksum = canonical_checksum(payload);
    Ok(public_key.verify(checksum.as_bytes(), &dalek_sig).is_ok())
}

/// Build a dev/test placeholder signature that never verifies, used when
/// no private key is available for the signer.
#[must_use]
pub fn placeholder_signature(
    key_id: impl Into<String>,
    role: impl Into<String>,
    timestamp: impl Into<String>,
) -> Signature {
    Signature {
        key_id: key_id.into(),
        role: role.into(),
        notes: None,
        signature: PlaceholderMarker::VALUE.to_string(),
        timestamp: timestamp.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let value = json!({"b": 1, "a": 2, "c": {"z": 1, "y": 2}});
        assert_eq!(canonical_json(&value), r#"{"a":2,"b":1,"c":{"y":2,"z":1}}"#);
    }

    #[test]
    fn canonical_json_has_no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        let s = canonical_json(&value);
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn checksum_is_deterministic_across_key_order() {
        let a = json!({"title": "T", "status": "draft"});
        let b = json!({"status": "draft", "title": "T"});
        assert_eq!(canonical_checksum(&a), canonical_checksum(&b));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let (pk, sk) = generate_keys();
        let payload = json!({"title": "do the thing"});
        let sig = sign_payload(&payload, &sk, "human:alice", "author", None, "2024-01-01T00:00:00Z");
        assert!(verify_signature(&sig, &pk, &payload).unwrap());
    }

    #[test]
    fn verify_fails_for_tampered_payload() {
        let (pk, sk) = generate_keys();
        let payload = json!({"title": "original"});
        let sig = sign_payload(&payload, &sk, "human:alice", "author", None, "2024-01-01T00:00:00Z");
        let tampered = json!({"title": "tampered"});
        assert!(!verify_signature(&sig, &pk, &tampered).unwrap());
    }

    #[test]
    fn verify_fails_for_wrong_key() {
        let (_pk, sk) = generate_keys();
        let (other_pk, _other_sk) = generate_keys();
        let payload = json!({"title": "x"});
        let sig = sign_payload(&payload, &sk, "human:alice", "author", None, "2024-01-01T00:00:00Z");
        assert!(!verify_signature(&sig, &other_pk, &payload).unwrap());
    }

    #[test]
    fn placeholder_signature_never_verifies() {
        let (pk, _sk) = generate_keys();
        let payload = json!({"title": "x"});
        let sig = placeholder_signature("human:bob", "author", "2024-01-01T00:00:00Z");
        assert!(!verify_signature(&sig, &pk, &payload).unwrap());
    }

    #[test]
    fn public_key_encode_decode_round_trip() {
        let (pk, _sk) = generate_keys();
        let encoded = encode_public_key(&pk);
        let decoded = decode_public_key(&encoded).unwrap();
        assert_eq!(pk, decoded);
    }

    #[test]
    fn decode_public_key_rejects_bad_length() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"too-short");
        assert!(matches!(
            decode_public_key(&encoded),
            Err(CryptoError::InvalidKeyBytes(_))
        ));
    }

    #[test]
    fn private_key_encode_decode_round_trip() {
        let (_pk, sk) = generate_keys();
        let encoded = encode_private_key(&sk);
        let decoded = decode_private_key(&encoded).unwrap();
        assert_eq!(sk.to_bytes(), decoded.to_bytes());
    }

    proptest::proptest! {
        #[test]
        fn checksum_is_stable_under_reserialization(title in "[a-z ]{1,40}") {
            let payload = json!({"title": title, "nested": {"b": 1, "a": 2}});
            let once = canonical_checksum(&payload);
            let reparsed: Value = serde_json::from_str(&canonical_json(&payload)).unwrap();
            let twice = canonical_checksum(&reparsed);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
