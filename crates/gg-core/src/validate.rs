// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural checks shared by every per-kind `validate*Detailed` function.
//!
//! Each adapter validator re-checks its own payload invariants and then
//! folds in [`validate_header`] for the common 20% every record needs:
//! a non-empty checksum and at least one signature.

use gg_error::FieldError;

use crate::Header;

/// Checks common to every record's header, independent of payload kind.
#[must_use]
pub fn validate_header(header: &Header) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if header.payload_checksum.trim().is_empty() {
        errors.push(FieldError::new("header.payloadChecksum", "must not be empty"));
    }
    if header.signatures.is_empty() {
        errors.push(FieldError::new(
            "header.signatures",
            "must contain at least one signature",
        ));
    }
    errors
}

/// Require a string field to be non-empty after trimming.
pub fn require_non_empty(field: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    }
}

/// Require a string field to be at least `min_len` characters long.
pub fn require_min_len(field: &str, value: &str, min_len: usize, errors: &mut Vec<FieldError>) {
    if value.chars().count() < min_len {
        errors.push(
            FieldError::new(field, format!("must be at least {min_len} characters"))
                .with_value(value),
        );
    }
}

/// Require a collection field to be non-empty.
pub fn require_non_empty_list<T>(field: &str, value: &[T], errors: &mut Vec<FieldError>) {
    if value.is_empty() {
        errors.push(FieldError::new(field, "must contain at least one entry"));
    }
}
