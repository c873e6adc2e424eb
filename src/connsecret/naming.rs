//! # Connection Secret Naming
//!
//! Deterministic Kubernetes-safe names and label values for connection
//! secrets. Existing consumers look secrets up by these names, so the
//! derivation must stay byte-for-byte stable.

use crate::constants::{MAX_LABEL_VALUE_LENGTH, MAX_NAME_LENGTH};
use regex::Regex;
use std::sync::LazyLock;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9.-]+").expect("Failed to compile identifier pattern - this should never happen")
});

/// Lower-case, collapse every run of characters outside `[a-z0-9.-]` into a
/// single `-`, truncate to `max_len`
fn normalize(value: &str, max_len: usize) -> String {
    let lowered = value.to_lowercase();
    let mut normalized = DISALLOWED.replace_all(&lowered, "-").into_owned();
    // only ASCII survives the replacement, so byte truncation is safe
    normalized.truncate(max_len);
    normalized
}

/// Normalize for use as an object name (253 characters)
#[must_use]
pub fn normalize_identifier(value: &str) -> String {
    normalize(value, MAX_NAME_LENGTH)
}

/// Normalize for use as a label value (63 characters)
#[must_use]
pub fn normalize_label_value(value: &str) -> String {
    normalize(value, MAX_LABEL_VALUE_LENGTH)
}

/// Name of the connection secret for a (project, cluster, user) triple
#[must_use]
pub fn connection_secret_name(project_name: &str, cluster_name: &str, username: &str) -> String {
    normalize_identifier(&format!(
        "{}-{}-{}",
        normalize_identifier(project_name),
        normalize_identifier(cluster_name),
        normalize_identifier(username)
    ))
}
