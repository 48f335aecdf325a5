//! Generated identifiers for runs and handoff packets.
//!
//! Node, workflow, and edge identifiers are user-authored slugs (see
//! [`crate::slug`]) rather than generated ids, so they are not modeled here.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Generate `count` random bytes and hex-encode them.
fn random_hex(count: usize) -> String {
    let mut bytes = vec![0u8; count];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Unique identifier for a workflow run: `wfr_` followed by 12 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a new random run id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("wfr_{}", random_hex(6)))
    }

    /// Wrap an existing string as a run id without validation.
    ///
    /// Used when parsing ids out of external input (e.g. a path segment);
    /// callers that need a fresh id should use [`Self::generate`] instead.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a handoff packet: `hnd_` followed by 10 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandoffPacketId(String);

impl HandoffPacketId {
    /// Generate a new random handoff packet id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("hnd_{}", random_hex(5)))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandoffPacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_has_expected_shape() {
        let id = RunId::generate();
        assert!(id.as_str().starts_with("wfr_"));
        assert_eq!(id.as_str().len(), "wfr_".len() + 12);
    }

    #[test]
    fn run_id_unique_across_calls() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn handoff_id_has_expected_shape() {
        let id = HandoffPacketId::generate();
        assert!(id.as_str().starts_with("hnd_"));
        assert_eq!(id.as_str().len(), "hnd_".len() + 10);
    }

    #[test]
    fn run_id_serde_roundtrip() {
        let id = RunId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn run_id_display() {
        let id = RunId::from_raw("wfr_deadbeef0001");
        assert_eq!(id.to_string(), "wfr_deadbeef0001");
    }
}
