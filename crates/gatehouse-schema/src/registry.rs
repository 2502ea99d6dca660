use crate::hash::Sha256Digest;
use crate::package::PackageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Verification state of a package in the local registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryStatus {
    /// Present but not yet through the trust gate.
    #[default]
    Unverified,
    /// Hash, signature and scan all passed at install time.
    Verified,
    /// Failed a trust check; moved to the quarantine area.
    Quarantined,
    /// Administratively blocked.
    Blocked,
}

/// Durable record for one `(id, version)` package.
///
/// A `verified` entry's stored hash must equal the hash of the bytes at its
/// location; if the location is gone or the hash no longer matches, callers
/// treat the entry as absent and re-fetch. Quarantined entries are never
/// deleted by the gateway; they are the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Package identity.
    pub id: String,
    /// Version string.
    pub version: String,
    /// Content hash at the time the entry was written.
    pub sha256: Sha256Digest,
    /// Mod or resource.
    pub kind: PackageKind,
    /// Where the content lives: the install directory for verified entries,
    /// the quarantine location for quarantined ones.
    pub path: PathBuf,
    /// Verification state.
    pub status: RegistryStatus,
    /// When the content scanner last looked at the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Utc>>,
    /// Short human-readable failure reason; present only when quarantined or
    /// blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RegistryEntry {
    /// Whether the entry may be handed to the game launcher.
    pub fn is_usable(&self) -> bool {
        self.status == RegistryStatus::Verified
    }
}

/// The full package registry, persisted as a single JSON document and
/// rewritten atomically on every sync.
pub type Registry = BTreeMap<String, RegistryEntry>;

/// Registry key for a package: `"<id>:<version>"`.
pub fn entry_key(id: &str, version: &str) -> String {
    format!("{id}:{version}")
}
