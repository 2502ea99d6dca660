use crate::hash::Sha256Digest;
use serde::{Deserialize, Serialize};

/// One file of a client build as described by the update manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the build directory.
    pub path: String,
    /// Expected content hash of the file.
    pub sha256: Sha256Digest,
    /// Size in bytes, for progress display.
    pub size: u64,
    /// Absolute download URL; when absent the file is fetched relative to
    /// the channel's update base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The authoritative description of a full client build. Immutable once
/// fetched; a snapshot is written next to every installed build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Unique identifier of the build, e.g. `2026-07-beta12`.
    pub build_id: String,
    /// Version of the game runtime the build targets.
    #[serde(alias = "runtimeVersion")]
    pub runtime_version: String,
    /// Update track this build belongs to (stable, nightly, ...).
    pub channel: String,
    /// Ordered list of every file in the build.
    pub files: Vec<ManifestFile>,
    /// Detached signature over the manifest, base64.
    pub signature: String,
}

impl Manifest {
    /// Look up a manifest entry by its relative path.
    pub fn file_by_path(&self, rel_path: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.path == rel_path)
    }
}
