use crate::hash::Sha256Digest;
use serde::{Deserialize, Serialize};

/// Whether a package is game logic or pure content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// A gameplay mod archive (default).
    #[default]
    Mod,
    /// A resource pack (textures, audio, ...).
    Resource,
}

/// A package a server requires for joining a session, as received from the
/// matchmaking handshake. Immutable and never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRequirement {
    /// Package identity, unique per marketplace.
    pub id: String,
    /// Version string as published.
    pub version: String,
    /// Content hash the server expects the archive bytes to have.
    pub sha256: Sha256Digest,
    /// Whether the package is paid content.
    #[serde(default)]
    pub paid: bool,
}

/// Where a required package can be fetched from, offered by the handshake
/// alongside the requirement itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSource {
    /// Absolute download URL for the archive.
    pub url: String,
    /// Detached RSA-PSS signature over the archive bytes, base64. Absent for
    /// unsigned (free) packages.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Everything needed to drive a single fetch-and-verify pass for one
/// package. Built internally from a [`PackageRequirement`] plus whatever
/// source the handshake offered; transient.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// Package identity.
    pub id: String,
    /// Version string.
    pub version: String,
    /// Expected content hash.
    pub sha256: Sha256Digest,
    /// Mod or resource.
    pub kind: PackageKind,
    /// Whether the package is paid content.
    pub paid: bool,
    /// Download URL, if the handshake offered one.
    pub url: Option<String>,
    /// Detached signature, if the package is signed.
    pub signature: Option<String>,
}

impl PackageDescriptor {
    /// Combine a requirement with its (optional) handshake source.
    pub fn from_requirement(req: &PackageRequirement, source: Option<PackageSource>) -> Self {
        let (url, signature) = match source {
            Some(source) => (Some(source.url), source.signature),
            None => (None, None),
        };
        Self {
            id: req.id.clone(),
            version: req.version.clone(),
            sha256: req.sha256.clone(),
            kind: PackageKind::Mod,
            paid: req.paid,
            url,
            signature,
        }
    }
}
