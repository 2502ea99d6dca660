//! Shared failure handling: isolate an artifact that failed a trust check.
//!
//! A failed artifact must never stay in a location the launcher could load
//! from, and it is never deleted either -- the quarantine area is the audit
//! trail a player or admin inspects after an install is refused.

use gatehouse_schema::{PackageDescriptor, RegistryEntry, RegistryStatus, Sha256Digest};
use std::path::Path;

/// Move `artifact` into the quarantine area and build the registry entry
/// recording why.
///
/// # Errors
///
/// Returns an error if the artifact cannot be moved; the caller must then
/// treat the package as unavailable rather than verified.
pub fn quarantine_artifact(
    quarantine_dir: &Path,
    artifact: &Path,
    descriptor: &PackageDescriptor,
    hash_at_failure: Sha256Digest,
    reason: &str,
) -> std::io::Result<RegistryEntry> {
    std::fs::create_dir_all(quarantine_dir)?;

    let file_name = artifact.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("artifact path {} has no file name", artifact.display()),
        )
    })?;
    let dest = quarantine_dir.join(file_name);
    move_file(artifact, &dest)?;

    tracing::warn!(
        "package {}:{} quarantined: {reason}",
        descriptor.id,
        descriptor.version
    );

    Ok(RegistryEntry {
        id: descriptor.id.clone(),
        version: descriptor.version.clone(),
        sha256: hash_at_failure,
        kind: descriptor.kind,
        path: dest,
        status: RegistryStatus::Quarantined,
        scanned_at: None,
        reason: Some(reason.to_string()),
    })
}

/// Rename, falling back to copy+delete when source and destination sit on
/// different volumes.
pub(crate) fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dest)?;
            std::fs::remove_file(src)
        }
    }
}
