//! The package cache: fetch, verify, install or quarantine.
//!
//! `sync` is the only door through which mod and resource packages reach a
//! directory the launcher will hand to the game process. Every queued
//! package flows through the same gates, in cost order: content hash first
//! (a corrupted transfer is not a security question and skips the rest),
//! then detached signature, then content scan. The outcome of each gate is
//! a tagged value; registry mutation and filesystem moves happen strictly
//! off the tag, so the decision logic stays testable without I/O.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use gatehouse_schema::{
    entry_key, PackageDescriptor, PackageRequirement, PackageSource, RegistryEntry,
    RegistryStatus, Sha256Digest,
};

use crate::config::{GatehouseConfig, ScanPosture};
use crate::io::download::fetch_to;
use crate::paths::Layout;
use crate::quarantine::{move_file, quarantine_artifact};
use crate::registry::{RegistryError, RegistryStore};
use crate::trust::{Scanner, SignatureVerifier, TrustedKeys};

/// Failure modes of a whole sync pass. Individual package failures are not
/// errors -- those packages are simply absent from the result.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The updated registry could not be persisted; trust state is unknown.
    #[error("registry write failed: {0}")]
    Registry(#[from] RegistryError),

    /// The cache directories could not be prepared.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How one queued package came out of the pipeline.
enum SyncOutcome {
    /// All gates passed; the entry points at the install location.
    Verified(RegistryEntry),
    /// A gate failed; the entry points into the quarantine area.
    Quarantined(RegistryEntry),
    /// The package never made it to the gates (no URL, network failure).
    /// Not recorded in the registry.
    Unavailable {
        id: String,
        version: String,
        cause: String,
    },
}

/// Resolves a requirement to the download source the server handshake
/// offered for it. The wire format of that handshake is not this crate's
/// concern; callers implement this seam however they talk to the server.
pub trait SourceProvider: Send + Sync {
    /// The source for `(id, version)`, if one was offered.
    fn source_for(&self, id: &str, version: &str) -> Option<PackageSource>;
}

/// In-memory [`SourceProvider`] backed by a map, filled from a handshake
/// payload (or by tests).
#[derive(Debug, Clone, Default)]
pub struct StaticSources {
    sources: HashMap<String, PackageSource>,
}

impl StaticSources {
    /// An empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the source for `(id, version)`.
    pub fn insert(&mut self, id: &str, version: &str, source: PackageSource) {
        self.sources.insert(entry_key(id, version), source);
    }
}

impl SourceProvider for StaticSources {
    fn source_for(&self, id: &str, version: &str) -> Option<PackageSource> {
        self.sources.get(&entry_key(id, version)).cloned()
    }
}

/// Orchestrates the fetch/verify/install/quarantine workflow for a
/// requirement set and owns the registry while doing so.
pub struct PackageCache {
    layout: Layout,
    config: GatehouseConfig,
    client: Client,
    verifier: SignatureVerifier,
    scanner: Arc<dyn Scanner>,
    store: RegistryStore,
}

impl std::fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCache")
            .field("layout", &self.layout)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PackageCache {
    /// A cache rooted at `layout`, trusting `keys` and scanning with
    /// `scanner`.
    pub fn new(
        layout: Layout,
        config: GatehouseConfig,
        keys: TrustedKeys,
        scanner: Arc<dyn Scanner>,
    ) -> Self {
        let store = RegistryStore::new(layout.registry_path());
        Self {
            layout,
            config,
            client: Client::new(),
            verifier: SignatureVerifier::new(keys),
            scanner,
            store,
        }
    }

    /// Ensure every required package is present and verified.
    ///
    /// Returns the on-disk locations the caller may trust and pass onward;
    /// a package that failed a gate or could not be fetched is simply not
    /// in the set. The registry is rewritten exactly once, after all
    /// outcomes are known.
    ///
    /// # Errors
    ///
    /// Only a registry write failure or an unpreparable cache directory is
    /// an error; per-package failures are not.
    pub async fn sync(
        &self,
        requirements: &[PackageRequirement],
        sources: &dyn SourceProvider,
    ) -> Result<Vec<PathBuf>, SyncError> {
        self.layout.ensure_dirs()?;

        let mut registry = self.store.load();
        let mut verified_paths = Vec::new();
        let mut to_fetch = Vec::new();
        let mut queued = HashSet::new();

        for req in requirements {
            let key = entry_key(&req.id, &req.version);
            if reuse_verified(registry.get(&key), req) {
                tracing::debug!("reusing verified package {key}");
                if let Some(entry) = registry.get(&key) {
                    verified_paths.push(entry.path.clone());
                }
                continue;
            }
            if !queued.insert(key.clone()) {
                continue;
            }
            tracing::debug!("queueing fetch for {key}");
            let source = sources.source_for(&req.id, &req.version);
            to_fetch.push(PackageDescriptor::from_requirement(req, source));
        }

        for outcome in self.fetch_all(to_fetch).await {
            match outcome {
                SyncOutcome::Verified(entry) => {
                    verified_paths.push(entry.path.clone());
                    registry.insert(entry_key(&entry.id, &entry.version), entry);
                }
                SyncOutcome::Quarantined(entry) => {
                    registry.insert(entry_key(&entry.id, &entry.version), entry);
                }
                SyncOutcome::Unavailable { id, version, cause } => {
                    tracing::warn!("package {id}:{version} unavailable: {cause}");
                }
            }
        }

        self.store.save(&registry)?;
        Ok(verified_paths)
    }

    /// Run every queued fetch under the configured concurrency ceiling and
    /// collect the outcomes behind a join barrier.
    async fn fetch_all(&self, descriptors: Vec<PackageDescriptor>) -> Vec<SyncOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.download_concurrency.max(1)));
        let mut set: JoinSet<SyncOutcome> = JoinSet::new();

        for descriptor in descriptors {
            let worker = FetchWorker {
                client: self.client.clone(),
                layout: self.layout.clone(),
                verifier: self.verifier.clone(),
                scanner: self.scanner.clone(),
                scan: self.config.scan,
            };
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                worker.process(descriptor).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => tracing::warn!("package task failed: {err}"),
            }
        }
        outcomes
    }
}

/// Reuse the existing entry only if it is verified, its stored hash equals
/// what the server expects now, and its content is still where the entry
/// says it is. Anything else means re-fetch.
fn reuse_verified(entry: Option<&RegistryEntry>, req: &PackageRequirement) -> bool {
    match entry {
        Some(entry) => {
            entry.status == RegistryStatus::Verified
                && entry.sha256 == req.sha256
                && entry.path.exists()
        }
        None => false,
    }
}

/// Everything one spawned fetch needs, cloned out of the cache so the task
/// is `'static`.
struct FetchWorker {
    client: Client,
    layout: Layout,
    verifier: SignatureVerifier,
    scanner: Arc<dyn Scanner>,
    scan: ScanPosture,
}

impl FetchWorker {
    async fn process(&self, descriptor: PackageDescriptor) -> SyncOutcome {
        let Some(url) = descriptor.url.clone() else {
            return unavailable(&descriptor, "no download URL offered by the handshake");
        };

        let archive = self
            .layout
            .cache_dir()
            .join(format!("{}-{}.zip", descriptor.id, descriptor.version));

        let actual = match fetch_to(&self.client, &url, &archive).await {
            Ok(digest) => digest,
            Err(err) => return unavailable(&descriptor, &err.to_string()),
        };

        self.gate_and_install(descriptor, archive, actual).await
    }

    /// The trust gates, in cost order, then the install. Called only with
    /// the archive fully on disk and its digest computed.
    async fn gate_and_install(
        &self,
        descriptor: PackageDescriptor,
        archive: PathBuf,
        actual: Sha256Digest,
    ) -> SyncOutcome {
        if actual != descriptor.sha256 {
            let reason = format!(
                "integrity mismatch: expected {}, got {actual}",
                descriptor.sha256
            );
            return self.quarantine(descriptor, &archive, actual, &reason);
        }

        match self.check_signature(&descriptor, &archive).await {
            Ok(true) => {}
            Ok(false) => {
                return self.quarantine(
                    descriptor,
                    &archive,
                    actual,
                    "signature rejected: no trusted key match",
                );
            }
            Err(err) => return unavailable(&descriptor, &format!("signature check failed: {err}")),
        }

        match self.scan {
            ScanPosture::Enabled => match self.scanner.scan(&archive).await {
                crate::trust::ScanOutcome::Clean => {}
                crate::trust::ScanOutcome::Flagged(diagnostic) => {
                    let reason = format!("scanner flagged: {diagnostic}");
                    return self.quarantine(descriptor, &archive, actual, &reason);
                }
            },
            ScanPosture::Disabled => {
                tracing::debug!("content scanning disabled by configuration");
            }
        }

        let target_dir = self.layout.mod_path(&descriptor.id, &descriptor.version);
        if let Err(err) = install_archive(&archive, &target_dir) {
            return unavailable(&descriptor, &format!("install failed: {err}"));
        }

        SyncOutcome::Verified(RegistryEntry {
            id: descriptor.id,
            version: descriptor.version,
            sha256: actual,
            kind: descriptor.kind,
            path: target_dir,
            status: RegistryStatus::Verified,
            scanned_at: self.scanner.last_scan_at(),
            reason: None,
        })
    }

    /// Streaming the whole archive through the digest is blocking work.
    async fn check_signature(
        &self,
        descriptor: &PackageDescriptor,
        archive: &Path,
    ) -> std::io::Result<bool> {
        let verifier = self.verifier.clone();
        let archive = archive.to_path_buf();
        let signature = descriptor.signature.clone();
        tokio::task::spawn_blocking(move || verifier.verify_file(&archive, signature.as_deref()))
            .await
            .map_err(std::io::Error::other)?
    }

    fn quarantine(
        &self,
        descriptor: PackageDescriptor,
        archive: &Path,
        hash_at_failure: Sha256Digest,
        reason: &str,
    ) -> SyncOutcome {
        match quarantine_artifact(
            &self.layout.quarantine_dir(),
            archive,
            &descriptor,
            hash_at_failure,
            reason,
        ) {
            Ok(entry) => SyncOutcome::Quarantined(entry),
            Err(err) => unavailable(&descriptor, &format!("quarantine move failed: {err}")),
        }
    }
}

fn unavailable(descriptor: &PackageDescriptor, cause: &str) -> SyncOutcome {
    SyncOutcome::Unavailable {
        id: descriptor.id.clone(),
        version: descriptor.version.clone(),
        cause: cause.to_string(),
    }
}

/// Recreate the package's install directory and move the verified archive
/// into it, replacing any prior contents wholesale.
fn install_archive(archive: &Path, target_dir: &Path) -> std::io::Result<()> {
    if target_dir.exists() {
        std::fs::remove_dir_all(target_dir)?;
    }
    std::fs::create_dir_all(target_dir)?;

    let file_name = archive.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("archive path {} has no file name", archive.display()),
        )
    })?;
    move_file(archive, &target_dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_schema::PackageKind;

    fn digest(hex: &str) -> Sha256Digest {
        Sha256Digest::new(hex).unwrap()
    }

    fn requirement() -> PackageRequirement {
        PackageRequirement {
            id: "fog".into(),
            version: "1.0".into(),
            sha256: digest("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"),
            paid: false,
        }
    }

    fn verified_entry(path: PathBuf) -> RegistryEntry {
        RegistryEntry {
            id: "fog".into(),
            version: "1.0".into(),
            sha256: digest("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"),
            kind: PackageKind::Mod,
            path,
            status: RegistryStatus::Verified,
            scanned_at: None,
            reason: None,
        }
    }

    #[test]
    fn reuse_requires_matching_hash_and_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().to_path_buf();
        let req = requirement();

        // verified, hash matches, path exists -> reuse
        assert!(reuse_verified(Some(&verified_entry(present.clone())), &req));

        // path gone -> stale, re-fetch
        assert!(!reuse_verified(
            Some(&verified_entry(dir.path().join("missing"))),
            &req
        ));

        // hash changed server-side -> re-fetch
        let mut entry = verified_entry(present.clone());
        entry.sha256 =
            digest("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert!(!reuse_verified(Some(&entry), &req));

        // quarantined entries are never reused
        let mut entry = verified_entry(present);
        entry.status = RegistryStatus::Quarantined;
        assert!(!reuse_verified(Some(&entry), &req));

        assert!(!reuse_verified(None, &req));
    }

    #[test]
    fn static_sources_resolve_by_id_and_version() {
        let mut sources = StaticSources::new();
        sources.insert(
            "fog",
            "1.0",
            PackageSource {
                url: "https://dl.example/fog.zip".into(),
                signature: None,
            },
        );
        assert!(sources.source_for("fog", "1.0").is_some());
        assert!(sources.source_for("fog", "2.0").is_none());
        assert!(sources.source_for("rain", "1.0").is_none());
    }

    #[test]
    fn install_archive_replaces_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("fog-1.0.zip");
        std::fs::write(&archive, b"new bytes").unwrap();

        let target = dir.path().join("mods").join("fog-1.0");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.zip"), b"old bytes").unwrap();

        install_archive(&archive, &target).unwrap();

        assert!(!archive.exists());
        assert!(!target.join("stale.zip").exists());
        assert_eq!(
            std::fs::read(target.join("fog-1.0.zip")).unwrap(),
            b"new bytes"
        );
    }
}
