//! Manifest-driven full-build updates.
//!
//! A build is all-or-nothing: the target directory is recreated from
//! scratch, every file is downloaded with bounded parallelism and verified
//! against its manifest hash, and only after the last file has passed does
//! the channel marker flip to the new build id. A failed apply may leave a
//! partial directory behind, but the marker never points at it, so the
//! launcher keeps using the previous known-good build.

use std::path::{Component, Path};
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use gatehouse_schema::{Manifest, ManifestFile, Sha256Digest};

use crate::config::GatehouseConfig;
use crate::io::download::{fetch_verified, DownloadError};
use crate::paths::Layout;

/// Sentinel build id reported when a channel has no marker yet.
pub const UNKNOWN_BUILD: &str = "unknown";

/// Failure modes of applying a build update.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A file transfer failed outright (network, HTTP status, local I/O).
    #[error("download failed for {path}: {source}")]
    Download {
        /// Manifest-relative path of the file.
        path: String,
        /// Underlying transfer failure.
        #[source]
        source: DownloadError,
    },

    /// A file's bytes did not hash to its manifest entry.
    #[error("integrity failure for {path}: expected {expected}, got {actual}")]
    Integrity {
        /// Manifest-relative path of the file.
        path: String,
        /// Digest the manifest promised.
        expected: Sha256Digest,
        /// Digest of the bytes received.
        actual: Sha256Digest,
    },

    /// A manifest entry's path would escape the build directory.
    #[error("unsafe manifest path: {path}")]
    UnsafePath {
        /// The offending path as it appeared in the manifest.
        path: String,
    },

    /// Filesystem failure preparing or populating the build directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest snapshot could not be serialized.
    #[error("manifest snapshot failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The channel marker could not be written; the update is complete on
    /// disk but not activated.
    #[error("channel marker write failed: {0}")]
    Marker(#[source] std::io::Error),

    /// A download task panicked.
    #[error("update task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Compares local and remote build identity for a channel and atomically
/// replaces the local build when told to.
#[derive(Debug)]
pub struct BuildUpdater {
    layout: Layout,
    config: GatehouseConfig,
    client: Client,
}

impl BuildUpdater {
    /// An updater rooted at `layout`, fetching from the configured update
    /// base URL.
    pub fn new(layout: Layout, config: GatehouseConfig) -> Self {
        Self {
            layout,
            config,
            client: Client::new(),
        }
    }

    /// The build id currently active for `channel`, or [`UNKNOWN_BUILD`] if
    /// the channel has no marker yet.
    pub fn local_build(&self, channel: &str) -> String {
        match std::fs::read_to_string(self.layout.marker_path(channel)) {
            Ok(contents) => contents.trim().to_string(),
            Err(_) => UNKNOWN_BUILD.to_string(),
        }
    }

    /// Fetch and parse the channel's manifest. Any transport or parse
    /// failure yields `None` -- never a partial manifest.
    pub async fn remote_manifest(&self, channel: &str) -> Option<Manifest> {
        let url = format!("{}/{channel}/manifest.json", self.base_url());

        let response = match self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("manifest download failed: {err}");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!("manifest request for {channel} returned {}", response.status());
            return None;
        }

        match response.json::<Manifest>().await {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                tracing::warn!("malformed manifest: {err}");
                None
            }
        }
    }

    /// Download and activate the build described by `manifest`.
    ///
    /// The marker is overwritten only after every file has been verified on
    /// disk and the manifest snapshot written, so it never points at an
    /// incomplete build.
    ///
    /// # Errors
    ///
    /// Any single transfer or integrity failure fails the whole apply. The
    /// partial build directory is left behind (the next attempt recreates
    /// it from empty) and the marker keeps its prior value.
    pub async fn apply(&self, manifest: &Manifest) -> Result<(), UpdateError> {
        for file in &manifest.files {
            if !is_clean_relative(Path::new(&file.path)) {
                return Err(UpdateError::UnsafePath {
                    path: file.path.clone(),
                });
            }
        }

        let build_dir = self.layout.build_path(&manifest.build_id);
        if build_dir.exists() {
            std::fs::remove_dir_all(&build_dir)?;
        }
        std::fs::create_dir_all(&build_dir)?;

        let semaphore = Arc::new(Semaphore::new(self.config.download_concurrency.max(1)));
        let mut set: JoinSet<Result<(), UpdateError>> = JoinSet::new();

        for file in &manifest.files {
            let url = self.file_url(&manifest.channel, file);
            let dest = build_dir.join(&file.path);
            let expected = file.sha256.clone();
            let rel_path = file.path.clone();
            let client = self.client.clone();
            let semaphore = semaphore.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                match fetch_verified(&client, &url, &dest, &expected).await {
                    Ok(()) => Ok(()),
                    Err(DownloadError::HashMismatch { expected, actual }) => {
                        Err(UpdateError::Integrity {
                            path: rel_path,
                            expected,
                            actual,
                        })
                    }
                    Err(source) => Err(UpdateError::Download {
                        path: rel_path,
                        source,
                    }),
                }
            });
        }

        // Total barrier: every transfer settles before any state transition.
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => Err(UpdateError::Join(err)),
            };
            if let Err(err) = result {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        // Snapshot the manifest alongside the build, then flip the marker.
        let snapshot = serde_json::to_string_pretty(manifest)?;
        std::fs::write(build_dir.join("manifest.json"), snapshot)?;
        self.write_marker(&manifest.channel, &manifest.build_id)
            .map_err(UpdateError::Marker)?;

        tracing::info!("updated {} to build {}", manifest.channel, manifest.build_id);
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.config.update_base_url.trim_end_matches('/')
    }

    fn file_url(&self, channel: &str, file: &ManifestFile) -> String {
        match &file.url {
            Some(url) => url.clone(),
            None => format!("{}/{channel}/{}", self.base_url(), file.path),
        }
    }

    fn write_marker(&self, channel: &str, build_id: &str) -> std::io::Result<()> {
        let marker = self.layout.marker_path(channel);
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = marker.with_extension("txt.tmp");
        std::fs::write(&tmp, build_id)?;
        std::fs::rename(&tmp, &marker)
    }
}

/// A manifest path may only descend: relative, with plain components.
fn is_clean_relative(path: &Path) -> bool {
    path.is_relative()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
        && path.components().next().is_some()
}
