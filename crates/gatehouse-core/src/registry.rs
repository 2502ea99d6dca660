//! Durable storage for the package registry.
//!
//! The registry is one JSON document, read fully into memory, mutated
//! in-process and written back atomically, so a crash mid-write never
//! corrupts the previous state. A corrupt document is preserved under a
//! backup name before being treated as empty; evidence is never discarded
//! silently.

use gatehouse_schema::Registry;
use std::path::PathBuf;
use thiserror::Error;

/// Failure modes of persisting the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Filesystem failure while writing or renaming.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory registry could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loads and saves the registry document at a fixed path.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Store backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the registry. A missing file yields an empty registry; an
    /// unreadable or unparsable one is copied to `registry.corrupt.json`
    /// first, then likewise treated as empty.
    pub fn load(&self) -> Registry {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Registry::new(),
            Err(err) => {
                tracing::warn!("registry unreadable: {err}");
                self.preserve_corrupt();
                return Registry::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::warn!("registry corrupt ({err}), starting empty");
                self.preserve_corrupt();
                Registry::new()
            }
        }
    }

    /// Atomically persist the registry: write a temp file in the same
    /// directory, then rename over the target, so no observer ever sees a
    /// partially written document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the write, or the rename fails;
    /// the caller must surface this, since it leaves trust state unknown.
    pub fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let content = serde_json::to_string_pretty(registry)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn preserve_corrupt(&self) {
        let backup = self.path.with_extension("corrupt.json");
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => tracing::warn!("corrupt registry preserved at {}", backup.display()),
            Err(err) => tracing::warn!("could not back up corrupt registry: {err}"),
        }
    }
}
