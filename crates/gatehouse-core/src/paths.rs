use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Update track used when the user has not picked one.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Directory layout under the gatehouse home.
///
/// Resolved once at startup and passed explicitly to every component that
/// touches disk, so tests can point the whole gateway at a temp directory.
#[derive(Debug, Clone)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    /// Layout rooted at an explicit base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the user's gatehouse home (`GATEHOUSE_HOME` override, else
    /// `~/.gatehouse`), or None if the home directory cannot be determined.
    pub fn resolve() -> Option<Self> {
        if let Ok(val) = std::env::var("GATEHOUSE_HOME") {
            return Some(Self::new(val));
        }
        home_dir().map(|h| Self::new(h.join(".gatehouse")))
    }

    /// Root of all gateway state.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Installed client builds, one directory per build id.
    pub fn builds_dir(&self) -> PathBuf {
        self.base.join("builds")
    }

    /// Verified mod/resource packages.
    pub fn mods_dir(&self) -> PathBuf {
        self.base.join("mods")
    }

    /// Working area for in-flight downloads. Nothing in here is trusted.
    pub fn cache_dir(&self) -> PathBuf {
        self.base.join("cache")
    }

    /// Isolated storage for content that failed a trust check.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.base.join("quarantine")
    }

    /// Trusted public keys, one PEM file per trust anchor.
    pub fn keys_dir(&self) -> PathBuf {
        self.base.join("keys")
    }

    /// The package registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.mods_dir().join("registry.json")
    }

    /// Directory for a specific client build.
    pub fn build_path(&self, build_id: &str) -> PathBuf {
        self.builds_dir().join(build_id)
    }

    /// Directory where a verified package lives.
    pub fn mod_path(&self, id: &str, version: &str) -> PathBuf {
        self.mods_dir().join(format!("{id}-{version}"))
    }

    /// Per-channel marker file holding the active build id.
    pub fn marker_path(&self, channel: &str) -> PathBuf {
        self.builds_dir().join(format!("{channel}-current.txt"))
    }

    /// Create any missing directories (no error if they exist).
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.builds_dir(),
            self.mods_dir(),
            self.cache_dir(),
            self.quarantine_dir(),
            self.keys_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
