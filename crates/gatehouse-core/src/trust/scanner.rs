//! Content scanning via the platform's AV engine.
//!
//! The gateway shells out to a wrapper program that abstracts over the
//! platform scanner (ClamAV, Defender, ...). Exit 0 means clean; anything
//! else flags the archive and the captured output becomes the quarantine
//! reason.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::process::Command;

/// Result of scanning one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scanner found nothing.
    Clean,
    /// The scanner flagged the archive; the string is its diagnostic output.
    Flagged(String),
}

/// The seam between the package cache and whatever scanning capability the
/// host provides. Test code substitutes stubs here.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan the archive at `path`.
    async fn scan(&self, path: &Path) -> ScanOutcome;

    /// Wall-clock time of the most recent scan, kept for the process
    /// lifetime only.
    fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Scanner that invokes an external program with the archive path as its
/// only argument.
#[derive(Debug)]
pub struct CommandScanner {
    program: PathBuf,
    fail_open: bool,
    last_scan: Mutex<Option<DateTime<Utc>>>,
}

impl CommandScanner {
    /// Scanner for `program`. `fail_open` decides what happens when the
    /// program is missing or cannot be launched: `true` treats the archive
    /// as clean so installs keep working without an AV engine, `false`
    /// flags it.
    pub fn new(program: impl Into<PathBuf>, fail_open: bool) -> Self {
        Self {
            program: program.into(),
            fail_open,
            last_scan: Mutex::new(None),
        }
    }

    fn unavailable(&self, detail: &str) -> ScanOutcome {
        if self.fail_open {
            tracing::warn!("scanner unavailable ({detail}), treating archive as clean");
            ScanOutcome::Clean
        } else {
            tracing::warn!("scanner unavailable ({detail}), refusing archive");
            ScanOutcome::Flagged(format!("scanner unavailable: {detail}"))
        }
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    async fn scan(&self, path: &Path) -> ScanOutcome {
        if !self.program.exists() {
            return self.unavailable(&format!("{} missing", self.program.display()));
        }

        let result = Command::new(&self.program).arg(path).output().await;
        if let Ok(mut stamp) = self.last_scan.lock() {
            *stamp = Some(Utc::now());
        }

        match result {
            Ok(output) if output.status.success() => ScanOutcome::Clean,
            Ok(output) => {
                let mut diagnostic = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if diagnostic.is_empty() {
                    diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
                }
                if diagnostic.is_empty() {
                    diagnostic = format!("scanner exited with {}", output.status);
                }
                tracing::warn!("scanner flagged {}: {diagnostic}", path.display());
                ScanOutcome::Flagged(diagnostic)
            }
            Err(err) => self.unavailable(&err.to_string()),
        }
    }

    fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        self.last_scan.lock().ok().and_then(|stamp| *stamp)
    }
}
