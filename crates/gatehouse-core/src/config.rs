//! Runtime configuration for the gateway.
//!
//! Everything security-relevant is an explicit field here rather than a
//! hardcoded default buried in a component: the scan posture in particular
//! is a deliberate, user-visible trade-off.

use std::path::PathBuf;

const DEFAULT_UPDATE_URL: &str = "https://updates.gatehouse.dev";
const DEFAULT_CONCURRENCY: usize = 4;

/// Whether archives go through the content scanner before install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPosture {
    /// Run the configured scanner on every fetched archive.
    Enabled,
    /// Skip scanning entirely. Hash and signature checks still apply.
    Disabled,
}

/// Gateway configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GatehouseConfig {
    /// Base URL the updater fetches `<channel>/manifest.json` and
    /// channel-relative build files from.
    pub update_base_url: String,
    /// Hard ceiling on simultaneous downloads (packages and build files).
    pub download_concurrency: usize,
    /// Content scanning posture.
    pub scan: ScanPosture,
    /// External scanner program invoked per archive.
    pub scanner_program: Option<PathBuf>,
    /// When the scanner program is missing or cannot be launched: `true`
    /// treats the archive as clean (availability wins), `false` refuses
    /// the install.
    pub scanner_fail_open: bool,
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            update_base_url: DEFAULT_UPDATE_URL.to_string(),
            download_concurrency: DEFAULT_CONCURRENCY,
            scan: ScanPosture::Enabled,
            scanner_program: None,
            scanner_fail_open: true,
        }
    }
}

impl GatehouseConfig {
    /// Load configuration overrides from the environment.
    ///
    /// `GATEHOUSE_UPDATE_URL`, `GATEHOUSE_CONCURRENCY`, `GATEHOUSE_SCAN`
    /// (`0`/`false` disables), `GATEHOUSE_SCANNER` (path to the scanner
    /// program), `GATEHOUSE_SCAN_FAIL_OPEN` (`0`/`false` refuses installs
    /// when the scanner is unavailable).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("GATEHOUSE_UPDATE_URL") {
            config.update_base_url = url;
        }
        if let Some(n) = std::env::var("GATEHOUSE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            config.download_concurrency = n;
        }
        if let Ok(v) = std::env::var("GATEHOUSE_SCAN") {
            if is_falsy(&v) {
                config.scan = ScanPosture::Disabled;
            }
        }
        if let Ok(program) = std::env::var("GATEHOUSE_SCANNER") {
            config.scanner_program = Some(PathBuf::from(program));
        }
        if let Ok(v) = std::env::var("GATEHOUSE_SCAN_FAIL_OPEN") {
            config.scanner_fail_open = !is_falsy(&v);
        }

        config
    }
}

fn is_falsy(v: &str) -> bool {
    v == "0" || v.eq_ignore_ascii_case("false")
}
