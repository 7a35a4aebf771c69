//! Locating and installing the Chromium build the renderer runs on.
//!
//! The runtime lives in the Playwright browser cache so an existing
//! `playwright install chromium` is reused as-is.

use anyhow::Result;
use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use which::which;

use crate::error::SnapshotError;

/// Environment variable overriding the browser cache directory.
pub const BROWSERS_PATH_ENV: &str = "PLAYWRIGHT_BROWSERS_PATH";

const CACHE_DIR_NAME: &str = "ms-playwright";
const CHROMIUM_PREFIX: &str = "chromium-";
const INSTALLER: &str = "playwright";

#[cfg(target_os = "linux")]
const EXECUTABLE_LAYOUTS: &[&str] = &["chrome-linux/chrome", "chrome-linux64/chrome"];

#[cfg(target_os = "macos")]
const EXECUTABLE_LAYOUTS: &[&str] = &[
    "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
    "chrome-mac-arm64/Chromium.app/Contents/MacOS/Chromium",
    "chrome-mac/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
    "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
    "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
];

#[cfg(windows)]
const EXECUTABLE_LAYOUTS: &[&str] = &["chrome-win/chrome.exe", "chrome-win64/chrome.exe"];

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const EXECUTABLE_LAYOUTS: &[&str] = &["chrome-linux/chrome"];

/// Where the browser comes from and whether it may be installed on demand.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Run `playwright install chromium` when the runtime is missing.
    pub auto_install: bool,
    /// Use this executable instead of the managed runtime.
    pub executable: Option<PathBuf>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            auto_install: true,
            executable: None,
        }
    }
}

/// The browser cache directory holding `chromium-<revision>` builds.
#[derive(Debug, Clone)]
pub struct BrowserRuntime {
    root: PathBuf,
}

impl BrowserRuntime {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The runtime at the default location for this user and platform.
    pub fn locate() -> Result<Self> {
        let root = resolve_browsers_path(std::env::var_os(BROWSERS_PATH_ENV), dirs::home_dir())
            .ok_or_else(|| {
                anyhow::anyhow!("Cannot determine the browser cache directory; set {BROWSERS_PATH_ENV}")
            })?;
        Ok(Self::new(root))
    }

    /// Installed Chromium builds, newest revision first.
    pub fn chromium_builds(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut builds: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let revision = name.strip_prefix(CHROMIUM_PREFIX)?;
                Some((revision.parse().unwrap_or(0), entry.path()))
            })
            .collect();
        builds.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        builds.into_iter().map(|(_, path)| path).collect()
    }

    pub fn is_installed(&self) -> bool {
        !self.chromium_builds().is_empty()
    }

    /// Makes sure a Chromium build is present, installing one when allowed.
    pub fn ensure_installed(&self, auto_install: bool) -> Result<()> {
        if self.is_installed() {
            debug!("Chromium runtime found in {}", self.root.display());
            return Ok(());
        }
        if !auto_install {
            return Err(SnapshotError::RuntimeMissing.into());
        }

        let installer = which(INSTALLER).map_err(|_| SnapshotError::InstallerMissing)?;
        info!("Chromium runtime not found; installing via `playwright install chromium`...");

        let status = Command::new(&installer)
            .args(["install", "chromium"])
            .status()
            .map_err(SnapshotError::InstallFailed)?;
        if !status.success() {
            return Err(SnapshotError::InstallFailed(io::Error::other(format!(
                "`{} install chromium` exited with {status}",
                installer.display()
            )))
            .into());
        }

        if !self.is_installed() {
            return Err(SnapshotError::RuntimeIncomplete(self.root.clone()).into());
        }
        Ok(())
    }

    /// The browser executable of the newest installed build.
    pub fn executable(&self) -> Result<PathBuf> {
        self.chromium_builds()
            .iter()
            .flat_map(|build| EXECUTABLE_LAYOUTS.iter().map(move |layout| build.join(layout)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| SnapshotError::RuntimeIncomplete(self.root.clone()).into())
    }
}

/// Picks the browser executable to launch: an explicit one wins, otherwise
/// the managed runtime, installed first if `options` allow it.
pub fn resolve_executable(options: &RuntimeOptions) -> Result<PathBuf> {
    if let Some(path) = &options.executable {
        if !path.is_file() {
            return Err(SnapshotError::BrowserNotFound(path.clone()).into());
        }
        return Ok(path.clone());
    }

    let runtime = BrowserRuntime::locate()?;
    runtime.ensure_installed(options.auto_install)?;
    runtime.executable()
}

/// Cache root: the override when set and non-empty, else the platform default.
fn resolve_browsers_path(env_value: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    default_cache_root(home?)
}

#[cfg(windows)]
fn default_cache_root(home: PathBuf) -> Option<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| home.join("AppData").join("Local"));
    Some(base.join(CACHE_DIR_NAME))
}

#[cfg(target_os = "macos")]
fn default_cache_root(home: PathBuf) -> Option<PathBuf> {
    Some(home.join("Library").join("Caches").join(CACHE_DIR_NAME))
}

#[cfg(not(any(windows, target_os = "macos")))]
fn default_cache_root(home: PathBuf) -> Option<PathBuf> {
    Some(home.join(".cache").join(CACHE_DIR_NAME))
}
