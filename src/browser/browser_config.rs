use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::types::Viewport;

static DEFAULT_ARGS: [&str; 19] = [
    // === Process ===
    "--no-sandbox",            // required when running as root in containers
    "--disable-dev-shm-usage", // /dev/shm is tiny in Docker
    "--no-first-run",
    "--no-default-browser-check",
    // === Background noise ===
    "--disable-background-networking",
    "--disable-component-update",
    "--disable-domain-reliability",
    "--disable-sync",
    "--disable-breakpad",
    "--disable-features=Translate,OptimizationHints,MediaRouter,DialMediaRouteProvider",
    "--metrics-recording-only",
    "--no-pings",
    // === Rendering ===
    "--disable-gpu",
    "--force-color-profile=srgb",
    "--hide-scrollbars",
    "--mute-audio",
    // === UI ===
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
];

/// How to launch one browser process.
pub struct BrowserConfig {
    pub(crate) executable_path: PathBuf,
    pub(crate) headless: bool,
    pub(crate) window_size: (u32, u32),
    pub(crate) profile_dir: TempDir,
}

impl BrowserConfig {
    /// Headless configuration for `executable` with a fresh, throwaway profile.
    pub fn new(executable: impl Into<PathBuf>) -> Result<Self> {
        let profile_dir = tempfile::Builder::new()
            .prefix("html-snapshot-")
            .tempdir()
            .context("Failed to create browser profile directory")?;
        let default = Viewport::default();

        Ok(Self {
            executable_path: executable.into(),
            headless: true,
            window_size: (default.width, default.height),
            profile_dir,
        })
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    pub(crate) fn get_browser_args(&self) -> Vec<String> {
        // Port 0 lets Chromium pick a free port and report it on stderr.
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            format!("--user-data-dir={}", self.profile_dir.path().display()),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
        ];

        args.extend(DEFAULT_ARGS.iter().map(|s| s.to_string()));
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.push("about:blank".to_string());

        args
    }
}
