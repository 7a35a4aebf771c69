use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported to the user with a remediation hint.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("HTML file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error(
        "Chromium browser binaries are missing. Run `npx playwright install chromium` and try again."
    )]
    RuntimeMissing,

    #[error("Playwright CLI not found. Install dependencies or set PLAYWRIGHT_BROWSERS_PATH.")]
    InstallerMissing,

    #[error("Automatic Chromium install failed. Run `npx playwright install chromium` manually.")]
    InstallFailed(#[source] io::Error),

    #[error("No Chromium executable found under {}. Reinstall with `npx playwright install chromium`.", .0.display())]
    RuntimeIncomplete(PathBuf),

    #[error("Browser executable not found: {}", .0.display())]
    BrowserNotFound(PathBuf),
}
