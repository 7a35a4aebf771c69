//! The capture pipeline: validate paths, make sure a browser is available,
//! render the file, write the PNG, and always close the browser.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

use crate::browser::{Browser, BrowserConfig};
use crate::error::SnapshotError;
use crate::exit_hook::ExitHook;
use crate::runtime::{self, RuntimeOptions};
use crate::types::CaptureOptions;

/// One HTML file to render and where its PNG goes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    html_path: PathBuf,
    output_path: PathBuf,
    options: CaptureOptions,
}

impl Snapshot {
    /// Resolves `html_path` to an absolute path. Fails with
    /// [`SnapshotError::InputNotFound`] when the file does not exist.
    ///
    /// The output defaults to the input path with a `.png` extension.
    pub fn new(html_path: impl AsRef<Path>) -> Result<Self> {
        let absolute = std::path::absolute(html_path.as_ref())
            .with_context(|| format!("Invalid path {}", html_path.as_ref().display()))?;
        if !absolute.is_file() {
            return Err(SnapshotError::InputNotFound(absolute).into());
        }
        let output_path = absolute.with_extension("png");

        Ok(Self {
            html_path: absolute,
            output_path,
            options: CaptureOptions::default(),
        })
    }

    /// Writes the PNG to `output` instead of next to the input.
    pub fn with_output(mut self, output: impl AsRef<Path>) -> Result<Self> {
        self.output_path = std::path::absolute(output.as_ref())
            .with_context(|| format!("Invalid output path {}", output.as_ref().display()))?;
        Ok(self)
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// `file://` URL of the input.
    pub fn file_url(&self) -> Result<Url> {
        Url::from_file_path(&self.html_path)
            .map_err(|_| anyhow!("Cannot build a file URL for {}", self.html_path.display()))
    }

    /// Renders the page in a fresh tab of `browser` and writes the PNG.
    /// The tab is closed whether or not the capture succeeds.
    pub async fn capture(&self, browser: &Browser) -> Result<PathBuf> {
        let url = self.file_url()?;
        let tab = browser.new_tab().await?;
        debug!("Rendering {url} in tab {}", tab.target_id());

        let result = async {
            tab.set_viewport(&self.options.viewport).await?;
            tab.goto(url.as_str(), self.options.wait_until, self.options.timeout)
                .await?;
            tab.wait(self.options.delay).await;
            let data = tab.screenshot(self.options.full_page).await?;
            let png = BASE64_STANDARD
                .decode(data)
                .context("Screenshot data is not valid base64")?;
            fs::write(&self.output_path, png)
                .await
                .with_context(|| format!("Failed to write {}", self.output_path.display()))?;
            Ok::<_, anyhow::Error>(self.output_path.clone())
        }
        .await;

        if let Err(e) = tab.close().await {
            warn!("Failed to close tab after capture: {:?}", e);
        }

        result
    }
}

/// Runs the whole pipeline for `snapshot`: prepares the output directory,
/// resolves (and if allowed installs) the browser, launches it, captures,
/// and closes the browser on every path.
pub async fn render(snapshot: &Snapshot, runtime: &RuntimeOptions) -> Result<PathBuf> {
    if let Some(parent) = snapshot.output_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let executable = runtime::resolve_executable(runtime)?;
    let viewport = snapshot.options.viewport;
    let config = BrowserConfig::new(executable)?.window_size(viewport.width, viewport.height);

    let browser = Browser::launch(config).await?;
    let guard = ExitHook::new(browser.kill_switch());
    if let Err(e) = guard.register() {
        warn!("{e}");
    }

    let result = snapshot.capture(&browser).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {:?}", e);
    }
    drop(guard);

    if let Ok(path) = &result {
        info!("Captured {} into {}", snapshot.html_path.display(), path.display());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_input_is_reported_with_absolute_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.html");
        let err = Snapshot::new(&missing).unwrap_err();
        match err.downcast_ref::<SnapshotError>() {
            Some(SnapshotError::InputNotFound(path)) => assert_eq!(path, &missing),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn directory_is_not_an_input() {
        let dir = TempDir::new().unwrap();
        assert!(Snapshot::new(dir.path()).is_err());
    }

    #[test]
    fn output_defaults_to_png_next_to_input() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("slide.html");
        fs::write(&html, "<h1>hi</h1>").unwrap();

        let snapshot = Snapshot::new(&html).unwrap();
        assert_eq!(
            snapshot.output_path(),
            html.with_extension("png")
        );
        assert_eq!(snapshot.output_path().extension().unwrap(), "png");
    }

    #[test]
    fn extensionless_input_gains_png_extension() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("page");
        fs::write(&html, "<p>x</p>").unwrap();

        let snapshot = Snapshot::new(&html).unwrap();
        assert_eq!(snapshot.output_path().file_name().unwrap(), "page.png");
    }

    #[test]
    fn custom_output_is_made_absolute() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("a.html");
        fs::write(&html, "").unwrap();

        let snapshot = Snapshot::new(&html)
            .unwrap()
            .with_output("shots/custom.png")
            .unwrap();
        assert!(snapshot.output_path().is_absolute());
        assert!(snapshot.output_path().ends_with("shots/custom.png"));
    }

    #[test]
    fn file_url_points_at_input() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("with space.html");
        fs::write(&html, "").unwrap();

        let url = Snapshot::new(&html).unwrap().file_url().unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.as_str().ends_with("with%20space.html"));
        assert_eq!(url.to_file_path().unwrap(), html);
    }

    #[tokio::test]
    async fn render_without_runtime_fails_before_launch() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("a.html");
        fs::write(&html, "").unwrap();
        let snapshot = Snapshot::new(&html).unwrap();

        let runtime = RuntimeOptions {
            auto_install: false,
            executable: Some(dir.path().join("missing-chrome")),
        };
        let err = render(&snapshot, &runtime).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::BrowserNotFound(_))
        ));
        assert!(!snapshot.output_path().exists());
    }
}
