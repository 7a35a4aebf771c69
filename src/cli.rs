use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::RuntimeOptions;
use crate::types::{CaptureOptions, LoadState, Viewport};

/// Render a local HTML file to PNG with headless Chromium
#[derive(Parser, Debug)]
#[command(name = "html-snapshot", version, about)]
pub struct Cli {
    /// Path to the local HTML file
    pub html_path: PathBuf,

    /// PNG output path (defaults to <HTML_PATH> with a .png extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1400, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 900, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Seconds to wait after load before capturing
    #[arg(long, default_value_t = 0.0, value_parser = non_negative_seconds)]
    pub delay: f64,

    /// Capture only the viewport instead of the full page
    #[arg(long)]
    pub no_full_page: bool,

    /// Skip automatic browser install (Chromium must be pre-installed)
    #[arg(long)]
    pub no_auto_install: bool,

    /// Device scale factor; 2 doubles the image resolution
    #[arg(long, default_value_t = 1.0, value_parser = positive_factor)]
    pub scale: f64,

    /// Page load state to wait for before capturing
    #[arg(long, value_enum, default_value_t = WaitUntil::Networkidle)]
    pub wait_until: WaitUntil,

    /// Seconds allowed for navigation and the load-state wait
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Browser executable to use instead of the managed Chromium runtime
    #[arg(long, env = "CHROME")]
    pub browser: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaitUntil {
    Load,
    Domcontentloaded,
    Networkidle,
}

impl From<WaitUntil> for LoadState {
    fn from(value: WaitUntil) -> Self {
        match value {
            WaitUntil::Load => LoadState::Load,
            WaitUntil::Domcontentloaded => LoadState::DomContentLoaded,
            WaitUntil::Networkidle => LoadState::NetworkIdle,
        }
    }
}

impl Cli {
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions::new()
            .with_viewport(
                Viewport::new(self.width, self.height).with_device_scale_factor(self.scale),
            )
            .with_full_page(!self.no_full_page)
            .with_delay(Duration::from_secs_f64(self.delay))
            .with_wait_until(self.wait_until.into())
            .with_timeout(Duration::from_secs(self.timeout))
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            auto_install: !self.no_auto_install,
            executable: self.browser.clone(),
        }
    }
}

fn non_negative_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    // Upper bound keeps Duration::from_secs_f64 from panicking.
    if !value.is_finite() || !(0.0..=86_400.0).contains(&value) {
        return Err("expected a number of seconds between 0 and 86400".to_string());
    }
    Ok(value)
}

fn positive_factor(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err("expected a positive number".to_string());
    }
    Ok(value)
}
