use std::time::Duration;

/// Viewport configuration for controlling page dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Viewport width in CSS pixels.
    pub width: u32,
    /// Viewport height in CSS pixels.
    pub height: u32,
    /// Device scale factor (DPR). A factor of 2.0 doubles the pixel
    /// dimensions of the captured image. Default is 1.0.
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 900,
            device_scale_factor: 1.0,
        }
    }
}

impl Viewport {
    /// Creates a new viewport with specified dimensions at scale 1.0.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }
}

/// The point in page loading a capture waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// The `load` event fired.
    Load,
    /// The `DOMContentLoaded` event fired.
    DomContentLoaded,
    /// No network connections for at least 500 ms.
    #[default]
    NetworkIdle,
}

impl LoadState {
    /// Name of the matching `Page.lifecycleEvent`.
    pub fn lifecycle_event(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "DOMContentLoaded",
            LoadState::NetworkIdle => "networkIdle",
        }
    }
}

/// Configuration options for a page capture.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub(crate) viewport: Viewport,
    pub(crate) full_page: bool,
    pub(crate) delay: Duration,
    pub(crate) wait_until: LoadState,
    pub(crate) timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            full_page: true,
            delay: Duration::ZERO,
            wait_until: LoadState::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CaptureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// `true` captures the whole scrollable document, `false` only the viewport.
    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    /// Extra pause after the load state is reached, e.g. for animations.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_wait_until(mut self, state: LoadState) -> Self {
        self.wait_until = state;
        self
    }

    /// Bound on navigation plus the load-state wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn full_page(&self) -> bool {
        self.full_page
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn wait_until(&self) -> LoadState {
        self.wait_until
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let opts = CaptureOptions::default();
        assert_eq!(opts.viewport(), &Viewport::new(1400, 900));
        assert!(opts.full_page());
        assert_eq!(opts.delay(), Duration::ZERO);
        assert_eq!(opts.wait_until(), LoadState::NetworkIdle);
        assert_eq!(opts.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_fields() {
        let opts = CaptureOptions::new()
            .with_viewport(Viewport::new(800, 600).with_device_scale_factor(2.0))
            .with_full_page(false)
            .with_delay(Duration::from_millis(1500))
            .with_wait_until(LoadState::Load)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(opts.viewport().width, 800);
        assert_eq!(opts.viewport().device_scale_factor, 2.0);
        assert!(!opts.full_page());
        assert_eq!(opts.delay(), Duration::from_millis(1500));
        assert_eq!(opts.wait_until().lifecycle_event(), "load");
        assert_eq!(opts.timeout(), Duration::from_secs(5));
    }
}
