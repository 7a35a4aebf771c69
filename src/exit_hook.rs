use anyhow::{Result, anyhow};
use log::warn;
use std::sync::{Arc, Once};

/// Exit status used when the capture is interrupted with Ctrl+C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Runs a cleanup function when dropped, and on Ctrl+C once registered.
///
/// Only the first hook registered in a process receives Ctrl+C.
pub struct ExitHook {
    func: Arc<dyn Fn() + Send + Sync>,
}

impl ExitHook {
    pub fn new<F: Fn() + Send + Sync + 'static>(f: F) -> Self {
        Self { func: Arc::new(f) }
    }

    /// Installs the Ctrl+C handler: run the cleanup, then exit with status 130.
    pub fn register(&self) -> Result<()> {
        static ONCE: Once = Once::new();
        let f = self.func.clone();
        let mut res = Ok(());
        ONCE.call_once(|| {
            if let Err(e) = ctrlc::set_handler(move || {
                warn!("Interrupted; closing browser");
                f();
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }) {
                res = Err(anyhow!("Ctrl+C handler error: {e}"));
            }
        });
        res
    }
}

impl Drop for ExitHook {
    fn drop(&mut self) {
        (self.func)();
    }
}
