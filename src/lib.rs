/*!
Render a local HTML file to a PNG screenshot with headless Chromium, driven
over the Chrome DevTools Protocol (CDP).

The pipeline is linear: make sure a Chromium build is available (installing
it through the Playwright CLI when allowed), launch it, open the file, wait
for network idle, optionally pause, capture the full page or the viewport,
write the PNG and close the browser on every path.

```no_run
use html_snapshot::{CaptureOptions, RuntimeOptions, Snapshot, Viewport, render};

# async fn demo() -> anyhow::Result<()> {
let snapshot = Snapshot::new("slides/intro.html")?
    .with_output("out/intro.png")?
    .with_options(CaptureOptions::new().with_viewport(Viewport::new(1280, 720)));
let path = render(&snapshot, &RuntimeOptions::default()).await?;
println!("Saved screenshot to {}", path.display());
# Ok(())
# }
```
*/

mod browser;
pub mod cli;
mod error;
mod exit_hook;
pub mod runtime;
mod snapshot;
mod tab;
mod transport;
mod types;
mod utils;

pub use browser::{Browser, BrowserConfig};
pub use error::SnapshotError;
pub use exit_hook::{ExitHook, INTERRUPTED_EXIT_CODE};
pub use runtime::{BrowserRuntime, RuntimeOptions};
pub use snapshot::{Snapshot, render};
pub use tab::Tab;
pub use types::{CaptureOptions, LoadState, Viewport};
