mod browser_config;

pub use browser_config::BrowserConfig;

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::time;

use crate::tab::Tab;
use crate::transport::Transport;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

static DEVTOOLS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"listening on (ws://.*/devtools/browser/.*)$").expect("static regex")
});

/// Holds the browser process and its profile directory.
/// Kills the process on drop, before the profile is deleted.
struct BrowserProcess {
    child: Child,
    _profile_dir: TempDir,
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A running headless browser.
pub struct Browser {
    transport: Arc<Transport>,
    process: Arc<Mutex<Option<BrowserProcess>>>,
}

impl Browser {
    /// Spawns the browser described by `config` and connects to it.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let exe = config.executable_path.clone();
        info!("Launching browser {}", exe.display());

        #[cfg(windows)]
        let mut cmd = {
            use std::os::windows::process::CommandExt;
            let mut c = Command::new(&exe);
            c.creation_flags(0x08000000); // CREATE_NO_WINDOW
            c
        };
        #[cfg(not(windows))]
        let mut cmd = Command::new(&exe);

        let mut child = cmd
            .args(config.get_browser_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start browser {}", exe.display()))?;
        let stderr = child.stderr.take().context("No stderr")?;

        // From here on the process is owned by the guard, so every early
        // return below still kills it.
        let process = BrowserProcess {
            child,
            _profile_dir: config.profile_dir,
        };

        let ws_url = Self::wait_for_ws(stderr).await?;
        debug!("DevTools endpoint {ws_url}");

        Ok(Self {
            transport: Arc::new(Transport::new(&ws_url).await?),
            process: Arc::new(Mutex::new(Some(process))),
        })
    }

    /// Reads browser stderr until the DevTools WebSocket URL shows up, then
    /// keeps draining it into the debug log.
    async fn wait_for_ws(stderr: ChildStderr) -> Result<String> {
        let (tx, rx) = oneshot::channel::<Result<String>>();

        std::thread::spawn(move || {
            let mut tx = Some(tx);
            let mut tail: Vec<String> = Vec::new();
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                match tx.take() {
                    Some(sender) => match devtools_url(&line) {
                        Some(url) => {
                            let _ = sender.send(Ok(url));
                        }
                        None => {
                            if tail.len() == 10 {
                                tail.remove(0);
                            }
                            tail.push(line);
                            tx = Some(sender);
                        }
                    },
                    None => debug!(target: "chromium", "{line}"),
                }
            }
            if let Some(sender) = tx {
                let _ = sender.send(Err(anyhow!(
                    "Browser exited before reporting its DevTools URL:\n{}",
                    tail.join("\n")
                )));
            }
        });

        time::timeout(LAUNCH_TIMEOUT, rx)
            .await
            .map_err(|_| anyhow!("Timeout waiting for the browser DevTools URL"))?
            .map_err(|_| anyhow!("Browser stderr reader stopped"))?
    }

    /// Opens a new blank tab.
    pub async fn new_tab(&self) -> Result<Tab> {
        Tab::new(self.transport.clone()).await
    }

    /// Closes the browser: sends `Browser.close` over CDP, gives the process
    /// a moment to exit on its own, then kills and reaps it and removes its
    /// profile.
    pub async fn close(&self) -> Result<()> {
        self.transport.shutdown().await;
        if !wait_for_exit(&self.process, CLOSE_GRACE).await {
            debug!("Browser still running after {CLOSE_GRACE:?}; killing it");
        }
        self.kill();
        Ok(())
    }

    /// Kills the browser process if it is still running. Idempotent.
    pub fn kill(&self) {
        kill_process(&self.process);
    }

    /// A handle that kills this browser from any thread, e.g. a signal handler.
    pub fn kill_switch(&self) -> impl Fn() + Send + Sync + 'static {
        let process = self.process.clone();
        move || kill_process(&process)
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Polls until the process has exited or `grace` runs out. Returns whether it
/// exited (or was already gone).
async fn wait_for_exit(process: &Mutex<Option<BrowserProcess>>, grace: Duration) -> bool {
    let deadline = time::Instant::now() + grace;
    loop {
        {
            let Ok(mut guard) = process.lock() else {
                return false;
            };
            let Some(proc) = guard.as_mut() else {
                return true;
            };
            if !matches!(proc.child.try_wait(), Ok(None)) {
                return true;
            }
        }
        if time::Instant::now() >= deadline {
            return false;
        }
        time::sleep(Duration::from_millis(50)).await;
    }
}

fn kill_process(process: &Mutex<Option<BrowserProcess>>) {
    match process.lock() {
        // Dropping the process kills it and deletes the profile.
        Ok(mut guard) => drop(guard.take()),
        Err(e) => warn!("Browser process lock poisoned: {e}"),
    }
}

/// Extracts the DevTools WebSocket URL from one line of browser stderr.
fn devtools_url(line: &str) -> Option<String> {
    DEVTOOLS_URL
        .captures(line.trim_end())
        .map(|cap| cap[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn spawn_process(script: &str) -> Mutex<Option<BrowserProcess>> {
        let child = Command::new("sh").args(["-c", script]).spawn().unwrap();
        Mutex::new(Some(BrowserProcess {
            child,
            _profile_dir: TempDir::new().unwrap(),
        }))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exiting_process_is_seen_within_grace() {
        let process = spawn_process("exit 0");
        assert!(wait_for_exit(&process, Duration::from_secs(5)).await);
        kill_process(&process);
        assert!(process.lock().unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lingering_process_is_killed_after_grace() {
        let process = spawn_process("sleep 30");
        assert!(!wait_for_exit(&process, Duration::from_millis(100)).await);
        kill_process(&process);
        assert!(process.lock().unwrap().is_none());
        assert!(wait_for_exit(&process, Duration::ZERO).await);
    }

    #[test]
    fn finds_devtools_url_in_stderr_line() {
        let line = "DevTools listening on ws://127.0.0.1:40123/devtools/browser/0f3c-11aa\n";
        assert_eq!(
            devtools_url(line).as_deref(),
            Some("ws://127.0.0.1:40123/devtools/browser/0f3c-11aa")
        );
    }

    #[test]
    fn ignores_other_stderr_noise() {
        assert_eq!(devtools_url("[0101/000000.000:ERROR:bus.cc(407)] Failed"), None);
        assert_eq!(devtools_url(""), None);
    }
}
