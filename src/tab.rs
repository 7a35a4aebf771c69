use crate::transport::{Transport, TransportResponse, next_id};
use crate::types::{LoadState, Viewport};
use crate::utils::{self, send_and_get_msg};
use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Represents a CDP browser tab (target) session.
pub struct Tab {
    pub(crate) transport: Arc<Transport>,
    pub(crate) session_id: String,
    pub(crate) target_id: String,
}

impl Tab {
    /// Creates a new blank tab and attaches to it.
    pub(crate) async fn new(transport: Arc<Transport>) -> Result<Self> {
        let TransportResponse::Response(res_create) = transport
            .send(json!({ "id": next_id(), "method": "Target.createTarget", "params": { "url": "about:blank" } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let target_id = res_create.result["targetId"]
            .as_str()
            .context("No targetId")?
            .to_string();

        let TransportResponse::Response(res_attach) = transport
            .send(json!({ "id": next_id(), "method": "Target.attachToTarget", "params": { "targetId": target_id } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let session_id = res_attach.result["sessionId"]
            .as_str()
            .context("No sessionId")?
            .to_string();

        debug!("Attached to target {target_id} (session {session_id})");

        Ok(Self {
            transport,
            session_id,
            target_id,
        })
    }

    pub(crate) async fn send_cmd(&self, method: &str, params: Value) -> Result<Value> {
        let msg_id = next_id();
        let msg = json!({
            "id": msg_id,
            "method": method,
            "params": params
        })
        .to_string();
        let res = send_and_get_msg(self.transport.clone(), msg_id, &self.session_id, msg)
            .await
            .with_context(|| format!("{method} failed"))?;
        utils::serde_msg(&res)
    }

    /// Emulates the given viewport for every following render.
    pub async fn set_viewport(&self, viewport: &Viewport) -> Result<&Self> {
        self.send_cmd(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": viewport.device_scale_factor,
                "mobile": false
            }),
        )
        .await?;
        Ok(self)
    }

    /// Navigates to `url` and waits until `state` is reached for that
    /// navigation, or `timeout` elapses.
    pub async fn goto(&self, url: &str, state: LoadState, timeout: Duration) -> Result<&Self> {
        self.send_cmd("Page.enable", json!({})).await?;
        self.send_cmd("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;

        // Subscribe before navigating so early lifecycle events are buffered.
        let mut events = self
            .transport
            .subscribe(&self.session_id, "Page.lifecycleEvent")
            .await?;

        let wait = async {
            let nav = self.send_cmd("Page.navigate", json!({ "url": url })).await?;
            if let Some(error) = nav["result"]["errorText"].as_str() {
                bail!("Navigation to {url} failed: {error}");
            }
            let frame_id = nav["result"]["frameId"]
                .as_str()
                .context("No frameId")?
                .to_string();
            let loader_id = nav["result"]["loaderId"].as_str().map(str::to_string);

            while let Some(event) = events.recv().await {
                if event["name"] != state.lifecycle_event() || event["frameId"] != frame_id.as_str()
                {
                    continue;
                }
                if let Some(loader_id) = &loader_id
                    && event["loaderId"] != loader_id.as_str()
                {
                    continue;
                }
                debug!("Reached {} for {url}", state.lifecycle_event());
                return Ok(());
            }
            Err::<(), anyhow::Error>(anyhow!("Event channel closed"))
        };

        time::timeout(timeout, wait)
            .await
            .map_err(|_| {
                anyhow!(
                    "Timeout after {:?} waiting for {} on {url}",
                    timeout,
                    state.lifecycle_event()
                )
            })??;

        Ok(self)
    }

    /// Pauses before the next command; a zero duration returns immediately.
    pub async fn wait(&self, duration: Duration) -> &Self {
        if !duration.is_zero() {
            time::sleep(duration).await;
        }
        self
    }

    /// Captures a PNG of the page and returns it base64-encoded.
    ///
    /// With `full_page` the clip spans the whole CSS content size of the
    /// document, otherwise only the current viewport is captured.
    pub async fn screenshot(&self, full_page: bool) -> Result<String> {
        let mut params = json!({
            "format": "png",
            "fromSurface": true,
            "captureBeyondViewport": full_page,
        });

        if full_page {
            let (width, height) = self.content_size().await?;
            params["clip"] = json!({
                "x": 0,
                "y": 0,
                "width": width,
                "height": height,
                "scale": 1.0
            });
        }

        self.activate().await?;

        let result = self.send_cmd("Page.captureScreenshot", params).await?;

        result["result"]["data"]
            .as_str()
            .map(|s| s.to_string())
            .context("No image data received")
    }

    /// Full scrollable size of the document in CSS pixels.
    async fn content_size(&self) -> Result<(f64, f64)> {
        let metrics = self.send_cmd("Page.getLayoutMetrics", json!({})).await?;
        let size = if metrics["result"]["cssContentSize"].is_object() {
            &metrics["result"]["cssContentSize"]
        } else {
            &metrics["result"]["contentSize"]
        };
        let width = size["width"].as_f64().context("No content width")?;
        let height = size["height"].as_f64().context("No content height")?;
        Ok((width.ceil(), height.ceil()))
    }

    /// Activates the target tab to bring it to the foreground.
    pub async fn activate(&self) -> Result<&Self> {
        self.transport
            .send(json!({ "id": next_id(), "method": "Target.activateTarget", "params": { "targetId": self.target_id } }))
            .await?;
        Ok(self)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Closes the target tab. Sent on the browser connection, since the
    /// page session goes away with the target.
    pub async fn close(&self) -> Result<()> {
        self.transport
            .send(json!({ "id": next_id(), "method": "Target.closeTarget", "params": { "targetId": self.target_id } }))
            .await?;
        Ok(())
    }
}
