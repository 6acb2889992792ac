//! chromiumoxide-backed page driver.
//!
//! Launches a real, visible Chrome window: the login step depends on a human
//! completing credentials and MFA in it, so the browser must look and behave
//! like an ordinary desktop session rather than an automation harness.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::PortalConfig;

use super::driver::{DriverError, PageDriver, SessionLauncher, WaitState};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36";

/// Interval between condition checks in the wait loops.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One live browser session: the browser process, its CDP event handler task,
/// and the single page the navigator drives.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl ChromeSession {
    /// Launch a headed Chrome with automation detection disabled and open one
    /// blank page carrying a desktop user agent.
    pub async fn launch(_config: &PortalConfig) -> Result<Self, DriverError> {
        let chrome_path = find_chrome().ok_or_else(|| {
            DriverError::Launch(
                "Chrome/Chromium not found. Install Chrome or Chromium to run the navigator."
                    .to_string(),
            )
        })?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .with_head()
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--start-maximized")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .build()
            .map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(DriverError::Launch)?;
        if let Err(e) = page.execute(user_agent).await {
            handler_task.abort();
            return Err(DriverError::Launch(e.to_string()));
        }

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task,
            page,
        })
    }

    async fn selector_in_state(
        &self,
        selector: &str,
        state: WaitState,
    ) -> Result<bool, DriverError> {
        let selector_json =
            serde_json::to_string(selector).map_err(|e| DriverError::Page(e.to_string()))?;

        let script = match state {
            WaitState::Attached => format!(
                "(function() {{ return document.querySelector({selector_json}) !== null; }})()"
            ),
            WaitState::Visible => format!(
                r#"(function() {{
                    const el = document.querySelector({selector_json});
                    if (!el) return false;
                    const style = window.getComputedStyle(el);
                    if (style.display === 'none' || style.visibility === 'hidden') return false;
                    const rect = el.getBoundingClientRect();
                    return rect.width > 0 && rect.height > 0;
                }})()"#
            ),
        };

        self.page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Page(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| DriverError::Page(e.to_string()))
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Page(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_url(&self, pattern: &Regex) -> Result<(), DriverError> {
        loop {
            let url = self
                .page
                .url()
                .await
                .map_err(|e| DriverError::Page(e.to_string()))?;

            if let Some(url) = url {
                if pattern.is_match(&url) {
                    return Ok(());
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_selector(&self, selector: &str, state: WaitState) -> Result<(), DriverError> {
        loop {
            // Evaluation can fail while a navigation replaces the execution
            // context; treat that the same as the element not being ready.
            if let Ok(true) = self.selector_in_state(selector, state).await {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::Page(e.to_string()))?;

        element
            .inner_text()
            .await
            .map_err(|e| DriverError::Page(e.to_string()))
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            // Best-effort shutdown; dropping the handle kills the child
            // process if the protocol-level close does not go through.
            let _ = browser.close().await;
            let _ = browser.wait().await;
            drop(browser);
            self.handler_task.abort();
        }
        Ok(())
    }
}

/// Launches a fresh [`ChromeSession`] per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, config: &PortalConfig) -> Result<Arc<dyn PageDriver>, DriverError> {
        Ok(Arc::new(ChromeSession::launch(config).await?))
    }
}

/// Find a Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // NixOS
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }
    None
}
