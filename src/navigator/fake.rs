//! Scripted in-memory page driver for testing the navigation pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use regex::Regex;

use crate::config::PortalConfig;

use super::driver::{DriverError, PageDriver, SessionLauncher, WaitState};

/// One recorded driver call, in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Goto(String),
    WaitForUrl,
    WaitForSelector(String, WaitState),
    TextContent(String),
    Close,
}

/// In-memory [`PageDriver`] with scripted behavior.
///
/// Waits resolve immediately unless told otherwise; a wait marked as never
/// resolving parks forever, which lets tests exercise the caller-side
/// timeouts. Every call is recorded.
#[derive(Default)]
pub struct FakePageDriver {
    calls: StdMutex<Vec<FakeCall>>,
    close_count: AtomicUsize,
    text_contents: StdMutex<HashMap<String, String>>,
    stuck_selectors: StdMutex<HashSet<String>>,
    url_wait_stuck: std::sync::atomic::AtomicBool,
}

impl FakePageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the text content returned for a selector.
    pub fn set_text(&self, selector: impl Into<String>, text: impl Into<String>) {
        self.text_contents
            .lock()
            .expect("text contents lock poisoned")
            .insert(selector.into(), text.into());
    }

    /// Make waits on this selector park forever.
    pub fn never_resolve_selector(&self, selector: impl Into<String>) {
        self.stuck_selectors
            .lock()
            .expect("stuck selectors lock poisoned")
            .insert(selector.into());
    }

    /// Make URL waits park forever.
    pub fn never_resolve_url(&self) {
        self.url_wait_stuck.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().expect("calls lock poisoned").push(call);
    }
}

#[async_trait]
impl PageDriver for FakePageDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.record(FakeCall::Goto(url.to_string()));
        Ok(())
    }

    async fn wait_for_url(&self, _pattern: &Regex) -> Result<(), DriverError> {
        self.record(FakeCall::WaitForUrl);
        if self.url_wait_stuck.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, state: WaitState) -> Result<(), DriverError> {
        self.record(FakeCall::WaitForSelector(selector.to_string(), state));
        let stuck = self
            .stuck_selectors
            .lock()
            .expect("stuck selectors lock poisoned")
            .contains(selector);
        if stuck {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.record(FakeCall::TextContent(selector.to_string()));
        Ok(self
            .text_contents
            .lock()
            .expect("text contents lock poisoned")
            .get(selector)
            .cloned())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record(FakeCall::Close);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands the same scripted driver to the navigator, or fails launching.
pub struct FakeLauncher {
    driver: Arc<FakePageDriver>,
    fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(driver: Arc<FakePageDriver>) -> Self {
        Self {
            driver,
            fail_launch: false,
        }
    }

    /// A launcher whose `launch` always fails.
    pub fn failing() -> Self {
        Self {
            driver: Arc::new(FakePageDriver::new()),
            fail_launch: true,
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, _config: &PortalConfig) -> Result<Arc<dyn PageDriver>, DriverError> {
        if self.fail_launch {
            return Err(DriverError::Launch("scripted launch failure".to_string()));
        }
        Ok(self.driver.clone())
    }
}
