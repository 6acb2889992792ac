//! Capability interface over the browser page.
//!
//! The navigator only ever performs five page operations; keeping them behind
//! a trait lets the sequencing and extraction logic run against an in-memory
//! fake instead of a real browser.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::config::PortalConfig;

/// Readiness level a selector wait requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the document, visible or not.
    Attached,
    /// Attached and rendered with a non-empty box.
    Visible,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitState::Attached => f.write_str("attached"),
            WaitState::Visible => f.write_str("visible"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("page operation failed: {0}")]
    Page(String),
}

/// The page operations the navigator needs.
///
/// Wait operations run until their condition holds; callers bound them with
/// their own timeouts, so a race between two waits shares a single bound and
/// the loser is cancelled by drop.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL, resolving once the document is parsed.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Resolve once the page URL matches `pattern`.
    async fn wait_for_url(&self, pattern: &Regex) -> Result<(), DriverError>;

    /// Resolve once `selector` reaches the requested state.
    async fn wait_for_selector(&self, selector: &str, state: WaitState) -> Result<(), DriverError>;

    /// Text content of the first element matching `selector`.
    async fn text_content(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Release the underlying browser. Idempotent.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Constructs a live page session for one navigator run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, config: &PortalConfig) -> Result<Arc<dyn PageDriver>, DriverError>;
}
