//! The investment-portal navigator.
//!
//! One [`PortalNavigator`] drives one browser session through a fixed
//! sequence: open the login page, wait for a human to finish authenticating,
//! jump to the fixed-income offer table, and capture the account's available
//! balance. Every run ends with browser teardown and produces a [`RunResult`]
//! carrying the full timestamped log; failures are reported in the result,
//! never raised past `run`.

mod chrome;
mod driver;
mod fake;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use driver::{DriverError, PageDriver, SessionLauncher, WaitState};
pub use fake::{FakeCall, FakeLauncher, FakePageDriver};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::PortalConfig;
use crate::currency::{self, CurrencyParseError};

/// Bound on the balance element becoming visible.
const BALANCE_WAIT: Duration = Duration::from_millis(30_000);

#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    /// The browser could not be started, or the session stopped responding.
    #[error("browser session failure: {0}")]
    Session(#[from] DriverError),

    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("manual login was not detected within {timeout:?}")]
    LoginTimeout { timeout: Duration },

    #[error("element {selector:?} did not become {state} within {timeout:?}")]
    ElementNotFound {
        selector: String,
        state: WaitState,
        timeout: Duration,
    },

    #[error("failed to capture available balance: {0}")]
    BalanceExtraction(#[source] Box<NavigatorError>),

    #[error(transparent)]
    CurrencyParse(#[from] CurrencyParseError),
}

/// Where the run pipeline currently is. `Failed` is absorbing: once an error
/// surfaces, no further stage is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    LoggingIn,
    AwaitingManualAuth,
    NavigatingTarget,
    ExtractingBalance,
    Done,
    Failed,
}

/// Receives each log line as it is emitted, in addition to the sequence the
/// navigator accumulates. Callers can forward lines into an external
/// job-status record by injecting their own sink.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Default sink: forwards log lines to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Payload of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunData {
    pub balance: Decimal,
}

/// Terminal outcome of one `run` call.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
    pub data: Option<RunData>,
    pub logs: Vec<String>,
}

/// One row of the offer table, keyed by column label.
///
/// Extension point: the table schema in [`PortalConfig`] describes how rows
/// would be read, but the extraction flow does not consume it yet.
pub type ExtractedRow = BTreeMap<String, String>;

/// Drives one browser session through the portal.
///
/// Each instance owns its configuration, log sequence, and captured balance;
/// independent instances share nothing and may run concurrently.
pub struct PortalNavigator {
    config: PortalConfig,
    post_login: Regex,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    logs: Vec<String>,
    balance: Option<Decimal>,
    stage: Stage,
}

impl PortalNavigator {
    /// Create a navigator for the given configuration.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: PortalConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let post_login = Regex::new(&config.urls.post_login_pattern)
            .context("Invalid post-login URL pattern")?;

        Ok(Self {
            config,
            post_login,
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            logs: Vec::new(),
            balance: None,
            stage: Stage::NotStarted,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Balance captured by the last run, if extraction succeeded.
    pub fn available_balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    fn log(&mut self, message: &str) {
        let line = format!("[{}] {}", self.clock.timestamp(), message);
        self.sink.log(&line);
        self.logs.push(line);
    }

    /// Execute the full automation flow.
    ///
    /// The browser is torn down on every exit path, and all failures are
    /// folded into the returned [`RunResult`]; this method does not error.
    pub async fn run(&mut self, launcher: &dyn SessionLauncher) -> RunResult {
        self.logs.clear();
        self.balance = None;
        self.stage = Stage::NotStarted;

        self.log("Starting investment portal automation");

        let page = match launcher.launch(&self.config).await {
            Ok(page) => page,
            Err(err) => {
                let err = NavigatorError::from(err);
                self.stage = Stage::Failed;
                self.log(&format!("ERROR: {err}"));
                return self.finish(Err(err));
            }
        };
        self.log("Browser session initialized");

        let outcome = self.drive(page.as_ref()).await;

        if let Err(err) = &outcome {
            self.stage = Stage::Failed;
            self.log(&format!("ERROR: {err}"));
        }

        match page.close().await {
            Ok(()) => self.log("Browser closed"),
            Err(err) => self.log(&format!("Browser close failed: {err}")),
        }

        self.finish(outcome)
    }

    fn finish(&mut self, outcome: Result<(), NavigatorError>) -> RunResult {
        let result = match outcome {
            Ok(()) => {
                self.stage = Stage::Done;
                RunResult {
                    success: true,
                    message: "Automation completed successfully".to_string(),
                    data: Some(RunData {
                        balance: self.balance.unwrap_or(Decimal::ZERO),
                    }),
                    logs: Vec::new(),
                }
            }
            Err(err) => RunResult {
                success: false,
                message: format!("Automation failed: {err}"),
                data: None,
                logs: Vec::new(),
            },
        };

        self.log(&format!(
            "Automation finished: {}",
            if result.success { "success" } else { "failure" }
        ));

        RunResult {
            logs: self.logs.clone(),
            ..result
        }
    }

    async fn drive(&mut self, page: &dyn PageDriver) -> Result<(), NavigatorError> {
        self.stage = Stage::LoggingIn;
        self.navigate_to_login(page).await?;

        self.stage = Stage::AwaitingManualAuth;
        self.wait_for_manual_login(page).await?;

        self.stage = Stage::NavigatingTarget;
        self.navigate_to_target_page(page).await?;

        Ok(())
    }

    async fn navigate_to_login(&mut self, page: &dyn PageDriver) -> Result<(), NavigatorError> {
        self.log("Navigating to login page");

        let timeout = self.config.timeouts.navigation;
        let url = self.config.urls.login.clone();
        tokio::time::timeout(timeout, page.goto(&url))
            .await
            .map_err(|_| NavigatorError::NavigationTimeout {
                url: url.clone(),
                timeout,
            })??;

        Ok(())
    }

    /// Block until the human finishes logging in: a race between the page URL
    /// matching the post-login pattern and the portfolio marker attaching,
    /// whichever happens first, under one shared timeout. The automation only
    /// detects completion; it never enters credentials.
    async fn wait_for_manual_login(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<(), NavigatorError> {
        self.log("Waiting for manual login");

        let timeout = self.config.timeouts.login_confirmation;
        let marker = self.config.selectors.portfolio_marker.clone();

        let confirmed = async {
            tokio::select! {
                res = page.wait_for_url(&self.post_login) => res,
                res = page.wait_for_selector(&marker, WaitState::Attached) => res,
            }
        };

        tokio::time::timeout(timeout, confirmed)
            .await
            .map_err(|_| NavigatorError::LoginTimeout { timeout })??;

        self.log("Login confirmed");
        Ok(())
    }

    async fn navigate_to_target_page(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<(), NavigatorError> {
        let url = self.config.urls.target.clone();
        self.log(&format!("Navigating to target page {url}"));

        let timeout = self.config.timeouts.navigation;
        tokio::time::timeout(timeout, page.goto(&url))
            .await
            .map_err(|_| NavigatorError::NavigationTimeout {
                url: url.clone(),
                timeout,
            })??;

        let title = self.config.selectors.page_title.clone();
        let title_timeout = self.config.timeouts.element_visibility * 2;
        tokio::time::timeout(
            title_timeout,
            page.wait_for_selector(&title, WaitState::Attached),
        )
        .await
        .map_err(|_| NavigatorError::ElementNotFound {
            selector: title.clone(),
            state: WaitState::Attached,
            timeout: title_timeout,
        })??;

        self.stage = Stage::ExtractingBalance;
        self.capture_available_balance(page).await?;

        Ok(())
    }

    async fn capture_available_balance(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<(), NavigatorError> {
        let balance = self
            .read_balance(page)
            .await
            .map_err(|err| NavigatorError::BalanceExtraction(Box::new(err)))?;

        self.balance = Some(balance);
        self.log(&format!(
            "Balance captured: {}",
            currency::format_amount(balance, &self.config.currency, true)
        ));

        Ok(())
    }

    async fn read_balance(
        &mut self,
        page: &dyn PageDriver,
    ) -> Result<Decimal, NavigatorError> {
        let selector = self.config.selectors.balance.clone();

        tokio::time::timeout(
            BALANCE_WAIT,
            page.wait_for_selector(&selector, WaitState::Visible),
        )
        .await
        .map_err(|_| NavigatorError::ElementNotFound {
            selector: selector.clone(),
            state: WaitState::Visible,
            timeout: BALANCE_WAIT,
        })??;

        let text = page
            .text_content(&selector)
            .await?
            .ok_or_else(|| NavigatorError::ElementNotFound {
                selector: selector.clone(),
                state: WaitState::Visible,
                timeout: BALANCE_WAIT,
            })?;

        Ok(currency::parse_amount(&text, &self.config.currency)?)
    }
}
