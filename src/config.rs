//! Portal configuration: URLs, selectors, timeouts, currency style, and the
//! declarative filter/table schemas.
//!
//! The configuration is a plain value created once at startup, either from
//! built-in defaults or from a TOML file, and never mutated afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyStyle;
use crate::duration::deserialize_duration;

/// Pages the navigator drives, and the URL shape that marks a finished login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalUrls {
    /// Login page.
    pub login: String,

    /// Offer table the navigator lands on after authentication.
    pub target: String,

    /// Regex matched against the page URL to detect a completed login.
    pub post_login_pattern: String,
}

impl Default for PortalUrls {
    fn default() -> Self {
        Self {
            login: "https://portal.btgpactual.com/digital/#!/entrar/login".to_string(),
            target: "https://portal.btgpactual.com/digital/#!/aplicar/renda-fixa/cdb-lca-lci-lf"
                .to_string(),
            post_login_pattern: r"/meu-portfolio|/home".to_string(),
        }
    }
}

/// CSS selectors for the elements the navigator touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Element only present once the portfolio view has loaded; the DOM side
    /// of the login-detection race.
    pub portfolio_marker: String,

    /// Section title on the target page; readiness signal before extraction.
    pub page_title: String,

    /// Element carrying the account's available balance.
    pub balance: String,

    /// Token input inside the investment confirmation modal.
    pub token_input: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            portfolio_marker: ".portfolio-container".to_string(),
            page_title: "h2.section-title".to_string(),
            balance: "#main > div > div > div > div > summary-header > header > div > div > div \
                      > div:nth-child(1) strong"
                .to_string(),
            token_input: "#main > div > div > div > div > div.ng-animate-enabled > \
                          investments-modal > div > \
                          div.ng-modal-dialog.uiAnimate-fadeDownToUp.has-button-toolbar.ng-animate-enabled \
                          > div.ng-modal-dialog-content.clearfix > div:nth-child(2) > \
                          div.flowContainer > div > div > div:nth-child(2) > form > div > div > \
                          uplevel-input > div > div.field.noMarginBottom.noMarginTop > input"
                .to_string(),
        }
    }
}

fn default_navigation_timeout() -> Duration {
    Duration::from_millis(90_000)
}

fn default_login_confirmation_timeout() -> Duration {
    Duration::from_millis(180_000)
}

fn default_element_visibility_timeout() -> Duration {
    Duration::from_millis(45_000)
}

/// Upper bounds on the awaited browser operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on each page load.
    #[serde(
        default = "default_navigation_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub navigation: Duration,

    /// How long the human gets to complete login and MFA.
    #[serde(
        default = "default_login_confirmation_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub login_confirmation: Duration,

    /// Bound on element waits; the target page title gets twice this.
    #[serde(
        default = "default_element_visibility_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub element_visibility: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation: default_navigation_timeout(),
            login_confirmation: default_login_confirmation_timeout(),
            element_visibility: default_element_visibility_timeout(),
        }
    }
}

/// How a filter widget is operated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Checkbox list opened through an activation button.
    Multi,
    /// Plain `<select>` dropdown.
    Select,
}

/// One labeled filter on the offer table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
}

/// Selectors shared by all multi-option filter widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFilterSelectors {
    pub options: String,
    pub checkbox: String,
}

impl Default for MultiFilterSelectors {
    fn default() -> Self {
        Self {
            options: r#"ul > li:not(:has(input[ng-model="allSelected"]))"#.to_string(),
            checkbox: r#"input[type="checkbox"]"#.to_string(),
        }
    }
}

/// Filter widgets declared on the offer table.
///
/// Declarative only: application of filters is an extension point the
/// extraction flow does not drive yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub multi: MultiFilterSelectors,
    pub labels: BTreeMap<String, FilterSpec>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let multi_label = |element: &str| FilterSpec {
            kind: FilterKind::Multi,
            selector: format!(r#"div[element="{element}"]"#),
            button: Some(r#"button:has-text("Todos(as)")"#.to_string()),
        };

        let mut labels = BTreeMap::new();
        labels.insert("Produto".to_string(), multi_label("_A"));
        labels.insert("Indexador".to_string(), multi_label("_B"));
        labels.insert("Emissor".to_string(), multi_label("_C"));
        labels.insert("Risco".to_string(), multi_label("_D"));
        labels.insert("Liquidez".to_string(), multi_label("_E"));
        labels.insert(
            "Prazo".to_string(),
            FilterSpec {
                kind: FilterKind::Select,
                selector: "#termination".to_string(),
                button: None,
            },
        );
        labels.insert(
            "Aplicação Mínima".to_string(),
            FilterSpec {
                kind: FilterKind::Select,
                selector: "#aplicacao_minima".to_string(),
                button: None,
            },
        );

        Self {
            multi: MultiFilterSelectors::default(),
            labels,
        }
    }
}

/// How one table column is read out of a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Zero-based cell index within the row.
    pub index: usize,

    /// Selector applied inside the cell; the cell's own text otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_selector: Option<String>,

    /// Attribute to read instead of text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,

    /// Separator when the sub-selector matches several elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
}

/// Row selector and per-column extraction rules for the offer table.
///
/// Declarative only, like [`FilterConfig`]; see
/// [`crate::navigator::ExtractedRow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    pub rows: String,
    pub columns: BTreeMap<String, ColumnSpec>,
}

impl Default for TableSchema {
    fn default() -> Self {
        let mut columns = BTreeMap::new();
        columns.insert(
            "Risco".to_string(),
            ColumnSpec {
                index: 0,
                sub_selector: Some("span.riskLevelSymbol".to_string()),
                attr: Some("class".to_string()),
                join: None,
            },
        );
        columns.insert(
            "Produto".to_string(),
            ColumnSpec {
                index: 0,
                sub_selector: Some("div.textUppercase, small.textDescOverflow".to_string()),
                attr: None,
                join: Some(" - ".to_string()),
            },
        );
        columns.insert(
            "Prazo".to_string(),
            ColumnSpec {
                index: 1,
                sub_selector: None,
                attr: None,
                join: None,
            },
        );
        columns.insert(
            "Vencimento".to_string(),
            ColumnSpec {
                index: 2,
                sub_selector: None,
                attr: None,
                join: None,
            },
        );
        columns.insert(
            "Taxa".to_string(),
            ColumnSpec {
                index: 3,
                sub_selector: Some("span".to_string()),
                attr: None,
                join: Some(" ".to_string()),
            },
        );
        columns.insert(
            "Taxa Eq. CDB".to_string(),
            ColumnSpec {
                index: 4,
                sub_selector: Some("span".to_string()),
                attr: None,
                join: None,
            },
        );
        columns.insert(
            "Juros".to_string(),
            ColumnSpec {
                index: 5,
                sub_selector: None,
                attr: None,
                join: None,
            },
        );
        columns.insert(
            "Lastro disponível".to_string(),
            ColumnSpec {
                index: 6,
                sub_selector: None,
                attr: None,
                join: None,
            },
        );
        columns.insert(
            "Aplicação Mínima".to_string(),
            ColumnSpec {
                index: 7,
                sub_selector: None,
                attr: None,
                join: None,
            },
        );

        Self {
            rows: "table.moneyValues.enhanced.mobileVersion tbody tr".to_string(),
            columns,
        }
    }
}

/// Full navigator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub urls: PortalUrls,
    pub selectors: SelectorConfig,
    pub timeouts: TimeoutConfig,
    pub currency: CurrencyStyle,
    pub filters: FilterConfig,
    pub table: TableSchema,
}

impl PortalConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PortalConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the invariants the navigator relies on: strictly positive
    /// timeouts, a compilable post-login pattern, and distinct separators.
    pub fn validate(&self) -> Result<()> {
        for (name, timeout) in [
            ("navigation", self.timeouts.navigation),
            ("login_confirmation", self.timeouts.login_confirmation),
            ("element_visibility", self.timeouts.element_visibility),
        ] {
            if timeout.is_zero() {
                anyhow::bail!("Timeout '{name}' must be strictly positive");
            }
        }

        Regex::new(&self.urls.post_login_pattern).with_context(|| {
            format!(
                "Invalid post-login URL pattern: {:?}",
                self.urls.post_login_pattern
            )
        })?;

        if self.currency.thousands_separator == self.currency.decimal_separator {
            anyhow::bail!("Currency separators must differ");
        }

        Ok(())
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./portalsync.toml` if it exists in the current directory
/// 2. `~/.local/share/portalsync/portalsync.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("portalsync.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("portalsync").join("portalsync.toml");
    }

    local_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_portal_contract() {
        let config = PortalConfig::default();
        assert_eq!(config.timeouts.navigation, Duration::from_millis(90_000));
        assert_eq!(
            config.timeouts.login_confirmation,
            Duration::from_millis(180_000)
        );
        assert_eq!(
            config.timeouts.element_visibility,
            Duration::from_millis(45_000)
        );
    }

    #[test]
    fn default_urls_and_selectors() {
        let config = PortalConfig::default();
        assert!(config.urls.login.ends_with("/entrar/login"));
        assert!(config.urls.target.ends_with("/renda-fixa/cdb-lca-lci-lf"));
        assert_eq!(config.selectors.portfolio_marker, ".portfolio-container");
        assert_eq!(config.selectors.page_title, "h2.section-title");
        assert!(config.selectors.balance.contains("summary-header"));
    }

    #[test]
    fn default_filters_and_table_schema() {
        let config = PortalConfig::default();
        assert_eq!(config.filters.labels.len(), 7);

        let prazo = &config.filters.labels["Prazo"];
        assert_eq!(prazo.kind, FilterKind::Select);
        assert_eq!(prazo.selector, "#termination");
        assert!(prazo.button.is_none());

        let produto = &config.filters.labels["Produto"];
        assert_eq!(produto.kind, FilterKind::Multi);
        assert_eq!(produto.selector, r#"div[element="_A"]"#);

        assert_eq!(config.table.columns.len(), 9);
        assert_eq!(config.table.columns["Vencimento"].index, 2);
        assert_eq!(
            config.table.columns["Risco"].attr.as_deref(),
            Some("class")
        );
    }

    #[test]
    fn partial_toml_overrides_keep_defaults() {
        let config: PortalConfig = toml::from_str(
            r#"
            [timeouts]
            navigation = "120s"

            [currency]
            symbol = "US$"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.navigation, Duration::from_secs(120));
        assert_eq!(
            config.timeouts.login_confirmation,
            Duration::from_millis(180_000)
        );
        assert_eq!(config.currency.symbol, "US$");
        assert_eq!(config.currency.decimal_separator, ',');
        assert_eq!(config.urls.login, PortalUrls::default().login);
    }

    #[test]
    fn validate_accepts_defaults() {
        PortalConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = PortalConfig::default();
        config.timeouts.element_visibility = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_pattern() {
        let mut config = PortalConfig::default();
        config.urls.post_login_pattern = "(".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_equal_separators() {
        let mut config = PortalConfig::default();
        config.currency.decimal_separator = '.';
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portalsync.toml");

        let config = PortalConfig::load_or_default(&path).unwrap();
        assert_eq!(config.timeouts.navigation, Duration::from_millis(90_000));
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portalsync.toml");
        std::fs::write(
            &path,
            r#"
            [urls]
            login = "https://example.test/login"
            "#,
        )
        .unwrap();

        let config = PortalConfig::load(&path).unwrap();
        assert_eq!(config.urls.login, "https://example.test/login");
        assert_eq!(config.urls.target, PortalUrls::default().target);
    }
}
