//! Configuration loader and validator for the stock watcher.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::runner::BackoffPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid category {name}: {reason}")]
    InvalidCategory { name: String, reason: &'static str },
    #[error("Invalid CSS selector for scraper.selectors.{field}: {selector}")]
    InvalidSelector { field: &'static str, selector: String },
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub scraper: ScraperConfig,
    pub categories: Vec<CategoryConfig>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Telegram delivery settings, injected into the notifier at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Defaults to `sqlite://{data_dir}/stock.db` when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_retry_base_seconds")]
    pub retry_base_seconds: u64,
    #[serde(default = "default_retry_max_seconds")]
    pub retry_max_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            connect_attempts: default_connect_attempts(),
            retry_base_seconds: default_retry_base_seconds(),
            retry_max_seconds: default_retry_max_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScraperConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// `{base}` and `{page}` are substituted per request.
    #[serde(default = "default_page_url_template")]
    pub page_url_template: String,
    pub selectors: Selectors,
}

/// CSS selectors locating listing fields; `name`, `price`, `sale_price` and
/// `link` are evaluated inside each `container` match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selectors {
    pub container: String,
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub sale_price: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    pub name: String,
    pub base_url: String,
    pub interval_minutes: u64,
}

impl CategoryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

fn default_max_message_len() -> usize {
    4096
}
fn default_connect_attempts() -> u32 {
    3
}
fn default_retry_base_seconds() -> u64 {
    5
}
fn default_retry_max_seconds() -> u64 {
    60
}
fn default_user_agent() -> String {
    "stock-watchbot/0.1".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    30
}
fn default_page_delay_ms() -> u64 {
    500
}
fn default_max_pages() -> u32 {
    50
}
fn default_page_url_template() -> String {
    "{base}/page/{page}/?stock=instock".to_string()
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn database_url(&self) -> String {
        match &self.store.database_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!(
                "sqlite://{}/stock.db",
                self.app.data_dir.trim_end_matches('/')
            ),
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            attempts: self.store.connect_attempts,
            base: Duration::from_secs(self.store.retry_base_seconds),
            max: Duration::from_secs(self.store.retry_max_seconds),
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// Load configuration from a YAML file, apply environment overrides
/// (`TELEGRAM_BOT_TOKEN`, `DATABASE_URL`) and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_overrides(
        &mut cfg,
        std::env::var("TELEGRAM_BOT_TOKEN").ok(),
        std::env::var("DATABASE_URL").ok(),
    );
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, bot_token: Option<String>, database_url: Option<String>) {
    if let Some(token) = bot_token.filter(|t| !t.trim().is_empty()) {
        cfg.telegram.bot_token = token;
    }
    if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
        cfg.store.database_url = Some(url);
    }
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.chat_ids.is_empty() {
        return Err(ConfigError::Invalid("telegram.chat_ids must list at least one chat"));
    }
    if cfg.telegram.max_message_len == 0 {
        return Err(ConfigError::Invalid("telegram.max_message_len must be > 0"));
    }

    if cfg.store.connect_attempts == 0 {
        return Err(ConfigError::Invalid("store.connect_attempts must be > 0"));
    }

    let sc = &cfg.scraper;
    if sc.max_pages == 0 {
        return Err(ConfigError::Invalid("scraper.max_pages must be > 0"));
    }
    if !sc.page_url_template.contains("{base}") || !sc.page_url_template.contains("{page}") {
        return Err(ConfigError::Invalid(
            "scraper.page_url_template must contain {base} and {page}",
        ));
    }
    let selectors = [
        ("container", Some(&sc.selectors.container)),
        ("name", Some(&sc.selectors.name)),
        ("price", Some(&sc.selectors.price)),
        ("sale_price", sc.selectors.sale_price.as_ref()),
        ("link", Some(&sc.selectors.link)),
    ];
    for (field, selector) in selectors {
        let Some(selector) = selector else { continue };
        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field,
                selector: selector.clone(),
            });
        }
    }

    if cfg.categories.is_empty() {
        return Err(ConfigError::Invalid("categories must list at least one category"));
    }
    let mut names = HashSet::new();
    for category in &cfg.categories {
        let invalid = |reason| ConfigError::InvalidCategory {
            name: category.name.clone(),
            reason,
        };
        if category.name.trim().is_empty() {
            return Err(invalid("name must be non-empty"));
        }
        if !names.insert(category.name.as_str()) {
            return Err(invalid("name is duplicated"));
        }
        if reqwest::Url::parse(&category.base_url).is_err() {
            return Err(invalid("base_url must be an absolute URL"));
        }
        if category.interval_minutes == 0 {
            return Err(invalid("interval_minutes must be > 0"));
        }
    }

    Ok(())
}

/// Example configuration matching the shipped schema.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  chat_ids:
    - 123456789
  max_message_len: 4096

store:
  connect_attempts: 3
  retry_base_seconds: 5
  retry_max_seconds: 60

scraper:
  user_agent: "stock-watchbot/0.1"
  request_timeout_seconds: 30
  page_delay_ms: 500
  max_pages: 50
  page_url_template: "{base}/page/{page}/?stock=instock"
  selectors:
    container: "div.kad_product"
    name: "h5"
    price: "span.woocommerce-Price-amount"
    sale_price: "ins span.woocommerce-Price-amount"
    link: "a.product_item_link"

categories:
  - name: gpu
    base_url: "https://gameloot.in/product-category/graphics-card"
    interval_minutes: 15
  - name: cpu
    base_url: "https://gameloot.in/product-category/buy-cpu"
    interval_minutes: 22
  - name: mobo
    base_url: "https://gameloot.in/product-category/motherboard"
    interval_minutes: 27
"#
}
