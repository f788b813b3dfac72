//! Paginated category scraping driven by configured CSS selectors.
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{CategoryConfig, ScraperConfig, Selectors};
use crate::model::ProductRecord;

static PRICE_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*").expect("valid price regex"));
static CURRENCY_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:rs\.?|inr|₹)\s*(\d[\d,]*)").expect("valid currency regex")
});

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid page URL {0}")]
    InvalidUrl(String),
    #[error("invalid CSS selector {field}: {selector}")]
    InvalidSelector { field: &'static str, selector: String },
}

/// Result of scraping one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Pagination ended normally. May legitimately be empty.
    Complete(Vec<ProductRecord>),
    /// Some page could not be retrieved; the partial batch is discarded.
    Incomplete { reason: String },
}

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, category: &CategoryConfig) -> Result<ScrapeOutcome, ScrapeError>;
}

/// Strip the last parenthetical suffix and surrounding whitespace.
pub fn clean_product_name(raw: &str) -> String {
    let name = match raw.rfind('(') {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    name.trim().to_string()
}

/// Parse a localized price such as `"Rs. 1,000"` or `"₹1,23,456.00"` into
/// whole currency units. Digits following a currency marker win over any
/// earlier number; without a marker the first digit run is used. Returns
/// `None` when no digits are present.
pub fn parse_price(raw: &str) -> Option<i64> {
    let amount = CURRENCY_PRICE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .or_else(|| PRICE_DIGITS.find(raw))?;
    amount.as_str().replace(',', "").parse().ok()
}

pub(crate) struct CompiledSelectors {
    container: Selector,
    name: Selector,
    price: Selector,
    sale_price: Option<Selector>,
    link: Selector,
}

impl CompiledSelectors {
    pub(crate) fn compile(selectors: &Selectors) -> Result<Self, ScrapeError> {
        let parse = |field: &'static str, selector: &str| {
            Selector::parse(selector).map_err(|_| ScrapeError::InvalidSelector {
                field,
                selector: selector.to_string(),
            })
        };
        Ok(Self {
            container: parse("container", &selectors.container)?,
            name: parse("name", &selectors.name)?,
            price: parse("price", &selectors.price)?,
            sale_price: selectors
                .sale_price
                .as_deref()
                .map(|s| parse("sale_price", s))
                .transpose()?,
            link: parse("link", &selectors.link)?,
        })
    }
}

/// Listings found on a single page.
#[derive(Debug, Default)]
pub(crate) struct ParsedPage {
    pub containers: usize,
    pub records: Vec<ProductRecord>,
    pub malformed: usize,
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn parse_listing_page(
    html: &str,
    selectors: &CompiledSelectors,
    page_url: &Url,
    category: &str,
) -> ParsedPage {
    let document = Html::parse_document(html);
    let mut page = ParsedPage::default();

    for container in document.select(&selectors.container) {
        page.containers += 1;

        let name = container
            .select(&selectors.name)
            .next()
            .map(|el| clean_product_name(&element_text(el)))
            .filter(|n| !n.is_empty());
        let price_el = selectors
            .sale_price
            .as_ref()
            .and_then(|sel| container.select(sel).next())
            .or_else(|| container.select(&selectors.price).next());
        let price_text = price_el.map(element_text);
        let price = price_text.as_deref().and_then(parse_price);
        let link = container
            .select(&selectors.link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok());

        match (name, price, link) {
            (Some(name), Some(price), Some(link)) => {
                debug!(%name, price, %link, "parsed listing");
                page.records
                    .push(ProductRecord::scraped(name, price, link.to_string(), category));
            }
            (name, _, link) => {
                page.malformed += 1;
                warn!(
                    ?name,
                    price = ?price_text,
                    link = ?link.map(|l| l.to_string()),
                    "dropping malformed listing"
                );
            }
        }
    }
    page
}

pub(crate) fn page_url(template: &str, base: &str, page: u32) -> Result<Url, ScrapeError> {
    let raw = template
        .replace("{base}", base.trim_end_matches('/'))
        .replace("{page}", &page.to_string());
    Url::parse(&raw).map_err(|_| ScrapeError::InvalidUrl(raw))
}

/// HTTP scraper that walks `page_url_template` from page 1 until a 404 or an
/// empty listing page.
pub struct HtmlScraper {
    http: Client,
    selectors: CompiledSelectors,
    page_url_template: String,
    page_delay: Duration,
    max_pages: u32,
}

impl std::fmt::Debug for HtmlScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlScraper")
            .field("page_url_template", &self.page_url_template)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl HtmlScraper {
    pub fn from_config(cfg: &ScraperConfig) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            selectors: CompiledSelectors::compile(&cfg.selectors)?,
            page_url_template: cfg.page_url_template.clone(),
            page_delay: Duration::from_millis(cfg.page_delay_ms),
            max_pages: cfg.max_pages,
        })
    }
}

#[async_trait]
impl Scraper for HtmlScraper {
    #[instrument(skip_all, fields(category = %category.name))]
    async fn scrape(&self, category: &CategoryConfig) -> Result<ScrapeOutcome, ScrapeError> {
        let mut records = Vec::new();
        let mut malformed = 0usize;

        for page in 1..=self.max_pages {
            if page > 1 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            let url = page_url(&self.page_url_template, &category.base_url, page)?;
            info!(page, %url, "scraping page");

            let res = self.http.get(url.clone()).send().await?;
            let status = res.status();
            if status == StatusCode::NOT_FOUND {
                info!(page, "no more listing pages");
                return Ok(complete(records, malformed));
            }
            if status != StatusCode::OK {
                warn!(page, %status, %url, "unexpected status; aborting scrape");
                return Ok(ScrapeOutcome::Incomplete {
                    reason: format!("page {} returned {}", page, status),
                });
            }

            let body = res.text().await?;
            let parsed = parse_listing_page(&body, &self.selectors, &url, &category.name);
            if parsed.containers == 0 {
                info!(page, "page has no listings");
                return Ok(complete(records, malformed));
            }
            malformed += parsed.malformed;
            records.extend(parsed.records);
        }

        warn!(max_pages = self.max_pages, "pagination did not end");
        Ok(ScrapeOutcome::Incomplete {
            reason: format!("pagination did not end within {} pages", self.max_pages),
        })
    }
}

fn complete(records: Vec<ProductRecord>, malformed: usize) -> ScrapeOutcome {
    info!(products = records.len(), malformed, "scrape complete");
    ScrapeOutcome::Complete(records)
}
