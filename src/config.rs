use std::time::Duration;

use crate::error::{Error, Result};
use crate::html_extractor::EURO;

// ==================== CONFIG ====================

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const COOKIE_ENV: &str = "COOKIE_CARDMARKET";
pub const PORT_ENV: &str = "PORT";
pub const TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const ANCHORS_ENV: &str = "PRICE_ANCHORS";
pub const CURRENCY_ENV: &str = "PRICE_CURRENCY";

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Where the marketplace lives and how its product pages are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marketplace {
    /// Origin used to resolve relative product links.
    pub base_url: String,
    /// Search endpoint; the percent-encoded query is appended verbatim.
    pub search_url: String,
    /// Path fragment every canonical product page carries.
    pub product_path: String,
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            base_url: "https://www.cardmarket.com".to_string(),
            search_url: "https://www.cardmarket.com/fr/Pokemon/Products/Search?category=-1&searchString="
                .to_string(),
            product_path: "/Products/Singles/".to_string(),
        }
    }
}

impl Marketplace {
    pub fn search_url_for(&self, query: &str) -> String {
        format!("{}{}", self.search_url, urlencoding::encode(query))
    }

    pub fn is_product_url(&self, url: &str) -> bool {
        url.contains(&self.product_path)
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub cookies: Vec<(String, String)>,
    pub request_timeout: Duration,
    pub extra_anchors: Vec<String>,
    /// Marker that follows every price on the marketplace pages.
    pub currency: String,
    pub marketplace: Marketplace,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cookies: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            extra_anchors: Vec::new(),
            currency: EURO.to_string(),
            marketplace: Marketplace::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var)
    }

    /// Builds settings from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(port) = lookup(PORT_ENV) {
            settings.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{PORT_ENV} must be a port number, got '{port}'")))?;
        }

        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{TIMEOUT_ENV} must be a number of seconds, got '{secs}'"))
            })?;
            settings.request_timeout = Duration::from_secs(secs);
        }

        if let Some(header) = lookup(COOKIE_ENV) {
            settings.cookies = parse_cookie_header(&header);
        }

        if let Some(anchors) = lookup(ANCHORS_ENV) {
            settings.extra_anchors = anchors
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(currency) = lookup(CURRENCY_ENV) {
            settings.currency = currency.trim().to_string();
        }

        Ok(settings)
    }
}

/// Parses a `Cookie`-style header (`a=1; b=2`) into ordered name/value pairs.
/// Segments without `=` are ignored; a repeated name keeps its last value.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    let mut cookies: Vec<(String, String)> = Vec::new();
    for part in header.split(';') {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        match cookies.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => cookies.push((name.to_string(), value.to_string())),
        }
    }
    cookies
}
