use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Marketplace;
use crate::error::{Error, Result, TransportError};
use crate::transport::Transport;

/// Resolves a free-text card query into the marketplace's canonical product URL.
#[derive(Debug, Clone)]
pub struct ProductLocator {
    marketplace: Marketplace,
    timeout: Duration,
}

impl ProductLocator {
    pub fn new(marketplace: Marketplace, timeout: Duration) -> Self {
        Self {
            marketplace,
            timeout,
        }
    }

    pub async fn locate(&self, query: &str, transport: &dyn Transport) -> Result<String> {
        let search_url = self.marketplace.search_url_for(query);
        info!(query, url = %search_url, "searching marketplace");

        let page = transport.get(&search_url, true, self.timeout).await?;

        // Unique matches redirect straight to the product page.
        if self.marketplace.is_product_url(&page.final_url) {
            info!(url = %page.final_url, "search redirected to product page");
            return Ok(page.final_url);
        }

        if page.status == 403 {
            warn!(url = %page.final_url, "search blocked by marketplace");
            return Err(Error::Blocked {
                url: page.final_url,
            });
        }

        if page.status >= 400 {
            return Err(TransportError::Status {
                status: page.status,
                url: page.final_url,
            }
            .into());
        }

        match self.find_product_link(&page.body) {
            Some(url) => {
                info!(url = %url, "product found in search results");
                Ok(url)
            }
            None => Err(Error::NotFound {
                query: query.to_string(),
            }),
        }
    }

    /// Scans search-result markup from most to least specific scope and
    /// returns the first product link as an absolute URL.
    fn find_product_link(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        let marker = &self.marketplace.product_path;
        let selectors = [
            format!("table#ProductsTable a[href*='{marker}']"),
            format!("div#ProductsTable a[href*='{marker}']"),
            format!("a[href*='{marker}']"),
        ];

        for sel_str in &selectors {
            let sel = match Selector::parse(sel_str) {
                Ok(s) => s,
                Err(e) => {
                    warn!(selector = %sel_str, error = ?e, "skipping unparseable selector");
                    continue;
                }
            };
            let href = document
                .select(&sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .filter(|href| !href.is_empty());
            if let Some(href) = href {
                debug!(selector = %sel_str, href, "matched product link");
                return Some(self.absolute(href));
            }
        }
        None
    }

    fn absolute(&self, href: &str) -> String {
        match Url::parse(&self.marketplace.base_url).and_then(|base| base.join(href)) {
            Ok(u) => u.to_string(),
            Err(_) => href.to_string(),
        }
    }
}
