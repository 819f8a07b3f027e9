use std::time::{Duration, Instant};

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::{Marketplace, Settings};
use crate::error::{Error, Result, TransportError};
use crate::filters::{compose, FilterSet};
use crate::html_extractor::PriceExtractor;
use crate::locator::ProductLocator;
use crate::transport::Transport;

/// Prices for one card plus the page they were read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReport {
    pub lowest: String,
    pub median: String,
    pub url: String,
}

pub struct PricePipeline {
    locator: ProductLocator,
    extractor: PriceExtractor,
    lowest_filters: FilterSet,
    median_filters: FilterSet,
    timeout: Duration,
}

impl PricePipeline {
    pub fn new(marketplace: Marketplace, extractor: PriceExtractor, timeout: Duration) -> Self {
        Self {
            locator: ProductLocator::new(marketplace, timeout),
            extractor,
            lowest_filters: FilterSet::lowest_price(),
            median_filters: FilterSet::median_price(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let extractor = PriceExtractor::default()
            .extend_anchors(&settings.extra_anchors)
            .with_currency(&settings.currency)
            .map_err(|e| Error::Config(format!("unusable currency marker '{}': {e}", settings.currency)))?;
        Ok(Self::new(settings.marketplace.clone(), extractor, settings.request_timeout))
    }

    /// Overrides the filter sets used for the two price pages.
    pub fn with_filters(mut self, lowest: FilterSet, median: FilterSet) -> Self {
        self.lowest_filters = lowest;
        self.median_filters = median;
        self
    }

    /// Locates the product, then reads the lowest and median offers from two
    /// differently filtered listings. Only locating can fail; missing prices
    /// come back as `"N/A"`.
    pub async fn resolve_prices(&self, query: &str, transport: &dyn Transport) -> Result<PriceReport> {
        let start = Instant::now();
        let product_url = self.locator.locate(query, transport).await?;
        let product = Url::parse(&product_url).map_err(|source| TransportError::InvalidUrl {
            url: product_url.clone(),
            source,
        })?;

        let lowest_url = compose(&product, &self.lowest_filters).to_string();
        let body = self.fetch_listing(&lowest_url, transport).await?;
        let lowest = self.extractor.extract_lowest(&Html::parse_document(&body));

        let median_url = compose(&product, &self.median_filters).to_string();
        let body = self.fetch_listing(&median_url, transport).await?;
        let median = self.extractor.extract_median(&Html::parse_document(&body));

        info!(
            query,
            lowest = %lowest,
            median = %median,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "resolved prices"
        );
        Ok(PriceReport {
            lowest,
            median,
            url: lowest_url,
        })
    }

    /// Any status is accepted here; an error page just yields no price.
    async fn fetch_listing(&self, url: &str, transport: &dyn Transport) -> Result<String> {
        let page = transport.get(url, true, self.timeout).await?;
        if !page.is_success() {
            warn!(url, status = page.status, "listing page returned non-success status");
        }
        Ok(page.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;

    const SEARCH: &str = "https://www.cardmarket.com/fr/Pokemon/Products/Search?category=-1&searchString=Mew%20ex";
    const PRODUCT: &str = "https://www.cardmarket.com/fr/Pokemon/Products/Singles/151/Mew-ex-MEW151";
    const LOWEST: &str = "https://www.cardmarket.com/fr/Pokemon/Products/Singles/151/Mew-ex-MEW151?sellerCountry=12&language=2&minCondition=2";
    const MEDIAN: &str = "https://www.cardmarket.com/fr/Pokemon/Products/Singles/151/Mew-ex-MEW151?sellerCountry=12&sellerType=1&language=2&minCondition=2";

    fn pipeline() -> PricePipeline {
        PricePipeline::from_settings(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_full_resolution() {
        let transport = StubTransport::new()
            .redirect(SEARCH, PRODUCT, 200, "")
            .page(LOWEST, 200, "<dl><dd><span>Tendance des prix 4,10 €</span></dd></dl>")
            .page(
                MEDIAN,
                200,
                r#"<div class="table-body"><div>3,00 €</div><div>4,00 €</div><div>9,00 €</div></div>"#,
            );

        let report = pipeline().resolve_prices("Mew ex", &transport).await.unwrap();
        assert_eq!(
            report,
            PriceReport {
                lowest: "4,10 €".into(),
                median: "4,00 €".into(),
                url: LOWEST.into(),
            }
        );
        assert_eq!(
            *transport.requests.lock().unwrap(),
            vec![SEARCH.to_string(), LOWEST.to_string(), MEDIAN.to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_prices_degrade_to_sentinel() {
        let transport = StubTransport::new()
            .redirect(SEARCH, PRODUCT, 200, "")
            .page(LOWEST, 200, "<p>Aucune offre</p>")
            .page(MEDIAN, 403, "<p>Forbidden</p>");

        let report = pipeline().resolve_prices("Mew ex", &transport).await.unwrap();
        assert_eq!(report.lowest, "N/A");
        assert_eq!(report.median, "N/A");
        assert_eq!(report.url, LOWEST);
    }

    #[tokio::test]
    async fn test_custom_filter_sets_drive_listing_urls() {
        let lowest = format!("{PRODUCT}?language=1&minCondition=3");
        let median = format!("{PRODUCT}?sellerType=0");
        let transport = StubTransport::new()
            .redirect(SEARCH, PRODUCT, 200, "")
            .page(&lowest, 200, "<p>Price Trend 2,00 €</p>")
            .page(&median, 200, r#"<div class="table-body"><div>1,50 €</div></div>"#);

        let report = pipeline()
            .with_filters(
                FilterSet::new().with("language", "1").with("minCondition", "3"),
                FilterSet::new().with("sellerType", "0"),
            )
            .resolve_prices("Mew ex", &transport)
            .await
            .unwrap();

        assert_eq!(report.url, lowest);
        assert_eq!(report.lowest, "2,00 €");
        assert_eq!(report.median, "1,50 €");
        assert_eq!(
            *transport.requests.lock().unwrap(),
            vec![SEARCH.to_string(), lowest, median]
        );
    }

    #[tokio::test]
    async fn test_currency_marker_from_settings() {
        let settings = Settings {
            currency: "R$".to_string(),
            ..Settings::default()
        };
        let transport = StubTransport::new()
            .redirect(SEARCH, PRODUCT, 200, "")
            .page(LOWEST, 200, "<p>Frete 9,00 €</p><div><span>Prix moyen 40,00 R$</span></div>")
            .page(MEDIAN, 200, r#"<div class="table-body"><div>12,00 R$</div></div>"#);

        let report = PricePipeline::from_settings(&settings)
            .unwrap()
            .resolve_prices("Mew ex", &transport)
            .await
            .unwrap();
        assert_eq!(report.lowest, "40,00 R$");
        assert_eq!(report.median, "12,00 R$");
    }

    #[tokio::test]
    async fn test_locator_failure_propagates() {
        let transport = StubTransport::new().page(SEARCH, 403, "");
        let err = pipeline().resolve_prices("Mew ex", &transport).await.unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
    }
}
