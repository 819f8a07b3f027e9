use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Returned when a page carries no usable price.
pub const NOT_AVAILABLE: &str = "N/A";

pub const EURO: &str = "€";

/// Labels that sit next to the price summary on a product page, in priority order.
pub const DEFAULT_ANCHORS: &[&str] = &[
    // fr
    "tendance des prix",
    "prix moyen",
    "articles disponibles",
    // en
    "price trend",
    "average price",
    "available items",
    // de
    "preistrend",
    "durchschnittspreis",
    "verfügbare artikel",
    // it
    "andamento del prezzo",
    "prezzo medio",
    "articoli disponibili",
    // es
    "tendencia de precios",
    "precio medio",
    "artículos disponibles",
    // nl
    "prijstrend",
    "gemiddelde prijs",
    "beschikbare artikelen",
];

lazy_static! {
    static ref EURO_PRICE: Regex = price_pattern(EURO).expect("euro price pattern");
    static ref OFFER_TABLE: Selector = Selector::parse("div.table-body").expect("offer table selector");
    static ref OFFER_ROW: Selector = Selector::parse("div.article-row").expect("offer row selector");
}

/// Digits with optional thousands groups and cents, then the currency marker.
fn price_pattern(marker: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?:\d{{1,3}}(?:[.,]\d{{3}})*|\d+)(?:[.,]\d{{2}})?\s*{}",
        regex::escape(marker)
    ))
}

/// Pulls the two price signals out of a marketplace product page.
#[derive(Debug, Clone)]
pub struct PriceExtractor {
    anchors: Vec<String>,
    currency: String,
    price_re: Regex,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHORS.iter().map(|a| a.to_string()).collect(),
            currency: EURO.to_string(),
            price_re: EURO_PRICE.clone(),
        }
    }
}

impl PriceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the anchor list. Earlier entries take priority.
    pub fn with_anchors<I, S>(mut self, anchors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.anchors = anchors
            .into_iter()
            .map(|a| a.as_ref().trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }

    /// Appends anchors after the current ones, e.g. for an extra locale.
    pub fn extend_anchors<I, S>(mut self, anchors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for anchor in anchors {
            let anchor = anchor.as_ref().trim().to_lowercase();
            if !anchor.is_empty() && !self.anchors.contains(&anchor) {
                self.anchors.push(anchor);
            }
        }
        self
    }

    pub fn with_currency(mut self, marker: &str) -> Result<Self, regex::Error> {
        self.price_re = price_pattern(marker)?;
        self.currency = marker.to_string();
        Ok(self)
    }

    pub fn anchors(&self) -> &[String] {
        &self.anchors
    }

    pub fn extract_lowest(&self, document: &Html) -> String {
        self.find_lowest(document)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn extract_median(&self, document: &Html) -> String {
        self.find_median(document)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    fn find_lowest(&self, document: &Html) -> Option<String> {
        for anchor in &self.anchors {
            let Some(hit) = first_text_parent(document, anchor) else {
                continue;
            };
            let container = self.anchored_section(hit).unwrap_or(hit);
            if let Some(price) = self.first_price(container.text()) {
                tracing::debug!(anchor = %anchor, price = %price, "lowest price found near anchor");
                return Some(price);
            }
        }

        // Anywhere on the page; may pick up an unrelated amount.
        let price = self.first_price(document.root_element().text());
        if let Some(price) = &price {
            tracing::debug!(price = %price, "lowest price taken from page-wide scan");
        }
        price
    }

    /// Deepest ancestor (starting at `start`) whose text still mentions an anchor.
    fn anchored_section<'a>(&self, start: ElementRef<'a>) -> Option<ElementRef<'a>> {
        let mut current = Some(start);
        while let Some(el) = current {
            let text = visible_text(el).to_lowercase();
            if self.anchors.iter().any(|a| text.contains(a.as_str())) {
                return Some(el);
            }
            current = el.parent().and_then(ElementRef::wrap);
        }
        None
    }

    fn first_price<'a>(&self, strings: impl Iterator<Item = &'a str>) -> Option<String> {
        strings
            .filter(|s| s.contains(self.currency.as_str()))
            .find_map(|s| self.price_re.find(s).map(|m| m.as_str().trim().to_string()))
    }

    fn find_median(&self, document: &Html) -> Option<String> {
        let offers = document.select(&OFFER_TABLE).next()?;

        let mut rows: Vec<ElementRef> = offers
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .collect();
        if rows.is_empty() {
            rows = offers.select(&OFFER_ROW).collect();
        }
        if rows.is_empty() {
            return None;
        }

        // Rows are used in page order; the listing is expected to be cheapest first.
        let row = rows[median_index(rows.len())];
        row.text()
            .map(str::trim)
            .find(|s| s.contains(self.currency.as_str()))
            .map(String::from)
    }
}

/// Lower-middle row for even counts, exact middle for odd ones.
pub fn median_index(rows: usize) -> usize {
    ((rows + 1) / 2).saturating_sub(1)
}

/// Parent element of the first text node (document order) containing `needle`, case-insensitively.
fn first_text_parent<'a>(document: &'a Html, needle: &str) -> Option<ElementRef<'a>> {
    document
        .tree
        .root()
        .descendants()
        .find(|node| {
            node.value()
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains(needle))
        })
        .and_then(|node| node.parent())
        .and_then(ElementRef::wrap)
}

/// Stripped, non-empty text fragments joined by single spaces.
fn visible_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
