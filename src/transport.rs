//! The network capability the price pipeline consumes.
//!
//! [`Transport`] is the seam: production code uses [`HttpTransport`] (a `wreq`
//! client with browser emulation), tests plug in canned pages.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};
use url::Url;
use wreq::cookie::Jar;

use crate::config::{Marketplace, Settings};
use crate::error::{Result, TransportError};

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// What came back from a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL of the last hop, after any redirects that were followed.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        follow_redirects: bool,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<FetchedPage, TransportError>>;
}

/// Opens one transport per inbound request.
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn Transport>>;
}

/// Immutable session identity shared by every transport the process opens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Origin the configured cookies are scoped to.
    pub cookie_origin: String,
    pub cookies: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cookie_origin: settings.marketplace.base_url.clone(),
            cookies: settings.cookies.clone(),
            headers: browser_headers(),
        }
    }

    /// Fresh jar seeded with the configured cookies. Cookies the server sets
    /// later land in the same jar.
    fn cookie_jar(&self) -> Arc<Jar> {
        let jar = Arc::new(Jar::default());
        for (name, value) in &self.cookies {
            jar.add(format!("{name}={value}; Path=/"), self.cookie_origin.as_str());
        }
        jar
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_origin: Marketplace::default().base_url,
            cookies: Vec::new(),
            headers: browser_headers(),
        }
    }
}

impl SessionFactory for SessionConfig {
    fn open(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(HttpTransport::new(Arc::new(self.clone()))?))
    }
}

fn browser_headers() -> Vec<(String, String)> {
    [
        ("User-Agent", DESKTOP_UA),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "fr-FR,fr;q=0.9,en;q=0.8"),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Referer", "https://www.cardmarket.com/"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

// ==================== HTTP TRANSPORT ====================

pub struct HttpTransport {
    client: wreq::Client,
    session: Arc<SessionConfig>,
}

impl HttpTransport {
    pub fn new(session: Arc<SessionConfig>) -> Result<Self, TransportError> {
        let jar = session.cookie_jar();
        let client = match wreq::Client::builder()
            .emulation(wreq_util::Emulation::Chrome131)
            .cookie_provider(jar.clone())
            .build()
        {
            Ok(client) => {
                debug!("chrome emulation enabled");
                client
            }
            Err(e) => {
                warn!(error = %e, "chrome emulation unavailable, falling back to plain client");
                wreq::Client::builder()
                    .cookie_provider(jar)
                    .build()
                    .map_err(|e| TransportError::Client(e.to_string()))?
            }
        };

        Ok(Self { client, session })
    }

    /// Browser headers only; the client's jar supplies `Cookie`.
    fn request(&self, url: &str) -> wreq::RequestBuilder {
        let mut req = self.client.get(url);
        for (name, value) in &self.session.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }

    async fn fetch(&self, original_url: &str, follow_redirects: bool) -> Result<FetchedPage, TransportError> {
        let mut current_url = original_url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let resp = self
                .request(&current_url)
                .send()
                .await
                .map_err(|source| TransportError::Request {
                    url: current_url.clone(),
                    source,
                })?;
            let status = resp.status().as_u16();

            if follow_redirects && (300..400).contains(&status) {
                let location = resp
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .map(|loc| resolve_location(&current_url, loc));
                if let Some(next_url) = location {
                    debug!(from = %current_url, to = %next_url, status, "following redirect");
                    current_url = next_url;
                    continue;
                }
                warn!(url = %current_url, status, "redirect without usable Location header");
            }

            let body = resp.text().await.map_err(|source| TransportError::Request {
                url: current_url.clone(),
                source,
            })?;
            info!(url = %current_url, status, bytes = body.len(), "fetched page");
            return Ok(FetchedPage {
                final_url: current_url,
                status,
                body,
            });
        }

        Err(TransportError::TooManyRedirects {
            url: original_url.to_string(),
            max: MAX_REDIRECTS,
        })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        follow_redirects: bool,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<FetchedPage, TransportError>> {
        async move {
            Url::parse(url).map_err(|source| TransportError::InvalidUrl {
                url: url.to_string(),
                source,
            })?;
            match tokio::time::timeout(timeout, self.fetch(url, follow_redirects)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    url: url.to_string(),
                    secs: timeout.as_secs(),
                }),
            }
        }
        .boxed()
    }
}

/// Resolves a `Location` header against the URL that produced it.
fn resolve_location(current_url: &str, location: &str) -> String {
    match Url::parse(current_url) {
        Ok(base) => match base.join(location) {
            Ok(u) => u.to_string(),
            Err(_) => location.to_string(),
        },
        Err(_) => location.to_string(),
    }
}

// ==================== TEST SUPPORT ====================
