//! Resolves a trading-card query to its marketplace product page and reads the
//! lowest and median offer prices from it.

pub mod config;
pub mod error;
pub mod filters;
pub mod html_extractor;
pub mod locator;
pub mod pipeline;
pub mod server;
pub mod transport;

use std::sync::Arc;

pub use config::{Marketplace, Settings};
pub use error::{Error, Result, TransportError};
pub use filters::{compose, FilterSet};
pub use html_extractor::{PriceExtractor, NOT_AVAILABLE};
pub use locator::ProductLocator;
pub use pipeline::{PricePipeline, PriceReport};
pub use server::{router, AppState};
pub use transport::{FetchedPage, HttpTransport, SessionConfig, SessionFactory, Transport};

/// Wires the production pipeline and session factory from `settings`.
pub fn router_state(settings: &Settings) -> Result<AppState> {
    let sessions: Arc<dyn SessionFactory> = Arc::new(SessionConfig::from_settings(settings));
    Ok(AppState::new(PricePipeline::from_settings(settings)?, sessions))
}
