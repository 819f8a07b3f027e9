//! HTTP boundary: one JSON endpoint plus a liveness probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::Error;
use crate::pipeline::{PricePipeline, PriceReport};
use crate::transport::SessionFactory;

pub const MISSING_QUERY: &str = "Missing 'query' field";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<PricePipeline>,
    sessions: Arc<dyn SessionFactory>,
}

impl AppState {
    pub fn new(pipeline: PricePipeline, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sessions,
        }
    }
}

// --- Error Handling ---
pub enum AppError {
    BadRequest(String),
    Internal(Error),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError::Internal(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s),
            AppError::Internal(e) => {
                error!(error = %e, "price lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PricesRequest {
    query: Option<String>,
}

/// Extracts a non-empty `query` string from the raw body. Anything else,
/// including an empty or non-JSON body, counts as missing.
fn parse_query(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<PricesRequest>(body)
        .ok()
        .and_then(|req| req.query)
        .filter(|q| !q.is_empty())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/getPrices", post(get_prices))
        .with_state(state)
}

async fn home() -> &'static str {
    "Card price service is running"
}

async fn get_prices(State(state): State<AppState>, body: Bytes) -> Result<Json<PriceReport>, AppError> {
    let query = parse_query(&body).ok_or_else(|| AppError::BadRequest(MISSING_QUERY.to_string()))?;
    info!(query = %query, "price request");

    // One session per request; nothing is shared between lookups.
    let transport = state.sessions.open()?;
    let report = state.pipeline.resolve_prices(&query, transport.as_ref()).await?;
    Ok(Json(report))
}

pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("card price service listening on http://{}", addr);
    axum::serve(listener, router(state)).await
}
