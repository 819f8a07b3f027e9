use card_prices::{router_state, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "could not load settings");
            std::process::exit(2);
        }
    };
    info!(
        port = settings.port,
        cookies = settings.cookies.len(),
        timeout_secs = settings.request_timeout.as_secs(),
        "starting card price service"
    );

    let state = match router_state(&settings) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "could not build price pipeline");
            std::process::exit(2);
        }
    };
    if let Err(e) = card_prices::server::serve(state, settings.port).await {
        error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
