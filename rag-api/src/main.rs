use rag_api::config::GatewayConfig;
use rag_api::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = GatewayConfig::from_env();
    let addr = format!("0.0.0.0:{}", config.port);
    info!(%addr, prefix = %config.api_prefix, "starting gateway");

    let router = build_router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind listener");
    axum::serve(listener, router).await.expect("server error");
}
