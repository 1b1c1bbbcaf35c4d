use std::env;

use axum::serve;
use gemini_relay::{config::RelayConfig, router, state::RelayState};
use tokio::net::TcpListener;
use tracing::{info, Level};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse::<Level>().ok())
                .unwrap_or(Level::INFO),
        )
        .init();

    // Configuration from environment variables, loaded once
    let config = RelayConfig::from_env();
    let bind_addr = format!("0.0.0.0:{}", config.port);

    info!("Starting Gemini Relay");
    info!("Listening on: {}", bind_addr);
    info!("Chat model: {}", config.gemini_model);
    info!("Gemini API base: {}", config.gemini_api_base);
    info!("Gemini API key configured: {}", config.gemini_api_key.is_some());
    info!(
        "Allowed origin: {}",
        config.allowed_origin.as_deref().unwrap_or("(none)")
    );
    info!(
        "Form endpoint: {}",
        config.form_endpoint.as_deref().unwrap_or("(none)")
    );
    info!("Max upload size: {} bytes", config.max_upload_bytes);

    let state = RelayState::new(config);
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("Gemini Relay is ready");

    serve(listener, app).await.expect("Server error");
}
