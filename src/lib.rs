pub mod chat;
pub mod config;
pub mod form;
pub mod gemini;
pub mod sse;
pub mod state;
pub mod stream;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::post,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::RelayConfig;
use crate::state::RelayState;

/// Build the relay router: the two endpoints plus the cross-origin policy
/// restricting credentialed callers to the single configured origin.
pub fn router(state: RelayState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/submit-quote", post(form::submit_quote_handler))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &RelayConfig) -> CorsLayer {
    let Some(origin) = config.allowed_origin.as_deref() else {
        warn!("⚠️  FRONTEND_URL is not set; cross-origin requests will be rejected");
        return CorsLayer::new();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            warn!("⚠️  FRONTEND_URL {:?} is not a valid origin; cross-origin requests will be rejected", origin);
            CorsLayer::new()
        }
    }
}
