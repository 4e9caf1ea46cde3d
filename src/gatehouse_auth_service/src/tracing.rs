use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tracing::Span;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Installs color-eyre and the tracing subscriber stack. Call once at
/// process start.
pub fn init_tracing() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}

/// One span per request, tagged with a fresh request id so log lines from
/// concurrent logins stay separable.
pub fn make_span_with_request_id(request: &Request<Body>) -> Span {
    let request_id = Uuid::new_v4();
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

pub fn on_request(_request: &Request<Body>, _span: &Span) {
    tracing::info!("request received");
}

pub fn on_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    tracing::info!(
        status = %response.status(),
        latency_ms = %latency.as_millis(),
        "response sent"
    );
}
