//! Request logging.

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{SecondsFormat, Utc};

/// Log method, path and arrival time of every request.
pub async fn log_request(request: Request, next: Next) -> Response {
    tracing::info!(
        "[{}] {} {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        request.method(),
        request.uri().path()
    );
    next.run(request).await
}
