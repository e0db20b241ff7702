use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info};

use crate::error::ErrorSummary;

/// Records every request with method, uri, status and elapsed time.
/// Failed responses carry an `ErrorSummary` extension set by `ApiError`,
/// which is logged alongside.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();

    match response.extensions().get::<ErrorSummary>() {
        Some(summary) => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            code = summary.code,
            error = %summary.message,
            "Failed to process request"
        ),
        None => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
    }

    response
}
