//! Access logging middleware.
//!
//! Logs every authenticated API request with caller id, method, path and
//! response status. Runs innermost (after auth has injected CallerContext).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::CallerContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let caller = req
        .extensions()
        .get::<CallerContext>()
        .map(|c| c.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(req).await;

    tracing::info!(
        target: "access",
        %caller,
        %method,
        %path,
        status = response.status().as_u16(),
        "api request"
    );
    response
}
