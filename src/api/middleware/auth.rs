//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it with the backend's
//! auth service and injects `CallerContext` into request extensions.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::backend::BackendError;

pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

fn bearer_token(req: &Request<axum::body::Body>) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;

    let backend = ctx.backend.clone();
    let user = tokio::task::spawn_blocking(move || backend.get_user(&token))
        .await?
        .map_err(|e| match e {
            BackendError::Auth(reason) => {
                tracing::debug!(%reason, "bearer token rejected");
                ApiError::Unauthorized
            }
            other => ApiError::from(other),
        })?;

    req.extensions_mut().insert(CallerContext {
        user_id: user.id,
        email: user.email,
    });

    Ok(next.run(req).await)
}
