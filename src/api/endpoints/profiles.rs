//! Administrative profile endpoints.
//!
//! - `POST /api/admin/profiles/:id/role`
//! - `POST /api/admin/profiles/:id/certification`

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::admin::AdminActions;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::models::{Profile, UserRole};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificationRequest {
    pub is_expert_certified: bool,
}

fn target_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("Invalid profile ID format".into()))
}

fn body<T>(json: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    json.map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// `POST /api/admin/profiles/:id/role`
pub async fn update_role(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    path: Result<Path<Uuid>, PathRejection>,
    json: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let target = target_id(path)?;
    let request = body(json)?;

    let profile = tokio::task::spawn_blocking(move || {
        AdminActions::new(&ctx.admin, ctx.views.as_ref()).update_user_role(
            &caller.user_id,
            &target,
            request.role,
        )
    })
    .await??;

    Ok(Json(profile))
}

/// `POST /api/admin/profiles/:id/certification`
pub async fn set_certification(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    path: Result<Path<Uuid>, PathRejection>,
    json: Result<Json<CertificationRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let target = target_id(path)?;
    let request = body(json)?;

    let profile = tokio::task::spawn_blocking(move || {
        AdminActions::new(&ctx.admin, ctx.views.as_ref()).toggle_expert_certification(
            &caller.user_id,
            &target,
            request.is_expert_certified,
        )
    })
    .await??;

    Ok(Json(profile))
}
