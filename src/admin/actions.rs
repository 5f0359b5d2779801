//! Role and certification changes on behalf of an administrator.
//!
//! Each action follows the same order:
//! 1. Resolve the caller's own profile → Forbidden if absent
//! 2. Caller role must be ORG_ADMIN or SYS_ADMIN → Forbidden
//! 3. Load the target profile → NotFound
//! 4. ORG_ADMIN is limited to its own organization and may not touch a
//!    SYS_ADMIN → Forbidden
//! 5. One update call through the privileged client
//! 6. Invalidate dependent views, write the audit event

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::cache::{profile_view_paths, ViewCache};
use super::client::AdminClient;
use crate::backend::repository::ProfilePatch;
use crate::backend::BackendError;
use crate::models::{Profile, UserRole};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminActionError {
    #[error("Profile {profile_id} not found")]
    NotFound { profile_id: Uuid },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Backend error: {0}")]
    Backend(BackendError),
}

impl AdminActionError {
    /// Stable tag for logs and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Backend(_) => "backend_error",
        }
    }
}

/// Which mutation an audit event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    UpdateRole,
    SetExpertCertification,
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateRole => write!(f, "update_role"),
            Self::SetExpertCertification => write!(f, "set_expert_certification"),
        }
    }
}

pub struct AdminActions<'a> {
    client: &'a AdminClient,
    views: &'a dyn ViewCache,
}

impl<'a> AdminActions<'a> {
    pub fn new(client: &'a AdminClient, views: &'a dyn ViewCache) -> Self {
        Self { client, views }
    }

    /// Change `target_id`'s role.
    pub fn update_user_role(
        &self,
        caller_id: &Uuid,
        target_id: &Uuid,
        role: UserRole,
    ) -> Result<Profile, AdminActionError> {
        let result = self.authorize(caller_id, target_id).and_then(|(caller, _)| {
            if role == UserRole::SysAdmin && caller.role != UserRole::SysAdmin {
                return Err(AdminActionError::Forbidden(
                    "only SYS_ADMIN may grant SYS_ADMIN".into(),
                ));
            }
            self.apply(target_id, &ProfilePatch::role(role))
        });
        self.audit(AdminAction::UpdateRole, caller_id, target_id, &result);
        result
    }

    /// Set `target_id`'s expert-certification flag.
    pub fn toggle_expert_certification(
        &self,
        caller_id: &Uuid,
        target_id: &Uuid,
        certified: bool,
    ) -> Result<Profile, AdminActionError> {
        let result = self
            .authorize(caller_id, target_id)
            .and_then(|_| self.apply(target_id, &ProfilePatch::certification(certified)));
        self.audit(
            AdminAction::SetExpertCertification,
            caller_id,
            target_id,
            &result,
        );
        result
    }

    /// Steps 1-4. Returns the caller's and the target's profiles.
    fn authorize(
        &self,
        caller_id: &Uuid,
        target_id: &Uuid,
    ) -> Result<(Profile, Profile), AdminActionError> {
        let caller = self.client.get_profile(caller_id).map_err(|e| {
            if e.is_not_found() {
                AdminActionError::Forbidden("caller has no profile".into())
            } else {
                AdminActionError::Backend(e)
            }
        })?;

        if !caller.role.is_admin() {
            return Err(AdminActionError::Forbidden(format!(
                "role {} cannot administer profiles",
                caller.role
            )));
        }

        let target = self.client.get_profile(target_id).map_err(|e| {
            if e.is_not_found() {
                AdminActionError::NotFound {
                    profile_id: *target_id,
                }
            } else {
                AdminActionError::Backend(e)
            }
        })?;

        if caller.role == UserRole::OrgAdmin && !target.belongs_to(&caller.org_id) {
            return Err(AdminActionError::Forbidden(
                "target profile belongs to another organization".into(),
            ));
        }

        if caller.role == UserRole::OrgAdmin && target.role == UserRole::SysAdmin {
            return Err(AdminActionError::Forbidden(
                "only SYS_ADMIN may modify a SYS_ADMIN profile".into(),
            ));
        }

        Ok((caller, target))
    }

    /// Steps 5-6: the single mutation, then view invalidation.
    fn apply(&self, target_id: &Uuid, patch: &ProfilePatch) -> Result<Profile, AdminActionError> {
        let updated = self.client.update_profile(target_id, patch).map_err(|e| {
            if e.is_not_found() {
                AdminActionError::NotFound {
                    profile_id: *target_id,
                }
            } else {
                AdminActionError::Backend(e)
            }
        })?;
        for path in profile_view_paths(target_id) {
            self.views.invalidate(&path);
        }
        Ok(updated)
    }

    fn audit(
        &self,
        action: AdminAction,
        caller_id: &Uuid,
        target_id: &Uuid,
        result: &Result<Profile, AdminActionError>,
    ) {
        match result {
            Ok(_) => tracing::info!(
                target: "audit",
                %action,
                actor = %caller_id,
                profile = %target_id,
                outcome = "success",
                "admin action"
            ),
            Err(e) => tracing::warn!(
                target: "audit",
                %action,
                actor = %caller_id,
                profile = %target_id,
                outcome = e.kind(),
                error = %e,
                "admin action rejected"
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
