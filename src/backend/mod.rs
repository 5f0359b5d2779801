//! Access to the hosted backend (auth + row store).
//!
//! `Backend` is the seam: `RestBackend` talks to a real instance over HTTP,
//! `MemoryBackend` is an isolated in-process instance that enforces the same
//! row-level policies and is used by the verification harness.
//!
//! Every data call carries a `Bearer`, which decides the policy context:
//! anonymous, an end user's session, or the service role (policies bypassed).

pub mod error;
pub mod memory;
pub mod repository;
pub mod rest;

pub use error::*;
pub use memory::MemoryBackend;
pub use rest::RestBackend;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::SecretKey;
use crate::models::UserRole;

// ═══════════════════════════════════════════════════════════
// Tables and filters
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Organizations,
    Profiles,
    Cases,
    Reviews,
    Notifications,
}

impl Table {
    pub const ALL: &'static [Table] = &[
        Table::Organizations,
        Table::Profiles,
        Table::Cases,
        Table::Reviews,
        Table::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Profiles => "profiles",
            Self::Cases => "cases",
            Self::Reviews => "reviews",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter (`column = value`). The only filter shape this crate issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn by_id(id: &Uuid) -> Self {
        Self::eq("id", id)
    }

    /// Query-string operator form, e.g. `eq.42`.
    pub fn operator(&self) -> String {
        format!("eq.{}", self.value)
    }

    pub fn matches(&self, row: &Value) -> bool {
        column_text(row, &self.column).as_deref() == Some(self.value.as_str())
    }
}

/// Read a scalar column as text. Objects, arrays and nulls have no text form.
pub fn column_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════
// Auth types
// ═══════════════════════════════════════════════════════════

/// Who a data request runs as.
#[derive(Debug, Clone)]
pub enum Bearer {
    Anon,
    /// An end user's access token; row-level policies apply.
    User(String),
    /// The service-role credential; row-level policies are bypassed.
    ServiceRole(SecretKey),
}

impl Bearer {
    pub fn for_session(session: &Session) -> Self {
        Self::User(session.access_token.clone())
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::ServiceRole(_))
    }
}

/// Claims precomputed into the session token at issue time.
///
/// Organization-scoped policies read these instead of querying `profiles`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub org_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Backend trait
// ═══════════════════════════════════════════════════════════

/// Request/response surface of the hosted backend.
///
/// Calls are blocking and sequential; no retries are performed here.
pub trait Backend: Send + Sync {
    /// Email + password sign-in. Bad credentials yield `BackendError::Auth`.
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// Resolve the user behind an access token.
    fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    /// Exactly one row or `NotFound` / `MultipleRows`.
    fn select_single(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
    ) -> Result<Value, BackendError>;

    /// Insert one row and return it as stored.
    fn insert_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        row: Value,
    ) -> Result<Value, BackendError>;

    /// Patch exactly one row and return it as stored.
    fn update_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Value, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_string_and_number_columns() {
        let row = json!({"id": "abc", "patient_age": 67, "is_read": false});
        assert!(Filter::eq("id", "abc").matches(&row));
        assert!(Filter::eq("patient_age", 67).matches(&row));
        assert!(Filter::eq("is_read", false).matches(&row));
        assert!(!Filter::eq("id", "abd").matches(&row));
        assert!(!Filter::eq("missing", "abc").matches(&row));
    }

    #[test]
    fn filter_operator_form() {
        assert_eq!(Filter::eq("org_id", "x").operator(), "eq.x");
    }

    #[test]
    fn session_debug_hides_token() {
        let session = Session {
            access_token: "eyJhbGciOi.secret".into(),
            token_type: Some("bearer".into()),
            expires_in: 3600,
            refresh_token: None,
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
                app_metadata: AppMetadata::default(),
                user_metadata: Value::Null,
            },
        };
        assert!(!format!("{session:?}").contains("secret"));
    }

    #[test]
    fn auth_user_ignores_unknown_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "email": "admin@alphaspine.io",
            "app_metadata": {"provider": "email", "providers": ["email"], "role": "ORG_ADMIN"},
            "user_metadata": {"full_name": "Dana Reyes"}
        }))
        .unwrap();
        assert_eq!(user.app_metadata.role, Some(UserRole::OrgAdmin));
        assert_eq!(user.app_metadata.org_id, None);
        assert_eq!(user.full_name().as_deref(), Some("Dana Reyes"));
    }

    #[test]
    fn table_names() {
        assert_eq!(Table::Profiles.to_string(), "profiles");
        assert_eq!(Table::ALL.len(), 5);
    }
}
