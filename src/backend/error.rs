use serde::Deserialize;
use thiserror::Error;

use super::Table;

/// Single-row query matched zero or several rows.
pub const CODE_NOT_SINGLE_ROW: &str = "PGRST116";
/// Row-level policy re-entered its own relation.
pub const CODE_POLICY_RECURSION: &str = "42P17";
/// Row-level policy rejected the request.
pub const CODE_INSUFFICIENT_PRIVILEGE: &str = "42501";
/// JWT rejected by the data API.
pub const CODE_JWT_INVALID: &str = "PGRST301";
pub const CODE_FOREIGN_KEY_VIOLATION: &str = "23503";
pub const CODE_UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("No row in {table} matched the single-row query")]
    NotFound { table: Table },

    #[error("Several rows in {table} matched the single-row query")]
    MultipleRows { table: Table },

    #[error("Row access policy error ({code}): {message}")]
    Policy { code: String, message: String },

    #[error("Backend returned error (status {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Cannot provision profile: {0}")]
    Provisioning(String),

    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl BackendError {
    /// Backend error code, when the backend supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } | Self::MultipleRows { .. } => Some(CODE_NOT_SINGLE_ROW),
            Self::Policy { code, .. } => Some(code),
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_policy_recursion(&self) -> bool {
        self.code() == Some(CODE_POLICY_RECURSION)
    }

    pub fn policy_recursion(relation: Table) -> Self {
        Self::Policy {
            code: CODE_POLICY_RECURSION.into(),
            message: format!("infinite recursion detected in policy for relation \"{relation}\""),
        }
    }

    pub fn policy_violation(relation: Table) -> Self {
        Self::Policy {
            code: CODE_INSUFFICIENT_PRIVILEGE.into(),
            message: format!("new row violates row-level security policy for table \"{relation}\""),
        }
    }

    pub fn protected_column(relation: Table, column: &str) -> Self {
        Self::Policy {
            code: CODE_INSUFFICIENT_PRIVILEGE.into(),
            message: format!("permission denied for column \"{column}\" of relation \"{relation}\""),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Error body classification
// ═══════════════════════════════════════════════════════════

/// Error body of the row API.
#[derive(Debug, Default, Deserialize)]
struct DataErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Error body of the auth API. Older servers send `error`/`error_description`,
/// newer ones `error_code`/`msg`.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a failed row API response to a `BackendError`.
pub fn classify_error(status: u16, body: &str, table: Table) -> BackendError {
    let parsed: DataErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| truncate(body).to_string());

    match parsed.code.as_deref() {
        Some(CODE_NOT_SINGLE_ROW) => {
            // "The result contains 0 rows" vs "The result contains 2 rows"
            let details = parsed.details.unwrap_or_default();
            if details.contains(" 0 rows") || details.is_empty() {
                BackendError::NotFound { table }
            } else {
                BackendError::MultipleRows { table }
            }
        }
        Some(code @ (CODE_POLICY_RECURSION | CODE_INSUFFICIENT_PRIVILEGE)) => BackendError::Policy {
            code: code.to_string(),
            message,
        },
        Some(CODE_JWT_INVALID) => BackendError::Auth(message),
        _ if status == 401 => BackendError::Auth(message),
        code => BackendError::Api {
            status,
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Map a failed auth API response to a `BackendError`.
pub fn classify_auth_error(status: u16, body: &str) -> BackendError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .unwrap_or_else(|| truncate(body).to_string());

    if (400..500).contains(&status) && status != 429 {
        BackendError::Auth(message)
    } else {
        BackendError::Api {
            status,
            code: parsed.error_code.or(parsed.error),
            message,
        }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_not_found() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        let err = classify_error(406, body, Table::Profiles);
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some(CODE_NOT_SINGLE_ROW));
    }

    #[test]
    fn several_rows_is_distinct_from_not_found() {
        let body = r#"{"code":"PGRST116","details":"The result contains 2 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        let err = classify_error(406, body, Table::Profiles);
        assert_eq!(err, BackendError::MultipleRows { table: Table::Profiles });
        assert!(!err.is_not_found());
    }

    #[test]
    fn recursion_is_a_policy_error_not_not_found() {
        let body = r#"{"code":"42P17","details":null,"hint":null,"message":"infinite recursion detected in policy for relation \"profiles\""}"#;
        let err = classify_error(500, body, Table::Profiles);
        assert!(err.is_policy_recursion());
        assert!(!err.is_not_found());
        assert!(matches!(err, BackendError::Policy { .. }));
    }

    #[test]
    fn rls_rejection_is_policy() {
        let body = r#"{"code":"42501","message":"new row violates row-level security policy for table \"profiles\""}"#;
        let err = classify_error(403, body, Table::Profiles);
        assert_eq!(err.code(), Some(CODE_INSUFFICIENT_PRIVILEGE));
    }

    #[test]
    fn unknown_code_is_api_error() {
        let body = r#"{"code":"23503","message":"insert or update on table \"profiles\" violates foreign key constraint"}"#;
        match classify_error(409, body, Table::Profiles) {
            BackendError::Api { status, code, .. } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some(CODE_FOREIGN_KEY_VIOLATION));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_body_kept_as_message() {
        match classify_error(502, "Bad Gateway", Table::Cases) {
            BackendError::Api { message, code, .. } => {
                assert_eq!(message, "Bad Gateway");
                assert!(code.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn auth_errors_old_and_new_shapes() {
        let old = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            classify_auth_error(400, old),
            BackendError::Auth("Invalid login credentials".into())
        );

        let new = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        assert_eq!(
            classify_auth_error(400, new),
            BackendError::Auth("Invalid login credentials".into())
        );
    }

    #[test]
    fn auth_server_failure_is_not_bad_credentials() {
        let err = classify_auth_error(503, "upstream down");
        assert!(matches!(err, BackendError::Api { status: 503, .. }));
    }

    #[test]
    fn recursion_helper_message() {
        let err = BackendError::policy_recursion(Table::Profiles);
        assert!(err.to_string().contains("infinite recursion"));
        assert!(err.is_policy_recursion());
    }
}
