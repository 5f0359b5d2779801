//! Isolated in-process backend instance.
//!
//! Seeds identities and rows, issues session tokens, and enforces a policy
//! catalogue per row exactly as the hosted backend's policy layer does,
//! including failing with 42P17 when handed a self-referential policy.
//! The verification harness and the HTTP surface tests run against it.
//!
//! Session claims are computed at sign-in from the user's profile row read
//! with service privileges (the backend's access-token hook), so
//! organization-scoped policies never query `profiles` themselves.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{
    column_text, AppMetadata, AuthUser, Backend, BackendError, Bearer, Filter, Session, Table,
    CODE_FOREIGN_KEY_VIOLATION, CODE_UNIQUE_VIOLATION,
};
use crate::config::SecretKey;
use crate::policy::{
    check_protected_columns, default_policies, Policy, PolicyCommand, PolicyEngine, Requester,
    RowSource,
};

/// Foreign keys checked on insert and update: (table, column, referenced table).
const FOREIGN_KEYS: &[(Table, &str, Table)] = &[
    (Table::Profiles, "org_id", Table::Organizations),
    (Table::Cases, "org_id", Table::Organizations),
    (Table::Cases, "submitter_id", Table::Profiles),
    (Table::Reviews, "case_id", Table::Cases),
    (Table::Reviews, "reviewer_id", Table::Profiles),
    (Table::Notifications, "recipient_id", Table::Profiles),
];

const SESSION_TTL_SECS: u64 = 3600;

struct MemoryUser {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<MemoryUser>,
    tokens: HashMap<String, AuthUser>,
    tables: HashMap<Table, Vec<Value>>,
    requests: u64,
}

impl RowSource for MemoryState {
    fn rows(&self, table: Table) -> &[Value] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl MemoryState {
    fn requester(&self, bearer: &Bearer, service_key: &SecretKey) -> Result<Option<Requester>, BackendError> {
        match bearer {
            Bearer::Anon => Ok(None),
            Bearer::ServiceRole(key) if key.matches(service_key) => Ok(None),
            Bearer::ServiceRole(_) => Err(BackendError::Auth("Invalid API key".into())),
            Bearer::User(token) => {
                let user = self
                    .tokens
                    .get(token)
                    .ok_or_else(|| BackendError::Auth("JWT expired or invalid".into()))?;
                Ok(Some(Requester {
                    user_id: user.id,
                    claims: user.app_metadata.clone(),
                }))
            }
        }
    }

    fn check_foreign_keys(&self, table: Table, row: &Value) -> Result<(), BackendError> {
        for (fk_table, column, referenced) in FOREIGN_KEYS {
            if *fk_table != table {
                continue;
            }
            let Some(value) = column_text(row, column) else {
                continue;
            };
            let exists = self
                .rows(*referenced)
                .iter()
                .any(|r| column_text(r, "id").as_deref() == Some(value.as_str()));
            if !exists {
                return Err(BackendError::Api {
                    status: 409,
                    code: Some(CODE_FOREIGN_KEY_VIOLATION.into()),
                    message: format!(
                        "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{column}_fkey\""
                    ),
                });
            }
        }
        Ok(())
    }

    /// Claims for a freshly issued token: role and organization from the
    /// user's profile row when one exists, otherwise the stored metadata.
    fn issue_claims(&self, user: &AuthUser) -> AppMetadata {
        let id = user.id.to_string();
        let profile = self
            .rows(Table::Profiles)
            .iter()
            .find(|r| column_text(r, "id").as_deref() == Some(id.as_str()));
        match profile {
            Some(row) => AppMetadata {
                role: column_text(row, "role").and_then(|r| r.parse().ok()),
                org_id: column_text(row, "org_id").and_then(|o| Uuid::parse_str(&o).ok()),
            },
            None => user.app_metadata.clone(),
        }
    }
}

/// In-process backend with row-level policy enforcement.
pub struct MemoryBackend {
    service_key: SecretKey,
    policies: Vec<Policy>,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Policies are taken as given, unvalidated, so a defective catalogue can
    /// be loaded and its failure observed.
    pub fn new(service_key: SecretKey, policies: Vec<Policy>) -> Self {
        Self {
            service_key,
            policies,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_default_policies(service_key: SecretKey) -> Self {
        Self::new(service_key, default_policies())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicked test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an auth identity. Returns its user id.
    pub fn seed_user(&self, email: &str, password: &str, full_name: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let user = AuthUser {
            id,
            email: Some(email.to_string()),
            app_metadata: AppMetadata::default(),
            user_metadata: match full_name {
                Some(name) => json!({ "full_name": name }),
                None => json!({}),
            },
        };
        self.lock().users.push(MemoryUser {
            user,
            password: password.to_string(),
        });
        id
    }

    /// Set stored app metadata (used when the user has no profile yet).
    pub fn set_app_metadata(&self, user_id: &Uuid, metadata: AppMetadata) {
        let mut state = self.lock();
        if let Some(u) = state.users.iter_mut().find(|u| &u.user.id == user_id) {
            u.user.app_metadata = metadata;
        }
    }

    /// Insert a row directly, bypassing policies and constraints.
    pub fn seed_row(&self, table: Table, row: Value) {
        self.lock().tables.entry(table).or_default().push(row);
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.lock().rows(table).to_vec()
    }

    /// Number of backend calls served so far.
    pub fn request_count(&self) -> u64 {
        self.lock().requests
    }

    fn visible_matches(
        &self,
        state: &MemoryState,
        bearer: &Bearer,
        table: Table,
        command: PolicyCommand,
        filter: &Filter,
    ) -> Result<Vec<usize>, BackendError> {
        let requester = state.requester(bearer, &self.service_key)?;
        let candidates = state
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.matches(row));

        if bearer.is_privileged() {
            return Ok(candidates.map(|(i, _)| i).collect());
        }

        let engine = PolicyEngine::new(&self.policies);
        engine.check_expansion(table, command)?;
        let Some(who) = requester else {
            // Anonymous callers match no policy.
            return Ok(Vec::new());
        };
        Ok(candidates
            .filter(|(_, row)| engine.permits(state, &who, table, command, row))
            .map(|(i, _)| i)
            .collect())
    }

    fn check_new_row(
        &self,
        state: &MemoryState,
        bearer: &Bearer,
        table: Table,
        command: PolicyCommand,
        old: Option<&Value>,
        row: &Value,
    ) -> Result<(), BackendError> {
        if bearer.is_privileged() {
            state.requester(bearer, &self.service_key)?;
            return Ok(());
        }
        let engine = PolicyEngine::new(&self.policies);
        engine.check_expansion(table, command)?;
        let permitted = match state.requester(bearer, &self.service_key)? {
            Some(who) => engine.permits(state, &who, table, command, row),
            None => false,
        };
        if !permitted {
            return Err(BackendError::policy_violation(table));
        }
        check_protected_columns(table, old, row)
    }
}

fn single(table: Table, matches: &[usize]) -> Result<usize, BackendError> {
    match matches {
        [] => Err(BackendError::NotFound { table }),
        [one] => Ok(*one),
        _ => Err(BackendError::MultipleRows { table }),
    }
}

fn now_text() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Backend for MemoryBackend {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let mut state = self.lock();
        state.requests += 1;
        let mut user = state
            .users
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email) && u.password == password)
            .map(|u| u.user.clone())
            .ok_or_else(|| BackendError::Auth("Invalid login credentials".into()))?;
        user.app_metadata = state.issue_claims(&user);

        let access_token = format!("mem-{}", Uuid::new_v4().simple());
        state.tokens.insert(access_token.clone(), user.clone());
        tracing::debug!(user_id = %user.id, "memory backend issued session");
        Ok(Session {
            access_token,
            token_type: Some("bearer".into()),
            expires_in: SESSION_TTL_SECS,
            refresh_token: Some(Uuid::new_v4().simple().to_string()),
            user,
        })
    }

    fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let mut state = self.lock();
        state.requests += 1;
        state
            .tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| BackendError::Auth("JWT expired or invalid".into()))
    }

    fn select_single(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
    ) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state.requests += 1;
        let matches = self.visible_matches(&state, bearer, table, PolicyCommand::Select, filter)?;
        let idx = single(table, &matches)?;
        Ok(state.rows(table)[idx].clone())
    }

    fn insert_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        row: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state.requests += 1;

        let Value::Object(mut fields) = row else {
            return Err(BackendError::Api {
                status: 400,
                code: Some("PGRST102".into()),
                message: "insert body must be a JSON object".into(),
            });
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(now_text()));
        let row = Value::Object(fields);

        self.check_new_row(&state, bearer, table, PolicyCommand::Insert, None, &row)?;

        let id = column_text(&row, "id");
        if state
            .rows(table)
            .iter()
            .any(|r| column_text(r, "id") == id)
        {
            return Err(BackendError::Api {
                status: 409,
                code: Some(CODE_UNIQUE_VIOLATION.into()),
                message: format!("duplicate key value violates unique constraint \"{table}_pkey\""),
            });
        }
        state.check_foreign_keys(table, &row)?;

        state.tables.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    fn update_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state.requests += 1;

        let Value::Object(patch) = patch else {
            return Err(BackendError::Api {
                status: 400,
                code: Some("PGRST102".into()),
                message: "update body must be a JSON object".into(),
            });
        };

        let matches = self.visible_matches(&state, bearer, table, PolicyCommand::Update, filter)?;
        let idx = single(table, &matches)?;

        let current = state.rows(table)[idx].clone();
        let mut updated: Map<String, Value> = match &current {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        for (key, value) in patch {
            updated.insert(key, value);
        }
        updated.insert("updated_at".into(), Value::String(now_text()));
        let updated = Value::Object(updated);

        self.check_new_row(
            &state,
            bearer,
            table,
            PolicyCommand::Update,
            Some(&current),
            &updated,
        )?;
        state.check_foreign_keys(table, &updated)?;

        if let Some(rows) = state.tables.get_mut(&table) {
            rows[idx] = updated.clone();
        }
        Ok(updated)
    }
}
