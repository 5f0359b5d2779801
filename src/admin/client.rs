use std::sync::Arc;

use uuid::Uuid;

use crate::backend::repository::{self, ProfilePatch};
use crate::backend::{Backend, BackendError, Bearer, RestBackend};
use crate::config::{AdminConfig, ConfigError, SecretKey, ENV_URL};
use crate::models::Profile;

/// Backend handle authorized to bypass row-level policies.
///
/// Not tied to any end user: it never holds, persists or refreshes a session.
/// Construct only in trusted server-side code.
pub struct AdminClient {
    backend: Arc<dyn Backend>,
    bearer: Bearer,
}

impl AdminClient {
    /// Wrap an existing backend with the service credential.
    pub fn with_backend(backend: Arc<dyn Backend>, service_role_key: SecretKey) -> Self {
        Self {
            backend,
            bearer: Bearer::ServiceRole(service_role_key),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn persists_session(&self) -> bool {
        false
    }

    pub fn get_profile(&self, id: &Uuid) -> Result<Profile, BackendError> {
        repository::get_profile(self.backend(), &self.bearer, id)
    }

    pub fn update_profile(&self, id: &Uuid, patch: &ProfilePatch) -> Result<Profile, BackendError> {
        repository::update_profile(self.backend(), &self.bearer, id, patch)
    }
}

/// Build the privileged client from validated configuration. No network call
/// is made here.
pub fn create_admin_client(config: &AdminConfig) -> Result<AdminClient, ConfigError> {
    let backend = RestBackend::new(
        config.url.as_str(),
        config.service_role_key.clone(),
        crate::backend::rest::DEFAULT_TIMEOUT_SECS,
    )
    .map_err(|e| ConfigError::Invalid {
        name: ENV_URL,
        reason: e.to_string(),
    })?;
    tracing::debug!(url = %config.url, "privileged backend client created");
    Ok(AdminClient::with_backend(
        Arc::new(backend),
        config.service_role_key.clone(),
    ))
}

/// Read `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`, failing immediately
/// if either is absent.
pub fn create_admin_client_from_env() -> Result<AdminClient, ConfigError> {
    create_admin_client(&AdminConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Table};
    use crate::config::{ENV_PUBLISHABLE_KEY, ENV_SERVICE_ROLE_KEY, ENV_URL};
    use serde_json::json;

    #[test]
    fn missing_values_fail_before_a_client_exists() {
        let err = AdminConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_URL));

        let err = AdminConfig::from_lookup(|name| {
            (name == ENV_URL).then(|| "http://127.0.0.1:54321".to_string())
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_SERVICE_ROLE_KEY));

        // the publishable key is never a stand-in for the service key
        let err = AdminConfig::from_lookup(|name| match name {
            ENV_URL => Some("http://127.0.0.1:54321".into()),
            ENV_PUBLISHABLE_KEY => Some("sb_publishable_x".into()),
            _ => None,
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_SERVICE_ROLE_KEY));
    }

    #[test]
    fn factory_builds_without_network() {
        let config = AdminConfig::from_lookup(|name| match name {
            ENV_URL => Some("http://127.0.0.1:9".into()),
            ENV_SERVICE_ROLE_KEY => Some("sb_secret_x".into()),
            _ => None,
        })
        .unwrap();
        let client = create_admin_client(&config).unwrap();
        assert!(!client.persists_session());
    }

    #[test]
    fn service_role_reads_past_policies() {
        let key = SecretKey::new("sb_secret_test");
        let backend = Arc::new(MemoryBackend::with_default_policies(key.clone()));
        let org = Uuid::new_v4();
        let id = Uuid::new_v4();
        backend.seed_row(Table::Organizations, json!({"id": org.to_string(), "name": "Org", "type": "aco"}));
        backend.seed_row(
            Table::Profiles,
            json!({"id": id.to_string(), "email": "x@y.z", "role": "CLINICIAN", "org_id": org.to_string()}),
        );

        let client = AdminClient::with_backend(backend, key);
        assert_eq!(client.get_profile(&id).unwrap().id, id);
    }
}
