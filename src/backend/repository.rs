//! Typed row operations over any `Backend`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{Backend, BackendError, Bearer, Filter, Session, Table};
use crate::models::{NewProfile, Organization, Profile, UserRole};

fn decode<T: DeserializeOwned>(table: Table, value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value)
        .map_err(|e| BackendError::ResponseParsing(format!("{table} row: {e}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, BackendError> {
    serde_json::to_value(value).map_err(|e| BackendError::ResponseParsing(e.to_string()))
}

pub fn get_profile(api: &dyn Backend, bearer: &Bearer, id: &Uuid) -> Result<Profile, BackendError> {
    let row = api.select_single(bearer, Table::Profiles, &Filter::by_id(id))?;
    decode(Table::Profiles, row)
}

pub fn get_organization(
    api: &dyn Backend,
    bearer: &Bearer,
    id: &Uuid,
) -> Result<Organization, BackendError> {
    let row = api.select_single(bearer, Table::Organizations, &Filter::by_id(id))?;
    decode(Table::Organizations, row)
}

pub fn insert_profile(
    api: &dyn Backend,
    bearer: &Bearer,
    profile: &NewProfile,
) -> Result<Profile, BackendError> {
    let row = api.insert_returning(bearer, Table::Profiles, encode(profile)?)?;
    decode(Table::Profiles, row)
}

/// Columns an administrative action may change. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expert_certified: Option<bool>,
}

impl ProfilePatch {
    pub fn role(role: UserRole) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn certification(certified: bool) -> Self {
        Self {
            is_expert_certified: Some(certified),
            ..Self::default()
        }
    }
}

pub fn update_profile(
    api: &dyn Backend,
    bearer: &Bearer,
    id: &Uuid,
    patch: &ProfilePatch,
) -> Result<Profile, BackendError> {
    let row = api.update_returning(bearer, Table::Profiles, &Filter::by_id(id), encode(patch)?)?;
    decode(Table::Profiles, row)
}

/// Result of `get_or_create_profile`.
#[derive(Debug, Clone)]
pub struct ProfileLookup {
    pub profile: Profile,
    pub created: bool,
}

/// Fetch the session user's profile, provisioning a clinician profile when
/// none exists.
///
/// Only a not-found result triggers provisioning. A policy error (including
/// 42P17) is returned unchanged: provisioning cannot repair a broken policy,
/// and inserting would hide it. The new profile's organization comes from the
/// session's org claim, else `default_org`.
pub fn get_or_create_profile(
    api: &dyn Backend,
    session: &Session,
    default_org: Option<Uuid>,
) -> Result<ProfileLookup, BackendError> {
    let bearer = Bearer::for_session(session);
    let user = &session.user;

    match get_profile(api, &bearer, &user.id) {
        Ok(profile) => {
            return Ok(ProfileLookup {
                profile,
                created: false,
            })
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let org_id = user.app_metadata.org_id.or(default_org).ok_or_else(|| {
        BackendError::Provisioning(format!("no organization known for user {}", user.id))
    })?;
    let email = user.email.clone().unwrap_or_default();
    let new_profile = NewProfile::clinician(user.id, &email, user.full_name(), org_id);

    tracing::info!(user_id = %user.id, %org_id, "provisioning missing profile");
    let profile = insert_profile(api, &bearer, &new_profile)?;
    Ok(ProfileLookup {
        profile,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AppMetadata, MemoryBackend};
    use crate::config::SecretKey;
    use serde_json::json;

    const ORG: &str = "00000000-0000-0000-0000-00000000000a";

    fn org_id() -> Uuid {
        Uuid::parse_str(ORG).unwrap()
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::with_default_policies(SecretKey::new("sb_secret_test"));
        backend.seed_row(
            Table::Organizations,
            json!({"id": ORG, "name": "Alpha Spine", "type": "hospital"}),
        );
        backend
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let json = serde_json::to_value(ProfilePatch::role(UserRole::ExpertReviewer)).unwrap();
        assert_eq!(json, json!({"role": "EXPERT_REVIEWER"}));
        let json = serde_json::to_value(ProfilePatch::certification(false)).unwrap();
        assert_eq!(json, json!({"is_expert_certified": false}));
    }

    #[test]
    fn existing_profile_is_returned_untouched() {
        let backend = backend();
        let id = backend.seed_user("c@alphaspine.io", "pw", None);
        backend.seed_row(
            Table::Profiles,
            json!({"id": id.to_string(), "email": "c@alphaspine.io", "role": "EXPERT_REVIEWER", "org_id": ORG}),
        );
        let session = backend.sign_in_with_password("c@alphaspine.io", "pw").unwrap();

        let lookup = get_or_create_profile(&backend, &session, None).unwrap();
        assert!(!lookup.created);
        assert_eq!(lookup.profile.role, UserRole::ExpertReviewer);
        assert_eq!(backend.rows(Table::Profiles).len(), 1);
    }

    #[test]
    fn missing_profile_is_created_once() {
        let backend = backend();
        let id = backend.seed_user("new@alphaspine.io", "pw", Some("Sam Ortiz"));
        let session = backend.sign_in_with_password("new@alphaspine.io", "pw").unwrap();

        let first = get_or_create_profile(&backend, &session, Some(org_id())).unwrap();
        assert!(first.created);
        assert_eq!(first.profile.id, id);
        assert_eq!(first.profile.role, UserRole::Clinician);
        assert_eq!(first.profile.full_name.as_deref(), Some("Sam Ortiz"));

        let second = get_or_create_profile(&backend, &session, Some(org_id())).unwrap();
        assert!(!second.created);
        assert_eq!(backend.rows(Table::Profiles).len(), 1);
    }

    #[test]
    fn org_claim_wins_over_default() {
        let backend = backend();
        let id = backend.seed_user("claim@alphaspine.io", "pw", None);
        backend.set_app_metadata(
            &id,
            AppMetadata {
                role: None,
                org_id: Some(org_id()),
            },
        );
        let session = backend.sign_in_with_password("claim@alphaspine.io", "pw").unwrap();

        let lookup = get_or_create_profile(&backend, &session, Some(Uuid::new_v4())).unwrap();
        assert_eq!(lookup.profile.org_id, org_id());
    }

    #[test]
    fn no_organization_is_provisioning_error() {
        let backend = backend();
        backend.seed_user("orphan@alphaspine.io", "pw", None);
        let session = backend.sign_in_with_password("orphan@alphaspine.io", "pw").unwrap();

        let err = get_or_create_profile(&backend, &session, None).unwrap_err();
        assert!(matches!(err, BackendError::Provisioning(_)));
        assert!(backend.rows(Table::Profiles).is_empty());
    }

    #[test]
    fn organization_lookup_by_profile_reference() {
        let backend = backend();
        let id = backend.seed_user("c@alphaspine.io", "pw", None);
        backend.seed_row(
            Table::Profiles,
            json!({"id": id.to_string(), "email": "c@alphaspine.io", "role": "CLINICIAN", "org_id": ORG}),
        );
        let session = backend.sign_in_with_password("c@alphaspine.io", "pw").unwrap();
        let bearer = Bearer::for_session(&session);

        let profile = get_profile(&backend, &bearer, &id).unwrap();
        let org = get_organization(&backend, &bearer, &profile.org_id).unwrap();
        assert_eq!(org.name, "Alpha Spine");
    }
}
