use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

/// One profile per authenticated user; `id` equals the auth subject id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub is_expert_certified: bool,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub org_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn belongs_to(&self, org_id: &Uuid) -> bool {
        &self.org_id == org_id
    }

    /// Name to show in the UI, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Insert payload for create-if-missing provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_expert_certified: bool,
    pub specialties: Vec<String>,
    pub org_id: Uuid,
}

impl NewProfile {
    /// A fresh clinician profile bound to an auth identity.
    pub fn clinician(id: Uuid, email: &str, full_name: Option<String>, org_id: Uuid) -> Self {
        Self {
            id,
            email: email.to_string(),
            full_name,
            role: UserRole::Clinician,
            is_expert_certified: false,
            specialties: Vec::new(),
            org_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Profile {
        serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "email": "admin@alphaspine.io",
            "full_name": null,
            "role": "ORG_ADMIN",
            "org_id": "00000000-0000-0000-0000-00000000000a"
        }))
        .unwrap()
    }

    #[test]
    fn missing_optional_columns_default() {
        let p = sample();
        assert_eq!(p.role, UserRole::OrgAdmin);
        assert!(!p.is_expert_certified);
        assert!(p.specialties.is_empty());
        assert!(p.created_at.is_none());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut p = sample();
        assert_eq!(p.display_name(), "admin@alphaspine.io");
        p.full_name = Some("Dana Reyes".into());
        assert_eq!(p.display_name(), "Dana Reyes");
    }

    #[test]
    fn new_clinician_is_uncertified() {
        let id = Uuid::new_v4();
        let org = Uuid::new_v4();
        let p = NewProfile::clinician(id, "c@example.org", None, org);
        assert_eq!(p.role, UserRole::Clinician);
        assert!(!p.is_expert_certified);
        assert_eq!(p.org_id, org);
    }
}
