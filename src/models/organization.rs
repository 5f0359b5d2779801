use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::OrgType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrgType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_row() {
        let org: Organization = serde_json::from_value(serde_json::json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "name": "Alpha Spine",
            "type": "private_practice",
            "created_at": "2025-01-14T09:30:00+00:00"
        }))
        .unwrap();
        assert_eq!(org.name, "Alpha Spine");
        assert_eq!(org.org_type, OrgType::PrivatePractice);
        assert!(org.created_at.is_some());
    }
}
