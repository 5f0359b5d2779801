use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub case_id: Option<Uuid>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_column_maps_to_kind() {
        let n: Notification = serde_json::from_value(serde_json::json!({
            "id": "20000000-0000-0000-0000-000000000001",
            "recipient_id": "00000000-0000-0000-0000-000000000002",
            "type": "CASE_RESULT_READY",
            "title": "Your case has a result"
        }))
        .unwrap();
        assert_eq!(n.kind, NotificationType::CaseResultReady);
        assert!(!n.is_read);
    }
}
