use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AnatomyRegion, CaseStatus, PreferredApproach};

/// A submitted spine-surgery case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub org_id: Uuid,
    pub submitter_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub patient_age: Option<u16>,
    #[serde(default)]
    pub symptom_duration_months: Option<u16>,
    pub status: CaseStatus,
    pub anatomy_region: AnatomyRegion,
    pub preferred_approach: PreferredApproach,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Case {
    pub fn is_editable(&self) -> bool {
        self.status == CaseStatus::Draft
    }
}
