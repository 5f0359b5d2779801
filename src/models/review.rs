use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FinalClassification, ReviewStatus};
use super::ModelError;

/// An expert's evaluation of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub case_id: Uuid,
    pub reviewer_id: Uuid,
    pub status: ReviewStatus,
    #[serde(default)]
    pub final_classification: Option<FinalClassification>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    /// A submitted review carries a classification; an open one does not.
    pub fn validate(&self) -> Result<(), ModelError> {
        match (self.status, self.final_classification) {
            (ReviewStatus::Submitted, None) => Err(ModelError::Invalid {
                entity: "review",
                reason: "submitted review has no final classification".into(),
            }),
            (ReviewStatus::Assigned | ReviewStatus::InProgress, Some(_)) => {
                Err(ModelError::Invalid {
                    entity: "review",
                    reason: "open review already carries a classification".into(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, ReviewStatus::Assigned | ReviewStatus::InProgress)
            && self.due_at.is_some_and(|due| due < now)
    }
}
