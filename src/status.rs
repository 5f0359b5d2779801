//! Status → badge mapping for case, review, classification and role values.
//!
//! Every mapping is an exhaustive match, so adding an enum member without a
//! badge fails to compile.

use serde::Serialize;

use crate::models::{CaseStatus, FinalClassification, ReviewStatus, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeVariant {
    Default,
    Success,
    Warning,
    Error,
    Info,
    Purple,
    Teal,
}

impl BadgeVariant {
    pub const ALL: &'static [BadgeVariant] = &[
        BadgeVariant::Default,
        BadgeVariant::Success,
        BadgeVariant::Warning,
        BadgeVariant::Error,
        BadgeVariant::Info,
        BadgeVariant::Purple,
        BadgeVariant::Teal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
            Self::Purple => "purple",
            Self::Teal => "teal",
        }
    }
}

/// Display form of one status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub variant: BadgeVariant,
    pub label: &'static str,
}

const fn display(variant: BadgeVariant, label: &'static str) -> StatusDisplay {
    StatusDisplay { variant, label }
}

pub trait StatusBadge {
    fn badge(&self) -> StatusDisplay;
}

impl StatusBadge for CaseStatus {
    fn badge(&self) -> StatusDisplay {
        match self {
            Self::Draft => display(BadgeVariant::Default, "Draft"),
            Self::Submitted => display(BadgeVariant::Info, "Submitted"),
            Self::UnderReview => display(BadgeVariant::Warning, "Under Review"),
            Self::Completed => display(BadgeVariant::Success, "Completed"),
            Self::Failed => display(BadgeVariant::Error, "Failed"),
        }
    }
}

impl StatusBadge for ReviewStatus {
    fn badge(&self) -> StatusDisplay {
        match self {
            Self::Assigned => display(BadgeVariant::Info, "Assigned"),
            Self::InProgress => display(BadgeVariant::Warning, "In Progress"),
            Self::Submitted => display(BadgeVariant::Success, "Submitted"),
            Self::Expired => display(BadgeVariant::Error, "Expired"),
        }
    }
}

impl StatusBadge for FinalClassification {
    fn badge(&self) -> StatusDisplay {
        match self {
            Self::Appropriate => display(BadgeVariant::Success, "Appropriate"),
            Self::Uncertain => display(BadgeVariant::Warning, "Uncertain"),
            Self::Inappropriate => display(BadgeVariant::Error, "Inappropriate"),
        }
    }
}

impl StatusBadge for UserRole {
    fn badge(&self) -> StatusDisplay {
        match self {
            Self::Clinician => display(BadgeVariant::Default, "Clinician"),
            Self::ExpertReviewer => display(BadgeVariant::Purple, "Expert Reviewer"),
            Self::OrgAdmin => display(BadgeVariant::Teal, "Org Admin"),
            Self::SysAdmin => display(BadgeVariant::Info, "System Admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_total<T: StatusBadge>(values: &[T]) {
        for value in values {
            let d = value.badge();
            assert!(!d.label.trim().is_empty());
            assert!(BadgeVariant::ALL.contains(&d.variant));
        }
    }

    #[test]
    fn every_status_value_has_a_badge() {
        assert_total(CaseStatus::ALL);
        assert_total(ReviewStatus::ALL);
        assert_total(FinalClassification::ALL);
        assert_total(UserRole::ALL);
    }

    #[test]
    fn labels_are_distinct_within_each_enum() {
        let labels: std::collections::HashSet<_> =
            CaseStatus::ALL.iter().map(|s| s.badge().label).collect();
        assert_eq!(labels.len(), CaseStatus::ALL.len());
        let labels: std::collections::HashSet<_> =
            ReviewStatus::ALL.iter().map(|s| s.badge().label).collect();
        assert_eq!(labels.len(), ReviewStatus::ALL.len());
    }

    #[test]
    fn outcome_colours() {
        assert_eq!(CaseStatus::Completed.badge().variant, BadgeVariant::Success);
        assert_eq!(CaseStatus::Failed.badge().variant, BadgeVariant::Error);
        assert_eq!(
            FinalClassification::Inappropriate.badge().variant,
            BadgeVariant::Error
        );
        assert_eq!(CaseStatus::UnderReview.badge().label, "Under Review");
    }

    #[test]
    fn variant_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BadgeVariant::Teal).unwrap(), "\"teal\"");
    }
}
