use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Serde uses the same strings as the backend schema, and `ALL` lists every
/// member in declaration order.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(OrgType {
    Hospital => "hospital",
    PrivatePractice => "private_practice",
    Aco => "aco",
    Other => "other",
});

str_enum!(UserRole {
    Clinician => "CLINICIAN",
    ExpertReviewer => "EXPERT_REVIEWER",
    OrgAdmin => "ORG_ADMIN",
    SysAdmin => "SYS_ADMIN",
});

str_enum!(CaseStatus {
    Draft => "DRAFT",
    Submitted => "SUBMITTED",
    UnderReview => "UNDER_REVIEW",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

str_enum!(ReviewStatus {
    Assigned => "ASSIGNED",
    InProgress => "IN_PROGRESS",
    Submitted => "SUBMITTED",
    Expired => "EXPIRED",
});

str_enum!(FinalClassification {
    Appropriate => "APPROPRIATE",
    Uncertain => "UNCERTAIN",
    Inappropriate => "INAPPROPRIATE",
});

str_enum!(AnatomyRegion {
    Lumbar => "LUMBAR",
    Cervical => "CERVICAL",
    Thoracic => "THORACIC",
    Other => "OTHER",
});

str_enum!(PreferredApproach {
    DecompressionOnly => "DECOMPRESSION_ONLY",
    Plf => "PLF",
    Tlif => "TLIF",
    Alif => "ALIF",
    Other => "OTHER",
});

str_enum!(NotificationType {
    CaseAssigned => "CASE_ASSIGNED",
    CaseResultReady => "CASE_RESULT_READY",
    ReviewReminder => "REVIEW_REMINDER",
    SystemMessage => "SYSTEM_MESSAGE",
});

impl UserRole {
    /// ORG_ADMIN or SYS_ADMIN.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::OrgAdmin | Self::SysAdmin)
    }
}

impl CaseStatus {
    /// Terminal states accept no further reviews.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn user_role_round_trip() {
        for (variant, s) in [
            (UserRole::Clinician, "CLINICIAN"),
            (UserRole::ExpertReviewer, "EXPERT_REVIEWER"),
            (UserRole::OrgAdmin, "ORG_ADMIN"),
            (UserRole::SysAdmin, "SYS_ADMIN"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(UserRole::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn org_type_uses_lowercase_strings() {
        assert_eq!(OrgType::PrivatePractice.as_str(), "private_practice");
        assert_eq!(OrgType::from_str("aco").unwrap(), OrgType::Aco);
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&CaseStatus::UnderReview).unwrap();
        assert_eq!(json, "\"UNDER_REVIEW\"");
        let parsed: PreferredApproach = serde_json::from_str("\"DECOMPRESSION_ONLY\"").unwrap();
        assert_eq!(parsed, PreferredApproach::DecompressionOnly);
    }

    #[test]
    fn invalid_value_is_rejected() {
        let err = ReviewStatus::from_str("DONE").unwrap_err();
        assert!(err.to_string().contains("ReviewStatus"));
        assert!(err.to_string().contains("DONE"));
    }

    #[test]
    fn all_lists_every_member() {
        assert_eq!(CaseStatus::ALL.len(), 5);
        assert_eq!(ReviewStatus::ALL.len(), 4);
        assert_eq!(FinalClassification::ALL.len(), 3);
        assert_eq!(AnatomyRegion::ALL.len(), 4);
        assert_eq!(PreferredApproach::ALL.len(), 5);
        assert_eq!(NotificationType::ALL.len(), 4);
        for role in UserRole::ALL {
            assert_eq!(UserRole::from_str(role.as_str()).unwrap(), *role);
        }
    }

    #[test]
    fn admin_roles() {
        assert!(UserRole::OrgAdmin.is_admin());
        assert!(UserRole::SysAdmin.is_admin());
        assert!(!UserRole::Clinician.is_admin());
        assert!(!UserRole::ExpertReviewer.is_admin());
    }

    #[test]
    fn terminal_case_states() {
        assert!(CaseStatus::Completed.is_terminal());
        assert!(CaseStatus::Failed.is_terminal());
        assert!(!CaseStatus::UnderReview.is_terminal());
    }
}
