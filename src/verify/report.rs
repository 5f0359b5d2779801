use serde::Serialize;
use uuid::Uuid;

use crate::backend::{BackendError, CODE_POLICY_RECURSION};
use crate::models::{Organization, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SignIn,
    FetchProfile,
    CreateProfile,
    ConfirmProfile,
    FetchOrganization,
    CheckExpectations,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::FetchProfile => "fetch_profile",
            Self::CreateProfile => "create_profile",
            Self::ConfirmProfile => "confirm_profile",
            Self::FetchOrganization => "fetch_organization",
            Self::CheckExpectations => "check_expectations",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    /// Lookup ran cleanly and matched no row.
    NotFound,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
    /// Backend error code, when the step produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub detail: String,
}

impl StepRecord {
    pub fn passed(step: Step, detail: impl Into<String>) -> Self {
        Self {
            step,
            outcome: StepOutcome::Passed,
            code: None,
            detail: detail.into(),
        }
    }

    pub fn skipped(step: Step) -> Self {
        Self {
            step,
            outcome: StepOutcome::Skipped,
            code: None,
            detail: String::new(),
        }
    }

    pub fn not_found(step: Step, err: &BackendError) -> Self {
        Self {
            step,
            outcome: StepOutcome::NotFound,
            code: err.code().map(str::to_string),
            detail: err.to_string(),
        }
    }

    pub fn failed(step: Step, err: &BackendError) -> Self {
        Self {
            step,
            outcome: StepOutcome::Failed,
            code: err.code().map(str::to_string),
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnosis {
    Healthy,
    AuthenticationFailed { message: String },
    /// A row access policy re-enters its own table.
    PolicyRecursion { step: Step },
    /// No profile row and none could be provisioned.
    ProfileMissing { message: String },
    OrganizationUnreachable { message: String },
    ExpectationMismatch { mismatches: Vec<String> },
    Unexpected { step: Step, message: String },
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Operator-facing one-liner.
    pub fn summary(&self) -> String {
        match self {
            Self::Healthy => "Sign-in, profile and organization checks passed".into(),
            Self::AuthenticationFailed { message } => format!("Sign-in failed: {message}"),
            Self::PolicyRecursion { step } => format!(
                "Profile Setup Required: row access policy recursion ({CODE_POLICY_RECURSION}) during {step}"
            ),
            Self::ProfileMissing { message } => format!("No profile provisioned: {message}"),
            Self::OrganizationUnreachable { message } => {
                format!("Organization not readable: {message}")
            }
            Self::ExpectationMismatch { mismatches } => {
                format!("Unexpected values: {}", mismatches.join("; "))
            }
            Self::Unexpected { step, message } => format!("{step} failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub profile_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
    pub diagnosis: Diagnosis,
    pub summary: String,
}

impl VerificationReport {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            user_id: None,
            steps: Vec::new(),
            profile: None,
            profile_created: false,
            organization: None,
            diagnosis: Diagnosis::Healthy,
            summary: String::new(),
        }
    }

    pub fn record(&mut self, record: StepRecord) {
        match record.outcome {
            StepOutcome::Failed => tracing::warn!(
                step = %record.step,
                code = record.code.as_deref().unwrap_or("-"),
                detail = %record.detail,
                "verification step failed"
            ),
            _ => tracing::info!(step = %record.step, outcome = ?record.outcome, "verification step"),
        }
        self.steps.push(record);
    }

    pub fn finish(mut self, diagnosis: Diagnosis) -> Self {
        self.summary = diagnosis.summary();
        self.diagnosis = diagnosis;
        self
    }

    /// True if any step reported the policy-recursion code.
    pub fn saw_recursion(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.code.as_deref() == Some(CODE_POLICY_RECURSION))
    }

    pub fn step(&self, step: Step) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
