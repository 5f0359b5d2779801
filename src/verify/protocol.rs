use uuid::Uuid;

use super::report::{Diagnosis, Step, StepOutcome, StepRecord, VerificationReport};
use crate::backend::repository::{get_organization, get_or_create_profile, get_profile};
use crate::backend::{Backend, BackendError, Bearer, Table};
use crate::config::SecretKey;
use crate::models::UserRole;

pub struct Credentials {
    pub email: String,
    pub password: SecretKey,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: SecretKey::new(password),
        }
    }
}

/// Values the operator expects to see for this identity.
#[derive(Debug, Clone, Default)]
pub struct Expectations {
    pub role: Option<UserRole>,
    pub organization: Option<String>,
}

/// Diagnosis for a failed profile or organization step.
fn diagnose(step: Step, err: &BackendError) -> Diagnosis {
    if err.is_policy_recursion() {
        return Diagnosis::PolicyRecursion { step };
    }
    match (step, err) {
        (_, BackendError::Auth(message)) => Diagnosis::AuthenticationFailed {
            message: message.clone(),
        },
        (Step::FetchProfile | Step::CreateProfile | Step::ConfirmProfile, _)
            if err.is_not_found() || matches!(err, BackendError::Provisioning(_)) =>
        {
            Diagnosis::ProfileMissing {
                message: err.to_string(),
            }
        }
        (Step::FetchOrganization, _) => Diagnosis::OrganizationUnreachable {
            message: err.to_string(),
        },
        _ => Diagnosis::Unexpected {
            step,
            message: err.to_string(),
        },
    }
}

fn fail(
    mut report: VerificationReport,
    step: Step,
    err: &BackendError,
    rest: &[Step],
) -> VerificationReport {
    report.record(StepRecord::failed(step, err));
    for s in rest {
        report.record(StepRecord::skipped(*s));
    }
    report.finish(diagnose(step, err))
}

/// Sign in, fetch (or provision) the profile, fetch its organization, then
/// compare against `expected`. Steps run one after another; the first
/// failure ends the run and the remaining steps are recorded as skipped.
pub fn run_protocol(
    api: &dyn Backend,
    credentials: &Credentials,
    expected: &Expectations,
    default_org: Option<Uuid>,
) -> VerificationReport {
    let mut report = VerificationReport::new(&credentials.email);

    // 1. sign in
    let session = match api.sign_in_with_password(&credentials.email, credentials.password.expose()) {
        Ok(session) => session,
        Err(e) => {
            report.record(StepRecord::failed(Step::SignIn, &e));
            for s in [Step::FetchProfile, Step::FetchOrganization, Step::CheckExpectations] {
                report.record(StepRecord::skipped(s));
            }
            let diagnosis = match e {
                BackendError::Auth(message) => Diagnosis::AuthenticationFailed { message },
                other => Diagnosis::Unexpected {
                    step: Step::SignIn,
                    message: other.to_string(),
                },
            };
            return report.finish(diagnosis);
        }
    };
    let user_id = session.user.id;
    report.user_id = Some(user_id);
    report.record(StepRecord::passed(Step::SignIn, format!("user {user_id}")));

    // 2. profile, provisioned when missing
    let bearer = Bearer::for_session(&session);
    let lookup = match get_or_create_profile(api, &session, default_org) {
        Ok(lookup) => lookup,
        Err(e) => {
            return fail(
                report,
                Step::FetchProfile,
                &e,
                &[Step::FetchOrganization, Step::CheckExpectations],
            )
        }
    };

    let profile = if lookup.created {
        report.record(StepRecord::not_found(
            Step::FetchProfile,
            &BackendError::NotFound {
                table: Table::Profiles,
            },
        ));
        report.record(StepRecord::passed(
            Step::CreateProfile,
            format!("provisioned {} in {}", lookup.profile.role, lookup.profile.org_id),
        ));
        report.profile_created = true;

        // the new row must be readable under the same session
        match get_profile(api, &bearer, &user_id) {
            Ok(profile) => {
                report.record(StepRecord::passed(Step::ConfirmProfile, "row visible"));
                profile
            }
            Err(e) => {
                return fail(
                    report,
                    Step::ConfirmProfile,
                    &e,
                    &[Step::FetchOrganization, Step::CheckExpectations],
                )
            }
        }
    } else {
        report.record(StepRecord::passed(
            Step::FetchProfile,
            format!("role {}", lookup.profile.role),
        ));
        lookup.profile
    };
    let org_id = profile.org_id;
    report.profile = Some(profile);

    // 3. organization by the profile's reference
    let organization = match get_organization(api, &bearer, &org_id) {
        Ok(org) => org,
        Err(e) => return fail(report, Step::FetchOrganization, &e, &[Step::CheckExpectations]),
    };
    report.record(StepRecord::passed(
        Step::FetchOrganization,
        organization.name.clone(),
    ));
    report.organization = Some(organization);

    // 4. expectations
    let mut mismatches = Vec::new();
    if let (Some(want), Some(profile)) = (expected.role, report.profile.as_ref()) {
        if profile.role != want {
            mismatches.push(format!("role is {}, expected {want}", profile.role));
        }
    }
    if let (Some(want), Some(org)) = (expected.organization.as_deref(), report.organization.as_ref()) {
        if org.name != want {
            mismatches.push(format!("organization is {:?}, expected {want:?}", org.name));
        }
    }

    if mismatches.is_empty() {
        report.record(StepRecord::passed(Step::CheckExpectations, "all expectations met"));
        report.finish(Diagnosis::Healthy)
    } else {
        report.record(StepRecord {
            step: Step::CheckExpectations,
            outcome: StepOutcome::Failed,
            code: None,
            detail: mismatches.join("; "),
        });
        report.finish(Diagnosis::ExpectationMismatch { mismatches })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::policy::{default_policies, Policy, PolicyCommand, PolicyRule};
    use serde_json::json;

    const ORG: &str = "00000000-0000-0000-0000-0000000000a1";
    const ADMIN_EMAIL: &str = "admin@alphaspine.io";
    const ADMIN_PASSWORD: &str = "alpha-spine-2025";

    fn org_id() -> Uuid {
        Uuid::parse_str(ORG).unwrap()
    }

    fn seeded(policies: Vec<Policy>) -> MemoryBackend {
        let backend = MemoryBackend::new(SecretKey::new("sb_secret_test"), policies);
        backend.seed_row(
            Table::Organizations,
            json!({"id": ORG, "name": "Alpha Spine Institute", "type": "hospital"}),
        );
        let id = backend.seed_user(ADMIN_EMAIL, ADMIN_PASSWORD, Some("Avery Admin"));
        backend.seed_row(
            Table::Profiles,
            json!({
                "id": id.to_string(),
                "email": ADMIN_EMAIL,
                "full_name": "Avery Admin",
                "role": "ORG_ADMIN",
                "org_id": ORG
            }),
        );
        backend
    }

    fn admin_expectations() -> Expectations {
        Expectations {
            role: Some(UserRole::OrgAdmin),
            organization: Some("Alpha Spine Institute".into()),
        }
    }

    /// Org-admin visibility expressed by querying `profiles` from a
    /// `profiles` policy.
    fn recursive_catalogue() -> Vec<Policy> {
        let mut policies: Vec<Policy> = default_policies()
            .into_iter()
            .filter(|p| p.name != "profiles_select_org_admin")
            .collect();
        policies.push(Policy::new(
            "profiles_select_org_admin",
            Table::Profiles,
            PolicyCommand::Select,
            PolicyRule::MembershipSubquery {
                source: Table::Profiles,
                subject_column: "id".into(),
                match_column: "org_id".into(),
                row_column: "org_id".into(),
                roles: vec![UserRole::OrgAdmin, UserRole::SysAdmin],
            },
        ));
        policies
    }

    #[test]
    fn org_admin_scenario_end_to_end() {
        let backend = seeded(default_policies());
        let report = run_protocol(
            &backend,
            &Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD),
            &admin_expectations(),
            None,
        );

        assert_eq!(report.diagnosis, Diagnosis::Healthy, "{}", report.summary);
        assert!(!report.saw_recursion());
        assert!(!report.profile_created);
        let profile = report.profile.as_ref().unwrap();
        assert_eq!(Some(profile.id), report.user_id);
        assert_eq!(profile.role, UserRole::OrgAdmin);
        assert_eq!(
            report.organization.as_ref().map(|o| o.name.as_str()),
            Some("Alpha Spine Institute")
        );
        assert!(report
            .steps
            .iter()
            .all(|s| s.outcome == StepOutcome::Passed));
    }

    #[test]
    fn recursive_policy_is_diagnosed_as_profile_setup_required() {
        let backend = seeded(recursive_catalogue());
        let report = run_protocol(
            &backend,
            &Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD),
            &admin_expectations(),
            None,
        );

        assert!(report.saw_recursion());
        assert_eq!(
            report.diagnosis,
            Diagnosis::PolicyRecursion {
                step: Step::FetchProfile
            }
        );
        assert!(report.summary.starts_with("Profile Setup Required"));
        // recursion must not be mistaken for a missing profile
        assert!(!report.profile_created);
        assert_eq!(backend.rows(Table::Profiles).len(), 1);
        assert_eq!(
            report.step(Step::FetchOrganization).map(|s| s.outcome),
            Some(StepOutcome::Skipped)
        );
    }

    #[test]
    fn missing_profile_is_provisioned_and_confirmed() {
        let backend = seeded(default_policies());
        let id = backend.seed_user("new.clinician@alphaspine.io", "pw", Some("Noor Patel"));

        let report = run_protocol(
            &backend,
            &Credentials::new("new.clinician@alphaspine.io", "pw"),
            &Expectations {
                role: Some(UserRole::Clinician),
                organization: Some("Alpha Spine Institute".into()),
            },
            Some(org_id()),
        );

        assert!(report.diagnosis.is_healthy(), "{}", report.summary);
        assert!(report.profile_created);
        assert_eq!(
            report.step(Step::FetchProfile).map(|s| s.outcome),
            Some(StepOutcome::NotFound)
        );
        assert_eq!(
            report.step(Step::ConfirmProfile).map(|s| s.outcome),
            Some(StepOutcome::Passed)
        );
        let mine: Vec<_> = backend
            .rows(Table::Profiles)
            .into_iter()
            .filter(|r| r["id"] == json!(id.to_string()))
            .collect();
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn missing_profile_without_organization() {
        let backend = seeded(default_policies());
        backend.seed_user("orphan@alphaspine.io", "pw", None);

        let report = run_protocol(
            &backend,
            &Credentials::new("orphan@alphaspine.io", "pw"),
            &Expectations::default(),
            None,
        );
        assert!(matches!(report.diagnosis, Diagnosis::ProfileMissing { .. }));
        assert!(!report.saw_recursion());
    }

    #[test]
    fn wrong_password_stops_at_sign_in() {
        let backend = seeded(default_policies());
        let report = run_protocol(
            &backend,
            &Credentials::new(ADMIN_EMAIL, "wrong"),
            &admin_expectations(),
            None,
        );

        assert!(matches!(
            report.diagnosis,
            Diagnosis::AuthenticationFailed { .. }
        ));
        assert_eq!(report.user_id, None);
        assert_eq!(
            report.step(Step::FetchProfile).map(|s| s.outcome),
            Some(StepOutcome::Skipped)
        );
        assert_eq!(backend.request_count(), 1);
    }

    #[test]
    fn role_mismatch_is_reported() {
        let backend = seeded(default_policies());
        let report = run_protocol(
            &backend,
            &Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD),
            &Expectations {
                role: Some(UserRole::SysAdmin),
                organization: None,
            },
            None,
        );

        match &report.diagnosis {
            Diagnosis::ExpectationMismatch { mismatches } => {
                assert_eq!(mismatches.len(), 1);
                assert!(mismatches[0].contains("ORG_ADMIN"));
            }
            other => panic!("unexpected diagnosis {other:?}"),
        }
    }

    #[test]
    fn dangling_organization_reference() {
        let backend = MemoryBackend::with_default_policies(SecretKey::new("sb_secret_test"));
        let id = backend.seed_user("lost@alphaspine.io", "pw", None);
        backend.seed_row(
            Table::Profiles,
            json!({"id": id.to_string(), "email": "lost@alphaspine.io", "role": "CLINICIAN", "org_id": ORG}),
        );

        let report = run_protocol(
            &backend,
            &Credentials::new("lost@alphaspine.io", "pw"),
            &Expectations::default(),
            None,
        );
        assert!(matches!(
            report.diagnosis,
            Diagnosis::OrganizationUnreachable { .. }
        ));
    }

    #[test]
    fn report_json_carries_diagnosis_and_steps() {
        let backend = seeded(recursive_catalogue());
        let report = run_protocol(
            &backend,
            &Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD),
            &Expectations::default(),
            None,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["diagnosis"]["kind"], "policy_recursion");
        assert_eq!(json["steps"][1]["code"], "42P17");
    }
}
