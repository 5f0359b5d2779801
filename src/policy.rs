//! Row-level access policy catalogue.
//!
//! A policy grants a command on a table when its rule holds for a row.
//! Several policies on the same table and command are permissive: any one
//! granting is enough, and no policy at all means deny.
//!
//! Rules come in four shapes:
//! 1. `IdentityEquals`: `auth.uid() = <column>`
//! 2. `OrgClaimEquals`: the session's org claim equals `<column>`
//! 3. `RoleClaim`: the session's role claim is in a set
//! 4. `MembershipSubquery`: `EXISTS (SELECT 1 FROM <source> ...)`
//!
//! Only shape 4 reads another table. A policy that reads its own table (or a
//! cycle of tables reading each other) recurses without bound; the backend
//! rejects it at query time with code 42P17. `validate_policies` rejects it
//! before it is ever applied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{column_text, AppMetadata, BackendError, Table};
use crate::models::UserRole;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCommand {
    Select,
    Insert,
    Update,
    All,
}

impl PolicyCommand {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::All => "ALL",
        }
    }

    /// Does a policy declared for `self` apply to a request of `requested`?
    pub fn covers(&self, requested: PolicyCommand) -> bool {
        *self == PolicyCommand::All || *self == requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRule {
    IdentityEquals {
        column: String,
    },
    /// Empty `roles` means any role.
    OrgClaimEquals {
        column: String,
        roles: Vec<UserRole>,
    },
    RoleClaim {
        roles: Vec<UserRole>,
    },
    /// `EXISTS (SELECT 1 FROM source s WHERE s.subject_column = auth.uid()
    /// AND s.match_column = row.row_column [AND s.role IN roles])`
    MembershipSubquery {
        source: Table,
        subject_column: String,
        match_column: String,
        row_column: String,
        roles: Vec<UserRole>,
    },
}

impl PolicyRule {
    /// Table this rule reads while being evaluated, if any.
    pub fn reads_table(&self) -> Option<Table> {
        match self {
            Self::MembershipSubquery { source, .. } => Some(*source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub table: Table,
    pub command: PolicyCommand,
    pub rule: PolicyRule,
}

impl Policy {
    pub fn new(name: &str, table: Table, command: PolicyCommand, rule: PolicyRule) -> Self {
        Self {
            name: name.to_string(),
            table,
            command,
            rule,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Policy {policy} on {table} queries {table} to authorize access to {table}")]
    SelfReferential { policy: String, table: Table },

    #[error("Policies form a cycle: {}", format_cycle(.tables))]
    Cycle { tables: Vec<Table> },
}

fn format_cycle(tables: &[Table]) -> String {
    tables
        .iter()
        .map(Table::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The identity a user-scoped request runs as.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: Uuid,
    pub claims: AppMetadata,
}

// ═══════════════════════════════════════════════════════════
// Catalogue
// ═══════════════════════════════════════════════════════════

fn identity(column: &str) -> PolicyRule {
    PolicyRule::IdentityEquals {
        column: column.to_string(),
    }
}

fn admin_roles() -> Vec<UserRole> {
    vec![UserRole::OrgAdmin, UserRole::SysAdmin]
}

/// The application's policy set. No profile policy reads any table.
pub fn default_policies() -> Vec<Policy> {
    use PolicyCommand::*;

    vec![
        // profiles: own row by identity, org admins by session claim
        Policy::new("profiles_select_own", Table::Profiles, Select, identity("id")),
        Policy::new("profiles_insert_own", Table::Profiles, Insert, identity("id")),
        Policy::new("profiles_update_own", Table::Profiles, Update, identity("id")),
        Policy::new(
            "profiles_select_org_admin",
            Table::Profiles,
            Select,
            PolicyRule::OrgClaimEquals {
                column: "org_id".into(),
                roles: admin_roles(),
            },
        ),
        Policy::new(
            "profiles_select_sys_admin",
            Table::Profiles,
            Select,
            PolicyRule::RoleClaim {
                roles: vec![UserRole::SysAdmin],
            },
        ),
        // organizations: members, through their own profile row
        Policy::new(
            "organizations_select_member",
            Table::Organizations,
            Select,
            PolicyRule::MembershipSubquery {
                source: Table::Profiles,
                subject_column: "id".into(),
                match_column: "org_id".into(),
                row_column: "id".into(),
                roles: Vec::new(),
            },
        ),
        Policy::new(
            "organizations_select_sys_admin",
            Table::Organizations,
            Select,
            PolicyRule::RoleClaim {
                roles: vec![UserRole::SysAdmin],
            },
        ),
        // cases
        Policy::new("cases_select_submitter", Table::Cases, Select, identity("submitter_id")),
        Policy::new("cases_insert_submitter", Table::Cases, Insert, identity("submitter_id")),
        Policy::new("cases_update_submitter", Table::Cases, Update, identity("submitter_id")),
        Policy::new(
            "cases_select_org_admin",
            Table::Cases,
            Select,
            PolicyRule::OrgClaimEquals {
                column: "org_id".into(),
                roles: admin_roles(),
            },
        ),
        // reviews
        Policy::new("reviews_select_reviewer", Table::Reviews, Select, identity("reviewer_id")),
        Policy::new("reviews_update_reviewer", Table::Reviews, Update, identity("reviewer_id")),
        Policy::new(
            "reviews_select_case_submitter",
            Table::Reviews,
            Select,
            PolicyRule::MembershipSubquery {
                source: Table::Cases,
                subject_column: "submitter_id".into(),
                match_column: "id".into(),
                row_column: "case_id".into(),
                roles: Vec::new(),
            },
        ),
        // notifications
        Policy::new(
            "notifications_select_recipient",
            Table::Notifications,
            Select,
            identity("recipient_id"),
        ),
        Policy::new(
            "notifications_update_recipient",
            Table::Notifications,
            Update,
            identity("recipient_id"),
        ),
    ]
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

/// Reject self-referential policies and cycles between tables.
pub fn validate_policies(policies: &[Policy]) -> Result<(), PolicyError> {
    for policy in policies {
        if policy.rule.reads_table() == Some(policy.table) {
            return Err(PolicyError::SelfReferential {
                policy: policy.name.clone(),
                table: policy.table,
            });
        }
    }

    let mut edges: BTreeMap<Table, BTreeSet<Table>> = BTreeMap::new();
    for policy in policies {
        if let Some(source) = policy.rule.reads_table() {
            edges.entry(policy.table).or_default().insert(source);
        }
    }

    let mut done = BTreeSet::new();
    for start in edges.keys() {
        let mut path = Vec::new();
        if let Some(cycle) = find_cycle(*start, &edges, &mut path, &mut done) {
            return Err(PolicyError::Cycle { tables: cycle });
        }
    }
    Ok(())
}

fn find_cycle(
    table: Table,
    edges: &BTreeMap<Table, BTreeSet<Table>>,
    path: &mut Vec<Table>,
    done: &mut BTreeSet<Table>,
) -> Option<Vec<Table>> {
    if let Some(pos) = path.iter().position(|t| *t == table) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(table);
        return Some(cycle);
    }
    if done.contains(&table) {
        return None;
    }
    path.push(table);
    if let Some(next) = edges.get(&table) {
        for source in next {
            if let Some(cycle) = find_cycle(*source, edges, path, done) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    done.insert(table);
    None
}

// ═══════════════════════════════════════════════════════════
// SQL rendering
// ═══════════════════════════════════════════════════════════

const CLAIM_ORG: &str = "(auth.jwt() -> 'app_metadata' ->> 'org_id')::uuid";
const CLAIM_ROLE: &str = "(auth.jwt() -> 'app_metadata' ->> 'role')";

fn role_list(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(|r| format!("'{}'", r.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn rule_sql(table: Table, rule: &PolicyRule) -> String {
    match rule {
        PolicyRule::IdentityEquals { column } => format!("auth.uid() = {column}"),
        PolicyRule::OrgClaimEquals { column, roles } if roles.is_empty() => {
            format!("{CLAIM_ORG} = {column}")
        }
        PolicyRule::OrgClaimEquals { column, roles } => format!(
            "{CLAIM_ORG} = {column} AND {CLAIM_ROLE} IN ({})",
            role_list(roles)
        ),
        PolicyRule::RoleClaim { roles } => format!("{CLAIM_ROLE} IN ({})", role_list(roles)),
        PolicyRule::MembershipSubquery {
            source,
            subject_column,
            match_column,
            row_column,
            roles,
        } => {
            let mut sql = format!(
                "EXISTS (SELECT 1 FROM public.{source} s WHERE s.{subject_column} = auth.uid() \
                 AND s.{match_column} = {table}.{row_column}"
            );
            if !roles.is_empty() {
                let _ = write!(sql, " AND s.role IN ({})", role_list(roles));
            }
            sql.push(')');
            sql
        }
    }
}

/// `CREATE POLICY` statement for one policy.
pub fn render_sql(policy: &Policy) -> String {
    let predicate = rule_sql(policy.table, &policy.rule);
    let clauses = match policy.command {
        PolicyCommand::Select => format!("USING ({predicate})"),
        PolicyCommand::Insert => format!("WITH CHECK ({predicate})"),
        PolicyCommand::Update | PolicyCommand::All => {
            format!("USING ({predicate}) WITH CHECK ({predicate})")
        }
    };
    format!(
        "CREATE POLICY \"{}\" ON public.{} FOR {} TO authenticated {};",
        policy.name,
        policy.table,
        policy.command.as_sql(),
        clauses
    )
}

/// Full script: enable row-level security on every table, then each policy.
pub fn render_script(policies: &[Policy]) -> String {
    let mut out = String::new();
    for table in Table::ALL {
        let _ = writeln!(out, "ALTER TABLE public.{table} ENABLE ROW LEVEL SECURITY;");
    }
    for policy in policies {
        let _ = writeln!(out, "{}", render_sql(policy));
    }
    for table in Table::ALL {
        if let Some(sql) = render_column_guard(*table) {
            out.push_str(&sql);
        }
    }
    out.push_str(&render_access_token_hook());
    out
}

// ═══════════════════════════════════════════════════════════
// Column guards
// ═══════════════════════════════════════════════════════════

/// What an end-user insert may put in a protected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertValue {
    Any,
    Text(&'static str),
    Bool(bool),
}

impl InsertValue {
    /// An absent column takes the schema default, which is always allowed.
    fn accepts(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Self::Any, _) | (_, None) => true,
            (Self::Text(expected), Some(v)) => v.as_str() == Some(*expected),
            (Self::Bool(expected), Some(v)) => v.as_bool() == Some(*expected),
        }
    }

    fn as_sql(&self) -> Option<String> {
        match self {
            Self::Any => None,
            Self::Text(text) => Some(format!("'{text}'")),
            Self::Bool(b) => Some(b.to_string()),
        }
    }
}

/// A column end users may not change on rows their policies otherwise let
/// them write. Only the service role sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedColumn {
    pub table: Table,
    pub column: &'static str,
    pub on_insert: InsertValue,
}

pub const PROTECTED_COLUMNS: &[ProtectedColumn] = &[
    ProtectedColumn {
        table: Table::Profiles,
        column: "role",
        on_insert: InsertValue::Text("CLINICIAN"),
    },
    ProtectedColumn {
        table: Table::Profiles,
        column: "is_expert_certified",
        on_insert: InsertValue::Bool(false),
    },
    ProtectedColumn {
        table: Table::Profiles,
        column: "org_id",
        on_insert: InsertValue::Any,
    },
];

pub fn protected_columns(table: Table) -> impl Iterator<Item = &'static ProtectedColumn> {
    PROTECTED_COLUMNS.iter().filter(move |c| c.table == table)
}

/// Reject an end-user write that sets a protected column.
///
/// `old` is the stored row for updates and `None` for inserts. An update may
/// repeat a protected value unchanged; it may not alter it.
pub fn check_protected_columns(
    table: Table,
    old: Option<&Value>,
    new: &Value,
) -> Result<(), BackendError> {
    for guard in protected_columns(table) {
        let incoming = new.get(guard.column);
        let allowed = match old {
            Some(old) => incoming.is_none() || incoming == old.get(guard.column),
            None => guard.on_insert.accepts(incoming),
        };
        if !allowed {
            return Err(BackendError::protected_column(table, guard.column));
        }
    }
    Ok(())
}

/// Trigger raising 42501 when an authenticated user changes a protected
/// column. Returns `None` for tables without protected columns.
pub fn render_column_guard(table: Table) -> Option<String> {
    let guards: Vec<&ProtectedColumn> = protected_columns(table).collect();
    if guards.is_empty() {
        return None;
    }
    let changed = guards
        .iter()
        .map(|g| format!("NEW.{c} IS DISTINCT FROM OLD.{c}", c = g.column))
        .collect::<Vec<_>>()
        .join(" OR ");
    let inserted = guards
        .iter()
        .filter_map(|g| {
            g.on_insert
                .as_sql()
                .map(|v| format!("NEW.{} IS DISTINCT FROM {v}", g.column))
        })
        .collect::<Vec<_>>()
        .join(" OR ");

    let function = format!("public.{table}_guard_columns");
    let mut out = String::new();
    let _ = writeln!(out, "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger");
    let _ = writeln!(out, "LANGUAGE plpgsql AS $$");
    let _ = writeln!(out, "BEGIN");
    let _ = writeln!(out, "  IF auth.role() = 'authenticated' THEN");
    let _ = writeln!(out, "    IF TG_OP = 'UPDATE' AND ({changed}) THEN");
    let _ = writeln!(
        out,
        "      RAISE EXCEPTION 'protected column on {table}' USING ERRCODE = '42501';"
    );
    let _ = writeln!(out, "    END IF;");
    if !inserted.is_empty() {
        let _ = writeln!(out, "    IF TG_OP = 'INSERT' AND ({inserted}) THEN");
        let _ = writeln!(
            out,
            "      RAISE EXCEPTION 'protected column on {table}' USING ERRCODE = '42501';"
        );
        let _ = writeln!(out, "    END IF;");
    }
    let _ = writeln!(out, "  END IF;");
    let _ = writeln!(out, "  RETURN NEW;");
    let _ = writeln!(out, "END $$;");
    let _ = writeln!(out, "DROP TRIGGER IF EXISTS {table}_guard_columns ON public.{table};");
    let _ = writeln!(
        out,
        "CREATE TRIGGER {table}_guard_columns BEFORE INSERT OR UPDATE ON public.{table} \
         FOR EACH ROW EXECUTE FUNCTION {function}();"
    );
    Some(out)
}

// ═══════════════════════════════════════════════════════════
// Session claims
// ═══════════════════════════════════════════════════════════

/// Name of the auth hook that copies `role` and `org_id` from the caller's
/// profile into `app_metadata` each time an access token is issued.
pub const ACCESS_TOKEN_HOOK: &str = "public.custom_access_token_hook";

/// The hook reads profiles as its owner, so it runs past row policies and
/// cannot recurse through them. A role change reaches the claims on the next
/// token issue.
pub fn render_access_token_hook() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "CREATE OR REPLACE FUNCTION {ACCESS_TOKEN_HOOK}(event jsonb) RETURNS jsonb"
    );
    let _ = writeln!(out, "LANGUAGE plpgsql STABLE SECURITY DEFINER SET search_path = public AS $$");
    let _ = writeln!(out, "DECLARE");
    let _ = writeln!(out, "  claims jsonb := event -> 'claims';");
    let _ = writeln!(out, "  profile record;");
    let _ = writeln!(out, "BEGIN");
    let _ = writeln!(
        out,
        "  SELECT p.role, p.org_id INTO profile FROM public.profiles p WHERE p.id = (event ->> 'user_id')::uuid;"
    );
    let _ = writeln!(out, "  IF FOUND THEN");
    let _ = writeln!(
        out,
        "    claims := jsonb_set(claims, '{{app_metadata}}', coalesce(claims -> 'app_metadata', '{{}}'::jsonb)"
    );
    let _ = writeln!(
        out,
        "      || jsonb_build_object('role', profile.role, 'org_id', profile.org_id));"
    );
    let _ = writeln!(out, "  END IF;");
    let _ = writeln!(out, "  RETURN jsonb_set(event, '{{claims}}', claims);");
    let _ = writeln!(out, "END $$;");
    let _ = writeln!(out, "GRANT USAGE ON SCHEMA public TO supabase_auth_admin;");
    let _ = writeln!(
        out,
        "GRANT EXECUTE ON FUNCTION {ACCESS_TOKEN_HOOK}(jsonb) TO supabase_auth_admin;"
    );
    let _ = writeln!(
        out,
        "REVOKE EXECUTE ON FUNCTION {ACCESS_TOKEN_HOOK}(jsonb) FROM authenticated, anon, public;"
    );
    out
}

// ═══════════════════════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════════════════════

/// Row storage the evaluator may read for membership subqueries.
pub trait RowSource {
    fn rows(&self, table: Table) -> &[Value];
}

/// Evaluates a policy set against rows, the way the backend's policy layer does.
pub struct PolicyEngine<'a> {
    policies: &'a [Policy],
}

impl<'a> PolicyEngine<'a> {
    pub fn new(policies: &'a [Policy]) -> Self {
        Self { policies }
    }

    fn applicable(&self, table: Table, command: PolicyCommand) -> impl Iterator<Item = &Policy> {
        self.policies
            .iter()
            .filter(move |p| p.table == table && p.command.covers(command))
    }

    /// Expand the policies a request on `table` would pull in, failing with
    /// 42P17 when expansion re-enters a relation already being expanded.
    ///
    /// Runs before any row is read, so a recursive definition fails even on
    /// an empty table.
    pub fn check_expansion(&self, table: Table, command: PolicyCommand) -> Result<(), BackendError> {
        let mut stack = Vec::new();
        self.expand(table, command, &mut stack)
    }

    fn expand(
        &self,
        table: Table,
        command: PolicyCommand,
        stack: &mut Vec<Table>,
    ) -> Result<(), BackendError> {
        if stack.contains(&table) {
            return Err(BackendError::policy_recursion(table));
        }
        stack.push(table);
        let sources: Vec<Table> = self
            .applicable(table, command)
            .filter_map(|p| p.rule.reads_table())
            .collect();
        for source in sources {
            self.expand(source, PolicyCommand::Select, stack)?;
        }
        stack.pop();
        Ok(())
    }

    /// Does any policy grant `command` on `row` to `who`?
    ///
    /// Callers run `check_expansion` first; evaluation itself assumes an
    /// acyclic policy graph.
    pub fn permits(
        &self,
        source: &dyn RowSource,
        who: &Requester,
        table: Table,
        command: PolicyCommand,
        row: &Value,
    ) -> bool {
        self.applicable(table, command)
            .any(|p| self.rule_holds(source, who, table, &p.rule, row))
    }

    fn rule_holds(
        &self,
        source: &dyn RowSource,
        who: &Requester,
        table: Table,
        rule: &PolicyRule,
        row: &Value,
    ) -> bool {
        let uid = who.user_id.to_string();
        match rule {
            PolicyRule::IdentityEquals { column } => {
                column_text(row, column).as_deref() == Some(uid.as_str())
            }
            PolicyRule::OrgClaimEquals { column, roles } => {
                let org_matches = match (who.claims.org_id, column_text(row, column)) {
                    (Some(org), Some(value)) => org.to_string() == value,
                    _ => false,
                };
                org_matches && role_allowed(who.claims.role, roles)
            }
            PolicyRule::RoleClaim { roles } => {
                who.claims.role.is_some_and(|r| roles.contains(&r))
            }
            PolicyRule::MembershipSubquery {
                source: src_table,
                subject_column,
                match_column,
                row_column,
                roles,
            } => {
                debug_assert_ne!(*src_table, table);
                let Some(wanted) = column_text(row, row_column) else {
                    return false;
                };
                source.rows(*src_table).iter().any(|s| {
                    column_text(s, subject_column).as_deref() == Some(uid.as_str())
                        && column_text(s, match_column).as_deref() == Some(wanted.as_str())
                        && (roles.is_empty()
                            || column_text(s, "role")
                                .and_then(|r| r.parse::<UserRole>().ok())
                                .is_some_and(|r| roles.contains(&r)))
                        && self.permits(source, who, *src_table, PolicyCommand::Select, s)
                })
            }
        }
    }
}

fn role_allowed(role: Option<UserRole>, roles: &[UserRole]) -> bool {
    roles.is_empty() || role.is_some_and(|r| roles.contains(&r))
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
