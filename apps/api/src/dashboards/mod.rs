//! Status counts for the per-role dashboards and the admin monitoring views.
//! Every status label is reported, with 0 when no row has it.

pub mod handlers;

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::access::Scope;
use crate::errors::AppError;
use crate::models::enums::{RequestKind, StatusLabel};

pub type Counts = BTreeMap<&'static str, i64>;

/// Days ahead an active listing counts as expiring.
pub const EXPIRING_WINDOW_DAYS: i64 = 7;
pub const RECENT_LISTINGS: i64 = 10;

pub fn zero_filled<S: StatusLabel>(rows: &[(S, i64)]) -> Counts {
    let mut counts: Counts = S::ALL.iter().map(|s| (s.label(), 0)).collect();
    for (status, n) in rows {
        *counts.entry(status.label()).or_insert(0) += n;
    }
    counts
}

pub fn total(counts: &Counts) -> i64 {
    counts.values().sum()
}

/// A table grouped by one status column and scoped to a student or company.
pub struct CountSource {
    pub from: &'static str,
    pub group_col: &'static str,
    pub student_col: &'static str,
    pub company_col: &'static str,
    pub condition: &'static str,
}

pub const APPLICATIONS: CountSource = CountSource {
    from: "applications",
    group_col: "status",
    student_col: "user_id",
    company_col: "company_id",
    condition: "",
};

pub const EMPLOYMENTS: CountSource = CountSource {
    from: "employment_records",
    group_col: "status",
    student_col: "user_id",
    company_col: "company_id",
    condition: "",
};

pub const TIMESHEETS: CountSource = CountSource {
    from: "timesheets t JOIN employment_records e ON e.id = t.employment_id",
    group_col: "t.status",
    student_col: "e.user_id",
    company_col: "e.company_id",
    condition: "",
};

pub const PENDING_REQUESTS: CountSource = CountSource {
    from: "employment_requests r JOIN employment_records e ON e.id = r.employment_id",
    group_col: "r.kind",
    student_col: "e.user_id",
    company_col: "e.company_id",
    condition: " AND r.status = 'pending'",
};

impl CountSource {
    pub fn query(&self, scope: Scope) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {col}, COUNT(*) FROM {from} WHERE TRUE{cond}",
            col = self.group_col,
            from = self.from,
            cond = self.condition,
        ));
        scope.push_filter(&mut qb, self.student_col, self.company_col);
        qb.push(format!(" GROUP BY {}", self.group_col));
        qb
    }

    pub async fn counts<S>(&self, pool: &PgPool, scope: Scope) -> Result<Counts, AppError>
    where
        S: StatusLabel + Send + Unpin,
        (S, i64): for<'r> FromRow<'r, PgRow>,
    {
        let rows: Vec<(S, i64)> = self.query(scope).build_query_as().fetch_all(pool).await?;
        Ok(zero_filled(&rows))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingDecisions {
    pub extensions: i64,
    pub terminations: i64,
    pub resignations: i64,
    pub early_completions: i64,
}

impl PendingDecisions {
    pub fn from_counts(by_kind: &Counts) -> Self {
        let get = |kind: RequestKind| by_kind.get(kind.label()).copied().unwrap_or(0);
        PendingDecisions {
            extensions: get(RequestKind::Extension),
            terminations: get(RequestKind::Termination),
            resignations: get(RequestKind::Resignation),
            early_completions: get(RequestKind::EarlyCompletion),
        }
    }
}

/// Admin monitoring list selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringList {
    PendingJobs,
    PendingCompanies,
    RenewalRequests,
    ExpiringJobs,
}

impl MonitoringList {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending_jobs" | "pendingJobs" => Some(MonitoringList::PendingJobs),
            "pending_companies" | "pendingCompanies" => Some(MonitoringList::PendingCompanies),
            "renewal_requests" | "renewalRequests" => Some(MonitoringList::RenewalRequests),
            "expiring_jobs" | "expiringJobs" => Some(MonitoringList::ExpiringJobs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ApplicationStatus, TimesheetStatus};
    use uuid::Uuid;

    #[test]
    fn test_zero_filled_reports_every_status() {
        let counts = zero_filled(&[(ApplicationStatus::New, 3), (ApplicationStatus::Hired, 1)]);
        assert_eq!(counts.len(), ApplicationStatus::ALL.len());
        assert_eq!(counts["new"], 3);
        assert_eq!(counts["hired"], 1);
        assert_eq!(counts["withdrawn"], 0);
        assert_eq!(total(&counts), 4);
    }

    #[test]
    fn test_zero_filled_empty() {
        let counts = zero_filled::<TimesheetStatus>(&[]);
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|n| *n == 0));
    }

    #[test]
    fn test_pending_decisions_from_kind_counts() {
        let counts = zero_filled(&[(RequestKind::Extension, 2), (RequestKind::EarlyCompletion, 1)]);
        assert_eq!(
            PendingDecisions::from_counts(&counts),
            PendingDecisions {
                extensions: 2,
                terminations: 0,
                resignations: 0,
                early_completions: 1,
            }
        );
    }

    #[test]
    fn test_count_query_is_scoped() {
        let sql = TIMESHEETS.query(Scope::Company(Uuid::nil())).sql().to_string();
        assert_eq!(
            sql,
            "SELECT t.status, COUNT(*) FROM timesheets t JOIN employment_records e ON e.id = t.employment_id \
             WHERE TRUE AND e.company_id = $1 GROUP BY t.status"
        );
        let sql = PENDING_REQUESTS.query(Scope::All).sql().to_string();
        assert!(sql.contains("WHERE TRUE AND r.status = 'pending' GROUP BY r.kind"));
    }

    #[test]
    fn test_monitoring_list_parse() {
        assert_eq!(MonitoringList::parse("pending_jobs"), Some(MonitoringList::PendingJobs));
        assert_eq!(MonitoringList::parse("renewalRequests"), Some(MonitoringList::RenewalRequests));
        assert_eq!(MonitoringList::parse("everything"), None);
    }
}
