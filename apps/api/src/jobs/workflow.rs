//! Job listing lifecycle: draft -> pending -> active -> closed.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::errors::{AppError, WorkflowError};
use crate::models::enums::{JobStatus, Role};
use crate::models::job_listing::JobListingRow;

pub const LISTING_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Submit,
    Close,
    RequestRenewal,
    Approve,
    Reject,
    Renew,
}

impl JobAction {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        match raw.trim() {
            "submit" | "submit_for_approval" => Ok(JobAction::Submit),
            "close" => Ok(JobAction::Close),
            "request_renewal" => Ok(JobAction::RequestRenewal),
            "approve" => Ok(JobAction::Approve),
            "reject" => Ok(JobAction::Reject),
            "renew" => Ok(JobAction::Renew),
            _ => Err(WorkflowError::InvalidAction),
        }
    }

    fn admin_only(self) -> bool {
        matches!(self, JobAction::Approve | JobAction::Reject | JobAction::Renew)
    }
}

pub fn expiry_from(publish_at: DateTime<Utc>) -> DateTime<Utc> {
    publish_at + Duration::days(LISTING_LIFETIME_DAYS)
}

/// Returns the listing as it looks after `action`. Admins may also act for
/// the owning company.
pub fn apply_action(
    current: &JobListingRow,
    role: Role,
    action: JobAction,
    now: DateTime<Utc>,
) -> Result<JobListingRow, WorkflowError> {
    if action.admin_only() && role != Role::Admin {
        return Err(WorkflowError::Forbidden("Only admins can review job listings"));
    }
    if role == Role::Student {
        return Err(WorkflowError::Forbidden("Not authorized"));
    }

    let mut next = current.clone();
    match (action, current.status) {
        (JobAction::Submit, JobStatus::Draft) => {
            next.status = JobStatus::Pending;
            next.submitted_at = Some(now);
        }
        (JobAction::Close, JobStatus::Active) => {
            next.status = JobStatus::Closed;
            next.closed_at = Some(now);
            next.renewal = false;
        }
        (JobAction::RequestRenewal, JobStatus::Active) => {
            next.renewal = true;
            next.renewal_requested_at = Some(now);
        }
        (JobAction::Approve, JobStatus::Pending) => {
            let publish_at = current.publish_at.unwrap_or(now);
            next.status = JobStatus::Active;
            next.approved_at = Some(now);
            next.publish_at = Some(publish_at);
            next.expires_at = Some(expiry_from(publish_at));
        }
        (JobAction::Reject, JobStatus::Pending) => {
            next.status = JobStatus::Draft;
        }
        (JobAction::Renew, JobStatus::Active) => {
            let base = current.expires_at.unwrap_or(now).max(now);
            next.expires_at = Some(expiry_from(base));
            next.renewal = false;
            next.renewal_requested_at = None;
            next.last_expiry_reminder_at = None;
        }
        _ => return Err(WorkflowError::InvalidAction),
    }
    next.updated_at = now;
    Ok(next)
}

/// Owners may edit content only before the listing goes live.
pub fn can_edit(status: JobStatus, role: Role) -> bool {
    role == Role::Admin || matches!(status, JobStatus::Draft | JobStatus::Pending)
}

/// Checks the salary range and date range are ordered.
pub fn validate_ranges(
    salary_min: Option<i32>,
    salary_max: Option<i32>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if let (Some(min), Some(max)) = (salary_min, salary_max) {
        if min > max {
            return Err(AppError::Validation(
                "salary_min cannot exceed salary_max".to_string(),
            ));
        }
    }
    if salary_min.is_some_and(|v| v < 0) || salary_max.is_some_and(|v| v < 0) {
        return Err(AppError::Validation("salary cannot be negative".to_string()));
    }
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AppError::Validation(
                "start_date must be before end_date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Title/body of the notification a transition sends the company owner.
pub fn transition_notice(before: JobStatus, after: JobStatus) -> Option<(&'static str, &'static str)> {
    match (before, after) {
        (JobStatus::Pending, JobStatus::Active) => Some((
            "Job approved",
            "Your job listing has been approved and is now active.",
        )),
        (JobStatus::Pending, JobStatus::Draft) => Some((
            "Job rejected",
            "Your job listing was rejected. Please review and resubmit.",
        )),
        (JobStatus::Active, JobStatus::Closed) => {
            Some(("Job closed", "Your job listing has been closed."))
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn sample_listing(status: JobStatus) -> JobListingRow {
    let now = Utc::now();
    JobListingRow {
        id: uuid::Uuid::new_v4(),
        company_id: uuid::Uuid::new_v4(),
        created_by: uuid::Uuid::new_v4(),
        title: "Backend Intern".to_string(),
        description: Some("Rust services".to_string()),
        location: Some("Kuala Lumpur".to_string()),
        salary_min: Some(1200),
        salary_max: Some(1800),
        start_date: Some(now + Duration::days(30)),
        end_date: Some(now + Duration::days(120)),
        status,
        submitted_at: None,
        approved_at: None,
        publish_at: None,
        expires_at: None,
        closed_at: None,
        renewal: false,
        renewal_requested_at: None,
        last_expiry_reminder_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_then_approve() {
        let now = Utc::now();
        let draft = sample_listing(JobStatus::Draft);
        let pending = apply_action(&draft, Role::Company, JobAction::Submit, now).unwrap();
        assert_eq!(pending.status, JobStatus::Pending);
        assert_eq!(pending.submitted_at, Some(now));

        let active = apply_action(&pending, Role::Admin, JobAction::Approve, now).unwrap();
        assert_eq!(active.status, JobStatus::Active);
        assert_eq!(active.publish_at, Some(now));
        assert_eq!(active.expires_at, Some(now + Duration::days(30)));
    }

    #[test]
    fn test_approve_keeps_scheduled_publish_date() {
        let now = Utc::now();
        let publish = now + Duration::days(5);
        let mut pending = sample_listing(JobStatus::Pending);
        pending.publish_at = Some(publish);
        let active = apply_action(&pending, Role::Admin, JobAction::Approve, now).unwrap();
        assert_eq!(active.publish_at, Some(publish));
        assert_eq!(active.expires_at, Some(publish + Duration::days(30)));
    }

    #[test]
    fn test_company_cannot_review() {
        let pending = sample_listing(JobStatus::Pending);
        assert!(matches!(
            apply_action(&pending, Role::Company, JobAction::Approve, Utc::now()),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn test_reject_returns_to_draft() {
        let pending = sample_listing(JobStatus::Pending);
        let draft = apply_action(&pending, Role::Admin, JobAction::Reject, Utc::now()).unwrap();
        assert_eq!(draft.status, JobStatus::Draft);
    }

    #[test]
    fn test_invalid_transitions() {
        let now = Utc::now();
        let cases = [
            (JobStatus::Active, JobAction::Submit),
            (JobStatus::Draft, JobAction::Close),
            (JobStatus::Pending, JobAction::RequestRenewal),
            (JobStatus::Closed, JobAction::Renew),
            (JobStatus::Active, JobAction::Approve),
        ];
        for (status, action) in cases {
            let listing = sample_listing(status);
            assert_eq!(
                apply_action(&listing, Role::Admin, action, now),
                Err(WorkflowError::InvalidAction),
                "{status} / {action:?}"
            );
        }
    }

    #[test]
    fn test_renewal_cycle() {
        let now = Utc::now();
        let mut active = sample_listing(JobStatus::Active);
        active.expires_at = Some(now + Duration::days(3));

        let requested = apply_action(&active, Role::Company, JobAction::RequestRenewal, now).unwrap();
        assert!(requested.renewal);
        assert_eq!(requested.renewal_requested_at, Some(now));

        let renewed = apply_action(&requested, Role::Admin, JobAction::Renew, now).unwrap();
        assert!(!renewed.renewal);
        assert_eq!(renewed.expires_at, Some(now + Duration::days(33)));
    }

    #[test]
    fn test_close_active() {
        let active = sample_listing(JobStatus::Active);
        let closed = apply_action(&active, Role::Company, JobAction::Close, Utc::now()).unwrap();
        assert_eq!(closed.status, JobStatus::Closed);
        assert!(closed.closed_at.is_some());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(JobAction::parse("request_renewal"), Ok(JobAction::RequestRenewal));
        assert_eq!(JobAction::parse("submit_for_approval"), Ok(JobAction::Submit));
        assert_eq!(JobAction::parse("publish"), Err(WorkflowError::InvalidAction));
    }

    #[test]
    fn test_edit_window_and_ranges() {
        assert!(can_edit(JobStatus::Draft, Role::Company));
        assert!(can_edit(JobStatus::Pending, Role::Company));
        assert!(!can_edit(JobStatus::Active, Role::Company));
        assert!(can_edit(JobStatus::Closed, Role::Admin));

        assert!(validate_ranges(Some(2000), Some(1000), None, None).is_err());
        assert!(validate_ranges(Some(-1), None, None, None).is_err());
        let now = Utc::now();
        assert!(validate_ranges(None, None, Some(now), Some(now - Duration::days(1))).is_err());
        assert!(validate_ranges(Some(1000), Some(2000), Some(now), Some(now)).is_ok());
    }

    #[test]
    fn test_transition_notices() {
        assert_eq!(
            transition_notice(JobStatus::Pending, JobStatus::Active).map(|n| n.0),
            Some("Job approved")
        );
        assert_eq!(transition_notice(JobStatus::Draft, JobStatus::Pending), None);
    }
}
