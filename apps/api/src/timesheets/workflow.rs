//! Timesheet review cycle: draft -> submitted -> approved | rejected.
//! A rejected sheet can be edited and submitted again.

use chrono::{DateTime, Utc};

use crate::errors::{AppError, WorkflowError};
use crate::models::employment::TimesheetItem;
use crate::models::enums::{Role, TimesheetStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimesheetAction {
    Submit,
    WithdrawSubmission,
    Approve,
    Reject,
}

impl TimesheetAction {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        match raw.trim() {
            "submit" => Ok(TimesheetAction::Submit),
            "withdraw_submission" | "withdrawSubmission" => Ok(TimesheetAction::WithdrawSubmission),
            "approve" => Ok(TimesheetAction::Approve),
            "reject" => Ok(TimesheetAction::Reject),
            _ => Err(WorkflowError::InvalidAction),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimesheetAction::Submit => "submit",
            TimesheetAction::WithdrawSubmission => "withdraw_submission",
            TimesheetAction::Approve => "approve",
            TimesheetAction::Reject => "reject",
        }
    }

    fn by_student(self) -> bool {
        matches!(self, TimesheetAction::Submit | TimesheetAction::WithdrawSubmission)
    }
}

pub fn total_hours(items: &[TimesheetItem]) -> f64 {
    items.iter().map(|i| i.hours).sum()
}

pub fn validate_items(items: &[TimesheetItem]) -> Result<(), AppError> {
    if items.iter().any(|i| !i.hours.is_finite() || i.hours < 0.0) {
        return Err(AppError::Validation(
            "Timesheet hours must be non-negative numbers".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_period(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::Validation(
            "period_end must not be before period_start".to_string(),
        ));
    }
    Ok(())
}

pub fn can_edit(status: TimesheetStatus) -> bool {
    matches!(status, TimesheetStatus::Draft | TimesheetStatus::Rejected)
}

/// Status after `action`. The caller has already been checked against the
/// employment; here only the side of the action matters.
pub fn next_status(
    current: TimesheetStatus,
    role: Role,
    action: TimesheetAction,
) -> Result<TimesheetStatus, WorkflowError> {
    use TimesheetStatus as S;

    match (action.by_student(), role) {
        (true, Role::Student) | (false, Role::Company | Role::Admin) => {}
        (true, _) => return Err(WorkflowError::Forbidden("Only the student can submit timesheets")),
        (false, _) => {
            return Err(WorkflowError::Forbidden(
                "Only the company or an admin can review timesheets",
            ))
        }
    }

    match (action, current) {
        (TimesheetAction::Submit, S::Draft | S::Rejected) => Ok(S::Submitted),
        (TimesheetAction::WithdrawSubmission, S::Submitted) => Ok(S::Draft),
        (TimesheetAction::Approve, S::Submitted) => Ok(S::Approved),
        (TimesheetAction::Reject, S::Submitted) => Ok(S::Rejected),
        _ => Err(WorkflowError::InvalidAction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(hours: f64) -> TimesheetItem {
        TimesheetItem {
            date: None,
            hours,
            note: None,
        }
    }

    #[test]
    fn test_total_hours() {
        assert_eq!(total_hours(&[item(8.0), item(7.5), item(0.0)]), 15.5);
        assert_eq!(total_hours(&[]), 0.0);
    }

    #[test]
    fn test_negative_hours_rejected() {
        assert!(validate_items(&[item(4.0)]).is_ok());
        assert!(validate_items(&[item(-1.0)]).is_err());
        assert!(validate_items(&[item(f64::NAN)]).is_err());
    }

    #[test]
    fn test_student_cycle() {
        use TimesheetStatus as S;
        assert_eq!(next_status(S::Draft, Role::Student, TimesheetAction::Submit), Ok(S::Submitted));
        assert_eq!(next_status(S::Rejected, Role::Student, TimesheetAction::Submit), Ok(S::Submitted));
        assert_eq!(
            next_status(S::Submitted, Role::Student, TimesheetAction::WithdrawSubmission),
            Ok(S::Draft)
        );
        assert_eq!(
            next_status(S::Approved, Role::Student, TimesheetAction::Submit),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_review_requires_submission() {
        use TimesheetStatus as S;
        assert_eq!(next_status(S::Submitted, Role::Company, TimesheetAction::Approve), Ok(S::Approved));
        assert_eq!(next_status(S::Submitted, Role::Admin, TimesheetAction::Reject), Ok(S::Rejected));
        assert_eq!(
            next_status(S::Draft, Role::Company, TimesheetAction::Approve),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_wrong_side_is_forbidden() {
        use TimesheetStatus as S;
        assert!(matches!(
            next_status(S::Submitted, Role::Student, TimesheetAction::Approve),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            next_status(S::Draft, Role::Company, TimesheetAction::Submit),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn test_editable_statuses() {
        assert!(can_edit(TimesheetStatus::Draft));
        assert!(can_edit(TimesheetStatus::Rejected));
        assert!(!can_edit(TimesheetStatus::Submitted));
        assert!(!can_edit(TimesheetStatus::Approved));
    }
}
