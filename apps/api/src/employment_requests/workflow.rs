//! Who may raise and decide resignation, termination, early-completion and
//! extension requests, and what an approval does to the employment.

use chrono::{DateTime, Utc};

use crate::errors::{AppError, WorkflowError};
use crate::models::employment::EmploymentRequestRow;
use crate::models::enums::{EmploymentStatus, RequestKind, RequestStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Cancel,
    Approve,
    Reject,
}

impl RequestAction {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        match raw.trim() {
            "cancel" => Ok(RequestAction::Cancel),
            "approve" => Ok(RequestAction::Approve),
            "reject" => Ok(RequestAction::Reject),
            _ => Err(WorkflowError::InvalidAction),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestAction::Cancel => "cancel",
            RequestAction::Approve => "approve",
            RequestAction::Reject => "reject",
        }
    }
}

/// Whether the student raises this kind of request (otherwise the company does).
pub fn raised_by_student(kind: RequestKind) -> bool {
    matches!(kind, RequestKind::Resignation | RequestKind::EarlyCompletion)
}

pub fn check_initiator(kind: RequestKind, role: Role) -> Result<(), WorkflowError> {
    match (raised_by_student(kind), role) {
        (true, Role::Student) | (false, Role::Company | Role::Admin) => Ok(()),
        (true, _) => Err(WorkflowError::Forbidden(
            "Only the student can request resignation or early completion",
        )),
        (false, _) => Err(WorkflowError::Forbidden(
            "Only the company can request termination or extension",
        )),
    }
}

/// Roles that approve or reject `kind`, after employment scoping.
pub fn deciders(kind: RequestKind) -> &'static [Role] {
    match kind {
        RequestKind::Resignation | RequestKind::EarlyCompletion => &[Role::Company, Role::Admin],
        RequestKind::Termination => &[Role::Admin],
        RequestKind::Extension => &[Role::Student, Role::Admin],
    }
}

/// An extension must propose a date after the current end date.
pub fn validate_proposal(
    kind: RequestKind,
    proposed_date: Option<DateTime<Utc>>,
    current_end: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if kind != RequestKind::Extension {
        return Ok(());
    }
    match (proposed_date, current_end) {
        (None, _) => Err(AppError::Validation(
            "proposed_date is required for an extension".to_string(),
        )),
        (Some(proposed), Some(end)) if proposed <= end => Err(AppError::Validation(
            "proposed_date must be after the current end date".to_string(),
        )),
        _ => Ok(()),
    }
}

pub fn decide(
    request: &EmploymentRequestRow,
    actor_id: uuid::Uuid,
    role: Role,
    action: RequestAction,
) -> Result<RequestStatus, WorkflowError> {
    if request.status != RequestStatus::Pending {
        return Err(WorkflowError::InvalidAction);
    }
    match action {
        RequestAction::Cancel if request.initiator_id == actor_id => Ok(RequestStatus::Cancelled),
        RequestAction::Cancel => Err(WorkflowError::Forbidden("Only the initiator can cancel")),
        _ if !deciders(request.kind).contains(&role) => {
            Err(WorkflowError::Forbidden("Not allowed to decide this request"))
        }
        RequestAction::Approve => Ok(RequestStatus::Approved),
        RequestAction::Reject => Ok(RequestStatus::Rejected),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmploymentChange {
    pub status: Option<EmploymentStatus>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Employment update applied when a request is approved.
pub fn approval_effect(
    kind: RequestKind,
    current: EmploymentStatus,
    proposed_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EmploymentChange {
    match kind {
        RequestKind::Resignation | RequestKind::Termination => EmploymentChange {
            status: Some(EmploymentStatus::Terminated),
            end_date: Some(proposed_date.unwrap_or(now)),
        },
        RequestKind::EarlyCompletion => EmploymentChange {
            status: Some(EmploymentStatus::Closure),
            end_date: Some(proposed_date.unwrap_or(now)),
        },
        RequestKind::Extension => EmploymentChange {
            status: (current == EmploymentStatus::Closure).then_some(EmploymentStatus::Ongoing),
            end_date: proposed_date,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn request(kind: RequestKind, initiated_by: Role) -> EmploymentRequestRow {
        let now = Utc::now();
        EmploymentRequestRow {
            id: Uuid::new_v4(),
            employment_id: Uuid::new_v4(),
            kind,
            initiated_by,
            initiator_id: Uuid::new_v4(),
            reason: Some("moving abroad".to_string()),
            proposed_date: None,
            status: RequestStatus::Pending,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_initiator_rules() {
        assert!(check_initiator(RequestKind::Resignation, Role::Student).is_ok());
        assert!(check_initiator(RequestKind::EarlyCompletion, Role::Student).is_ok());
        assert!(check_initiator(RequestKind::Termination, Role::Company).is_ok());
        assert!(check_initiator(RequestKind::Extension, Role::Admin).is_ok());
        assert!(check_initiator(RequestKind::Resignation, Role::Company).is_err());
        assert!(check_initiator(RequestKind::Termination, Role::Student).is_err());
    }

    #[test]
    fn test_extension_needs_later_date() {
        let end = Utc::now();
        assert!(validate_proposal(RequestKind::Extension, None, Some(end)).is_err());
        assert!(validate_proposal(RequestKind::Extension, Some(end), Some(end)).is_err());
        assert!(validate_proposal(RequestKind::Extension, Some(end + Duration::days(30)), Some(end)).is_ok());
        assert!(validate_proposal(RequestKind::Resignation, None, Some(end)).is_ok());
    }

    #[test]
    fn test_only_initiator_cancels() {
        let req = request(RequestKind::Resignation, Role::Student);
        assert_eq!(
            decide(&req, req.initiator_id, Role::Student, RequestAction::Cancel),
            Ok(RequestStatus::Cancelled)
        );
        assert!(matches!(
            decide(&req, Uuid::new_v4(), Role::Company, RequestAction::Cancel),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn test_deciders_per_kind() {
        let resignation = request(RequestKind::Resignation, Role::Student);
        let actor = Uuid::new_v4();
        assert_eq!(
            decide(&resignation, actor, Role::Company, RequestAction::Approve),
            Ok(RequestStatus::Approved)
        );
        assert!(decide(&resignation, actor, Role::Student, RequestAction::Approve).is_err());

        let termination = request(RequestKind::Termination, Role::Company);
        assert!(decide(&termination, actor, Role::Company, RequestAction::Approve).is_err());
        assert_eq!(
            decide(&termination, actor, Role::Admin, RequestAction::Reject),
            Ok(RequestStatus::Rejected)
        );

        let extension = request(RequestKind::Extension, Role::Company);
        assert_eq!(
            decide(&extension, actor, Role::Student, RequestAction::Approve),
            Ok(RequestStatus::Approved)
        );
        assert!(decide(&extension, actor, Role::Company, RequestAction::Approve).is_err());
    }

    #[test]
    fn test_decided_request_is_final() {
        let mut req = request(RequestKind::EarlyCompletion, Role::Student);
        req.status = RequestStatus::Approved;
        assert_eq!(
            decide(&req, Uuid::new_v4(), Role::Admin, RequestAction::Reject),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_approval_effects() {
        let now = Utc::now();
        let later = now + Duration::days(14);

        let resign = approval_effect(RequestKind::Resignation, EmploymentStatus::Ongoing, None, now);
        assert_eq!(resign.status, Some(EmploymentStatus::Terminated));
        assert_eq!(resign.end_date, Some(now));

        let early = approval_effect(RequestKind::EarlyCompletion, EmploymentStatus::Ongoing, Some(later), now);
        assert_eq!(early.status, Some(EmploymentStatus::Closure));
        assert_eq!(early.end_date, Some(later));

        let reopen = approval_effect(RequestKind::Extension, EmploymentStatus::Closure, Some(later), now);
        assert_eq!(reopen.status, Some(EmploymentStatus::Ongoing));
        assert_eq!(reopen.end_date, Some(later));

        let extend = approval_effect(RequestKind::Extension, EmploymentStatus::Ongoing, Some(later), now);
        assert_eq!(extend.status, None);
    }
}
