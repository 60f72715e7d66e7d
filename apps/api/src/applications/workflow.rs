//! Application state machine.
//!
//! ```text
//! new -> shortlisted -> interview_scheduled -> pending_acceptance -> hired
//!   \________________________________________________/ -> rejected | withdrawn
//!                       interview_scheduled -> not_attending
//! ```
//!
//! Company-side actions are open to the owning company and admins;
//! student-side actions to the applicant only. Any pairing of action and
//! status not listed here is rejected with [`WorkflowError::InvalidAction`].

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::errors::WorkflowError;
use crate::models::application::{InterviewDetails, OfferDetails};
use crate::models::enums::{ApplicationStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Shortlist,
    ScheduleInterview,
    RescheduleInterview,
    CancelInterview,
    SendOffer,
    Reject,
    MarkNoShow,
    Withdraw,
    DeclineInterview,
    AcceptOffer,
    DeclineOffer,
    RegenerateSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Company,
    Student,
}

impl AppAction {
    /// Accepts snake_case and the camelCase spelling older clients send.
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let action = match raw.trim() {
            "shortlist" => AppAction::Shortlist,
            "schedule_interview" | "scheduleInterview" => AppAction::ScheduleInterview,
            "reschedule_interview" | "rescheduleInterview" => AppAction::RescheduleInterview,
            "cancel_interview" | "cancelInterview" => AppAction::CancelInterview,
            "send_offer" | "sendOffer" => AppAction::SendOffer,
            "reject" => AppAction::Reject,
            "mark_no_show" | "markNoShow" => AppAction::MarkNoShow,
            "withdraw" => AppAction::Withdraw,
            "decline_interview" | "declineInterview" => AppAction::DeclineInterview,
            "accept_offer" | "acceptOffer" => AppAction::AcceptOffer,
            "decline_offer" | "declineOffer" => AppAction::DeclineOffer,
            "regenerate_summary" | "regeneratePdf" => AppAction::RegenerateSummary,
            _ => return Err(WorkflowError::InvalidAction),
        };
        Ok(action)
    }

    pub fn name(self) -> &'static str {
        match self {
            AppAction::Shortlist => "shortlist",
            AppAction::ScheduleInterview => "schedule_interview",
            AppAction::RescheduleInterview => "reschedule_interview",
            AppAction::CancelInterview => "cancel_interview",
            AppAction::SendOffer => "send_offer",
            AppAction::Reject => "reject",
            AppAction::MarkNoShow => "mark_no_show",
            AppAction::Withdraw => "withdraw",
            AppAction::DeclineInterview => "decline_interview",
            AppAction::AcceptOffer => "accept_offer",
            AppAction::DeclineOffer => "decline_offer",
            AppAction::RegenerateSummary => "regenerate_summary",
        }
    }

    /// `None` for actions either side may take.
    pub fn side(self) -> Option<Side> {
        match self {
            AppAction::Shortlist
            | AppAction::ScheduleInterview
            | AppAction::RescheduleInterview
            | AppAction::CancelInterview
            | AppAction::SendOffer
            | AppAction::Reject
            | AppAction::MarkNoShow => Some(Side::Company),
            AppAction::Withdraw
            | AppAction::DeclineInterview
            | AppAction::AcceptOffer
            | AppAction::DeclineOffer => Some(Side::Student),
            AppAction::RegenerateSummary => None,
        }
    }
}

fn side_of(role: Role) -> Side {
    match role {
        Role::Student => Side::Student,
        Role::Company | Role::Admin => Side::Company,
    }
}

/// Extra fields sent alongside `action`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionPayload {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub mode: Option<String>,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Rejected,
    Withdrawn,
    Accepted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub status: ApplicationStatus,
    /// Replacement interview details, when the action touches them.
    pub interview: Option<InterviewDetails>,
    pub offer: Option<OfferDetails>,
    pub stamp: Option<Stamp>,
    /// Notification kind sent to the counterparty.
    pub notice: &'static str,
    pub creates_employment: bool,
}

impl Transition {
    fn to(status: ApplicationStatus, notice: &'static str) -> Self {
        Transition {
            status,
            interview: None,
            offer: None,
            stamp: None,
            notice,
            creates_employment: false,
        }
    }

    fn stamped(mut self, stamp: Stamp) -> Self {
        self.stamp = Some(stamp);
        self
    }
}

pub fn plan_transition(
    role: Role,
    status: ApplicationStatus,
    current_interview: Option<&InterviewDetails>,
    action: AppAction,
    payload: &ActionPayload,
    now: DateTime<Utc>,
    offer_validity_days: i64,
) -> Result<Transition, WorkflowError> {
    use ApplicationStatus as S;

    if action.side().is_some_and(|side| side != side_of(role)) {
        return Err(WorkflowError::InvalidAction);
    }

    let transition = match (action, status) {
        (AppAction::Shortlist, S::New) => Transition::to(S::Shortlisted, "application_shortlisted"),
        (
            AppAction::ScheduleInterview | AppAction::RescheduleInterview,
            S::Shortlisted | S::InterviewScheduled,
        ) => Transition {
            interview: Some(InterviewDetails {
                scheduled_at: payload.scheduled_at,
                location: payload.location.clone(),
                mode: payload.mode.clone(),
                notes: payload.notes.clone(),
                outcome: None,
                updated_at: Some(now),
            }),
            ..Transition::to(S::InterviewScheduled, "interview_scheduled")
        },
        (AppAction::CancelInterview, S::InterviewScheduled) => Transition {
            interview: Some(InterviewDetails {
                scheduled_at: None,
                updated_at: Some(now),
                ..current_interview.cloned().unwrap_or_default()
            }),
            ..Transition::to(S::Shortlisted, "interview_cancelled")
        },
        (AppAction::SendOffer, S::Shortlisted | S::InterviewScheduled) => Transition {
            offer: Some(OfferDetails {
                sent_at: Some(now),
                valid_until: Some(
                    payload
                        .valid_until
                        .unwrap_or(now + Duration::days(offer_validity_days)),
                ),
                title: payload.title.clone(),
                notes: payload.notes.clone(),
            }),
            ..Transition::to(S::PendingAcceptance, "offer_sent")
        },
        (AppAction::Reject, s) if s.is_open() => {
            Transition::to(S::Rejected, "application_rejected").stamped(Stamp::Rejected)
        }
        (AppAction::MarkNoShow, S::InterviewScheduled) => {
            Transition::to(S::NotAttending, "interview_noshow")
        }
        (AppAction::Withdraw, s) if s.is_open() => {
            Transition::to(S::Withdrawn, "application_withdrawn").stamped(Stamp::Withdrawn)
        }
        (AppAction::DeclineInterview, S::InterviewScheduled) => Transition {
            interview: Some(InterviewDetails {
                outcome: Some("declined".to_string()),
                updated_at: Some(now),
                ..current_interview.cloned().unwrap_or_default()
            }),
            ..Transition::to(S::Shortlisted, "interview_declined")
        },
        (AppAction::AcceptOffer, S::PendingAcceptance) => Transition {
            creates_employment: true,
            ..Transition::to(S::Hired, "offer_accepted").stamped(Stamp::Accepted)
        },
        (AppAction::DeclineOffer, S::PendingAcceptance) => {
            Transition::to(S::Rejected, "offer_declined").stamped(Stamp::Rejected)
        }
        _ => return Err(WorkflowError::InvalidAction),
    };
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus as S;

    fn plan(role: Role, status: S, action: AppAction) -> Result<Transition, WorkflowError> {
        plan_transition(role, status, None, action, &ActionPayload::default(), Utc::now(), 7)
    }

    #[test]
    fn test_company_happy_path() {
        assert_eq!(plan(Role::Company, S::New, AppAction::Shortlist).unwrap().status, S::Shortlisted);
        let t = plan(Role::Company, S::Shortlisted, AppAction::ScheduleInterview).unwrap();
        assert_eq!(t.status, S::InterviewScheduled);
        assert!(t.interview.is_some());
        let t = plan(Role::Company, S::InterviewScheduled, AppAction::RescheduleInterview).unwrap();
        assert_eq!(t.status, S::InterviewScheduled);
        assert_eq!(
            plan(Role::Company, S::InterviewScheduled, AppAction::SendOffer).unwrap().status,
            S::PendingAcceptance
        );
    }

    #[test]
    fn test_admin_acts_for_company() {
        assert_eq!(plan(Role::Admin, S::New, AppAction::Shortlist).unwrap().status, S::Shortlisted);
        assert_eq!(
            plan(Role::Admin, S::PendingAcceptance, AppAction::AcceptOffer),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_offer_validity_default_and_override() {
        let now = Utc::now();
        let t = plan_transition(
            Role::Company,
            S::Shortlisted,
            None,
            AppAction::SendOffer,
            &ActionPayload::default(),
            now,
            7,
        )
        .unwrap();
        assert_eq!(t.offer.unwrap().valid_until, Some(now + Duration::days(7)));

        let until = now + Duration::days(2);
        let payload = ActionPayload {
            valid_until: Some(until),
            title: Some("Intern".into()),
            ..Default::default()
        };
        let t = plan_transition(Role::Company, S::Shortlisted, None, AppAction::SendOffer, &payload, now, 7)
            .unwrap();
        let offer = t.offer.unwrap();
        assert_eq!(offer.valid_until, Some(until));
        assert_eq!(offer.title.as_deref(), Some("Intern"));
    }

    #[test]
    fn test_reject_and_withdraw_from_any_open_status() {
        for status in ApplicationStatus::OPEN {
            let t = plan(Role::Company, *status, AppAction::Reject).unwrap();
            assert_eq!(t.status, S::Rejected);
            assert_eq!(t.stamp, Some(Stamp::Rejected));
            let t = plan(Role::Student, *status, AppAction::Withdraw).unwrap();
            assert_eq!(t.status, S::Withdrawn);
        }
        for closed in [S::Hired, S::Rejected, S::Withdrawn, S::NotAttending] {
            assert_eq!(plan(Role::Company, closed, AppAction::Reject), Err(WorkflowError::InvalidAction));
            assert_eq!(plan(Role::Student, closed, AppAction::Withdraw), Err(WorkflowError::InvalidAction));
        }
    }

    #[test]
    fn test_interview_cancel_and_decline_keep_details() {
        let existing = InterviewDetails {
            scheduled_at: Some(Utc::now()),
            location: Some("HQ".into()),
            ..Default::default()
        };
        let t = plan_transition(
            Role::Company,
            S::InterviewScheduled,
            Some(&existing),
            AppAction::CancelInterview,
            &ActionPayload::default(),
            Utc::now(),
            7,
        )
        .unwrap();
        assert_eq!(t.status, S::Shortlisted);
        let interview = t.interview.unwrap();
        assert_eq!(interview.scheduled_at, None);
        assert_eq!(interview.location.as_deref(), Some("HQ"));

        let t = plan_transition(
            Role::Student,
            S::InterviewScheduled,
            Some(&existing),
            AppAction::DeclineInterview,
            &ActionPayload::default(),
            Utc::now(),
            7,
        )
        .unwrap();
        assert_eq!(t.status, S::Shortlisted);
        assert_eq!(t.interview.unwrap().outcome.as_deref(), Some("declined"));
    }

    #[test]
    fn test_accept_offer_creates_employment() {
        let t = plan(Role::Student, S::PendingAcceptance, AppAction::AcceptOffer).unwrap();
        assert_eq!(t.status, S::Hired);
        assert!(t.creates_employment);
        assert_eq!(t.stamp, Some(Stamp::Accepted));

        let t = plan(Role::Student, S::PendingAcceptance, AppAction::DeclineOffer).unwrap();
        assert_eq!(t.status, S::Rejected);
        assert!(!t.creates_employment);
    }

    #[test]
    fn test_no_show() {
        assert_eq!(
            plan(Role::Company, S::InterviewScheduled, AppAction::MarkNoShow).unwrap().status,
            S::NotAttending
        );
        assert_eq!(plan(Role::Company, S::Shortlisted, AppAction::MarkNoShow), Err(WorkflowError::InvalidAction));
    }

    #[test]
    fn test_wrong_side_is_invalid() {
        assert_eq!(plan(Role::Student, S::New, AppAction::Shortlist), Err(WorkflowError::InvalidAction));
        assert_eq!(
            plan(Role::Company, S::PendingAcceptance, AppAction::AcceptOffer),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_invalid_status_pairs() {
        assert_eq!(plan(Role::Company, S::Shortlisted, AppAction::Shortlist), Err(WorkflowError::InvalidAction));
        assert_eq!(plan(Role::Company, S::New, AppAction::SendOffer), Err(WorkflowError::InvalidAction));
        assert_eq!(plan(Role::Student, S::Shortlisted, AppAction::AcceptOffer), Err(WorkflowError::InvalidAction));
    }

    #[test]
    fn test_parse_both_spellings() {
        assert_eq!(AppAction::parse("acceptOffer"), Ok(AppAction::AcceptOffer));
        assert_eq!(AppAction::parse("accept_offer"), Ok(AppAction::AcceptOffer));
        assert_eq!(AppAction::parse("regeneratePdf"), Ok(AppAction::RegenerateSummary));
        assert_eq!(AppAction::parse("hire"), Err(WorkflowError::InvalidAction));
        assert_eq!(AppAction::MarkNoShow.name(), "mark_no_show");
        assert_eq!(AppAction::RegenerateSummary.side(), None);
    }
}
