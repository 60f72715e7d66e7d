pub mod handlers;

use crate::errors::WorkflowError;
use crate::models::enums::InviteStatus;

/// How the caller relates to an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Invitee,
    InvitingCompany,
    Other,
}

/// The invitee answers a pending invite; the inviting company may withdraw it.
pub fn respond(
    current: InviteStatus,
    party: Party,
    requested: InviteStatus,
) -> Result<InviteStatus, WorkflowError> {
    let allowed = match requested {
        InviteStatus::Accepted | InviteStatus::Declined => party == Party::Invitee,
        InviteStatus::Cancelled => party == Party::InvitingCompany,
        InviteStatus::Pending => return Err(WorkflowError::InvalidAction),
    };
    if !allowed {
        return Err(WorkflowError::Forbidden("Not allowed to respond to this invite"));
    }
    if current != InviteStatus::Pending {
        return Err(WorkflowError::InvalidAction);
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitee_answers_pending_invite() {
        assert_eq!(
            respond(InviteStatus::Pending, Party::Invitee, InviteStatus::Accepted),
            Ok(InviteStatus::Accepted)
        );
        assert_eq!(
            respond(InviteStatus::Pending, Party::Invitee, InviteStatus::Declined),
            Ok(InviteStatus::Declined)
        );
        assert!(matches!(
            respond(InviteStatus::Pending, Party::Invitee, InviteStatus::Cancelled),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn test_company_can_only_cancel() {
        assert_eq!(
            respond(InviteStatus::Pending, Party::InvitingCompany, InviteStatus::Cancelled),
            Ok(InviteStatus::Cancelled)
        );
        assert!(matches!(
            respond(InviteStatus::Pending, Party::InvitingCompany, InviteStatus::Accepted),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(respond(InviteStatus::Pending, Party::Other, InviteStatus::Cancelled).is_err());
    }

    #[test]
    fn test_answered_invite_is_final() {
        assert_eq!(
            respond(InviteStatus::Declined, Party::Invitee, InviteStatus::Accepted),
            Err(WorkflowError::InvalidAction)
        );
        assert_eq!(
            respond(InviteStatus::Pending, Party::Invitee, InviteStatus::Pending),
            Err(WorkflowError::InvalidAction)
        );
    }
}
