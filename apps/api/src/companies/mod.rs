pub mod handlers;
pub mod verifications;

use crate::errors::WorkflowError;
use crate::models::enums::VerificationStatus;

/// Company row plus its active-listing stats, one row per company.
pub const SELECT_WITH_STATS: &str = r#"
    SELECT c.*,
        (SELECT COUNT(*) FROM job_listings j
          WHERE j.company_id = c.id AND j.status = 'active') AS active_listing_count,
        COALESCE((SELECT array_agg(t.title) FROM (
            SELECT j.title FROM job_listings j
            WHERE j.company_id = c.id AND j.status = 'active'
            ORDER BY j.created_at DESC LIMIT 3) t), '{}'::text[]) AS top_listing_titles
    FROM companies c
"#;

/// Outcome of an admin decision on a verification submission.
pub fn decide_verification(
    current: VerificationStatus,
    action: &str,
) -> Result<VerificationStatus, WorkflowError> {
    let next = match action {
        "approve" => VerificationStatus::Approved,
        "reject" => VerificationStatus::Rejected,
        _ => return Err(WorkflowError::InvalidAction),
    };
    if current != VerificationStatus::Pending {
        return Err(WorkflowError::InvalidAction);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_submission_can_be_decided() {
        assert_eq!(
            decide_verification(VerificationStatus::Pending, "approve"),
            Ok(VerificationStatus::Approved)
        );
        assert_eq!(
            decide_verification(VerificationStatus::Pending, "reject"),
            Ok(VerificationStatus::Rejected)
        );
    }

    #[test]
    fn test_decided_submission_is_final() {
        assert_eq!(
            decide_verification(VerificationStatus::Approved, "reject"),
            Err(WorkflowError::InvalidAction)
        );
        assert_eq!(
            decide_verification(VerificationStatus::Rejected, "approve"),
            Err(WorkflowError::InvalidAction)
        );
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            decide_verification(VerificationStatus::Pending, "escalate"),
            Err(WorkflowError::InvalidAction)
        );
    }
}
