//! Status and role enumerations shared by rows, workflows and dashboards.
//!
//! Each enum maps onto a native Postgres enum type declared in the initial
//! migration and serializes to the same snake_case label over JSON.

use serde::{Deserialize, Serialize};

/// Enumerations whose every variant is reported by the dashboards,
/// including those with zero rows.
pub trait StatusLabel: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $pg:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[sqlx(type_name = $pg, rename_all = "snake_case")]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl StatusLabel for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> sqlx::postgres::PgTypeInfo {
                sqlx::postgres::PgTypeInfo::with_name(concat!("_", $pg))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

status_enum! {
    Role, "user_role" {
        Student => "student",
        Company => "company",
        Admin => "admin",
    }
}

status_enum! {
    PrivacySetting, "privacy_setting" {
        Full => "full",
        Restricted => "restricted",
        Private => "private",
    }
}

status_enum! {
    /// Company verification (KYC) state, shared by companies and submissions.
    VerificationStatus, "verification_status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

status_enum! {
    JobStatus, "job_status" {
        Draft => "draft",
        Pending => "pending",
        Active => "active",
        Closed => "closed",
    }
}

status_enum! {
    ApplicationStatus, "application_status" {
        New => "new",
        Shortlisted => "shortlisted",
        InterviewScheduled => "interview_scheduled",
        PendingAcceptance => "pending_acceptance",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
        NotAttending => "not_attending",
    }
}

status_enum! {
    EmploymentStatus, "employment_status" {
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Closure => "closure",
        Completed => "completed",
        Terminated => "terminated",
    }
}

status_enum! {
    TimesheetStatus, "timesheet_status" {
        Draft => "draft",
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
    }
}

status_enum! {
    RequestKind, "request_kind" {
        Resignation => "resignation",
        Termination => "termination",
        EarlyCompletion => "early_completion",
        Extension => "extension",
    }
}

status_enum! {
    RequestStatus, "request_status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

status_enum! {
    InviteStatus, "invite_status" {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
        Cancelled => "cancelled",
    }
}

impl ApplicationStatus {
    /// Statuses from which the application can still move forward.
    pub const OPEN: &'static [ApplicationStatus] = &[
        ApplicationStatus::New,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::PendingAcceptance,
    ];

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_match_serde_names() {
        for status in ApplicationStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.label()));
        }
        assert_eq!(RequestKind::EarlyCompletion.to_string(), "early_completion");
    }

    #[test]
    fn test_open_application_statuses() {
        assert!(ApplicationStatus::New.is_open());
        assert!(ApplicationStatus::PendingAcceptance.is_open());
        assert!(!ApplicationStatus::Hired.is_open());
        assert!(!ApplicationStatus::Withdrawn.is_open());
    }

    #[test]
    fn test_all_lists_every_variant() {
        assert_eq!(EmploymentStatus::ALL.len(), 5);
        assert_eq!(TimesheetStatus::ALL.len(), 4);
        assert_eq!(Role::ALL.len(), 3);
    }
}
