//! Employment records created when a student accepts an offer, and the
//! date-driven lifecycle the scheduler applies to them:
//!
//! ```text
//! upcoming -> ongoing -> closure -> completed
//!        \________\________\-----> terminated
//! ```

pub mod handlers;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::resolve_scope;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::application::ApplicationRow;
use crate::models::employment::{EmploymentDocumentRow, EmploymentRow, TimesheetRow};
use crate::models::enums::{EmploymentStatus, TimesheetStatus};

pub const REQUIRED_DOCS: &[&str] = &["contract", "nda"];
pub const DEFAULT_CADENCE: &str = "weekly";

pub async fn create_from_application(
    pool: &PgPool,
    app: &ApplicationRow,
) -> Result<EmploymentRow, AppError> {
    let dates = sqlx::query_as::<_, (Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
        "SELECT start_date, end_date FROM job_listings WHERE id = $1",
    )
    .bind(app.job_listing_id)
    .fetch_optional(pool)
    .await?
    .unwrap_or((None, None));

    let required: Vec<String> = REQUIRED_DOCS.iter().map(|d| d.to_string()).collect();
    Ok(sqlx::query_as::<_, EmploymentRow>(
        r#"
        INSERT INTO employment_records
            (user_id, company_id, job_listing_id, application_id, status,
             start_date, end_date, cadence, required_docs)
        VALUES ($1, $2, $3, $4, 'upcoming', $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(app.user_id)
    .bind(app.company_id)
    .bind(app.job_listing_id)
    .bind(app.id)
    .bind(dates.0)
    .bind(dates.1)
    .bind(DEFAULT_CADENCE)
    .bind(&required)
    .fetch_one(pool)
    .await?)
}

pub async fn load_employment(pool: &PgPool, id: Uuid) -> Result<EmploymentRow, AppError> {
    sqlx::query_as::<_, EmploymentRow>("SELECT * FROM employment_records WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Employment"))
}

/// Loads the employment and checks the caller is its student, its
/// company's owner, or an admin.
pub async fn load_scoped_employment(
    pool: &PgPool,
    user: &AuthUser,
    id: Uuid,
) -> Result<EmploymentRow, AppError> {
    let employment = load_employment(pool, id).await?;
    let scope = resolve_scope(pool, user).await?;
    if !scope.allows(employment.user_id, employment.company_id) {
        return Err(AppError::forbidden());
    }
    Ok(employment)
}

/// Next status reached purely by the passing of start and end dates.
pub fn date_progression(
    status: EmploymentStatus,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<EmploymentStatus> {
    match status {
        EmploymentStatus::Upcoming if start_date.is_some_and(|d| d <= now) => {
            Some(EmploymentStatus::Ongoing)
        }
        EmploymentStatus::Ongoing if end_date.is_some_and(|d| d <= now) => {
            Some(EmploymentStatus::Closure)
        }
        _ => None,
    }
}

/// What still blocks a closure from completing: unverified required
/// documents and unapproved timesheets ending on or before the end date.
pub fn outstanding_closure_tasks(
    employment: &EmploymentRow,
    documents: &[EmploymentDocumentRow],
    timesheets: &[TimesheetRow],
) -> Vec<String> {
    let mut tasks: Vec<String> = employment
        .required_docs
        .iter()
        .filter(|required| {
            !documents
                .iter()
                .any(|d| d.verified && &d.doc_type == *required)
        })
        .map(|doc| format!("verify {doc}"))
        .collect();

    let unapproved = timesheets
        .iter()
        .filter(|t| employment.end_date.map_or(true, |end| t.period_end <= end))
        .filter(|t| t.status != TimesheetStatus::Approved)
        .count();
    if unapproved > 0 {
        tasks.push(format!("approve {unapproved} timesheet(s)"));
    }
    tasks
}

#[cfg(test)]
pub(crate) fn sample_employment(status: EmploymentStatus) -> EmploymentRow {
    let now = Utc::now();
    EmploymentRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        job_listing_id: Some(Uuid::new_v4()),
        application_id: Some(Uuid::new_v4()),
        status,
        start_date: Some(now - chrono::Duration::days(60)),
        end_date: Some(now),
        cadence: DEFAULT_CADENCE.to_string(),
        required_docs: REQUIRED_DOCS.iter().map(|d| d.to_string()).collect(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::types::Json;

    fn document(employment_id: Uuid, doc_type: &str, verified: bool) -> EmploymentDocumentRow {
        EmploymentDocumentRow {
            id: Uuid::new_v4(),
            employment_id,
            doc_type: doc_type.to_string(),
            file_key: format!("uploads/document/x/{doc_type}.pdf"),
            verified,
            verified_by: None,
            verified_at: None,
            uploaded_at: Utc::now(),
        }
    }

    fn timesheet(employment_id: Uuid, period_end: DateTime<Utc>, status: TimesheetStatus) -> TimesheetRow {
        TimesheetRow {
            id: Uuid::new_v4(),
            employment_id,
            period_start: period_end - Duration::days(7),
            period_end,
            cadence: DEFAULT_CADENCE.to_string(),
            items: Json(vec![]),
            total_hours: 0.0,
            status,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            feedback: None,
            created_at: period_end,
            updated_at: period_end,
        }
    }

    #[test]
    fn test_date_progression() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        let future = Some(now + Duration::days(1));
        assert_eq!(
            date_progression(EmploymentStatus::Upcoming, past, future, now),
            Some(EmploymentStatus::Ongoing)
        );
        assert_eq!(date_progression(EmploymentStatus::Upcoming, future, future, now), None);
        assert_eq!(date_progression(EmploymentStatus::Upcoming, None, None, now), None);
        assert_eq!(
            date_progression(EmploymentStatus::Ongoing, past, past, now),
            Some(EmploymentStatus::Closure)
        );
        assert_eq!(date_progression(EmploymentStatus::Closure, past, past, now), None);
    }

    #[test]
    fn test_closure_complete_when_everything_verified() {
        let emp = sample_employment(EmploymentStatus::Closure);
        let docs = vec![document(emp.id, "contract", true), document(emp.id, "nda", true)];
        let end = emp.end_date.unwrap();
        let sheets = vec![timesheet(emp.id, end, TimesheetStatus::Approved)];
        assert!(outstanding_closure_tasks(&emp, &docs, &sheets).is_empty());
    }

    #[test]
    fn test_closure_blocked_by_documents_and_timesheets() {
        let emp = sample_employment(EmploymentStatus::Closure);
        let docs = vec![document(emp.id, "contract", true), document(emp.id, "nda", false)];
        let end = emp.end_date.unwrap();
        let sheets = vec![
            timesheet(emp.id, end - Duration::days(7), TimesheetStatus::Submitted),
            timesheet(emp.id, end + Duration::days(7), TimesheetStatus::Draft),
        ];
        let tasks = outstanding_closure_tasks(&emp, &docs, &sheets);
        assert_eq!(tasks, vec!["verify nda", "approve 1 timesheet(s)"]);
    }
}
