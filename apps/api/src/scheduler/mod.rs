//! In-process periodic workflow checks.
//!
//! Every `SCHEDULER_INTERVAL_MINUTES` one cycle runs:
//! - listing expiry reminders (at most one per 24h) and closing of expired listings
//! - auto-withdrawal of applications past their validity, offer-expiry reminders
//! - employment date progression and closure completion
//! - weekly timesheet and closure reminders
//!
//! A failing check is logged and never stops the loop.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::applications::record_event;
use crate::config::SchedulerConfig;
use crate::employment::{date_progression, outstanding_closure_tasks};
use crate::errors::AppError;
use crate::models::employment::{EmploymentDocumentRow, EmploymentRow, TimesheetRow};
use crate::models::enums::{EmploymentStatus, Role};
use crate::models::job_listing::JobListingRow;
use crate::notifications::{notify, notify_company, NewNotification};

const BATCH: i64 = 200;
const EXPIRY_NOTICE_DAYS: i64 = 7;
const EXPIRY_REMINDER_GAP_HOURS: i64 = 24;
const OFFER_NOTICE_HOURS: i64 = 24;
const WEEKLY_REMINDER_DAYS: i64 = 7;
const STARTUP_DELAY_SECS: u64 = 15;

/// Open applications past their validity move to `withdrawn`.
const AUTO_WITHDRAW_SQL: &str = r#"
    UPDATE applications SET status = 'withdrawn', withdrawn_at = $1, updated_at = now()
    WHERE id IN (
        SELECT id FROM applications
        WHERE status IN ('new', 'shortlisted', 'interview_scheduled', 'pending_acceptance')
          AND validity_until <= $1
        LIMIT $2
    )
    RETURNING id, user_id, company_id
"#;

/// Pending offers whose `valid_until` falls inside `[$1, $2]` with no
/// reminder in the last `$3` hours.
const OFFER_EXPIRY_SQL: &str = r#"
    SELECT a.id, a.user_id, a.offer->>'valid_until'
    FROM applications a
    WHERE a.status = 'pending_acceptance'
      AND (a.offer->>'valid_until')::timestamptz BETWEEN $1 AND $2
      AND NOT EXISTS (
          SELECT 1 FROM notifications n
          WHERE n.kind = 'offer_expiring'
            AND n.data->>'application_id' = a.id::text
            AND n.created_at > $1 - make_interval(hours => $3)
      )
    LIMIT $4
"#;

/// Candidates for [`date_progression`].
const EMPLOYMENT_DUE_SQL: &str = r#"
    SELECT * FROM employment_records
    WHERE (status = 'upcoming' AND start_date <= $1)
       OR (status = 'ongoing' AND end_date <= $1)
    LIMIT $2
"#;

/// Keyset page of employments in closure, after id `$1`.
const IN_CLOSURE_SQL: &str = r#"
    SELECT * FROM employment_records
    WHERE status = 'closure' AND id > $1
    ORDER BY id ASC
    LIMIT $2
"#;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub expiry_reminders: usize,
    pub listings_closed: usize,
    pub applications_withdrawn: usize,
    pub offer_reminders: usize,
    pub employments_advanced: usize,
    pub employments_completed: usize,
    pub timesheet_reminders: usize,
    pub closure_reminders: usize,
}

/// Bounds of the offer-expiry reminder window starting at `now`.
pub fn offer_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now, now + Duration::hours(OFFER_NOTICE_HOURS))
}

/// Whether an expiring listing is due another reminder.
pub fn expiry_reminder_due(last_reminder: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_reminder.map_or(true, |at| at < now - Duration::hours(EXPIRY_REMINDER_GAP_HOURS))
}

pub struct Scheduler {
    db: PgPool,
}

impl Scheduler {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Runs every check once.
    pub async fn run_cycle(&self) -> CycleStats {
        let now = Utc::now();
        let mut stats = CycleStats::default();

        match self.job_expiry_check(now).await {
            Ok((reminded, closed)) => {
                stats.expiry_reminders = reminded;
                stats.listings_closed = closed;
            }
            Err(e) => tracing::warn!(error = %e, "Job expiry check failed"),
        }
        match self.application_checks(now).await {
            Ok((withdrawn, offers)) => {
                stats.applications_withdrawn = withdrawn;
                stats.offer_reminders = offers;
            }
            Err(e) => tracing::warn!(error = %e, "Application checks failed"),
        }
        match self.employment_checks(now).await {
            Ok((advanced, completed)) => {
                stats.employments_advanced = advanced;
                stats.employments_completed = completed;
            }
            Err(e) => tracing::warn!(error = %e, "Employment checks failed"),
        }
        match self.timesheet_reminders().await {
            Ok(sent) => stats.timesheet_reminders = sent,
            Err(e) => tracing::warn!(error = %e, "Timesheet reminders failed"),
        }
        match self.closure_reminders().await {
            Ok(sent) => stats.closure_reminders = sent,
            Err(e) => tracing::warn!(error = %e, "Closure reminders failed"),
        }

        tracing::info!(?stats, "Scheduler cycle completed");
        stats
    }

    async fn job_expiry_check(&self, now: DateTime<Utc>) -> Result<(usize, usize), AppError> {
        let expiring = sqlx::query_as::<_, JobListingRow>(
            r#"
            SELECT * FROM job_listings
            WHERE status = 'active' AND expires_at > $1 AND expires_at <= $2
            ORDER BY expires_at ASC
            LIMIT $3
            "#,
        )
        .bind(now)
        .bind(now + Duration::days(EXPIRY_NOTICE_DAYS))
        .bind(BATCH)
        .fetch_all(&self.db)
        .await?;

        let mut reminded = 0;
        for job in expiring
            .iter()
            .filter(|j| expiry_reminder_due(j.last_expiry_reminder_at, now))
        {
            let expires = job.expires_at.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
            notify_company(
                &self.db,
                job.company_id,
                NewNotification::new(job.created_by, Role::Company, "job_expiring", "Job listing expiring soon")
                    .body(format!(
                        "Your job \"{}\" expires on {expires}. Consider renewing to keep it active.",
                        job.title
                    ))
                    .data(json!({ "job_listing_id": job.id, "expires_at": job.expires_at })),
            )
            .await;
            sqlx::query("UPDATE job_listings SET last_expiry_reminder_at = $2 WHERE id = $1")
                .bind(job.id)
                .bind(now)
                .execute(&self.db)
                .await?;
            reminded += 1;
        }

        let closed = sqlx::query(
            r#"
            UPDATE job_listings SET status = 'closed', closed_at = $1, updated_at = now()
            WHERE status = 'active' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.db)
        .await?
        .rows_affected() as usize;

        Ok((reminded, closed))
    }

    async fn application_checks(&self, now: DateTime<Utc>) -> Result<(usize, usize), AppError> {
        let expired = sqlx::query_as::<_, (Uuid, Uuid, Uuid)>(AUTO_WITHDRAW_SQL)
            .bind(now)
            .bind(BATCH)
            .fetch_all(&self.db)
            .await?;

        for (id, student_id, company_id) in &expired {
            record_event(&self.db, *id, None, "system", "auto_withdraw", json!({})).await?;
            let data = json!({ "application_id": id });
            notify_company(
                &self.db,
                *company_id,
                NewNotification::new(*student_id, Role::Company, "application_withdrawn", "Application withdrawn (expired)")
                    .data(data.clone()),
            )
            .await;
            notify(
                &self.db,
                NewNotification::new(*student_id, Role::Student, "application_withdrawn", "Your application expired")
                    .data(data),
            )
            .await;
        }

        let (window_start, window_end) = offer_window(now);
        let offers = sqlx::query_as::<_, (Uuid, Uuid, String)>(OFFER_EXPIRY_SQL)
            .bind(window_start)
            .bind(window_end)
            .bind(OFFER_NOTICE_HOURS as i32)
            .bind(BATCH)
            .fetch_all(&self.db)
            .await?;

        for (id, student_id, valid_until) in &offers {
            notify(
                &self.db,
                NewNotification::new(*student_id, Role::Student, "offer_expiring", "Offer expiring soon")
                    .data(json!({ "application_id": id, "valid_until": valid_until })),
            )
            .await;
        }

        Ok((expired.len(), offers.len()))
    }

    async fn employment_checks(&self, now: DateTime<Utc>) -> Result<(usize, usize), AppError> {
        let due = sqlx::query_as::<_, EmploymentRow>(EMPLOYMENT_DUE_SQL)
            .bind(now)
            .bind(BATCH)
            .fetch_all(&self.db)
            .await?;

        let mut advanced = 0;
        for emp in &due {
            if let Some(next) = date_progression(emp.status, emp.start_date, emp.end_date, now) {
                set_employment_status(&self.db, emp.id, next).await?;
                tracing::info!(employment = %emp.id, from = %emp.status, to = %next, "Employment advanced");
                advanced += 1;
            }
        }

        let mut completed = 0;
        for emp in self.in_closure().await? {
            let (documents, timesheets) = closure_inputs(&self.db, emp.id).await?;
            if outstanding_closure_tasks(&emp, &documents, &timesheets).is_empty() {
                set_employment_status(&self.db, emp.id, EmploymentStatus::Completed).await?;
                tracing::info!(employment = %emp.id, "Employment completed");
                completed += 1;
            }
        }

        Ok((advanced, completed))
    }

    /// Every employment in closure, read in id-ordered batches.
    async fn in_closure(&self) -> Result<Vec<EmploymentRow>, AppError> {
        let mut rows = Vec::new();
        let mut after = Uuid::nil();
        loop {
            let batch = sqlx::query_as::<_, EmploymentRow>(IN_CLOSURE_SQL)
                .bind(after)
                .bind(BATCH)
                .fetch_all(&self.db)
                .await?;
            let Some(last) = batch.last() else { break };
            after = last.id;
            let full = batch.len() as i64 == BATCH;
            rows.extend(batch);
            if !full {
                break;
            }
        }
        Ok(rows)
    }

    async fn timesheet_reminders(&self) -> Result<usize, AppError> {
        let ongoing = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT e.id, e.user_id FROM employment_records e
            WHERE e.status = 'ongoing'
              AND NOT EXISTS (
                  SELECT 1 FROM notifications n
                  WHERE n.recipient_user_id = e.user_id
                    AND n.kind = 'timesheet_reminder'
                    AND n.data->>'employment_id' = e.id::text
                    AND n.created_at > now() - make_interval(days => $1)
              )
            LIMIT $2
            "#,
        )
        .bind(WEEKLY_REMINDER_DAYS as i32)
        .bind(BATCH)
        .fetch_all(&self.db)
        .await?;

        for (employment_id, student_id) in &ongoing {
            notify(
                &self.db,
                NewNotification::new(*student_id, Role::Student, "timesheet_reminder", "Weekly timesheet reminder")
                    .body("Please submit your timesheet for this week.")
                    .data(json!({ "employment_id": employment_id })),
            )
            .await;
        }
        Ok(ongoing.len())
    }

    async fn closure_reminders(&self) -> Result<usize, AppError> {
        let mut sent = 0;
        for emp in self.in_closure().await? {
            let (documents, timesheets) = closure_inputs(&self.db, emp.id).await?;
            let tasks = outstanding_closure_tasks(&emp, &documents, &timesheets);
            if tasks.is_empty() {
                continue;
            }

            let recent: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM notifications
                    WHERE kind = 'closure_reminder'
                      AND data->>'employment_id' = $1::text
                      AND created_at > now() - make_interval(days => $2)
                )
                "#,
            )
            .bind(emp.id)
            .bind(WEEKLY_REMINDER_DAYS as i32)
            .fetch_one(&self.db)
            .await?;
            if recent {
                continue;
            }

            notify_company(
                &self.db,
                emp.company_id,
                NewNotification::new(emp.user_id, Role::Company, "closure_reminder", "Employment closure reminder")
                    .body(format!("Pending closure tasks: {}.", tasks.join(", ")))
                    .data(json!({ "employment_id": emp.id, "tasks": tasks })),
            )
            .await;
            sent += 1;
        }
        Ok(sent)
    }
}

async fn set_employment_status(pool: &PgPool, id: Uuid, status: EmploymentStatus) -> Result<(), AppError> {
    sqlx::query("UPDATE employment_records SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

async fn closure_inputs(
    pool: &PgPool,
    employment_id: Uuid,
) -> Result<(Vec<EmploymentDocumentRow>, Vec<TimesheetRow>), AppError> {
    let documents = sqlx::query_as::<_, EmploymentDocumentRow>(
        "SELECT * FROM employment_documents WHERE employment_id = $1",
    )
    .bind(employment_id)
    .fetch_all(pool)
    .await?;
    let timesheets = sqlx::query_as::<_, TimesheetRow>("SELECT * FROM timesheets WHERE employment_id = $1")
        .bind(employment_id)
        .fetch_all(pool)
        .await?;
    Ok((documents, timesheets))
}

/// Starts the background loop unless disabled.
pub fn spawn_scheduler(db: PgPool, config: &SchedulerConfig) {
    if !config.enabled {
        tracing::info!("Workflow scheduler is disabled");
        return;
    }

    let period = std::time::Duration::from_secs(config.interval_minutes * 60);
    tracing::info!(interval_minutes = config.interval_minutes, "Starting workflow scheduler");

    let scheduler = Scheduler::new(db);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(STARTUP_DELAY_SECS)).await;

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            scheduler.run_cycle().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ApplicationStatus, StatusLabel};

    #[test]
    fn test_first_expiry_reminder_is_due() {
        assert!(expiry_reminder_due(None, Utc::now()));
    }

    #[test]
    fn test_expiry_reminder_once_per_day() {
        let now = Utc::now();
        assert!(!expiry_reminder_due(Some(now - Duration::hours(3)), now));
        assert!(expiry_reminder_due(Some(now - Duration::hours(25)), now));
    }

    fn quoted(label: &str) -> String {
        format!("'{label}'")
    }

    #[test]
    fn test_auto_withdraw_targets_open_statuses() {
        let start = AUTO_WITHDRAW_SQL.find("status IN (").unwrap();
        let end = start + AUTO_WITHDRAW_SQL[start..].find(')').unwrap();
        let selected = &AUTO_WITHDRAW_SQL[start..end];
        for status in ApplicationStatus::ALL {
            assert_eq!(
                selected.contains(&quoted(status.label())),
                status.is_open(),
                "{status}"
            );
        }
        assert!(AUTO_WITHDRAW_SQL.contains("validity_until <= $1"));
    }

    #[test]
    fn test_offer_window_spans_one_day() {
        let now = Utc::now();
        let (start, end) = offer_window(now);
        assert_eq!(start, now);
        assert_eq!(end - start, Duration::hours(24));
        assert!(OFFER_EXPIRY_SQL.contains("a.status = 'pending_acceptance'"));
        assert!(OFFER_EXPIRY_SQL.contains("BETWEEN $1 AND $2"));
    }

    #[test]
    fn test_due_query_matches_date_progression() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        for status in EmploymentStatus::ALL {
            let progresses = date_progression(*status, past, past, now).is_some();
            let selected = EMPLOYMENT_DUE_SQL.contains(&format!("status = {}", quoted(status.label())));
            assert_eq!(selected, progresses, "{status}");
        }
    }

    #[test]
    fn test_closure_scan_is_ordered() {
        assert!(IN_CLOSURE_SQL.contains("status = 'closure'"));
        assert!(IN_CLOSURE_SQL.contains("ORDER BY id ASC"));
    }
}
