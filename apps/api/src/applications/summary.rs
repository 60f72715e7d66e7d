//! Markdown summary of an application, stored next to it in object storage.

use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::ApplicationRow;
use crate::storage::put_object;

pub fn summary_key(application_id: Uuid) -> String {
    format!("applications/{application_id}/summary.md")
}

pub fn render_summary_md(
    app: &ApplicationRow,
    applicant: &str,
    company_name: &str,
    job_title: &str,
) -> String {
    let mut md = String::from("# Application Summary\n\n");
    md.push_str(&format!("_Generated: {}_\n\n", Utc::now().to_rfc3339()));

    md.push_str(&format!("- **Application ID:** {}\n", app.id));
    md.push_str(&format!("- **Applicant:** {applicant}\n"));
    md.push_str(&format!("- **Company:** {company_name}\n"));
    md.push_str(&format!("- **Job:** {job_title}\n"));
    md.push_str(&format!("- **Submitted:** {}\n", app.submitted_at.to_rfc3339()));
    md.push_str(&format!("- **Valid until:** {}\n", app.validity_until.to_rfc3339()));

    if let Some(statement) = app.candidate_statement.as_deref().filter(|s| !s.trim().is_empty()) {
        md.push_str("\n## Candidate Statement\n\n");
        md.push_str(statement.trim());
        md.push('\n');
    }

    if let Value::Object(form) = &app.form {
        if !form.is_empty() {
            md.push_str("\n## Form Data\n\n");
            for (k, v) in form {
                let val = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                md.push_str(&format!("- {k}: {val}\n"));
            }
        }
    }

    if !app.attachments.is_empty() {
        md.push_str("\n## Attachments\n\n");
        for key in &app.attachments {
            md.push_str(&format!("- {key}\n"));
        }
    }

    md
}

/// Renders, uploads and records the summary; returns the object key.
pub async fn generate_summary(
    pool: &PgPool,
    s3: &S3Client,
    bucket: &str,
    app: &ApplicationRow,
) -> Result<String, AppError> {
    let (applicant, company_name, job_title): (String, String, String) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(NULLIF(trim(concat_ws(' ', u.first_name, u.last_name)), ''), u.email),
            c.name,
            j.title
        FROM applications a
        JOIN users u ON u.id = a.user_id
        JOIN companies c ON c.id = a.company_id
        JOIN job_listings j ON j.id = a.job_listing_id
        WHERE a.id = $1
        "#,
    )
    .bind(app.id)
    .fetch_one(pool)
    .await?;

    let md = render_summary_md(app, &applicant, &company_name, &job_title);
    let key = summary_key(app.id);
    put_object(s3, bucket, &key, md.into_bytes(), "text/markdown").await?;

    sqlx::query("UPDATE applications SET summary_key = $2, updated_at = now() WHERE id = $1")
        .bind(app.id)
        .bind(&key)
        .execute(pool)
        .await?;

    Ok(key)
}

#[cfg(test)]
pub(crate) fn sample_application(status: crate::models::enums::ApplicationStatus) -> ApplicationRow {
    let now = Utc::now();
    ApplicationRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        job_listing_id: Uuid::new_v4(),
        candidate_statement: Some("I love distributed systems.".to_string()),
        form: serde_json::json!({ "availability": "June", "years": 2 }),
        attachments: vec!["uploads/resume/u/cv.pdf".to_string()],
        summary_key: None,
        status,
        validity_until: now + chrono::Duration::days(14),
        interview: None,
        offer: None,
        submitted_at: now,
        rejected_at: None,
        withdrawn_at: None,
        accepted_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ApplicationStatus;

    #[test]
    fn test_summary_sections() {
        let app = sample_application(ApplicationStatus::New);
        let md = render_summary_md(&app, "Ada Lovelace", "Acme", "Backend Intern");
        assert!(md.starts_with("# Application Summary"));
        assert!(md.contains("- **Applicant:** Ada Lovelace"));
        assert!(md.contains("- **Company:** Acme"));
        assert!(md.contains("## Candidate Statement\n\nI love distributed systems."));
        assert!(md.contains("- availability: June"));
        assert!(md.contains("- years: 2"));
        assert!(md.contains("- uploads/resume/u/cv.pdf"));
    }

    #[test]
    fn test_empty_sections_are_skipped() {
        let mut app = sample_application(ApplicationStatus::New);
        app.candidate_statement = None;
        app.form = serde_json::json!({});
        app.attachments.clear();
        let md = render_summary_md(&app, "a", "b", "c");
        assert!(!md.contains("## Candidate Statement"));
        assert!(!md.contains("## Form Data"));
        assert!(!md.contains("## Attachments"));
    }

    #[test]
    fn test_summary_key() {
        let id = Uuid::nil();
        assert_eq!(
            summary_key(id),
            "applications/00000000-0000-0000-0000-000000000000/summary.md"
        );
    }
}
