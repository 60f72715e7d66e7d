//! Saved jobs, liked jobs and liked companies. Adding is idempotent.

pub mod handlers;

/// The two per-user job bookmark tables share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMark {
    Saved,
    Liked,
}

impl JobMark {
    pub fn table(self) -> &'static str {
        match self {
            JobMark::Saved => "saved_jobs",
            JobMark::Liked => "liked_jobs",
        }
    }

    pub fn upsert_sql(self) -> String {
        format!(
            "INSERT INTO {table} (user_id, job_listing_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, job_listing_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING *",
            table = self.table()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_targets_table() {
        assert!(JobMark::Saved.upsert_sql().starts_with("INSERT INTO saved_jobs "));
        assert!(JobMark::Liked.upsert_sql().contains("ON CONFLICT (user_id, job_listing_id)"));
    }
}
