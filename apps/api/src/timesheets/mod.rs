pub mod handlers;
pub mod workflow;

/// Timesheet columns joined with the owning employment, for scoping.
pub const SELECT_SCOPED: &str = r#"
    SELECT t.* FROM timesheets t
    JOIN employment_records e ON e.id = t.employment_id
"#;
