pub mod handlers;
pub mod workflow;

pub const SELECT_ITEM: &str = r#"
    SELECT j.*, c.name AS company_name
    FROM job_listings j
    JOIN companies c ON c.id = j.company_id
"#;
