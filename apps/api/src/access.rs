//! Row scoping shared by list endpoints: students see their own rows,
//! company users see rows of the company they own, admins see everything.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::models::enums::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Student(Uuid),
    Company(Uuid),
    /// Company user that has not created a company yet.
    Nothing,
}

impl Scope {
    /// Appends ` AND <cond>` restricting `student_col` / `company_col`.
    pub fn push_filter(
        &self,
        qb: &mut QueryBuilder<'_, Postgres>,
        student_col: &str,
        company_col: &str,
    ) {
        match *self {
            Scope::All => {}
            Scope::Student(id) => {
                qb.push(format!(" AND {student_col} = ")).push_bind(id);
            }
            Scope::Company(id) => {
                qb.push(format!(" AND {company_col} = ")).push_bind(id);
            }
            Scope::Nothing => {
                qb.push(" AND FALSE");
            }
        }
    }

    pub fn allows(&self, student_id: Uuid, company_id: Uuid) -> bool {
        match *self {
            Scope::All => true,
            Scope::Student(id) => id == student_id,
            Scope::Company(id) => id == company_id,
            Scope::Nothing => false,
        }
    }
}

pub async fn company_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Option<CompanyRow>, AppError> {
    Ok(
        sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE owner_user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// The caller's own company, or 403 when they have none.
pub async fn require_own_company(pool: &PgPool, user: &AuthUser) -> Result<CompanyRow, AppError> {
    company_owned_by(pool, user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Company profile required".to_string()))
}

pub async fn company_owner_id(pool: &PgPool, company_id: Uuid) -> Result<Option<Uuid>, AppError> {
    Ok(
        sqlx::query_scalar::<_, Uuid>("SELECT owner_user_id FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn resolve_scope(pool: &PgPool, user: &AuthUser) -> Result<Scope, AppError> {
    Ok(match user.role {
        Role::Admin => Scope::All,
        Role::Student => Scope::Student(user.id),
        Role::Company => match company_owned_by(pool, user.id).await? {
            Some(company) => Scope::Company(company.id),
            None => Scope::Nothing,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_allows() {
        let student = Uuid::new_v4();
        let company = Uuid::new_v4();
        assert!(Scope::All.allows(student, company));
        assert!(Scope::Student(student).allows(student, company));
        assert!(!Scope::Student(Uuid::new_v4()).allows(student, company));
        assert!(Scope::Company(company).allows(student, company));
        assert!(!Scope::Nothing.allows(student, company));
    }

    #[test]
    fn test_scope_filter_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM applications a WHERE TRUE");
        Scope::Company(Uuid::nil()).push_filter(&mut qb, "a.user_id", "a.company_id");
        assert_eq!(
            qb.sql(),
            "SELECT * FROM applications a WHERE TRUE AND a.company_id = $1"
        );

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        Scope::Nothing.push_filter(&mut qb, "x", "y");
        assert_eq!(qb.sql(), "SELECT 1 WHERE TRUE AND FALSE");
    }
}
