//! In-app notifications. Every workflow calls [`notify`] after its write;
//! inserts are best-effort and never fail the request.

pub mod handlers;

use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::enums::Role;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: Uuid,
    pub role: Role,
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl NewNotification {
    pub fn new(recipient: Uuid, role: Role, kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            recipient,
            role,
            kind,
            title: title.into(),
            body: String::new(),
            data: Value::Object(Default::default()),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

pub async fn notify(pool: &PgPool, n: NewNotification) {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (recipient_user_id, recipient_role, kind, title, body, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(n.recipient)
    .bind(n.role)
    .bind(n.kind)
    .bind(&n.title)
    .bind(&n.body)
    .bind(&n.data)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!("Failed to create '{}' notification for {}: {e}", n.kind, n.recipient);
    }
}

/// Sends a copy of `template` to every active admin.
pub async fn notify_admins(pool: &PgPool, template: NewNotification) {
    let admins = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM users WHERE role = 'admin' AND is_active = TRUE",
    )
    .fetch_all(pool)
    .await;

    match admins {
        Ok(ids) => {
            for id in ids {
                let mut n = template.clone();
                n.recipient = id;
                n.role = Role::Admin;
                notify(pool, n).await;
            }
        }
        Err(e) => warn!("Failed to look up admins for '{}' notification: {e}", template.kind),
    }
}

/// Notifies whoever owns `company_id`; silently skipped when there is none.
pub async fn notify_company(pool: &PgPool, company_id: Uuid, mut template: NewNotification) {
    match crate::access::company_owner_id(pool, company_id).await {
        Ok(Some(owner)) => {
            template.recipient = owner;
            template.role = Role::Company;
            notify(pool, template).await;
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to resolve owner of company {company_id}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let id = Uuid::new_v4();
        let n = NewNotification::new(id, Role::Student, "invite_created", "You were invited")
            .body("Acme invited you")
            .data(serde_json::json!({ "invite_id": "x" }));
        assert_eq!(n.recipient, id);
        assert_eq!(n.kind, "invite_created");
        assert_eq!(n.body, "Acme invited you");
        assert_eq!(n.data["invite_id"], "x");

        let bare = NewNotification::new(id, Role::Admin, "k", "t");
        assert!(bare.data.as_object().is_some_and(|m| m.is_empty()));
    }
}
