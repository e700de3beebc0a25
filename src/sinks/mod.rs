//! Audit-log and notification sinks.
//!
//! Both are external collaborators from the core's point of view: append-only,
//! fire-and-forget. Callers that must not fail on a sink error log and move on.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Thin writer for the audit log and the per-user notification feed
#[derive(Clone)]
pub struct Sinks {
    db_pool: PgPool,
}

impl Sinks {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Append an audit entry.
    pub async fn audit(
        &self,
        actor: &str,
        action: &str,
        subject_id: Option<Uuid>,
        detail: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, actor, action, subject_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor)
        .bind(action)
        .bind(subject_id)
        .bind(detail)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    /// Push a message onto a user's notification feed.
    pub async fn notify_user(&self, user_id: Uuid, title: &str, body: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(body)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    /// Audit variant for paths that must never propagate a sink failure.
    pub async fn audit_best_effort(
        &self,
        actor: &str,
        action: &str,
        subject_id: Option<Uuid>,
        detail: &str,
    ) {
        if let Err(e) = self.audit(actor, action, subject_id, detail).await {
            tracing::warn!(action = %action, error = %e, "Audit write failed; continuing");
        }
    }

    /// Notification variant for paths that must never propagate a sink failure.
    pub async fn notify_best_effort(&self, user_id: Uuid, title: &str, body: &str) {
        if let Err(e) = self.notify_user(user_id, title, body).await {
            tracing::warn!(user_id = %user_id, error = %e, "Notification write failed; continuing");
        }
    }
}
