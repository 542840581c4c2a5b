use super::IReminderRepo;

use capsule_keeper_domain::{FileRefsPayload, NewReminder, Reminder, ReminderStatus};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::convert::TryFrom;

pub struct PostgresReminderRepo {
    pool: PgPool,
}

impl PostgresReminderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    id: i64,
    recipient_email: String,
    scheduled_at: DateTime<Utc>,
    message_body: String,
    file_refs: Option<serde_json::Value>,
    created_at_source: DateTime<Utc>,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReminderRaw> for Reminder {
    type Error = anyhow::Error;

    fn try_from(raw: ReminderRaw) -> Result<Self, Self::Error> {
        // The single place the persisted payload is interpreted
        let file_refs = FileRefsPayload::decode(raw.file_refs.as_ref());
        Ok(Reminder {
            id: raw.id,
            recipient_email: raw.recipient_email,
            scheduled_at: raw.scheduled_at,
            message_body: raw.message_body,
            file_refs,
            created_at_source: raw.created_at_source,
            status: raw.status.parse::<ReminderStatus>()?,
            updated_at: raw.updated_at,
        })
    }
}

#[async_trait::async_trait]
impl IReminderRepo for PostgresReminderRepo {
    async fn insert(&self, new_reminder: NewReminder) -> anyhow::Result<Reminder> {
        let file_refs = if new_reminder.file_refs.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&new_reminder.file_refs)?)
        };
        let raw = sqlx::query_as::<_, ReminderRaw>(
            r#"
            INSERT INTO reminders
            (recipient_email, scheduled_at, message_body, file_refs, created_at_source, status, updated_at)
            VALUES($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(&new_reminder.recipient_email)
        .bind(new_reminder.scheduled_at)
        .bind(&new_reminder.message_body)
        .bind(file_refs)
        .bind(new_reminder.created_at_source)
        .bind(ReminderStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Reminder::try_from(raw)
    }

    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders AS r
            WHERE r.status = $1 AND r.scheduled_at <= $2
            ORDER BY r.scheduled_at
            LIMIT $3
            "#,
        )
        .bind(ReminderStatus::Pending.as_str())
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reminder::try_from).collect()
    }

    async fn mark_status(&self, id: i64, status: ReminderStatus) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE reminders
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() != 1 {
            anyhow::bail!("No reminder with id: {} to update", id);
        }
        Ok(())
    }

    async fn find(&self, id: i64) -> anyhow::Result<Option<Reminder>> {
        let raw = sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders AS r
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        raw.map(Reminder::try_from).transpose()
    }
}
