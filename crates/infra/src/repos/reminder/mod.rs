mod inmemory;
mod postgres;

pub use inmemory::InMemoryReminderRepo;
pub use postgres::PostgresReminderRepo;

use capsule_keeper_domain::{NewReminder, Reminder, ReminderStatus};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    async fn insert(&self, new_reminder: NewReminder) -> anyhow::Result<Reminder>;
    /// Due rows only: `status = pending AND scheduled_at <= now`, ascending
    /// by `scheduled_at`, capped at `limit`. The predicate is what keeps
    /// terminal and in-flight rows out of later cycles.
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Reminder>>;
    /// Updates `status` and `updated_at` for exactly one row. Each call is
    /// committed on its own so a failure for one reminder never rolls back
    /// siblings.
    async fn mark_status(&self, id: i64, status: ReminderStatus) -> anyhow::Result<()>;
    async fn find(&self, id: i64) -> anyhow::Result<Option<Reminder>>;
}
