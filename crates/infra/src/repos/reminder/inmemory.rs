use super::IReminderRepo;

use capsule_keeper_domain::{FileRefsPayload, NewReminder, Reminder, ReminderStatus};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub struct InMemoryReminderRepo {
    reminders: Mutex<Vec<Reminder>>,
    next_id: AtomicI64,
}

impl InMemoryReminderRepo {
    pub fn new() -> Self {
        Self {
            reminders: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Inserts a row with an explicit payload, bypassing the validated
    /// `NewReminder` path. Lets tests seed the malformed payloads a real
    /// database can contain.
    pub fn insert_with_payload(&self, new_reminder: NewReminder, payload: FileRefsPayload) -> Reminder {
        let reminder = Reminder {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            recipient_email: new_reminder.recipient_email,
            scheduled_at: new_reminder.scheduled_at,
            message_body: new_reminder.message_body,
            file_refs: payload,
            created_at_source: new_reminder.created_at_source,
            status: ReminderStatus::Pending,
            updated_at: Utc::now(),
        };
        let mut reminders = self.reminders.lock().unwrap();
        reminders.push(reminder.clone());
        reminder
    }
}

impl Default for InMemoryReminderRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IReminderRepo for InMemoryReminderRepo {
    async fn insert(&self, new_reminder: NewReminder) -> anyhow::Result<Reminder> {
        let payload = if new_reminder.file_refs.is_empty() {
            FileRefsPayload::Empty
        } else {
            FileRefsPayload::Valid(new_reminder.file_refs.clone())
        };
        Ok(self.insert_with_payload(new_reminder, payload))
    }

    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Reminder>> {
        let reminders = self.reminders.lock().unwrap();
        let mut due = reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending && r.scheduled_at <= now)
            .cloned()
            .collect::<Vec<_>>();
        due.sort_by_key(|r| r.scheduled_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_status(&self, id: i64, status: ReminderStatus) -> anyhow::Result<()> {
        let mut reminders = self.reminders.lock().unwrap();
        for reminder in reminders.iter_mut() {
            if reminder.id == id {
                reminder.status = status;
                reminder.updated_at = Utc::now();
                return Ok(());
            }
        }
        anyhow::bail!("No reminder with id: {} to update", id)
    }

    async fn find(&self, id: i64) -> anyhow::Result<Option<Reminder>> {
        let reminders = self.reminders.lock().unwrap();
        Ok(reminders.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn new_reminder(scheduled_at: DateTime<Utc>) -> NewReminder {
        NewReminder {
            recipient_email: "future@example.com".into(),
            scheduled_at,
            message_body: String::new(),
            file_refs: Vec::new(),
            created_at_source: scheduled_at - Duration::days(365),
        }
    }

    #[tokio::test]
    async fn fetches_due_rows_in_ascending_order_with_cap() {
        let repo = InMemoryReminderRepo::new();
        let now = Utc::now();

        for offset in &[3, 1, 2] {
            repo.insert(new_reminder(now - Duration::hours(*offset)))
                .await
                .unwrap();
        }
        repo.insert(new_reminder(now + Duration::hours(1)))
            .await
            .unwrap();

        let due = repo.fetch_due(now, 10).await.unwrap();
        assert_eq!(due.len(), 3);
        assert!(due.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));

        let capped = repo.fetch_due(now, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].scheduled_at, now - Duration::hours(3));
    }

    #[tokio::test]
    async fn non_pending_rows_are_never_fetched() {
        let repo = InMemoryReminderRepo::new();
        let now = Utc::now();

        let sent = repo.insert(new_reminder(now - Duration::hours(1))).await.unwrap();
        let failed = repo.insert(new_reminder(now - Duration::hours(1))).await.unwrap();
        let claimed = repo.insert(new_reminder(now - Duration::hours(1))).await.unwrap();
        repo.mark_status(sent.id, ReminderStatus::Sent).await.unwrap();
        repo.mark_status(failed.id, ReminderStatus::Failed).await.unwrap();
        repo.mark_status(claimed.id, ReminderStatus::InProgress)
            .await
            .unwrap();

        assert!(repo.fetch_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_status_updates_one_row_and_touches_updated_at() {
        let repo = InMemoryReminderRepo::new();
        let now = Utc::now();
        let a = repo.insert(new_reminder(now)).await.unwrap();
        let b = repo.insert(new_reminder(now)).await.unwrap();

        repo.mark_status(a.id, ReminderStatus::Sent).await.unwrap();

        let a_after = repo.find(a.id).await.unwrap().unwrap();
        let b_after = repo.find(b.id).await.unwrap().unwrap();
        assert_eq!(a_after.status, ReminderStatus::Sent);
        assert!(a_after.updated_at >= a.updated_at);
        assert_eq!(b_after.status, ReminderStatus::Pending);

        assert!(repo.mark_status(999, ReminderStatus::Sent).await.is_err());
    }
}
