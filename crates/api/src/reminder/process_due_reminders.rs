use crate::reminder::compose::compose_reminder_email;
use crate::shared::usecase::UseCase;
use capsule_keeper_domain::{Reminder, ReminderStatus};
use capsule_keeper_infra::{CapsuleContext, FileRehydrator};
use thiserror::Error;
use tracing::{error, info, warn};

/// Runs one dispatch cycle: fetch the due reminders and deliver each one.
#[derive(Debug)]
pub struct ProcessDueRemindersUseCase;

/// Counts for one cycle. `processed` covers every row the cycle touched,
/// including the ones that ended up failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error("Unable to query due reminders: {0}")]
    Storage(#[from] anyhow::Error),
}

#[async_trait::async_trait(?Send)]
impl UseCase for ProcessDueRemindersUseCase {
    type Response = DispatchReport;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &CapsuleContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        let due = ctx
            .repos
            .reminders
            .fetch_due(now, ctx.config.reminder_batch_size)
            .await?;

        let mut report = DispatchReport::default();
        if due.is_empty() {
            info!("No due reminders at {}", now);
            return Ok(report);
        }
        info!("Processing {} due reminders", due.len());

        for reminder in due {
            report.processed += 1;
            match process_one(&reminder, ctx).await {
                ReminderStatus::Sent => report.sent += 1,
                _ => report.failed += 1,
            }
        }

        info!(
            "Dispatch cycle done. processed: {}, sent: {}, failed: {}",
            report.processed, report.sent, report.failed
        );
        Ok(report)
    }
}

/// Delivers a single reminder and returns the status it ended up in. Every
/// failure is contained here so one bad row never stops the rest of the
/// batch.
async fn process_one(reminder: &Reminder, ctx: &CapsuleContext) -> ReminderStatus {
    if reminder.file_refs.is_malformed() {
        error!(
            "Reminder: {} has an undecodable file list, marking it failed",
            reminder.id
        );
        commit_status(reminder.id, ReminderStatus::Failed, ctx).await;
        return ReminderStatus::Failed;
    }

    // Claiming the row first bounds delivery at one email even if this
    // process dies before the final status lands.
    if let Err(e) = ctx
        .repos
        .reminders
        .mark_status(reminder.id, ReminderStatus::InProgress)
        .await
    {
        error!(
            "Unable to claim reminder: {}, skipping it this cycle: {:?}",
            reminder.id, e
        );
        return ReminderStatus::Pending;
    }

    let rehydrator = FileRehydrator::new(
        ctx.storage.clone(),
        ctx.config.temp_download_dir.clone(),
    );
    let batch = rehydrator
        .fetch_all(reminder.id, reminder.file_refs.refs())
        .await;

    let draft = compose_reminder_email(reminder, &batch, &ctx.config, ctx.sys.now());
    let outcome = ctx.mailer.send(&reminder.recipient_email, &draft).await;

    let status = if outcome.accepted {
        info!(
            "Reminder: {} delivered to {}: {}",
            reminder.id, reminder.recipient_email, outcome.detail
        );
        ReminderStatus::Sent
    } else {
        warn!(
            "Reminder: {} was rejected by the mail transport: {}",
            reminder.id, outcome.detail
        );
        ReminderStatus::Failed
    };
    commit_status(reminder.id, status, ctx).await;

    status
}

/// Commit failures are logged and swallowed. The row then stays in progress
/// and is resolved by an operator, it is never silently retried.
async fn commit_status(id: i64, status: ReminderStatus, ctx: &CapsuleContext) {
    if let Err(e) = ctx.repos.reminders.mark_status(id, status).await {
        error!(
            "Unable to record status: {:?} for reminder: {}: {:?}",
            status, id, e
        );
    }
}
