use capsule_keeper_domain::{format_elapsed, EmailAttachment, EmailDraft, Reminder};
use capsule_keeper_infra::{Config, RehydratedFile};
use chrono::{DateTime, Utc};
use tracing::warn;

pub const SUBJECT: &str = "Your time capsule is ready to open";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Renders the delivery email for a due reminder.
///
/// The body always lists every file name stored with the reminder, even
/// when some of them could not be fetched back from storage. Attachments
/// only cover the files that were actually rehydrated to disk.
pub fn compose_reminder_email(
    reminder: &Reminder,
    files: &[RehydratedFile],
    config: &Config,
    now: DateTime<Utc>,
) -> EmailDraft {
    let elapsed = format_elapsed(reminder.created_at_source, now);
    let created_local = reminder
        .created_at_source
        .with_timezone(&config.display_timezone)
        .format("%Y-%m-%d %H:%M %Z");

    let mut body = format!(
        "Hello,\n\nYou sealed this time capsule {} ago, on {}.\nToday it is due to be opened.\n",
        elapsed, created_local
    );

    let names = reminder
        .file_refs
        .refs()
        .iter()
        .map(|r| r.display_name.clone())
        .collect::<Vec<_>>();
    body.push_str("\nFiles in this capsule:\n");
    if names.is_empty() {
        body.push_str("(no files)\n");
    } else {
        for name in &names {
            body.push_str(&format!("- {}\n", name));
        }
    }

    if !reminder.message_body.trim().is_empty() {
        body.push_str(&format!(
            "\nYour message to yourself:\n{}\n",
            reminder.message_body
        ));
    }

    body.push_str(&format!("\nFrom: {}\n", config.sender_name));

    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let content = match std::fs::read(&file.local_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Unable to read back downloaded file {:?}: {:?}. Skipping attachment.",
                    file.local_path, e
                );
                continue;
            }
        };
        let content_type = mime_guess::from_path(&file.original_name)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        attachments.push(EmailAttachment {
            file_name: file.original_name.clone(),
            content_type,
            content,
        });
    }

    EmailDraft {
        subject: SUBJECT.to_string(),
        body,
        attachments,
    }
}
