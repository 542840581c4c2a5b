mod date;
mod elapsed;
mod email;
mod reminder;

pub use date::parse_timestamp_utc;
pub use elapsed::format_elapsed;
pub use email::{EmailAttachment, EmailDraft};
pub use reminder::{
    FileRefsPayload, InvalidStatusError, NewReminder, Reminder, ReminderStatus, RemoteFileRef,
};
