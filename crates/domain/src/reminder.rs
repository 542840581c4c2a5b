use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A `Reminder` pairs a future delivery time with a recipient, a message and
/// the references to the archived files that should be mailed back at that
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    /// Unique identity, assigned by the storage on creation, immutable
    pub id: i64,
    /// Destination address for the reminder email
    pub recipient_email: String,
    /// The delivery trigger time, UTC
    pub scheduled_at: DateTime<Utc>,
    /// Free text from the original submitter, may be empty
    pub message_body: String,
    /// References to the archived remote objects, decoded once at the
    /// repository boundary
    pub file_refs: FileRefsPayload,
    /// When the capsule was originally archived, used for the elapsed-time
    /// section of the email body
    pub created_at_source: DateTime<Utc>,
    pub status: ReminderStatus,
    /// Last status change, set by the repository on every transition
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a new `Reminder`. The storage assigns `id`,
/// `status` (always `Pending`) and `updated_at`.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub recipient_email: String,
    pub scheduled_at: DateTime<Utc>,
    pub message_body: String,
    pub file_refs: Vec<RemoteFileRef>,
    pub created_at_source: DateTime<Utc>,
}

/// Delivery state of a `Reminder`.
///
/// Valid transitions are `Pending -> InProgress -> {Sent, Failed}` and
/// `Pending -> Failed` for rows whose file references do not decode.
/// `Sent` and `Failed` are terminal. The polling query only ever selects
/// `Pending` rows, so a row that left `Pending` is never re-queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InvalidStatusError {
    #[error("Reminder status: {0} is not recognized")]
    Unrecognized(String),
}

impl FromStr for ReminderStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(InvalidStatusError::Unrecognized(s.into())),
        }
    }
}

/// Reference to one archived object in remote storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileRef {
    pub remote_id: String,
    pub display_name: String,
}

/// The persisted `file_refs` payload after its single decode at the
/// repository boundary.
///
/// Historically the column has held `NULL`, a JSON array, or a string
/// containing JSON, and sometimes garbage. Everything that is not a list of
/// complete references is carried as `Malformed` so the pipeline can fail the
/// row without attempting delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum FileRefsPayload {
    Empty,
    Valid(Vec<RemoteFileRef>),
    Malformed(String),
}

impl FileRefsPayload {
    pub fn decode(raw: Option<&serde_json::Value>) -> Self {
        let value = match raw {
            None | Some(serde_json::Value::Null) => return Self::Empty,
            Some(v) => v,
        };

        // TEXT columns surface as a JSON string wrapping the real payload
        if let serde_json::Value::String(s) = value {
            return Self::decode_str(s);
        }

        Self::from_value(value)
    }

    pub fn decode_str(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => Self::Malformed(format!("invalid JSON: {}", e)),
        }
    }

    fn from_value(value: &serde_json::Value) -> Self {
        let refs: Vec<RemoteFileRef> = match serde_json::from_value(value.clone()) {
            Ok(refs) => refs,
            Err(e) => return Self::Malformed(format!("unexpected shape: {}", e)),
        };
        if refs
            .iter()
            .any(|r| r.remote_id.is_empty() || r.display_name.is_empty())
        {
            return Self::Malformed("file reference with empty id or name".into());
        }
        if refs.is_empty() {
            return Self::Empty;
        }
        Self::Valid(refs)
    }

    /// The references to fetch, empty when there is nothing to attach.
    /// `Malformed` payloads must be rejected before this is meaningful.
    pub fn refs(&self) -> &[RemoteFileRef] {
        match self {
            Self::Valid(refs) => refs,
            _ => &[],
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_roundtrips_through_str() {
        for status in &[
            ReminderStatus::Pending,
            ReminderStatus::InProgress,
            ReminderStatus::Sent,
            ReminderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ReminderStatus>().unwrap(), *status);
        }
        assert!("pendin".parse::<ReminderStatus>().is_err());
    }

    #[test]
    fn only_sent_and_failed_are_terminal() {
        assert!(!ReminderStatus::Pending.is_terminal());
        assert!(!ReminderStatus::InProgress.is_terminal());
        assert!(ReminderStatus::Sent.is_terminal());
        assert!(ReminderStatus::Failed.is_terminal());
    }

    #[test]
    fn decodes_missing_payload_as_empty() {
        assert_eq!(FileRefsPayload::decode(None), FileRefsPayload::Empty);
        assert_eq!(
            FileRefsPayload::decode(Some(&serde_json::Value::Null)),
            FileRefsPayload::Empty
        );
        assert_eq!(
            FileRefsPayload::decode(Some(&serde_json::json!([]))),
            FileRefsPayload::Empty
        );
    }

    #[test]
    fn decodes_valid_reference_list() {
        let value = serde_json::json!([
            { "remote_id": "abc", "display_name": "photo.png" },
            { "remote_id": "def", "display_name": "letter.txt" }
        ]);
        match FileRefsPayload::decode(Some(&value)) {
            FileRefsPayload::Valid(refs) => {
                assert_eq!(refs.len(), 2);
                assert_eq!(refs[0].remote_id, "abc");
                assert_eq!(refs[1].display_name, "letter.txt");
            }
            other => panic!("Expected valid payload, got {:?}", other),
        }
    }

    #[test]
    fn decodes_json_wrapped_in_string_column() {
        let value = serde_json::Value::String(
            r#"[{ "remote_id": "abc", "display_name": "photo.png" }]"#.into(),
        );
        match FileRefsPayload::decode(Some(&value)) {
            FileRefsPayload::Valid(refs) => assert_eq!(refs.len(), 1),
            other => panic!("Expected valid payload, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_json() {
        let payload = FileRefsPayload::decode_str(r#"[{"remote_id": "abc", "disp"#);
        assert!(payload.is_malformed());
    }

    #[test]
    fn rejects_wrong_shape_and_empty_fields() {
        assert!(FileRefsPayload::decode(Some(&serde_json::json!({ "remote_id": "x" }))).is_malformed());
        assert!(FileRefsPayload::decode(Some(&serde_json::json!(42))).is_malformed());
        assert!(FileRefsPayload::decode(Some(
            &serde_json::json!([{ "remote_id": "", "display_name": "a.txt" }])
        ))
        .is_malformed());
        assert!(FileRefsPayload::decode(Some(
            &serde_json::json!([{ "remote_id": "abc", "display_name": "" }])
        ))
        .is_malformed());
    }
}
