mod gmail;
mod mailjet;

pub use gmail::GmailApiTransport;
pub use mailjet::MailjetTransport;

use capsule_keeper_domain::EmailDraft;
use std::sync::Mutex;

/// Structured result of one transport call, for logging and the status
/// decision. `accepted` is only true when the transport call succeeded AND
/// any per message sub-status also indicates acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub accepted: bool,
    pub detail: String,
}

impl DeliveryOutcome {
    pub fn accepted(detail: impl Into<String>) -> Self {
        Self {
            accepted: true,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            accepted: false,
            detail: detail.into(),
        }
    }
}

/// External mail transport. Implementations are total: every transport
/// exception, non success status or malformed response folds into a rejected
/// outcome and never propagates to the dispatch pipeline.
#[async_trait::async_trait]
pub trait IMailTransport: Send + Sync {
    async fn send(&self, to_email: &str, draft: &EmailDraft) -> DeliveryOutcome;
}

/// Transport double that records what would have been sent
pub struct StubMailTransport {
    accept: bool,
    sent: Mutex<Vec<(String, EmailDraft)>>,
}

impl StubMailTransport {
    pub fn new() -> Self {
        Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, EmailDraft)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Default for StubMailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IMailTransport for StubMailTransport {
    async fn send(&self, to_email: &str, draft: &EmailDraft) -> DeliveryOutcome {
        let mut sent = self.sent.lock().unwrap();
        sent.push((to_email.into(), draft.clone()));
        if self.accept {
            DeliveryOutcome::accepted("stub transport accepted the message")
        } else {
            DeliveryOutcome::rejected("stub transport rejected the message")
        }
    }
}
