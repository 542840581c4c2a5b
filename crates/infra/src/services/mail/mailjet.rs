use super::DeliveryOutcome;
use crate::services::mail::IMailTransport;
use base64::Engine;
use capsule_keeper_domain::EmailDraft;
use serde::Serialize;
use tracing::warn;

// https://dev.mailjet.com/email/guides/send-api-v31/
const SEND_ENDPOINT: &str = "https://api.mailjet.com/v3.1/send";

/// Transactional email HTTP API transport: sender, recipient, subject, text
/// body and base64 encoded attachments as one structured JSON payload.
pub struct MailjetTransport {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
    sender_name: String,
    sender_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRequest {
    messages: Vec<MessagePayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessagePayload {
    from: Participant,
    to: Vec<Participant>,
    subject: String,
    text_part: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Participant {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentPayload {
    content_type: String,
    filename: String,
    base64_content: String,
}

impl MailjetTransport {
    pub fn new(
        api_key: String,
        secret_key: String,
        sender_name: String,
        sender_email: String,
        timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build mail http client: {:?}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            api_key,
            secret_key,
            sender_name,
            sender_email,
        }
    }

    fn payload(&self, to_email: &str, draft: &EmailDraft) -> SendRequest {
        let attachments = draft
            .attachments
            .iter()
            .map(|a| AttachmentPayload {
                content_type: a.content_type.clone(),
                filename: a.file_name.clone(),
                base64_content: base64::engine::general_purpose::STANDARD.encode(&a.content),
            })
            .collect();
        SendRequest {
            messages: vec![MessagePayload {
                from: Participant {
                    email: self.sender_email.clone(),
                    name: Some(self.sender_name.clone()),
                },
                to: vec![Participant {
                    email: to_email.into(),
                    name: None,
                }],
                subject: draft.subject.clone(),
                text_part: draft.body.clone(),
                attachments,
            }],
        }
    }
}

/// A send only counts as delivered when the HTTP call succeeded AND every
/// per message sub-status reports acceptance. A 200 carrying an "error"
/// sub-status is a failed send.
pub(crate) fn interpret_send_response(status: u16, body: &str) -> DeliveryOutcome {
    if !(200..300).contains(&status) {
        return DeliveryOutcome::rejected(format!(
            "Mail API returned status: {}, body: {}",
            status, body
        ));
    }
    let value = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value,
        Err(e) => {
            return DeliveryOutcome::rejected(format!("Mail API response is not JSON: {:?}", e))
        }
    };
    let messages = match value.get("Messages").and_then(|m| m.as_array()) {
        Some(messages) if !messages.is_empty() => messages,
        _ => {
            return DeliveryOutcome::rejected(format!(
                "Mail API response has no message statuses: {}",
                body
            ))
        }
    };
    let statuses: Vec<&str> = messages
        .iter()
        .map(|m| m.get("Status").and_then(|s| s.as_str()).unwrap_or("missing"))
        .collect();
    if statuses.iter().all(|s| *s == "success") {
        DeliveryOutcome::accepted("Mail API accepted the message")
    } else {
        DeliveryOutcome::rejected(format!(
            "Mail API reported per message statuses: {:?}",
            statuses
        ))
    }
}

#[async_trait::async_trait]
impl IMailTransport for MailjetTransport {
    async fn send(&self, to_email: &str, draft: &EmailDraft) -> DeliveryOutcome {
        let res = self
            .client
            .post(SEND_ENDPOINT)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .json(&self.payload(to_email, draft))
            .send()
            .await;
        let res = match res {
            Ok(res) => res,
            Err(e) => {
                return DeliveryOutcome::rejected(format!("Mail API request failed: {:?}", e))
            }
        };

        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        interpret_send_response(status, &body)
    }
}
