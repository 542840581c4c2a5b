use super::DeliveryOutcome;
use crate::services::mail::IMailTransport;
use crate::services::storage::ICredentialProvider;
use base64::Engine;
use capsule_keeper_domain::EmailDraft;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use std::sync::Arc;
use tracing::warn;

const SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Mail API transport: the message is assembled as a complete MIME document
/// and handed over base64url encoded in the `raw` field.
pub struct GmailApiTransport {
    client: reqwest::Client,
    credentials: Arc<dyn ICredentialProvider>,
    sender_name: String,
    sender_email: String,
}

impl GmailApiTransport {
    pub fn new(
        credentials: Arc<dyn ICredentialProvider>,
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
            credentials,
            sender_name,
            sender_email,
        }
    }
}

fn parse_mailbox(name: Option<&str>, email: &str) -> Result<Mailbox, String> {
    let address = email
        .parse()
        .map_err(|e| format!("Invalid address {}: {:?}", email, e))?;
    Ok(Mailbox::new(name.map(String::from), address))
}

/// Builds the full MIME message: a plain text body plus one attachment part
/// per rehydrated file, named by the original display name.
pub(crate) fn build_mime_message(
    sender_name: &str,
    sender_email: &str,
    to_email: &str,
    draft: &EmailDraft,
) -> Result<Vec<u8>, String> {
    let from = parse_mailbox(Some(sender_name), sender_email)?;
    let to = parse_mailbox(None, to_email)?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(draft.body.clone()));
    for attachment in &draft.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .or_else(|_| ContentType::parse("application/octet-stream"))
            .map_err(|e| format!("Unusable content type: {:?}", e))?;
        parts = parts.singlepart(
            Attachment::new(attachment.file_name.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(&draft.subject)
        .multipart(parts)
        .map_err(|e| format!("Failed to assemble MIME message: {:?}", e))?;
    Ok(message.formatted())
}

pub(crate) fn interpret_send_response(status: u16, body: &str) -> DeliveryOutcome {
    if !(200..300).contains(&status) {
        return DeliveryOutcome::rejected(format!(
            "Mail API returned status: {}, body: {}",
            status, body
        ));
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("id").and_then(|id| id.as_str()) {
            Some(id) => DeliveryOutcome::accepted(format!("Mail API accepted message id: {}", id)),
            None => DeliveryOutcome::rejected(format!(
                "Mail API response is missing a message id: {}",
                body
            )),
        },
        Err(e) => DeliveryOutcome::rejected(format!("Mail API response is not JSON: {:?}", e)),
    }
}

#[async_trait::async_trait]
impl IMailTransport for GmailApiTransport {
    async fn send(&self, to_email: &str, draft: &EmailDraft) -> DeliveryOutcome {
        let token = match self.credentials.get_access_token().await {
            Some(token) => token,
            None => return DeliveryOutcome::rejected("No credentials available for the mail API"),
        };

        let mime =
            match build_mime_message(&self.sender_name, &self.sender_email, to_email, draft) {
                Ok(mime) => mime,
                Err(detail) => return DeliveryOutcome::rejected(detail),
            };
        let raw = base64::engine::general_purpose::URL_SAFE.encode(mime);

        let res = self
            .client
            .post(SEND_ENDPOINT)
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
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
