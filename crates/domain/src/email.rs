/// A composed reminder email, ready to be handed to a mail transport
#[derive(Debug, Clone, PartialEq)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// One attachment part. `file_name` is the original display name of the
/// archived file, not the temporary local name it was rehydrated to.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}
