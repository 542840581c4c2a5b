pub mod mail;
pub mod rehydrate;
pub mod storage;

pub use mail::{
    DeliveryOutcome, GmailApiTransport, IMailTransport, MailjetTransport, StubMailTransport,
};
pub use rehydrate::{FileRehydrator, RehydratedBatch, RehydratedFile};
pub use storage::{
    DriveStorage, ICredentialProvider, IObjectStorage, InMemoryObjectStorage, ServiceAccountAuth,
    STORAGE_SCOPES,
};
