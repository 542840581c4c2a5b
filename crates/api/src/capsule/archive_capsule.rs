use crate::error::CapsuleError;
use crate::shared::usecase::{execute, UseCase};
use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine};
use capsule_keeper_domain::{parse_timestamp_utc, NewReminder, Reminder, RemoteFileRef};
use capsule_keeper_infra::CapsuleContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CapsuleFile {
    pub name: String,
    /// Base64 of the raw file bytes
    pub content_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub recipient_email: String,
    /// When the capsule should be opened. RFC 3339, or a naive timestamp
    /// which is taken as UTC.
    pub scheduled_at: String,
    pub message_body: Option<String>,
    #[serde(default)]
    pub files: Vec<CapsuleFile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct APIResponse {
    pub id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub archived_files: usize,
}

impl APIResponse {
    pub fn new(reminder: Reminder) -> Self {
        Self {
            id: reminder.id,
            scheduled_at: reminder.scheduled_at,
            archived_files: reminder.file_refs.refs().len(),
        }
    }
}

pub async fn archive_capsule_controller(
    body: web::Json<RequestBody>,
    ctx: web::Data<CapsuleContext>,
) -> Result<HttpResponse, CapsuleError> {
    let body = body.into_inner();

    if !body.recipient_email.contains('@') {
        return Err(CapsuleError::BadClientData(format!(
            "Invalid recipient email: {}",
            body.recipient_email
        )));
    }
    let scheduled_at = parse_timestamp_utc(&body.scheduled_at).ok_or_else(|| {
        CapsuleError::BadClientData(format!(
            "Invalid scheduled_at timestamp: {}",
            body.scheduled_at
        ))
    })?;

    let usecase = ArchiveCapsuleUseCase {
        recipient_email: body.recipient_email,
        scheduled_at,
        message_body: body.message_body.unwrap_or_default(),
        files: body.files,
    };

    execute(usecase, &ctx)
        .await
        .map(|reminder| HttpResponse::Created().json(APIResponse::new(reminder)))
        .map_err(|e| match e {
            UseCaseError::InvalidFileContent(name) => CapsuleError::BadClientData(format!(
                "File: {} does not contain valid base64 content",
                name
            )),
            UseCaseError::StorageUnavailable => CapsuleError::InternalError,
        })
}

#[derive(Debug)]
struct ArchiveCapsuleUseCase {
    recipient_email: String,
    scheduled_at: DateTime<Utc>,
    message_body: String,
    files: Vec<CapsuleFile>,
}

#[derive(Debug, Error)]
enum UseCaseError {
    #[error("File: {0} does not contain valid base64 content")]
    InvalidFileContent(String),
    #[error("Storage unavailable")]
    StorageUnavailable,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ArchiveCapsuleUseCase {
    type Response = Reminder;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &CapsuleContext) -> Result<Self::Response, Self::Errors> {
        let mut file_refs = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let content = STANDARD
                .decode(&file.content_base64)
                .map_err(|_| UseCaseError::InvalidFileContent(file.name.clone()))?;
            let remote_id = ctx
                .storage
                .upload(&file.name, content)
                .await
                .map_err(|_| UseCaseError::StorageUnavailable)?;
            file_refs.push(RemoteFileRef {
                remote_id,
                display_name: file.name.clone(),
            });
        }

        let reminder = ctx
            .repos
            .reminders
            .insert(NewReminder {
                recipient_email: self.recipient_email.clone(),
                scheduled_at: self.scheduled_at,
                message_body: self.message_body.clone(),
                file_refs,
                created_at_source: ctx.sys.now(),
            })
            .await
            .map_err(|_| UseCaseError::StorageUnavailable)?;

        info!(
            "Archived capsule as reminder: {} for {} with {} files, due {}",
            reminder.id,
            reminder.recipient_email,
            reminder.file_refs.refs().len(),
            reminder.scheduled_at
        );
        Ok(reminder)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::{test, App};
    use capsule_keeper_domain::ReminderStatus;
    use capsule_keeper_infra::{IReminderRepo, InMemoryObjectStorage, InMemoryReminderRepo};
    use chrono::TimeZone;
    use std::sync::Arc;

    struct TestSetup {
        ctx: CapsuleContext,
        repo: Arc<InMemoryReminderRepo>,
        storage: Arc<InMemoryObjectStorage>,
    }

    fn setup() -> TestSetup {
        let repo = Arc::new(InMemoryReminderRepo::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let mut ctx = CapsuleContext::create_inmemory();
        ctx.repos.reminders = repo.clone();
        ctx.storage = storage.clone();
        TestSetup { ctx, repo, storage }
    }

    #[actix_web::test]
    async fn archives_files_and_creates_a_pending_reminder() {
        let s = setup();
        let server = test::init_service(
            App::new()
                .app_data(web::Data::new(s.ctx))
                .configure(crate::capsule::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/capsules")
            .set_json(serde_json::json!({
                "recipient_email": "future@example.com",
                "scheduled_at": "2030-01-01T00:00:00Z",
                "message_body": "open me later",
                "files": [
                    { "name": "photo.png", "content_base64": STANDARD.encode(b"image bytes") }
                ]
            }))
            .to_request();
        let res: APIResponse = test::call_and_read_body_json(&server, req).await;

        assert_eq!(res.archived_files, 1);
        let stored = s.repo.find(res.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Pending);
        assert_eq!(stored.recipient_email, "future@example.com");
        assert_eq!(stored.message_body, "open me later");
        assert_eq!(stored.file_refs.refs().len(), 1);
        assert_eq!(stored.file_refs.refs()[0].display_name, "photo.png");
        assert!(s.storage.contains(&stored.file_refs.refs()[0].remote_id));
    }

    #[actix_web::test]
    async fn accepts_naive_timestamps_as_utc() {
        let s = setup();
        let server = test::init_service(
            App::new()
                .app_data(web::Data::new(s.ctx))
                .configure(crate::capsule::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/capsules")
            .set_json(serde_json::json!({
                "recipient_email": "future@example.com",
                "scheduled_at": "2030-01-01 12:30:00"
            }))
            .to_request();
        let res: APIResponse = test::call_and_read_body_json(&server, req).await;

        assert_eq!(
            res.scheduled_at,
            Utc.with_ymd_and_hms(2030, 1, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(res.archived_files, 0);
    }

    #[actix_web::test]
    async fn rejects_bad_email_timestamp_and_file_content() {
        let s = setup();
        let repo = s.repo.clone();
        let server = test::init_service(
            App::new()
                .app_data(web::Data::new(s.ctx))
                .configure(crate::capsule::configure_routes),
        )
        .await;

        let cases = vec![
            serde_json::json!({
                "recipient_email": "not-an-email",
                "scheduled_at": "2030-01-01T00:00:00Z"
            }),
            serde_json::json!({
                "recipient_email": "future@example.com",
                "scheduled_at": "tomorrowish"
            }),
            serde_json::json!({
                "recipient_email": "future@example.com",
                "scheduled_at": "2030-01-01T00:00:00Z",
                "files": [{ "name": "photo.png", "content_base64": "@@not base64@@" }]
            }),
        ];
        for body in cases {
            let req = test::TestRequest::post()
                .uri("/capsules")
                .set_json(body)
                .to_request();
            let res = test::call_service(&server, req).await;
            assert_eq!(res.status().as_u16(), 400);
        }
        assert!(repo.fetch_due(Utc::now(), 10).await.unwrap().is_empty());
    }
}
