mod config;
mod repos;
mod services;
mod system;

pub use config::{Config, MailTransportSetting};
pub use repos::{IReminderRepo, InMemoryReminderRepo, Repos};
pub use services::*;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{ISys, RealSys};

#[derive(Clone)]
pub struct CapsuleContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    /// The remote archive the capsule files live in
    pub storage: Arc<dyn IObjectStorage>,
    /// The transport reminder emails are delivered through
    pub mailer: Arc<dyn IMailTransport>,
}

struct ContextParams {
    pub postgres_connection_string: String,
}

impl CapsuleContext {
    async fn create(params: ContextParams) -> Self {
        let config = Config::new();
        let repos = Repos::create_postgres(&params.postgres_connection_string)
            .await
            .expect("Postgres credentials must be set and valid");

        let credentials: Arc<dyn ICredentialProvider> = Arc::new(ServiceAccountAuth::new(
            config.service_account_file.clone(),
            STORAGE_SCOPES,
            config.gmail_impersonated_user.clone(),
            config.http_timeout,
        ));
        let storage: Arc<dyn IObjectStorage> = Arc::new(DriveStorage::new(
            credentials.clone(),
            config.storage_folder_id.clone(),
            config.http_timeout,
        ));
        let mailer: Arc<dyn IMailTransport> = match &config.mail_transport {
            MailTransportSetting::Gmail => Arc::new(GmailApiTransport::new(
                credentials,
                config.sender_name.clone(),
                config.sender_email.clone(),
                config.http_timeout,
            )),
            MailTransportSetting::Mailjet {
                api_key,
                secret_key,
            } => Arc::new(MailjetTransport::new(
                api_key.clone(),
                secret_key.clone(),
                config.sender_name.clone(),
                config.sender_email.clone(),
                config.http_timeout,
            )),
        };

        Self {
            repos,
            config,
            sys: Arc::new(RealSys {}),
            storage,
            mailer,
        }
    }

    /// Context with in-memory repos and stubbed external services, used by
    /// tests and local development without a database
    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            config: Config::new(),
            sys: Arc::new(RealSys {}),
            storage: Arc::new(InMemoryObjectStorage::new()),
            mailer: Arc::new(StubMailTransport::new()),
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> CapsuleContext {
    CapsuleContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string(),
    })
    .await
}

fn get_psql_connection_string() -> String {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .unwrap_or_else(|_| panic!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&get_psql_connection_string())
        .await
        .expect("TO CONNECT TO POSTGRES");

    sqlx::migrate!().run(&pool).await
}
