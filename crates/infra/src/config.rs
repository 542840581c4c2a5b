use capsule_keeper_utils::create_random_secret;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Which external transport delivers the reminder emails. Exactly one is
/// active per deployment.
#[derive(Debug, Clone)]
pub enum MailTransportSetting {
    /// Authenticated mail API accepting a fully formed MIME message
    Gmail,
    /// Transactional email HTTP API accepting a structured JSON payload
    Mailjet { api_key: String, secret_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    /// Name shown as the sender of reminder emails
    pub sender_name: String,
    /// Address reminder emails are sent from
    pub sender_email: String,
    /// Where remote files are rehydrated to before being attached
    pub temp_download_dir: PathBuf,
    /// Maximum number of due reminders one dispatch cycle will process.
    /// Together with sequential processing this bounds per-cycle load.
    pub reminder_batch_size: i64,
    /// Timezone used when rendering the original archiving time in the
    /// email body
    pub display_timezone: Tz,
    /// Secret expected in the `capsule-dispatch-key` header of the external
    /// dispatch trigger
    pub dispatch_secret_key: String,
    /// Interval of the built-in dispatch job. 0 disables it, leaving the
    /// external trigger as the only way to start a cycle.
    pub dispatch_interval_secs: u64,
    pub mail_transport: MailTransportSetting,
    /// Path to the service account key used for remote storage and, with the
    /// Gmail transport, for sending mail
    pub service_account_file: PathBuf,
    /// Mailbox the service account impersonates when sending through the
    /// mail API. Required by that API for domain-wide delegation.
    pub gmail_impersonated_user: Option<String>,
    /// Remote storage folder new capsule files are archived into
    pub storage_folder_id: Option<String>,
    /// Timeout applied to every remote storage and mail transport request
    pub http_timeout: Duration,
}

impl Config {
    pub fn new() -> Self {
        let default_port = "5000";
        let port = std::env::var("PORT").unwrap_or_else(|_| default_port.into());
        let port = match port.parse::<usize>() {
            Ok(port) => port,
            Err(_) => {
                warn!(
                    "The given PORT: {} is not valid, falling back to the default port: {}.",
                    port, default_port
                );
                default_port.parse::<usize>().unwrap()
            }
        };

        let sender_name =
            std::env::var("SENDER_NAME").unwrap_or_else(|_| "Time Capsule Keeper".into());
        let sender_email = match std::env::var("SENDER_EMAIL") {
            Ok(email) => email,
            Err(_) => {
                warn!("SENDER_EMAIL environment variable is not set. Mail delivery will fail.");
                String::new()
            }
        };

        let temp_download_dir = std::env::var("TEMP_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp/capsule_keeper_downloads"));

        let default_batch_size = 10;
        let reminder_batch_size = match std::env::var("REMINDER_BATCH_SIZE") {
            Ok(raw) => match raw.parse::<i64>() {
                Ok(size) if size > 0 => size,
                _ => {
                    warn!(
                        "The given REMINDER_BATCH_SIZE: {} is not valid, falling back to the default: {}.",
                        raw, default_batch_size
                    );
                    default_batch_size
                }
            },
            Err(_) => default_batch_size,
        };

        let display_timezone = match std::env::var("DISPLAY_TIMEZONE") {
            Ok(raw) => match raw.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        "The given DISPLAY_TIMEZONE: {} is not valid, falling back to UTC.",
                        raw
                    );
                    Tz::UTC
                }
            },
            Err(_) => Tz::UTC,
        };

        let dispatch_secret_key = match std::env::var("DISPATCH_SECRET_KEY") {
            Ok(key) => key,
            Err(_) => {
                info!("Did not find DISPATCH_SECRET_KEY environment variable. Going to create one.");
                let key = create_random_secret(16);
                info!(
                    "Secret key for triggering reminder dispatch was generated and set to: {}",
                    key
                );
                key
            }
        };

        let dispatch_interval_secs = match std::env::var("DISPATCH_INTERVAL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => {
                    warn!(
                        "The given DISPATCH_INTERVAL_SECS: {} is not valid, disabling the built-in dispatch job.",
                        raw
                    );
                    0
                }
            },
            Err(_) => 0,
        };

        let mail_transport = match std::env::var("MAIL_TRANSPORT").as_deref() {
            Ok("gmail") => MailTransportSetting::Gmail,
            Ok("mailjet") | Err(_) => Self::mailjet_setting(),
            Ok(other) => {
                warn!(
                    "The given MAIL_TRANSPORT: {} is not recognized, falling back to mailjet.",
                    other
                );
                Self::mailjet_setting()
            }
        };

        let service_account_file = std::env::var("SERVICE_ACCOUNT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/secrets/service_account.json"));

        let gmail_impersonated_user = std::env::var("GMAIL_IMPERSONATED_USER").ok();
        if gmail_impersonated_user.is_none() {
            if let MailTransportSetting::Gmail = mail_transport {
                warn!("GMAIL_IMPERSONATED_USER environment variable is not set. The mail API will reject sends from a bare service account.");
            }
        }

        let storage_folder_id = std::env::var("STORAGE_FOLDER_ID").ok();

        Self {
            port,
            sender_name,
            sender_email,
            temp_download_dir,
            reminder_batch_size,
            display_timezone,
            dispatch_secret_key,
            dispatch_interval_secs,
            mail_transport,
            service_account_file,
            gmail_impersonated_user,
            storage_folder_id,
            http_timeout: Duration::from_secs(30),
        }
    }

    fn mailjet_setting() -> MailTransportSetting {
        let api_key = std::env::var("MAILJET_API_KEY").unwrap_or_else(|_| {
            warn!("MAILJET_API_KEY environment variable is not set. Mail delivery will fail.");
            String::new()
        });
        let secret_key = std::env::var("MAILJET_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MAILJET_SECRET_KEY environment variable is not set. Mail delivery will fail.");
            String::new()
        });
        MailTransportSetting::Mailjet {
            api_key,
            secret_key,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
