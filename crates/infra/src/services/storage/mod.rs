mod auth_provider;

pub use auth_provider::{ICredentialProvider, ServiceAccountAuth};

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const STORAGE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/gmail.send",
];

const DOWNLOAD_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_ENDPOINT: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart";

/// The remote archive the capsule files live in
#[async_trait::async_trait]
pub trait IObjectStorage: Send + Sync {
    /// Fetches the raw bytes of one archived object
    async fn download(&self, remote_id: &str) -> anyhow::Result<Vec<u8>>;
    /// Archives content under the given name and returns the assigned
    /// remote id
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> anyhow::Result<String>;
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

pub struct DriveStorage {
    client: reqwest::Client,
    credentials: Arc<dyn ICredentialProvider>,
    folder_id: Option<String>,
}

impl DriveStorage {
    pub fn new(
        credentials: Arc<dyn ICredentialProvider>,
        folder_id: Option<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build storage http client: {:?}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            credentials,
            folder_id,
        }
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        self.credentials
            .get_access_token()
            .await
            .ok_or_else(|| anyhow::anyhow!("No credentials available for remote storage"))
    }
}

#[async_trait::async_trait]
impl IObjectStorage for DriveStorage {
    async fn download(&self, remote_id: &str) -> anyhow::Result<Vec<u8>> {
        let token = self.access_token().await?;
        let res = self
            .client
            .get(format!("{}/{}", DOWNLOAD_ENDPOINT, remote_id))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.bytes().await?.to_vec())
    }

    async fn upload(&self, file_name: &str, content: Vec<u8>) -> anyhow::Result<String> {
        let token = self.access_token().await?;

        let metadata = match &self.folder_id {
            Some(folder_id) => serde_json::json!({ "name": file_name, "parents": [folder_id] }),
            None => serde_json::json!({ "name": file_name }),
        };

        // multipart/related body: a JSON metadata part followed by the media
        let boundary = "capsule_keeper_upload";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n",
                boundary, metadata
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let res = self
            .client
            .post(UPLOAD_ENDPOINT)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let created = res.json::<CreatedObject>().await?;
        Ok(created.id)
    }
}

/// Storage backed by a map, for tests and local development
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn put(&self, remote_id: &str, content: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(remote_id.into(), content);
    }

    pub fn contains(&self, remote_id: &str) -> bool {
        let objects = self.objects.lock().unwrap();
        objects.contains_key(remote_id)
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IObjectStorage for InMemoryObjectStorage {
    async fn download(&self, remote_id: &str) -> anyhow::Result<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(remote_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No object with remote id: {}", remote_id))
    }

    async fn upload(&self, _file_name: &str, content: Vec<u8>) -> anyhow::Result<String> {
        let remote_id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.put(&remote_id, content);
        Ok(remote_id)
    }
}
