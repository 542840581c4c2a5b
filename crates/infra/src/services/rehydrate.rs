use crate::services::storage::IObjectStorage;
use capsule_keeper_domain::RemoteFileRef;
use capsule_keeper_utils::sanitize_file_name;
use chrono::Utc;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// One remote object materialized as a local temporary file
#[derive(Debug, Clone)]
pub struct RehydratedFile {
    pub local_path: PathBuf,
    /// The display name of the archived file, used for the attachment part
    /// instead of the synthetic local name
    pub original_name: String,
}

/// The rehydrated files of one reminder. Dropping the batch removes every
/// temporary file, so cleanup happens on every exit path, panics included.
#[derive(Debug, Default)]
pub struct RehydratedBatch {
    files: Vec<RehydratedFile>,
}

impl RehydratedBatch {
    pub fn cleanup(&mut self) {
        for file in &self.files {
            if file.local_path.exists() {
                if let Err(e) = std::fs::remove_file(&file.local_path) {
                    error!(
                        "Failed to remove temporary file: {:?}, error: {:?}",
                        file.local_path, e
                    );
                }
            }
        }
        self.files.clear();
    }
}

impl Deref for RehydratedBatch {
    type Target = [RehydratedFile];

    fn deref(&self) -> &Self::Target {
        &self.files
    }
}

impl Drop for RehydratedBatch {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Downloads archived objects back to local transient storage so they can be
/// attached to the reminder email.
pub struct FileRehydrator {
    storage: Arc<dyn IObjectStorage>,
    root: PathBuf,
}

impl FileRehydrator {
    pub fn new(storage: Arc<dyn IObjectStorage>, root: PathBuf) -> Self {
        Self { storage, root }
    }

    /// Fetches every referenced object, best effort. A failed download or
    /// write skips that file and continues; a partial batch is a normal
    /// outcome. When the destination directory cannot be created all
    /// downloads are skipped and the batch is empty, which is also non
    /// fatal: the email goes out without attachments.
    pub async fn fetch_all(&self, reminder_id: i64, refs: &[RemoteFileRef]) -> RehydratedBatch {
        let mut batch = RehydratedBatch::default();
        if refs.is_empty() {
            return batch;
        }

        if let Err(e) = std::fs::create_dir_all(&self.root) {
            error!(
                "Failed to create download directory: {:?}, error: {:?}. Skipping all attachments for reminder: {}",
                self.root, e, reminder_id
            );
            return batch;
        }

        info!(
            "Downloading {} archived files for reminder: {}",
            refs.len(),
            reminder_id
        );
        for (index, file_ref) in refs.iter().enumerate() {
            let local_name = format!(
                "dl_{}_{}_{}_{}",
                reminder_id,
                Utc::now().timestamp_millis(),
                index,
                sanitize_file_name(&file_ref.display_name)
            );
            let local_path = self.root.join(local_name);

            let content = match self.storage.download(&file_ref.remote_id).await {
                Ok(content) => content,
                Err(e) => {
                    error!(
                        "Download failed for remote id: {} ({}), error: {:?}. Continuing with the remaining files",
                        file_ref.remote_id, file_ref.display_name, e
                    );
                    continue;
                }
            };
            match std::fs::write(&local_path, &content) {
                Ok(()) => {
                    info!(
                        "Downloaded {} to {:?} ({} bytes)",
                        file_ref.display_name,
                        local_path,
                        content.len()
                    );
                    batch.files.push(RehydratedFile {
                        local_path,
                        original_name: file_ref.display_name.clone(),
                    });
                }
                Err(e) => {
                    error!(
                        "Failed to persist download for {} to {:?}: {:?}",
                        file_ref.display_name, local_path, e
                    );
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::services::storage::InMemoryObjectStorage;

    fn file_ref(remote_id: &str, display_name: &str) -> RemoteFileRef {
        RemoteFileRef {
            remote_id: remote_id.into(),
            display_name: display_name.into(),
        }
    }

    fn populated_storage() -> Arc<InMemoryObjectStorage> {
        let storage = InMemoryObjectStorage::new();
        storage.put("r1", b"first".to_vec());
        storage.put("r2", b"second".to_vec());
        Arc::new(storage)
    }

    #[tokio::test]
    async fn materializes_files_with_sanitized_unique_names() {
        let tmp = tempfile::tempdir().unwrap();
        let rehydrator = FileRehydrator::new(populated_storage(), tmp.path().to_path_buf());

        let refs = vec![file_ref("r1", "my photo (1).png"), file_ref("r2", "letter.txt")];
        let batch = rehydrator.fetch_all(7, &refs).await;

        assert_eq!(batch.len(), 2);
        for file in batch.iter() {
            assert!(file.local_path.exists());
        }
        let name = batch[0].local_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dl_7_"));
        assert!(name.ends_with("my_photo__1_.png"));
        assert_eq!(batch[0].original_name, "my photo (1).png");
    }

    #[tokio::test]
    async fn skips_failed_downloads_and_keeps_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let rehydrator = FileRehydrator::new(populated_storage(), tmp.path().to_path_buf());

        let refs = vec![
            file_ref("r1", "a.txt"),
            file_ref("missing", "b.txt"),
            file_ref("r2", "c.txt"),
        ];
        let batch = rehydrator.fetch_all(1, &refs).await;

        assert_eq!(batch.len(), 2);
        let names: Vec<_> = batch.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn unusable_destination_directory_yields_empty_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let rehydrator = FileRehydrator::new(populated_storage(), blocker.join("downloads"));
        let batch = rehydrator.fetch_all(1, &[file_ref("r1", "a.txt")]).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_batch_removes_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let rehydrator = FileRehydrator::new(populated_storage(), tmp.path().to_path_buf());

        let refs = vec![file_ref("r1", "a.txt"), file_ref("r2", "b.txt")];
        let batch = rehydrator.fetch_all(1, &refs).await;
        let paths: Vec<_> = batch.iter().map(|f| f.local_path.clone()).collect();
        assert!(paths.iter().all(|p| p.exists()));

        drop(batch);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let rehydrator = FileRehydrator::new(populated_storage(), tmp.path().to_path_buf());

        let mut batch = rehydrator.fetch_all(1, &[file_ref("r1", "a.txt")]).await;
        batch.cleanup();
        batch.cleanup();
        assert!(batch.is_empty());
    }
}
