use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info};

use super::{media_reference, validate_user_id, RecordStore, StoreError, RECORDS_FILE_NAME};
use crate::record::InspirationRecord;

/// Filesystem store rooted at one directory, one subdirectory per user:
///
/// ```text
/// <root>/<user>/inspirations.json
/// <root>/<user>/archives/<name>
/// <root>/<user>/images/<YYYY>/<MM>/<display name>
/// ```
#[derive(Debug, Clone)]
pub struct LocalRecordStore {
    root: PathBuf,
}

impl LocalRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(validate_user_id(user_id)?))
    }

    pub fn records_path(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.user_dir(user_id)?.join(RECORDS_FILE_NAME))
    }

    pub fn archive_path(&self, user_id: &str, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self.user_dir(user_id)?.join("archives").join(file_name_only(name)?))
    }
}

fn file_name_only(name: &str) -> Result<&str, StoreError> {
    Path::new(name)
        .file_name()
        .and_then(|value| value.to_str())
        .filter(|value| *value == name)
        .ok_or_else(|| StoreError::Io(io::Error::other(format!("invalid file name: {}", name))))
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn load_records(&self, user_id: &str) -> Result<Vec<InspirationRecord>, StoreError> {
        let path = self.records_path(user_id)?;
        match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no live records for user {} yet", user_id);
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save_records(
        &self,
        user_id: &str,
        records: &[InspirationRecord],
    ) -> Result<(), StoreError> {
        let path = self.records_path(user_id)?;
        let body = serde_json::to_vec_pretty(records)?;
        write_atomic(&path, &body).await?;
        debug!(
            "wrote {} records for user {} to {}",
            records.len(),
            user_id,
            path.display()
        );
        Ok(())
    }

    async fn save_archive(
        &self,
        user_id: &str,
        document: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let path = self.archive_path(user_id, name)?;
        write_atomic(&path, document.as_bytes()).await?;
        info!("archived to {} ({} bytes)", path.display(), document.len());
        Ok(())
    }

    async fn upload_media(
        &self,
        local_ref: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<String, StoreError> {
        let reference = media_reference(Utc::now(), file_name_only(display_name)?);
        let target = self.user_dir(user_id)?.join(&reference);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local_ref, &target).await?;
        info!("stored image {} for user {}", reference, user_id);
        Ok(reference)
    }
}
