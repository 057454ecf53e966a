//! Persistence for the live record list, archives and uploaded media.
//!
//! Stores only offer whole-list replace semantics. Callers do
//! read-modify-write on the full list with no locking, so two concurrent
//! writers for the same user can overwrite each other; id uniqueness holds
//! only while a user's commands are handled one at a time.

mod drive;
mod local;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use crate::record::InspirationRecord;

pub use drive::{GoogleDriveStore, DEFAULT_DRIVE_BASE_URL, DRIVE_FOLDER_NAME};
pub use local::LocalRecordStore;
pub use memory::MemoryRecordStore;

pub const RECORDS_FILE_NAME: &str = "inspirations.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("drive api error: {0}")]
    Remote(String),
    #[error("user not authorized: {0}")]
    NotAuthorized(String),
    #[error("invalid user id: {0}")]
    InvalidUser(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Full live list for `user_id`, oldest first. Empty when nothing was saved yet.
    async fn load_records(&self, user_id: &str) -> Result<Vec<InspirationRecord>, StoreError>;

    /// Replace the live list for `user_id`.
    async fn save_records(
        &self,
        user_id: &str,
        records: &[InspirationRecord],
    ) -> Result<(), StoreError>;

    /// Persist a rendered archive document under `name`, separate from the live list.
    async fn save_archive(&self, user_id: &str, document: &str, name: &str)
        -> Result<(), StoreError>;

    /// Upload a local file and return the reference stored on the record.
    async fn upload_media(
        &self,
        local_ref: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<String, StoreError>;
}

/// `images/<YYYY>/<MM>/<display_name>` for an upload made at `at`.
pub fn media_reference(at: DateTime<Utc>, display_name: &str) -> String {
    format!(
        "images/{}/{:02}/{}",
        at.year(),
        at.month(),
        display_name
    )
}

/// Reject user ids that cannot be used as a single path component.
pub(crate) fn validate_user_id(user_id: &str) -> Result<&str, StoreError> {
    let trimmed = user_id.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidUser(user_id.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn media_reference_uses_year_and_padded_month() {
        let at = Utc.with_ymd_and_hms(2025, 7, 19, 10, 0, 0).unwrap();
        assert_eq!(
            media_reference(at, "inspiration_1.jpg"),
            "images/2025/07/inspiration_1.jpg"
        );
    }

    #[test]
    fn validate_user_id_rejects_path_tricks() {
        assert!(validate_user_id("U4af4980629").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("a\\b").is_err());
    }
}
