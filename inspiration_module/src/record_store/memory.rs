use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{media_reference, RecordStore, StoreError};
use crate::record::InspirationRecord;

/// Process-local store. Counts writes and can be switched into failure
/// modes, which is what the manager tests lean on.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, Vec<InspirationRecord>>>,
    archives: Mutex<HashMap<String, Vec<(String, String)>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_uploads: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a user's live list without counting a write.
    pub fn seed(&self, user_id: &str, records: Vec<InspirationRecord>) {
        lock(&self.records).insert(user_id.to_string(), records);
    }

    pub fn records(&self, user_id: &str) -> Vec<InspirationRecord> {
        lock(&self.records)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// `(name, document)` pairs in the order they were archived.
    pub fn archives(&self, user_id: &str) -> Vec<(String, String)> {
        lock(&self.archives)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `save_records`/`save_archive` calls that succeeded.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load_records(&self, user_id: &str) -> Result<Vec<InspirationRecord>, StoreError> {
        Ok(self.records(user_id))
    }

    async fn save_records(
        &self,
        user_id: &str,
        records: &[InspirationRecord],
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.records).insert(user_id.to_string(), records.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_archive(
        &self,
        user_id: &str,
        document: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.archives)
            .entry(user_id.to_string())
            .or_default()
            .push((name.to_string(), document.to_string()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_media(
        &self,
        local_ref: &str,
        _user_id: &str,
        display_name: &str,
    ) -> Result<String, StoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "upload of {} rejected",
                local_ref
            )));
        }
        Ok(media_reference(Utc::now(), display_name))
    }
}
