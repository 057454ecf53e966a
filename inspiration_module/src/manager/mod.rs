//! Record management and the deferred-authorization flow.
//!
//! Every operation first asks the [`AuthorizationGate`]. Unauthorized saves
//! are parked and replayed once the OAuth callback succeeds; every other
//! operation just reports the authorization URL. Authorized operations run
//! the daily rollover before touching the live list.

mod types;


use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::archive;
use crate::auth::AuthorizationGate;
use crate::id_allocator::next_id;
use crate::pending_cache::ExpiringCache;
use crate::record::{InspirationRecord, UserProfile};
use crate::record_store::RecordStore;
use crate::tags::{compose_text, parse_tags};

pub use types::{
    AuthorizationResult, ListPage, ManagerConfig, ManagerError, Outcome, PendingImage,
    PendingSaveInput, PurgeStats, SearchResults, DEFAULT_LIST_LIMIT, PENDING_IMAGE_TTL,
    PENDING_INPUT_TTL,
};

pub struct InspirationManager {
    store: Arc<dyn RecordStore>,
    gate: Arc<dyn AuthorizationGate>,
    pending_images: ExpiringCache<PendingImage>,
    pending_inputs: ExpiringCache<PendingSaveInput>,
    list_limit: usize,
}

impl InspirationManager {
    pub fn new(store: Arc<dyn RecordStore>, gate: Arc<dyn AuthorizationGate>) -> Self {
        Self::with_config(store, gate, ManagerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn RecordStore>,
        gate: Arc<dyn AuthorizationGate>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            gate,
            pending_images: ExpiringCache::new(config.pending_image_ttl),
            pending_inputs: ExpiringCache::new(config.pending_input_ttl),
            list_limit: config.list_limit,
        }
    }

    pub fn is_authorized(&self, user_id: &str) -> bool {
        self.gate.is_authorized(user_id)
    }

    pub fn authorization_url(&self, user_id: &str) -> String {
        self.gate.authorization_url(user_id)
    }

    /// Save `text` as a new record, attaching the held image if there is one.
    pub async fn save(&self, user_id: &str, text: &str) -> Outcome<InspirationRecord> {
        self.save_with(user_id, text, None, false).await
    }

    async fn save_with(
        &self,
        user_id: &str,
        text: &str,
        parked_image: Option<PendingImage>,
        skip_auth: bool,
    ) -> Outcome<InspirationRecord> {
        let parsed = parse_tags(text);
        if !skip_auth && !self.gate.is_authorized(user_id) {
            let image = parked_image.or_else(|| self.pending_images.take(user_id));
            self.pending_inputs.insert(
                user_id,
                PendingSaveInput {
                    content: parsed.clean_content,
                    tags: parsed.tags,
                    image,
                    created_at: Utc::now(),
                },
            );
            info!("parked save input for unauthorized user {}", user_id);
            return Outcome::NeedsAuth {
                auth_url: self.gate.authorization_url(user_id),
            };
        }

        let has_image = parked_image.is_some() || self.pending_images.get(user_id).is_some();
        if parsed.clean_content.is_empty() && !has_image {
            return Outcome::Failed(ManagerError::EmptyContent);
        }

        let mut records = match self.live_records(user_id).await {
            Ok(records) => records,
            Err(err) => return Outcome::Failed(err),
        };

        let image = match parked_image.or_else(|| self.pending_images.take(user_id)) {
            Some(pending) => self.upload_image(user_id, &pending).await,
            None => None,
        };

        let record = InspirationRecord {
            id: next_id(&records),
            content: parsed.clean_content,
            tags: parsed.tags,
            timestamp: Utc::now(),
            last_modified: None,
            image,
        };
        records.push(record.clone());
        if let Err(err) = self.store.save_records(user_id, &records).await {
            return Outcome::Failed(err.into());
        }
        info!("saved inspiration #{} for user {}", record.id, user_id);
        Outcome::Success(record)
    }

    /// Upload a held image. Failures are logged and the save goes on without it.
    async fn upload_image(&self, user_id: &str, pending: &PendingImage) -> Option<String> {
        match self
            .store
            .upload_media(&pending.local_ref, user_id, &pending.display_name)
            .await
        {
            Ok(reference) => Some(reference),
            Err(err) => {
                warn!(
                    "image upload failed for user {} ({}): {}",
                    user_id, pending.display_name, err
                );
                None
            }
        }
    }

    /// Most recent records first, optionally only those carrying `tag`.
    pub async fn list(
        &self,
        user_id: &str,
        tag: Option<&str>,
        limit: Option<usize>,
    ) -> Outcome<ListPage> {
        if let Some(outcome) = self.require_auth(user_id) {
            return outcome;
        }
        self.list_records(user_id, tag, limit).await.into()
    }

    /// Replace the content and tags of record `id`. Image and timestamp stay.
    pub async fn edit(
        &self,
        user_id: &str,
        id: &str,
        new_text: &str,
    ) -> Outcome<InspirationRecord> {
        if let Some(outcome) = self.require_auth(user_id) {
            return outcome;
        }
        self.edit_record(user_id, id, new_text).await.into()
    }

    /// Remove record `id`. Surviving ids are not renumbered.
    pub async fn delete(&self, user_id: &str, id: &str) -> Outcome<InspirationRecord> {
        if let Some(outcome) = self.require_auth(user_id) {
            return outcome;
        }
        self.delete_record(user_id, id).await.into()
    }

    pub async fn profile(&self, user_id: &str) -> Outcome<UserProfile> {
        if let Some(outcome) = self.require_auth(user_id) {
            return outcome;
        }
        self.build_profile(user_id).await.into()
    }

    /// Case-insensitive substring match over content and tags of the live list.
    pub async fn search(&self, user_id: &str, keyword: &str) -> Outcome<SearchResults> {
        if let Some(outcome) = self.require_auth(user_id) {
            return outcome;
        }
        self.search_records(user_id, keyword).await.into()
    }

    async fn list_records(
        &self,
        user_id: &str,
        tag: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ListPage, ManagerError> {
        let mut records = self.live_records(user_id).await?;
        if let Some(tag) = tag.filter(|tag| !tag.is_empty()) {
            records.retain(|record| record.has_tag(tag));
        }
        sort_newest_first(&mut records);
        let total = records.len();
        records.truncate(limit.unwrap_or(self.list_limit));
        Ok(ListPage {
            inspirations: records,
            total,
        })
    }

    async fn edit_record(
        &self,
        user_id: &str,
        id: &str,
        new_text: &str,
    ) -> Result<InspirationRecord, ManagerError> {
        let mut records = self.live_records(user_id).await?;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| ManagerError::NotFound { id: id.to_string() })?;
        let parsed = parse_tags(new_text);
        record.content = parsed.clean_content;
        record.tags = parsed.tags;
        record.last_modified = Some(Utc::now());
        let updated = record.clone();
        self.store.save_records(user_id, &records).await?;
        info!("edited inspiration #{} for user {}", id, user_id);
        Ok(updated)
    }

    async fn delete_record(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<InspirationRecord, ManagerError> {
        let mut records = self.live_records(user_id).await?;
        let index = records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| ManagerError::NotFound { id: id.to_string() })?;
        let removed = records.remove(index);
        self.store.save_records(user_id, &records).await?;
        info!("deleted inspiration #{} for user {}", id, user_id);
        Ok(removed)
    }

    async fn build_profile(&self, user_id: &str) -> Result<UserProfile, ManagerError> {
        let records = self.live_records(user_id).await?;
        let distinct_tags: HashSet<&str> = records
            .iter()
            .flat_map(|record| record.tags.iter().map(String::as_str))
            .collect();
        Ok(UserProfile {
            user_id: user_id.to_string(),
            total_inspirations: records.len(),
            total_tags: distinct_tags.len(),
            total_images: records.iter().filter(|record| record.image.is_some()).count(),
            registration_time: records.iter().map(|record| record.timestamp).min(),
            is_authorized: true,
        })
    }

    async fn search_records(
        &self,
        user_id: &str,
        keyword: &str,
    ) -> Result<SearchResults, ManagerError> {
        let keyword = keyword.trim();
        let needle = keyword.to_lowercase();
        let mut records = self.live_records(user_id).await?;
        records.retain(|record| {
            record.content.to_lowercase().contains(&needle)
                || record
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        });
        sort_newest_first(&mut records);
        Ok(SearchResults {
            inspirations: records,
            keyword: keyword.to_string(),
        })
    }

    /// Handle an OAuth callback for `user_id`.
    ///
    /// On success any parked input is replayed exactly once and then cleared,
    /// whatever the replay outcome. A failed exchange leaves it parked.
    pub async fn complete_authorization(&self, code: &str, user_id: &str) -> AuthorizationResult {
        if !self.gate.complete_authorization(code, user_id).await {
            warn!("authorization callback failed for user {}", user_id);
            return AuthorizationResult::default();
        }

        let Some(parked) = self.pending_inputs.take(user_id) else {
            return AuthorizationResult {
                authorized: true,
                ..AuthorizationResult::default()
            };
        };

        info!("replaying parked save input for user {}", user_id);
        let text = compose_text(&parked.content, &parked.tags);
        let image = parked.image.or_else(|| self.pending_images.take(user_id));
        let outcome = self.save_with(user_id, &text, image.clone(), true).await;
        match outcome {
            Outcome::Success(record) => AuthorizationResult {
                authorized: true,
                auto_saved: true,
                inspiration: Some(record),
                consumed_image: image,
            },
            other => {
                if let Some(err) = other.error() {
                    warn!("parked save replay failed for user {}: {}", user_id, err);
                }
                AuthorizationResult {
                    authorized: true,
                    auto_saved: false,
                    inspiration: None,
                    consumed_image: image,
                }
            }
        }
    }

    /// Hold an image for the user's next save. Returns the image it replaced.
    pub fn hold_image(
        &self,
        user_id: &str,
        local_ref: &str,
        display_name: &str,
    ) -> Option<PendingImage> {
        let previous = self.pending_images.take(user_id);
        self.pending_images.insert(
            user_id,
            PendingImage {
                local_ref: local_ref.to_string(),
                display_name: display_name.to_string(),
                created_at: Utc::now(),
            },
        );
        debug!("holding image {} for user {}", display_name, user_id);
        previous
    }

    pub fn pending_image(&self, user_id: &str) -> Option<PendingImage> {
        self.pending_images.get(user_id)
    }

    /// Discard the held image and hand it back so the caller can clean up.
    pub fn drop_image(&self, user_id: &str) -> Option<PendingImage> {
        self.pending_images.take(user_id)
    }

    pub fn pending_input(&self, user_id: &str) -> Option<PendingSaveInput> {
        self.pending_inputs.get(user_id)
    }

    pub fn purge_expired(&self) -> PurgeStats {
        let stats = PurgeStats {
            images: self.pending_images.purge_expired(),
            inputs: self.pending_inputs.purge_expired(),
        };
        if stats.images > 0 || stats.inputs > 0 {
            debug!(
                "purged {} pending images and {} pending inputs",
                stats.images, stats.inputs
            );
        }
        stats
    }

    fn require_auth<T>(&self, user_id: &str) -> Option<Outcome<T>> {
        if self.gate.is_authorized(user_id) {
            None
        } else {
            Some(Outcome::NeedsAuth {
                auth_url: self.gate.authorization_url(user_id),
            })
        }
    }

    /// Live list after the rollover check for today's UTC date.
    async fn live_records(&self, user_id: &str) -> Result<Vec<InspirationRecord>, ManagerError> {
        let (records, _) = archive::rollover(self.store.as_ref(), user_id, today()).await?;
        Ok(records)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn sort_newest_first(records: &mut [InspirationRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
