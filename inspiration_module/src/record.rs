use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One saved inspiration in a user's live list.
///
/// Serialized with the camelCase field names of the stored JSON blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspirationRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: Option<String>,
}

impl InspirationRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

/// Statistics recomputed from the live list on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub total_inspirations: usize,
    pub total_tags: usize,
    pub total_images: usize,
    /// Earliest timestamp among live records; moves forward after rollover.
    pub registration_time: Option<DateTime<Utc>>,
    pub is_authorized: bool,
}
