use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::record::InspirationRecord;
use crate::record_store::StoreError;

pub const DEFAULT_LIST_LIMIT: usize = 10;
pub const PENDING_IMAGE_TTL: Duration = Duration::from_secs(10 * 60);
pub const PENDING_INPUT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub pending_image_ttl: Duration,
    pub pending_input_ttl: Duration,
    pub list_limit: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            pending_image_ttl: PENDING_IMAGE_TTL,
            pending_input_ttl: PENDING_INPUT_TTL,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// An image received from the user and waiting for the next save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingImage {
    pub local_ref: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A save attempted before the user authorized, replayed after the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSaveInput {
    pub content: String,
    pub tags: Vec<String>,
    pub image: Option<PendingImage>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub inspirations: Vec<InspirationRecord>,
    /// Matches before the limit was applied.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub inspirations: Vec<InspirationRecord>,
    pub keyword: String,
}

/// What happened when an OAuth callback came back for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub authorized: bool,
    pub auto_saved: bool,
    pub inspiration: Option<InspirationRecord>,
    /// Held image the replay took, whether or not its upload went through.
    #[serde(skip)]
    pub consumed_image: Option<PendingImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PurgeStats {
    pub images: usize,
    pub inputs: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("no inspiration with id #{id}")]
    NotFound { id: String },
    #[error("inspiration content is empty")]
    EmptyContent,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ManagerError {
    pub fn kind(&self) -> &'static str {
        match self {
            ManagerError::NotFound { .. } => "not_found",
            ManagerError::EmptyContent => "empty_content",
            ManagerError::Store(_) => "store_failure",
        }
    }
}

/// Result of a manager operation.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    /// The user has to authorize first; not an error.
    NeedsAuth { auth_url: String },
    Failed(ManagerError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn needs_auth(&self) -> bool {
        matches!(self, Outcome::NeedsAuth { .. })
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ManagerError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Wire shape: `{success:true, ..data}`, `{success:false, needsAuth:true, authUrl}`
    /// or `{success:false, error, errorKind}`. `render` turns the payload into
    /// a JSON object whose fields are merged next to `success`.
    pub fn to_json_with(&self, render: impl FnOnce(&T) -> Value) -> Value {
        match self {
            Outcome::Success(value) => {
                let mut body = Map::new();
                body.insert("success".to_string(), Value::Bool(true));
                match render(value) {
                    Value::Object(fields) => body.extend(fields),
                    Value::Null => {}
                    other => {
                        body.insert("data".to_string(), other);
                    }
                }
                Value::Object(body)
            }
            Outcome::NeedsAuth { auth_url } => json!({
                "success": false,
                "needsAuth": true,
                "authUrl": auth_url,
            }),
            Outcome::Failed(err) => json!({
                "success": false,
                "error": err.to_string(),
                "errorKind": err.kind(),
            }),
        }
    }
}

impl<T: Serialize> Outcome<T> {
    pub fn to_json(&self) -> Value {
        self.to_json_with(|value| serde_json::to_value(value).unwrap_or(Value::Null))
    }
}

impl<T> From<Result<T, ManagerError>> for Outcome<T> {
    fn from(result: Result<T, ManagerError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failed(err),
        }
    }
}
