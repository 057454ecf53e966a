pub mod archive;
pub mod auth;
pub mod command;
pub mod google_auth;
pub mod id_allocator;
pub mod pending_cache;
pub mod record;
pub mod record_store;
pub mod service;
pub mod tags;

mod manager;

pub use manager::{
    AuthorizationResult, InspirationManager, ListPage, ManagerConfig, ManagerError, Outcome,
    PendingImage, PendingSaveInput, PurgeStats, SearchResults, DEFAULT_LIST_LIMIT,
    PENDING_IMAGE_TTL, PENDING_INPUT_TTL,
};
