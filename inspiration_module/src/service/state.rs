use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AllowAllGate, AuthorizationGate};
use crate::google_auth::GoogleOAuthGate;
use crate::manager::InspirationManager;
use crate::record_store::{GoogleDriveStore, LocalRecordStore, RecordStore};

use super::config::{ServiceConfig, StoreKind};
use super::temp_files::TempFiles;
use super::BoxError;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) config: Arc<ServiceConfig>,
    pub(super) manager: Arc<InspirationManager>,
    pub(super) temp_files: TempFiles,
}

/// Wire the store and authorization gate selected by `config` into a manager.
pub fn build_manager(config: &ServiceConfig) -> Result<InspirationManager, BoxError> {
    let store: Arc<dyn RecordStore>;
    let gate: Arc<dyn AuthorizationGate>;
    match config.store_kind {
        StoreKind::Drive => {
            let google = GoogleOAuthGate::new(config.google.clone())?;
            info!("storing inspirations in Google Drive");
            store = Arc::new(GoogleDriveStore::new(google.clone()));
            gate = Arc::new(google);
        }
        StoreKind::Local => {
            info!("storing inspirations under {}", config.data_root.display());
            store = Arc::new(LocalRecordStore::new(&config.data_root));
            if config.google.is_valid() {
                gate = Arc::new(GoogleOAuthGate::new(config.google.clone())?);
            } else {
                warn!("Google credentials not set; every user is treated as authorized");
                gate = Arc::new(AllowAllGate);
            }
        }
    }
    Ok(InspirationManager::with_config(
        store,
        gate,
        config.manager_config(),
    ))
}
