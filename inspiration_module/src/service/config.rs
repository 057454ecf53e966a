use std::env;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::google_auth::GoogleAuthConfig;
use crate::manager::{ManagerConfig, DEFAULT_LIST_LIMIT, PENDING_IMAGE_TTL, PENDING_INPUT_TTL};

use super::BoxError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Where records, archives and images are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Local,
    Drive,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StoreKind::Local),
            "drive" | "google_drive" => Ok(StoreKind::Drive),
            other => Err(format!("unknown INSPIRATION_STORE '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub store_kind: StoreKind,
    /// Root of the local store; unused with Drive storage.
    pub data_root: PathBuf,
    /// Directory inbound images are downloaded to before they are saved.
    pub temp_dir: PathBuf,
    pub google: GoogleAuthConfig,
    pub pending_image_ttl: Duration,
    pub pending_input_ttl: Duration,
    pub list_limit: usize,
    pub cache_sweep_interval: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let host = env::var("INSPIRATION_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INSPIRATION_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let store_kind = match env_var_non_empty("INSPIRATION_STORE") {
            Some(value) => value.parse::<StoreKind>()?,
            None => StoreKind::Local,
        };
        let data_root =
            resolve_path(env::var("INSPIRATION_DATA_ROOT").unwrap_or_else(|_| "data".to_string()))?;
        let temp_dir =
            resolve_path(env::var("INSPIRATION_TEMP_DIR").unwrap_or_else(|_| "temp".to_string()))?;

        let google =
            GoogleAuthConfig::from_env(&format!("http://localhost:{}/oauth/callback", port));
        if store_kind == StoreKind::Drive && !google.is_valid() {
            return Err(
                "INSPIRATION_STORE=drive requires GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET".into(),
            );
        }

        Ok(Self {
            host,
            port,
            store_kind,
            data_root,
            temp_dir,
            google,
            pending_image_ttl: env_secs("PENDING_IMAGE_TTL_SECS", PENDING_IMAGE_TTL),
            pending_input_ttl: env_secs("PENDING_INPUT_TTL_SECS", PENDING_INPUT_TTL),
            list_limit: env::var("LIST_LIMIT")
                .ok()
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_LIST_LIMIT),
            cache_sweep_interval: env_secs(
                "CACHE_SWEEP_INTERVAL_SECS",
                DEFAULT_CACHE_SWEEP_INTERVAL,
            ),
        })
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            pending_image_ttl: self.pending_image_ttl,
            pending_input_ttl: self.pending_input_ttl,
            list_limit: self.list_limit,
        }
    }

    /// Age after which a file left in the temp dir can no longer be referenced.
    pub fn temp_file_max_age(&self) -> Duration {
        self.pending_image_ttl.max(self.pending_input_ttl)
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
