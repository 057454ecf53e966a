mod config;
mod dispatch;
mod server;
mod state;
mod temp_files;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{ServiceConfig, StoreKind, DEFAULT_CACHE_SWEEP_INTERVAL, DEFAULT_PORT};
pub use dispatch::{dispatch_message, Dispatched};
pub use server::run_server;
pub use state::build_manager;
