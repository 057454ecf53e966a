#![allow(dead_code)]

use std::collections::HashSet;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use inspiration_module::auth::AuthorizationGate;
use inspiration_module::google_auth::GoogleAuthConfig;
use inspiration_module::service::{ServiceConfig, StoreKind};

pub const AUTH_URL: &str = "https://accounts.example/o/oauth2/auth";
pub const GOOD_CODE: &str = "good-code";

/// Authorization gate driven by the test: users start unauthorized and
/// become authorized when the callback carries [`GOOD_CODE`].
#[derive(Default)]
pub struct ScriptedGate {
    authorized: Mutex<HashSet<String>>,
}

impl ScriptedGate {
    pub fn authorize(&self, user_id: &str) {
        self.authorized.lock().unwrap().insert(user_id.to_string());
    }
}

#[async_trait]
impl AuthorizationGate for ScriptedGate {
    fn is_authorized(&self, user_id: &str) -> bool {
        self.authorized.lock().unwrap().contains(user_id)
    }

    fn authorization_url(&self, user_id: &str) -> String {
        format!("{}?state={}", AUTH_URL, user_id)
    }

    async fn complete_authorization(&self, code: &str, user_id: &str) -> bool {
        if code != GOOD_CODE {
            return false;
        }
        self.authorize(user_id);
        true
    }
}

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("free port")
}

/// Local-store service config rooted in `root`, without Google credentials.
pub fn local_service_config(root: &Path, port: u16) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port,
        store_kind: StoreKind::Local,
        data_root: root.join("data"),
        temp_dir: root.join("temp"),
        google: GoogleAuthConfig::default(),
        pending_image_ttl: Duration::from_secs(600),
        pending_input_ttl: Duration::from_secs(900),
        list_limit: 10,
        cache_sweep_interval: Duration::from_secs(60),
    }
}

pub async fn wait_for_health(base_url: &str, timeout: Duration) -> bool {
    let client = reqwest::Client::new();
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(response) = client.get(format!("{}/health", base_url)).send().await {
            if response.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
