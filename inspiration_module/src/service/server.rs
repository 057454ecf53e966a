use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::ServiceConfig;
use super::dispatch::dispatch_message;
use super::state::{build_manager, AppState};
use super::temp_files::TempFiles;
use super::BoxError;

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let manager = Arc::new(build_manager(&config)?);
    let temp_files = TempFiles::new(&config.temp_dir);
    temp_files.ensure_dir().await?;

    let state = AppState {
        config: config.clone(),
        manager,
        temp_files,
    };
    let sweeper = spawn_cache_sweep(state.clone());

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("inspiration service listening on {}", addr);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    sweeper.abort();
    serve_result?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/messages", post(post_message))
        .route("/images", post(post_image))
        .route("/oauth/callback", get(oauth_callback))
        .with_state(state)
}

/// Evict expired pending entries and stale temp files on a fixed tick.
fn spawn_cache_sweep(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.cache_sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.manager.purge_expired();
            match state
                .temp_files
                .sweep_older_than(state.config.temp_file_max_age())
                .await
            {
                Ok(0) => {}
                Ok(removed) => debug!("removed {} stale temp files", removed),
                Err(err) => warn!("temp file sweep failed: {}", err),
            }
        }
    })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest {
    user_id: String,
    text: String,
}

/// POST /messages
async fn post_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Response {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing userId").into_response();
    }
    let reply = dispatch_message(&state.manager, user_id, &request.text).await;
    if let Some(image) = &reply.released_image {
        state.temp_files.release(&image.local_ref).await;
    }
    (StatusCode::OK, Json(reply.body)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    user_id: String,
    local_path: String,
    display_name: Option<String>,
}

/// POST /images
async fn post_image(State(state): State<AppState>, Json(request): Json<ImageRequest>) -> Response {
    let user_id = request.user_id.trim();
    if user_id.is_empty() || request.local_path.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing userId or localPath").into_response();
    }
    let resolved = state.temp_files.resolve(&request.local_path).await;
    let Some(local_ref) = resolved.as_deref().and_then(|path| path.to_str()) else {
        warn!(
            "rejecting image {} for user {}: not a file in the temp dir",
            request.local_path, user_id
        );
        return (
            StatusCode::BAD_REQUEST,
            "localPath must name a file in the temp directory",
        )
            .into_response();
    };
    let display_name = request
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("inspiration_{}.jpg", Utc::now().timestamp_millis()));

    if let Some(previous) = state
        .manager
        .hold_image(user_id, local_ref, &display_name)
    {
        state.temp_files.release(&previous.local_ref).await;
    }
    let image = state.manager.pending_image(user_id);
    (
        StatusCode::OK,
        Json(json!({ "success": true, "image": image })),
    )
        .into_response()
}

/// Query parameters Google sends back to the redirect URI.
#[derive(Debug, Deserialize)]
struct OAuthCallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /oauth/callback?code=...&state=<userId>
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    if let Some(err) = params.error {
        warn!("OAuth callback returned error: {}", err);
        return (StatusCode::BAD_REQUEST, format!("Authorization error: {}", err)).into_response();
    }
    let (Some(code), Some(user_id)) = (
        params.code.filter(|code| !code.is_empty()),
        params.state.filter(|user| !user.is_empty()),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing authorization code or state",
        )
            .into_response();
    };

    let result = state.manager.complete_authorization(&code, &user_id).await;
    if !result.authorized {
        error!("authorization failed for user {}", user_id);
        return (
            StatusCode::BAD_REQUEST,
            "Authorization failed. Please try again.",
        )
            .into_response();
    }
    if let Some(image) = &result.consumed_image {
        state.temp_files.release(&image.local_ref).await;
    }

    let message = match result.inspiration {
        Some(record) => format!(
            "Authorization complete. Your pending inspiration was saved as #{}.",
            record.id
        ),
        None => "Authorization complete. You can go back to the chat.".to_string(),
    };
    (StatusCode::OK, message).into_response()
}
