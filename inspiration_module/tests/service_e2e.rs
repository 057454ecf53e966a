mod test_support;

use std::time::Duration;

use inspiration_module::google_auth::GoogleAuthConfig;
use inspiration_module::service::run_server;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use test_support::{free_port, local_service_config, wait_for_health};

#[tokio::test]
async fn local_service_handles_image_and_commands() {
    let temp = tempfile::tempdir().expect("tempdir");
    let port = free_port();
    let config = local_service_config(temp.path(), port);
    let temp_dir = config.temp_dir.clone();
    let data_root = config.data_root.clone();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        run_server(config, async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    assert!(wait_for_health(&base_url, Duration::from_secs(10)).await);
    let client = reqwest::Client::new();

    let image_path = temp_dir.join("photo.jpg");
    std::fs::write(&image_path, b"jpeg bytes").expect("write image");
    let held: Value = client
        .post(format!("{}/images", base_url))
        .json(&json!({
            "userId": "U1",
            "localPath": image_path.to_str().unwrap(),
            "displayName": "sketch.jpg",
        }))
        .send()
        .await
        .expect("post image")
        .json()
        .await
        .expect("image json");
    assert_eq!(held["success"], true);
    assert_eq!(held["image"]["displayName"], "sketch.jpg");

    let saved: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "layout idea #ui /s" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("save json");
    assert_eq!(saved["success"], true);
    assert_eq!(saved["command"], "save");
    assert_eq!(saved["inspiration"]["id"], "001");
    let reference = saved["inspiration"]["image"].as_str().unwrap().to_string();
    assert!(reference.ends_with("/sketch.jpg"));
    assert!(data_root.join("U1").join(&reference).exists());
    assert!(!image_path.exists());

    let listed: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "#ui /l" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("list json");
    assert_eq!(listed["command"], "list");
    assert_eq!(listed["total"], 1);

    let chatter: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "hello there" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("chatter json");
    assert_eq!(chatter["success"], false);
    assert_eq!(chatter["error"], "no command");

    let missing = client
        .get(format!("{}/oauth/callback?state=U1", base_url))
        .send()
        .await
        .expect("callback");
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server stopped")
        .expect("join");
    assert!(result.is_ok());
}

#[tokio::test]
async fn image_outside_temp_dir_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let private = tempfile::tempdir().expect("tempdir");
    let secret = private.path().join("secret.txt");
    std::fs::write(&secret, b"server-private").expect("write secret");

    let port = free_port();
    let config = local_service_config(temp.path(), port);
    let temp_dir = config.temp_dir.clone();
    let data_root = config.data_root.clone();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        run_server(config, async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    assert!(wait_for_health(&base_url, Duration::from_secs(10)).await);
    let client = reqwest::Client::new();

    let escaping = format!(
        "{}/../../{}/secret.txt",
        temp_dir.display(),
        private.path().file_name().unwrap().to_str().unwrap()
    );
    for local_path in [secret.to_str().unwrap().to_string(), escaping] {
        let response = client
            .post(format!("{}/images", base_url))
            .json(&json!({ "userId": "U1", "localPath": local_path }))
            .send()
            .await
            .expect("post image");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    let saved: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "idea /s" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("save json");
    assert_eq!(saved["success"], true);
    assert!(saved["inspiration"]["image"].is_null());
    assert!(!data_root.join("U1").join("images").exists());
    assert!(secret.exists());

    let _ = shutdown_tx.send(());
    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server stopped")
        .expect("join");
    assert!(result.is_ok());
}

#[tokio::test]
async fn callback_releases_image_held_after_parking() {
    let mut oauth = mockito::Server::new_async().await;
    oauth
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.token","expires_in":3600}"#)
        .create_async()
        .await;

    let temp = tempfile::tempdir().expect("tempdir");
    let port = free_port();
    let mut config = local_service_config(temp.path(), port);
    config.google = GoogleAuthConfig {
        client_id: Some("client-id".to_string()),
        client_secret: Some("client-secret".to_string()),
        token_url: format!("{}/token", oauth.url()),
        ..GoogleAuthConfig::default()
    };
    let temp_dir = config.temp_dir.clone();
    let data_root = config.data_root.clone();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        run_server(config, async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    assert!(wait_for_health(&base_url, Duration::from_secs(10)).await);
    let client = reqwest::Client::new();

    let parked: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "night sketch #art /s" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("park json");
    assert_eq!(parked["needsAuth"], true);

    let image_path = temp_dir.join("late.jpg");
    std::fs::write(&image_path, b"jpeg bytes").expect("write image");
    let held = client
        .post(format!("{}/images", base_url))
        .json(&json!({
            "userId": "U1",
            "localPath": image_path.to_str().unwrap(),
            "displayName": "late.jpg",
        }))
        .send()
        .await
        .expect("post image");
    assert!(held.status().is_success());

    let callback = client
        .get(format!("{}/oauth/callback?code=abc&state=U1", base_url))
        .send()
        .await
        .expect("callback");
    assert!(callback.status().is_success());
    assert!(callback.text().await.expect("body").contains("#001"));
    assert!(!image_path.exists());

    let listed: Value = client
        .post(format!("{}/messages", base_url))
        .json(&json!({ "userId": "U1", "text": "/l" }))
        .send()
        .await
        .expect("post message")
        .json()
        .await
        .expect("list json");
    let reference = listed["inspirations"][0]["image"].as_str().unwrap();
    assert!(reference.ends_with("/late.jpg"));
    assert!(data_root.join("U1").join(reference).exists());

    let _ = shutdown_tx.send(());
    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server stopped")
        .expect("join");
    assert!(result.is_ok());
}
