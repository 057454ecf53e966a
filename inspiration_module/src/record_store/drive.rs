//! Google Drive v3 backed store.
//!
//! Every user gets one app folder in their own Drive holding the live list
//! (`inspirations.json`), the dated archive documents and an
//! `images/<YYYY>/<MM>` tree for uploads. Folders are looked up by name on
//! each call and created when missing.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{media_reference, RecordStore, StoreError, RECORDS_FILE_NAME};
use crate::google_auth::{GoogleAuthError, GoogleOAuthGate};
use crate::record::InspirationRecord;

pub const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com";
pub const DRIVE_FOLDER_NAME: &str = "Inspiration Helper";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Clone)]
pub struct GoogleDriveStore {
    auth: GoogleOAuthGate,
    client: Client,
    base_url: String,
}

impl GoogleDriveStore {
    pub fn new(auth: GoogleOAuthGate) -> Self {
        Self::with_base_url(auth, DEFAULT_DRIVE_BASE_URL)
    }

    pub fn with_base_url(auth: GoogleOAuthGate, base_url: &str) -> Self {
        Self {
            auth,
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn token(&self, user_id: &str) -> Result<String, StoreError> {
        self.auth.access_token(user_id).await.map_err(|err| match err {
            GoogleAuthError::NotAuthorized(user) => StoreError::NotAuthorized(user),
            other => StoreError::Remote(other.to_string()),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn upload_url(&self, file_id: &str) -> String {
        format!(
            "{}/upload/drive/v3/files/{}?uploadType=media",
            self.base_url, file_id
        )
    }

    async fn find(
        &self,
        token: &str,
        name: &str,
        parent: Option<&str>,
        folder: bool,
    ) -> Result<Option<String>, StoreError> {
        let mut query = format!("name='{}' and trashed=false", escape_query(name));
        if folder {
            query.push_str(&format!(" and mimeType='{}'", FOLDER_MIME));
        }
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{}' in parents", escape_query(parent)));
        }
        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        let list: FileList = check(response).await?.json().await?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create(
        &self,
        token: &str,
        name: &str,
        parent: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut metadata = json!({ "name": name });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent]);
        }
        if let Some(mime_type) = mime_type {
            metadata["mimeType"] = json!(mime_type);
        }
        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(token)
            .json(&metadata)
            .send()
            .await?;
        let file: DriveFile = check(response).await?.json().await?;
        debug!("created drive file {} ({})", name, file.id);
        Ok(file.id)
    }

    async fn ensure_folder(
        &self,
        token: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, StoreError> {
        match self.find(token, name, parent, true).await? {
            Some(id) => Ok(id),
            None => self.create(token, name, parent, Some(FOLDER_MIME)).await,
        }
    }

    async fn write_media(
        &self,
        token: &str,
        file_id: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.upload_url(file_id))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Create `name` under `parent` or overwrite its content if it exists.
    async fn upsert_file(
        &self,
        token: &str,
        parent: &str,
        name: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let file_id = match self.find(token, name, Some(parent), false).await? {
            Some(id) => id,
            None => self.create(token, name, Some(parent), None).await?,
        };
        self.write_media(token, &file_id, body, content_type).await?;
        Ok(file_id)
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn check(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Remote(format!("HTTP {}: {}", status, body)))
}

#[async_trait]
impl RecordStore for GoogleDriveStore {
    async fn load_records(&self, user_id: &str) -> Result<Vec<InspirationRecord>, StoreError> {
        let token = self.token(user_id).await?;
        let root = self.ensure_folder(&token, DRIVE_FOLDER_NAME, None).await?;
        let Some(file_id) = self.find(&token, RECORDS_FILE_NAME, Some(&root), false).await? else {
            return Ok(Vec::new());
        };
        let response = self
            .client
            .get(format!("{}/{}", self.files_url(), file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let raw = check(response).await?.text().await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save_records(
        &self,
        user_id: &str,
        records: &[InspirationRecord],
    ) -> Result<(), StoreError> {
        let token = self.token(user_id).await?;
        let root = self.ensure_folder(&token, DRIVE_FOLDER_NAME, None).await?;
        let body = serde_json::to_vec_pretty(records)?;
        self.upsert_file(&token, &root, RECORDS_FILE_NAME, body, "application/json")
            .await?;
        debug!("saved {} records to drive for {}", records.len(), user_id);
        Ok(())
    }

    async fn save_archive(
        &self,
        user_id: &str,
        document: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let token = self.token(user_id).await?;
        let root = self.ensure_folder(&token, DRIVE_FOLDER_NAME, None).await?;
        self.upsert_file(
            &token,
            &root,
            name,
            document.as_bytes().to_vec(),
            "text/markdown",
        )
        .await?;
        info!("archived {} to drive for {}", name, user_id);
        Ok(())
    }

    async fn upload_media(
        &self,
        local_ref: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<String, StoreError> {
        let body = tokio::fs::read(local_ref).await?;
        let token = self.token(user_id).await?;
        let now = Utc::now();
        let root = self.ensure_folder(&token, DRIVE_FOLDER_NAME, None).await?;
        let images = self.ensure_folder(&token, "images", Some(&root)).await?;
        let year = self
            .ensure_folder(&token, &now.year().to_string(), Some(&images))
            .await?;
        let month = self
            .ensure_folder(&token, &format!("{:02}", now.month()), Some(&year))
            .await?;
        let file_id = self.create(&token, display_name, Some(&month), None).await?;
        self.write_media(&token, &file_id, body, "image/jpeg").await?;
        let reference = media_reference(now, display_name);
        info!("uploaded image {} for {}", reference, user_id);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthorizationGate;
    use crate::google_auth::GoogleAuthConfig;
    use mockito::{Matcher, ServerGuard};

    async fn authorized_gate(server: &mut ServerGuard) -> GoogleOAuthGate {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"drive-token","expires_in":3600}"#)
            .create_async()
            .await;
        let gate = GoogleOAuthGate::new(GoogleAuthConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            token_url: format!("{}/token", server.url()),
            ..GoogleAuthConfig::default()
        })
        .expect("gate");
        assert!(gate.complete_authorization("code", "U1").await);
        gate
    }

    #[tokio::test]
    async fn load_without_file_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let gate = authorized_gate(&mut server).await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer drive-token")
            .with_status(200)
            .with_body(r#"{"files":[]}"#)
            .expect_at_least(1)
            .create_async()
            .await;
        server
            .mock("POST", "/drive/v3/files")
            .with_status(200)
            .with_body(r#"{"id":"root-folder"}"#)
            .create_async()
            .await;

        let store = GoogleDriveStore::with_base_url(gate, &server.url());
        let records = store.load_records("U1").await.expect("load");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn load_reads_existing_blob() {
        let mut server = mockito::Server::new_async().await;
        let gate = authorized_gate(&mut server).await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":[{"id":"f1","name":"x"}]}"#)
            .expect_at_least(1)
            .create_async()
            .await;
        server
            .mock("GET", "/drive/v3/files/f1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body(
                r#"[{"id":"001","content":"idea","tags":["a"],"timestamp":"2025-07-19T08:30:00Z","image":null}]"#,
            )
            .create_async()
            .await;

        let store = GoogleDriveStore::with_base_url(gate, &server.url());
        let records = store.load_records("U1").await.expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "idea");
    }

    #[tokio::test]
    async fn unauthorized_user_is_rejected_before_any_request() {
        let server = mockito::Server::new_async().await;
        let gate = GoogleOAuthGate::new(GoogleAuthConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..GoogleAuthConfig::default()
        })
        .expect("gate");
        let store = GoogleDriveStore::with_base_url(gate, &server.url());
        let result = store.save_records("U9", &[]).await;
        assert!(matches!(result, Err(StoreError::NotAuthorized(_))));
    }

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(escape_query("it's"), "it\\'s");
    }
}
