//! Dropbox-backed [`RemoteStore`].
//!
//! Talks to the Dropbox HTTP API directly: a refresh-token OAuth2 exchange
//! performed once per process, `files/get_metadata` for the existence
//! check, and `files/upload` in overwrite mode for the mirror pushes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{RemoteError, RemoteStore};
use crate::config::RemoteConfig;

const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
const METADATA_URL: &str = "https://api.dropboxapi.com/2/files/get_metadata";
const UPLOAD_URL: &str = "https://content.dropboxapi.com/2/files/upload";

pub struct DropboxStore {
    client: reqwest::Client,
    app_key: String,
    app_secret: String,
    refresh_token: String,
    // Short-lived bearer token, fetched lazily and reused for the rest of
    // the run. A run is far shorter than the token lifetime.
    access_token: OnceCell<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl DropboxStore {
    pub fn new(cfg: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            app_key: cfg.app_key.clone(),
            app_secret: cfg.app_secret.clone(),
            refresh_token: cfg.refresh_token.clone(),
            access_token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str, RemoteError> {
        self.access_token
            .get_or_try_init(|| async {
                tracing::debug!("exchanging refresh token for access token");
                let resp = self
                    .client
                    .post(TOKEN_URL)
                    .basic_auth(&self.app_key, Some(&self.app_secret))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", self.refresh_token.as_str()),
                    ])
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(RemoteError::Auth(format!(
                        "token endpoint returned {status}: {body}"
                    )));
                }
                let token: TokenResponse = resp.json().await?;
                Ok(token.access_token)
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl RemoteStore for DropboxStore {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(METADATA_URL)
            .bearer_auth(token)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }

        let body = resp.text().await.unwrap_or_default();
        // Dropbox reports a missing path as HTTP 409 with a structured
        // GetMetadataError; that is the only case treated as "absent".
        if status.as_u16() == 409 && body.contains("path/not_found") {
            return Ok(false);
        }
        Err(RemoteError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn upload_overwrite(&self, path: &str, body: Vec<u8>) -> Result<(), RemoteError> {
        let token = self.access_token().await?;
        let api_arg = serde_json::json!({
            "path": path,
            "mode": "overwrite",
            "mute": true,
        });
        let resp = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(token)
            .header("Dropbox-API-Arg", api_arg.to_string())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
