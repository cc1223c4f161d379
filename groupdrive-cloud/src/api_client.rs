//! HTTP client for the group file server.
//!
//! Covers the group directory, encrypted upload/download, membership and the
//! file catalogue. Non-success responses carry `{ "message": ... }`, which is
//! surfaced verbatim.

use crate::config::CloudConfig;
use crate::directory::GroupDirectory;
use crate::error::{CloudError, CloudResult};
use crate::transfer::FileTransport;
use crate::types::*;
use groupdrive_crypto::EncryptedEnvelope;
use groupdrive_types::Identity;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for the group file server.
pub struct CloudApiClient {
    client: Client,
    config: CloudConfig,
}

impl CloudApiClient {
    pub fn new(config: CloudConfig) -> CloudResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    // ── Directory ──

    pub async fn get_group_members_public_keys(&self) -> CloudResult<Vec<DirectoryEntry>> {
        let unavailable = |e: CloudError| match e {
            CloudError::Api(message) => CloudError::DirectoryUnavailable(message),
            other => CloudError::DirectoryUnavailable(other.to_string()),
        };

        let resp = self
            .client
            .get(self.url("/api/get_group_members_public_keys"))
            .send()
            .await
            .map_err(|e| unavailable(e.into()))?;
        let resp = ensure_success(resp).await.map_err(unavailable)?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Resp {
            #[serde(default)]
            public_keys: Vec<DirectoryEntry>,
        }
        let data: Resp = resp.json().await.map_err(|e| unavailable(e.into()))?;
        debug!(members = data.public_keys.len(), "fetched group directory");
        Ok(data.public_keys)
    }

    // ── Transfers ──

    pub async fn upload_file(&self, payload: &UploadPayload) -> CloudResult<()> {
        let envelope = &payload.envelope;
        let ciphertext = envelope.encrypted_file()?.ciphertext;

        let file_part = Part::bytes(ciphertext)
            .file_name(payload.file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("email", payload.uploader.to_string())
            .part("file", file_part)
            .text("iv", envelope.iv.clone())
            .text("encryptedData", envelope.encrypted_data.clone())
            .text(
                "encryptedAesKeys",
                serde_json::to_string(&envelope.encrypted_aes_keys)?,
            )
            .text("recipients", serde_json::to_string(&payload.recipients)?);

        let resp = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        ensure_success(resp).await?;

        info!(
            file = %payload.file_name,
            recipients = payload.recipients.len(),
            "uploaded encrypted file"
        );
        Ok(())
    }

    /// Fetches an encrypted file. `None` when the server has no such file.
    pub async fn download_file(&self, req: &DownloadRequest) -> CloudResult<Option<DownloadedFile>> {
        let resp = self
            .client
            .post(self.url("/download"))
            .json(&serde_json::json!({
                "file_id": req.file_id,
                "file_name": req.file_name,
                "email": req.requester,
            }))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(file_id = %req.file_id, "download returned 404");
            return Ok(None);
        }
        let resp = ensure_success(resp).await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Resp {
            file_content: String,
            iv: String,
            #[serde(default)]
            encrypted_aes_keys: Value,
            #[serde(default)]
            uploader: Option<String>,
            #[serde(default)]
            recipients: Option<Value>,
        }
        let Some(data) = resp.json::<Option<Resp>>().await? else {
            debug!(file_id = %req.file_id, "download returned no data");
            return Ok(None);
        };

        let recipients = match data.recipients {
            Some(value) if !value.is_null() => Some(normalize_string_list(value)?),
            _ => None,
        };

        Ok(Some(DownloadedFile {
            envelope: EncryptedEnvelope {
                iv: data.iv,
                encrypted_data: data.file_content,
                encrypted_aes_keys: normalize_string_list(data.encrypted_aes_keys)?,
            },
            uploader: data.uploader.filter(|u| !u.is_empty()),
            recipients,
        }))
    }

    // ── Membership ──

    pub async fn add_user(&self, email: &Identity, public_key: &str) -> CloudResult<()> {
        let resp = self
            .client
            .post(self.url("/api/add_user"))
            .json(&serde_json::json!({ "email": email, "public_key": public_key }))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn remove_user(&self, email: &Identity) -> CloudResult<()> {
        let resp = self
            .client
            .post(self.url("/api/remove_user"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn user_exists(&self, email: &Identity) -> CloudResult<bool> {
        let resp = self
            .client
            .post(self.url("/api/user_exists"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        #[derive(Deserialize)]
        struct Resp {
            exists: bool,
        }
        let data: Resp = resp.json().await?;
        Ok(data.exists)
    }

    /// Registered members, in server order.
    pub async fn list_users(&self) -> CloudResult<Vec<Identity>> {
        let resp = self.client.get(self.url("/api/get_users")).send().await?;
        let resp = ensure_success(resp).await?;

        #[derive(Deserialize)]
        struct Member {
            email: Identity,
        }
        let members: Vec<Member> = resp.json().await?;
        debug!(members = members.len(), "fetched member list");
        Ok(members.into_iter().map(|m| m.email).collect())
    }

    // ── Catalogue ──

    pub async fn list_files(&self) -> CloudResult<Vec<RemoteFile>> {
        let resp = self.client.get(self.url("/api/list_files")).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_file(&self, file_id: &str) -> CloudResult<()> {
        let resp = self
            .client
            .post(self.url("/api/delete_file"))
            .json(&serde_json::json!({ "fileId": file_id }))
            .send()
            .await?;
        ensure_success(resp).await?;
        info!(file_id, "deleted remote file");
        Ok(())
    }
}

// ── Trait implementations ──

impl GroupDirectory for CloudApiClient {
    async fn list_members(&self) -> CloudResult<Vec<DirectoryEntry>> {
        self.get_group_members_public_keys().await
    }
}

impl FileTransport for CloudApiClient {
    async fn upload(&self, payload: &UploadPayload) -> CloudResult<()> {
        self.upload_file(payload).await
    }

    async fn download(&self, request: &DownloadRequest) -> CloudResult<Option<DownloadedFile>> {
        self.download_file(request).await
    }
}

/// Passes a success response through; otherwise returns the server's
/// `message` (or `error`) field, falling back to `HTTP <status>`.
async fn ensure_success(resp: Response) -> CloudResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(ErrorBody {
            message: Some(m), ..
        }) => m,
        Ok(ErrorBody { error: Some(e), .. }) => e,
        _ => format!("HTTP {}", status.as_u16()),
    };
    debug!(status = status.as_u16(), %message, "server returned error");
    Err(CloudError::Api(message))
}

/// Flattens a list of strings that may arrive as a JSON array, a
/// JSON-encoded array string, or an array wrapping such a string.
pub(crate) fn normalize_string_list(value: Value) -> CloudResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => parse_list_string(&s),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.extend(parse_list_string(&s)?),
                    other => {
                        return Err(CloudError::Api(format!(
                            "unexpected list entry in response: {other}"
                        )));
                    }
                }
            }
            Ok(out)
        }
        other => Err(CloudError::Api(format!(
            "unexpected list shape in response: {other}"
        ))),
    }
}

fn parse_list_string(s: &str) -> CloudResult<Vec<String>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !trimmed.starts_with('[') {
        return Ok(vec![trimmed.to_string()]);
    }
    match serde_json::from_str(trimmed) {
        Ok(list) => Ok(list),
        // Single-quoted lists are accepted too.
        Err(e) => serde_json::from_str(&trimmed.replace('\'', "\"")).map_err(|_| e.into()),
    }
}
