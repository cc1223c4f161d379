mod support;

use groupdrive_cloud::api_client::CloudApiClient;
use groupdrive_cloud::config::CloudConfig;
use groupdrive_cloud::error::{CloudError, ErrorKind};
use groupdrive_cloud::types::*;
use groupdrive_cloud::{GroupDirectory, TransferOrchestrator, resolve_recipients};
use groupdrive_crypto::EncryptedEnvelope;
use groupdrive_types::Identity;
use pretty_assertions::assert_eq;
use support::{ALICE, BOB, MemorySink, alice_pair, bob_pair, entry, store_with};
use wiremock::matchers::{body_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(server: &MockServer) -> CloudApiClient {
    let config = CloudConfig {
        api_base_url: server.uri(),
        ..CloudConfig::default()
    };
    CloudApiClient::new(config).unwrap()
}

fn id(email: &str) -> Identity {
    Identity::parse(email).unwrap()
}

fn sealed_for_bob(plaintext: &[u8]) -> EncryptedEnvelope {
    EncryptedEnvelope::seal(plaintext, [&alice_pair().public, &bob_pair().public]).unwrap()
}

// --- Construction ---

#[test]
fn new_rejects_invalid_config() {
    let config = CloudConfig {
        api_base_url: "ftp://files.example.com".into(),
        ..CloudConfig::default()
    };
    let err = CloudApiClient::new(config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

// --- Directory ---

#[tokio::test]
async fn directory_lists_members_in_order() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/get_group_members_public_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "publicKeys": [entry(ALICE, alice_pair()), entry(BOB, bob_pair())]
        })))
        .mount(&server)
        .await;

    let members = client.list_members().await.unwrap();
    let emails: Vec<&str> = members.iter().map(|m| m.email.as_str()).collect();
    assert_eq!(emails, vec![ALICE, BOB]);

    let recipients = resolve_recipients(&client).await.unwrap();
    assert_eq!(recipients[1].public_key, bob_pair().public);
}

#[tokio::test]
async fn directory_server_error_is_unavailable() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/get_group_members_public_keys"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(serde_json::json!({ "message": "directory offline" })),
        )
        .mount(&server)
        .await;

    let err = client.get_group_members_public_keys().await.unwrap_err();
    assert!(matches!(err, CloudError::DirectoryUnavailable(ref m) if m == "directory offline"));
}

#[tokio::test]
async fn directory_connection_failure_is_unavailable() {
    let config = CloudConfig {
        api_base_url: "http://127.0.0.1:1".into(),
        request_timeout_secs: 2,
        ..CloudConfig::default()
    };
    let client = CloudApiClient::new(config).unwrap();

    let err = client.get_group_members_public_keys().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirectoryUnavailable);
}

#[tokio::test]
async fn empty_directory_resolves_to_no_recipients() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/get_group_members_public_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "publicKeys": []
        })))
        .mount(&server)
        .await;

    let err = resolve_recipients(&client).await.unwrap_err();
    assert!(matches!(err, CloudError::NoRecipients));
}

// --- Upload ---

#[tokio::test]
async fn upload_sends_multipart_envelope() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"report body");

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "message": "File uploaded successfully." })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = UploadPayload {
        uploader: id(ALICE),
        file_name: "report.txt".into(),
        envelope: envelope.clone(),
        recipients: vec![id(ALICE), id(BOB)],
    };
    client.upload_file(&payload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    for field in ["email", "file", "iv", "encryptedData", "encryptedAesKeys", "recipients"] {
        assert!(body.contains(&format!("name=\"{field}\"")), "missing part {field}");
    }
    assert!(body.contains("filename=\"report.txt\""));
    assert!(body.contains(&envelope.iv));
    assert!(body.contains(&envelope.encrypted_data));
    assert!(body.contains(&serde_json::to_string(&envelope.encrypted_aes_keys).unwrap()));
    assert!(body.contains("[\"alice@example.com\",\"bob@example.com\"]"));
}

#[tokio::test]
async fn upload_error_surfaces_server_message() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "message": "Missing required data." })),
        )
        .mount(&server)
        .await;

    let payload = UploadPayload {
        uploader: id(ALICE),
        file_name: "x.bin".into(),
        envelope: sealed_for_bob(b"x"),
        recipients: vec![id(ALICE), id(BOB)],
    };
    let err = client.upload_file(&payload).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert_eq!(err.to_string(), "API request failed: Missing required data.");
}

#[tokio::test]
async fn error_without_message_falls_back_to_status() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/remove_user"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client.remove_user(&id(BOB)).await.unwrap_err();
    assert!(matches!(err, CloudError::Api(ref m) if m == "HTTP 502"));
}

// --- Download ---

fn download_body(envelope: &EncryptedEnvelope, keys: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "fileContent": envelope.encrypted_data,
        "iv": envelope.iv,
        "uploader": ALICE,
        "encryptedAesKeys": keys,
    })
}

async fn mount_download(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/download"))
        .and(body_json(serde_json::json!({
            "file_id": "f-1",
            "file_name": "report.txt",
            "email": BOB,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn bob_request() -> DownloadRequest {
    DownloadRequest {
        file_id: "f-1".into(),
        file_name: "report.txt".into(),
        requester: id(BOB),
    }
}

#[tokio::test]
async fn download_accepts_plain_key_array() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"data");
    mount_download(
        &server,
        download_body(&envelope, serde_json::json!(envelope.encrypted_aes_keys)),
    )
    .await;

    let file = client.download_file(&bob_request()).await.unwrap().unwrap();
    assert_eq!(file.envelope, envelope);
    assert_eq!(file.uploader.as_deref(), Some(ALICE));
    assert_eq!(file.recipients, None);
}

#[tokio::test]
async fn download_accepts_json_encoded_key_string() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"data");
    let encoded = serde_json::to_string(&envelope.encrypted_aes_keys).unwrap();
    mount_download(&server, download_body(&envelope, serde_json::json!(encoded))).await;

    let file = client.download_file(&bob_request()).await.unwrap().unwrap();
    assert_eq!(file.envelope.encrypted_aes_keys, envelope.encrypted_aes_keys);
}

#[tokio::test]
async fn download_accepts_array_wrapping_key_string() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"data");
    let encoded = serde_json::to_string(&envelope.encrypted_aes_keys).unwrap();
    mount_download(&server, download_body(&envelope, serde_json::json!([encoded]))).await;

    let file = client.download_file(&bob_request()).await.unwrap().unwrap();
    assert_eq!(file.envelope.encrypted_aes_keys.len(), 2);
    assert_eq!(file.envelope.encrypted_aes_keys, envelope.encrypted_aes_keys);
}

#[tokio::test]
async fn download_reads_recipient_metadata() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"data");
    let mut body = download_body(&envelope, serde_json::json!(envelope.encrypted_aes_keys));
    body["recipients"] = serde_json::json!("[\"alice@example.com\",\"bob@example.com\"]");
    mount_download(&server, body).await;

    let file = client.download_file(&bob_request()).await.unwrap().unwrap();
    assert_eq!(
        file.recipients,
        Some(vec![ALICE.to_string(), BOB.to_string()])
    );
}

#[tokio::test]
async fn download_404_is_none() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.download_file(&bob_request()).await.unwrap().is_none());
}

#[tokio::test]
async fn download_null_body_is_none() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("null"),
        )
        .mount(&server)
        .await;

    assert!(client.download_file(&bob_request()).await.unwrap().is_none());
}

#[tokio::test]
async fn download_forbidden_is_transport_failure() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "message": "You are not authorized to download this file."
        })))
        .mount(&server)
        .await;

    let err = client.download_file(&bob_request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(err.to_string().contains("not authorized"));
}

#[tokio::test]
async fn orchestrated_download_over_http() {
    let server = MockServer::start().await;
    let client = setup(&server).await;
    let envelope = sealed_for_bob(b"over the wire");
    let encoded = serde_json::to_string(&envelope.encrypted_aes_keys).unwrap();
    mount_download(&server, download_body(&envelope, serde_json::json!([encoded]))).await;

    let client = std::sync::Arc::new(client);
    let orch = TransferOrchestrator::new(
        store_with(&[(BOB, bob_pair())]),
        client.clone(),
        client,
        CloudConfig::default(),
    );
    let sink = MemorySink::default();
    let receipt = orch
        .download(BOB, "f-1", "report.txt", &sink)
        .await
        .unwrap();

    assert_eq!(receipt.uploader.as_deref(), Some(ALICE));
    assert_eq!(sink.saved()[0].1, b"over the wire");
}

// --- Membership ---

#[tokio::test]
async fn add_user_posts_email_and_key() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/add_user"))
        .and(body_json(serde_json::json!({ "email": BOB, "public_key": "AAAA" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true, "message": "User added to the group successfully."
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.add_user(&id(BOB), "AAAA").await.unwrap();
}

#[tokio::test]
async fn user_exists_reads_flag() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/user_exists"))
        .and(body_json(serde_json::json!({ "email": ALICE })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "exists": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/user_exists"))
        .and(body_json(serde_json::json!({ "email": BOB })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "exists": false })))
        .mount(&server)
        .await;

    assert!(client.user_exists(&id(ALICE)).await.unwrap());
    assert!(!client.user_exists(&id(BOB)).await.unwrap());
}

#[tokio::test]
async fn list_users_returns_canonical_identities() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/get_users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "email": "Alice@Example.com" },
            { "email": BOB }
        ])))
        .mount(&server)
        .await;

    let users = client.list_users().await.unwrap();
    assert_eq!(users, vec![id(ALICE), id(BOB)]);
}

#[tokio::test]
async fn list_users_surfaces_server_error() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/get_users"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "Failed to fetch users" })),
        )
        .mount(&server)
        .await;

    let err = client.list_users().await.unwrap_err();
    assert!(matches!(err, CloudError::Api(ref m) if m == "Failed to fetch users"));
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}

// --- Catalogue ---

#[tokio::test]
async fn list_files_parses_catalogue() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/list_files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "1a2b",
                "name": "plans.txt",
                "mimeType": "application/octet-stream",
                "createdTime": "2024-03-01T12:30:00.000Z",
                "appProperties": { "uploader": ALICE, "iv": "ignored" },
                "uploader": ALICE
            },
            { "id": "3c4d", "name": "bare.bin" }
        ])))
        .mount(&server)
        .await;

    let files = client.list_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, "1a2b");
    assert_eq!(files[0].mime_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(
        files[0].created_time.unwrap().to_rfc3339(),
        "2024-03-01T12:30:00+00:00"
    );
    assert_eq!(files[0].uploader, ALICE);
    assert_eq!(files[1].mime_type, None);
    assert_eq!(files[1].uploader, "");
}

#[tokio::test]
async fn list_files_error_uses_error_field() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/list_files"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "Failed to fetch files" })),
        )
        .mount(&server)
        .await;

    let err = client.list_files().await.unwrap_err();
    assert!(matches!(err, CloudError::Api(ref m) if m == "Failed to fetch files"));
}

#[tokio::test]
async fn delete_file_posts_file_id() {
    let server = MockServer::start().await;
    let client = setup(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/delete_file"))
        .and(body_json(serde_json::json!({ "fileId": "1a2b" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "File deleted successfully."
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_file("1a2b").await.unwrap();
}

#[tokio::test]
async fn base_url_trailing_slash_is_ignored() {
    let server = MockServer::start().await;
    let config = CloudConfig {
        api_base_url: format!("{}/", server.uri()),
        ..CloudConfig::default()
    };
    let client = CloudApiClient::new(config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/delete_file"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_file("x").await.unwrap();
}
