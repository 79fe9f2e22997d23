//! Google Drive client against a local mock of the Drive and OAuth endpoints.

use pantheon_core::backend::{Arguments, Backend};
use pantheon_core::credentials::{AuthorizedUserToken, Credential, ServiceAccountKey};
use pantheon_core::gdrive::{DriveOp, GoogleDriveClient};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_rsa_key.pem");

fn client(server: &MockServer, credential: Credential) -> GoogleDriveClient {
    GoogleDriveClient::new(credential)
        .expect("client")
        .with_base_urls(server.uri(), format!("{}/upload", server.uri()))
}

fn args(value: Value) -> Arguments {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn search_with_static_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", "Bearer ya29.static"))
        .and(query_param("q", "name contains 'report'"))
        .and(query_param("pageSize", "10"))
        .and(query_param("supportsAllDrives", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{
                "id": "f1",
                "name": "report.pdf",
                "mimeType": "application/pdf",
                "size": "2048",
                "modifiedTime": "2024-02-02T00:00:00Z",
                "owners": [{"emailAddress": "owner@example.com"}],
                "shared": true
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = client(&server, Credential::Bearer("ya29.static".into()));
    let out = drive
        .invoke(
            DriveOp::SearchFiles,
            args(json!({
                "query": "name contains 'report'",
                "max_results": 10,
                "include_shared_drives": false
            })),
        )
        .await
        .expect("search");

    assert_eq!(out["found"], 1);
    assert_eq!(out["query"], "name contains 'report'");
    assert_eq!(
        out["files"][0],
        json!({
            "id": "f1",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "2048",
            "modified": "2024-02-02T00:00:00Z",
            "owners": ["owner@example.com"],
            "shared": true
        })
    );
}

#[tokio::test]
async fn service_account_token_is_exchanged_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.minted",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .and(header("authorization", "Bearer ya29.minted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"emailAddress": "bot@example.iam.gserviceaccount.com"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let key = ServiceAccountKey {
        key_type: Some("service_account".into()),
        client_email: "bot@example.iam.gserviceaccount.com".into(),
        private_key: TEST_KEY.into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let drive = client(&server, Credential::ServiceAccount(key));

    drive.probe().await.expect("first probe");
    drive.probe().await.expect("second probe");
}

#[tokio::test]
async fn expired_user_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/files/abc123"))
        .and(header("authorization", "Bearer ya29.fresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let token = AuthorizedUserToken {
        access_token: Some("ya29.stale".into()),
        refresh_token: Some("1/refresh".into()),
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        token_uri: format!("{}/token", server.uri()),
        expiry_date: Some(1_000),
    };
    let drive = client(&server, Credential::AuthorizedUser(token));

    let out = drive
        .invoke(DriveOp::DeleteFile, args(json!({"file_id": "abc123"})))
        .await
        .expect("delete");
    assert_eq!(out, json!({"deleted": true, "file_id": "abc123"}));
}

#[tokio::test]
async fn create_file_uploads_multipart_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains(r#""parents":["folder1"]"#))
        .and(body_string_contains("hello drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new1",
            "name": "hello.txt",
            "webViewLink": "https://drive.google.com/file/d/new1/view"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = client(&server, Credential::Bearer("ya29.static".into()));
    let out = drive
        .invoke(
            DriveOp::CreateFile,
            args(json!({
                "name": "hello.txt",
                "content": "hello drive",
                "mime_type": "text/plain",
                "parent_id": "folder1"
            })),
        )
        .await
        .expect("create");

    assert_eq!(out["created"], true);
    assert_eq!(out["file"]["id"], "new1");

    let requests = server.received_requests().await.expect("recording enabled");
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .expect("content type");
    let boundary = content_type
        .strip_prefix("multipart/related; boundary=")
        .expect("multipart boundary");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.ends_with(&format!("\r\nhello drive\r\n--{boundary}--\r\n")));
}

#[tokio::test]
async fn drive_errors_surface_the_google_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/missing/permissions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "File not found: missing."}
        })))
        .mount(&server)
        .await;

    let drive = client(&server, Credential::Bearer("ya29.static".into()));
    let err = drive
        .invoke(DriveOp::GetFilePermissions, args(json!({"file_id": "missing"})))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Google Drive API error (HTTP 404): File not found: missing."
    );
}
