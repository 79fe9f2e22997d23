//! Google Drive API v3 binding.

mod auth;

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::backend::{
    Arguments, Backend, BackendError, optional_bool, optional_str, optional_u64, required_str,
};
use crate::credentials::Credential;
use crate::http;

pub use auth::DRIVE_SCOPE;
use auth::TokenProvider;

const SERVICE: &str = "Google Drive";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const DEFAULT_SEARCH_RESULTS: u64 = 10;
const SEARCH_FIELDS: &str =
    "files(id, name, mimeType, size, createdTime, modifiedTime, webViewLink, owners, shared)";
const PERMISSION_FIELDS: &str = "permissions(id, type, role, emailAddress, displayName)";
const BOUNDARY_PREFIX: &str = "pantheon-";
const BOUNDARY_RANDOM_LEN: usize = 32;

/// Operations exposed by the Google Drive integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOp {
    SearchFiles,
    GetFileMetadata,
    ListSharedDrives,
    GetFilePermissions,
    CreateFile,
    UpdateFileContent,
    DeleteFile,
}

pub struct GoogleDriveClient {
    http: Client,
    auth: TokenProvider,
    drive_base: String,
    upload_base: String,
}

impl GoogleDriveClient {
    /// Build a client from any resolved credential kind.
    pub fn new(credential: Credential) -> Result<Self, BackendError> {
        Ok(Self {
            http: http::build_client(SERVICE)?,
            auth: TokenProvider::from_credential(credential),
            drive_base: DRIVE_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        })
    }

    /// Point the client at different API hosts (proxies, test servers).
    pub fn with_base_urls(
        mut self,
        drive_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.drive_base = drive_base.into();
        self.upload_base = upload_base.into();
        self
    }

    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder, BackendError> {
        let token = self.auth.bearer(&self.http).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let resp: Response = request.send().await.map_err(|e| http::request_error(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(http::api_error(SERVICE, resp, error_message).await);
        }
        http::json_body(SERVICE, resp).await
    }

    async fn search_files(&self, args: &Arguments) -> Result<Value, BackendError> {
        let query = required_str(args, "query")?;
        let max_results = optional_u64(args, "max_results")?.unwrap_or(DEFAULT_SEARCH_RESULTS);
        let all_drives = optional_bool(args, "include_shared_drives")?.unwrap_or(false);
        let all_drives = if all_drives { "true" } else { "false" };
        let page_size = max_results.to_string();

        debug!(query, max_results, "drive search");
        let request = self
            .request(Method::GET, format!("{}/files", self.drive_base))
            .await?
            .query(&[
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("fields", SEARCH_FIELDS),
                ("supportsAllDrives", all_drives),
                ("includeItemsFromAllDrives", all_drives),
            ]);
        let result = self.send(request).await?;

        let files: Vec<Value> = array(&result, "files").iter().map(summarize_file).collect();
        Ok(json!({
            "query": query,
            "found": files.len(),
            "files": files,
        }))
    }

    async fn get_file_metadata(&self, args: &Arguments) -> Result<Value, BackendError> {
        let file_id = file_id(args)?;
        let request = self
            .request(Method::GET, format!("{}/files/{file_id}", self.drive_base))
            .await?
            .query(&[("fields", "*"), ("supportsAllDrives", "true")]);
        self.send(request).await
    }

    async fn list_shared_drives(&self) -> Result<Value, BackendError> {
        let request = self
            .request(Method::GET, format!("{}/drives", self.drive_base))
            .await?
            .query(&[("pageSize", "100")]);
        let result = self.send(request).await?;

        let drives: Vec<Value> = array(&result, "drives")
            .iter()
            .map(|d| pick(d, &[("id", "id"), ("name", "name"), ("createdTime", "createdTime")]))
            .collect();
        Ok(json!({"found": drives.len(), "drives": drives}))
    }

    async fn get_file_permissions(&self, args: &Arguments) -> Result<Value, BackendError> {
        let file_id = file_id(args)?;
        let request = self
            .request(Method::GET, format!("{}/files/{file_id}/permissions", self.drive_base))
            .await?
            .query(&[("fields", PERMISSION_FIELDS), ("supportsAllDrives", "true")]);
        let result = self.send(request).await?;
        Ok(json!({
            "file_id": file_id,
            "permissions": array(&result, "permissions"),
        }))
    }

    async fn create_file(&self, args: &Arguments) -> Result<Value, BackendError> {
        let name = required_str(args, "name")?;
        let content = required_str(args, "content")?;
        let mime_type = optional_str(args, "mime_type")?.unwrap_or("text/plain");

        let mut metadata = json!({"name": name, "mimeType": mime_type});
        if let Some(parent) = optional_str(args, "parent_id")? {
            metadata["parents"] = json!([parent]);
        }

        let upload = multipart_related(&metadata, mime_type, content, random_boundary);
        let request = self
            .request(Method::POST, format!("{}/files", self.upload_base))
            .await?
            .query(&[("uploadType", "multipart"), ("fields", "id, name, webViewLink")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", upload.boundary),
            )
            .body(upload.body);
        let file = self.send(request).await?;
        Ok(json!({"created": true, "file": file}))
    }

    async fn update_file_content(&self, args: &Arguments) -> Result<Value, BackendError> {
        let file_id = file_id(args)?;
        let content = required_str(args, "content")?;

        let request = self
            .request(Method::PATCH, format!("{}/files/{file_id}", self.upload_base))
            .await?
            .query(&[("uploadType", "media"), ("fields", "id, name, modifiedTime")])
            .body(content.to_string());
        let file = self.send(request).await?;
        Ok(json!({"updated": true, "file": file}))
    }

    async fn delete_file(&self, args: &Arguments) -> Result<Value, BackendError> {
        let file_id = file_id(args)?;
        let request = self
            .request(Method::DELETE, format!("{}/files/{file_id}", self.drive_base))
            .await?
            .query(&[("supportsAllDrives", "true")]);
        self.send(request).await?;
        Ok(json!({"deleted": true, "file_id": file_id}))
    }
}

#[async_trait]
impl Backend for GoogleDriveClient {
    type Operation = DriveOp;

    async fn probe(&self) -> Result<(), BackendError> {
        let request = self
            .request(Method::GET, format!("{}/about", self.drive_base))
            .await?
            .query(&[("fields", "user")]);
        let about = self.send(request).await?;
        debug!(
            user = about["user"]["emailAddress"].as_str().unwrap_or("?"),
            "drive probe ok"
        );
        Ok(())
    }

    async fn invoke(
        &self,
        operation: DriveOp,
        arguments: Arguments,
    ) -> Result<Value, BackendError> {
        match operation {
            DriveOp::SearchFiles => self.search_files(&arguments).await,
            DriveOp::GetFileMetadata => self.get_file_metadata(&arguments).await,
            DriveOp::ListSharedDrives => self.list_shared_drives().await,
            DriveOp::GetFilePermissions => self.get_file_permissions(&arguments).await,
            DriveOp::CreateFile => self.create_file(&arguments).await,
            DriveOp::UpdateFileContent => self.update_file_content(&arguments).await,
            DriveOp::DeleteFile => self.delete_file(&arguments).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// File ids are interpolated into URL paths, so only the id alphabet passes.
fn file_id(args: &Arguments) -> Result<&str, BackendError> {
    let id = required_str(args, "file_id")?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(BackendError::InvalidArgument {
            field: "file_id".into(),
            reason: "must contain only letters, digits, '-' or '_'".into(),
        });
    }
    Ok(id)
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value[key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Copy the listed fields under new names, skipping absent ones.
fn pick(value: &Value, fields: &[(&str, &str)]) -> Value {
    let mut out = Map::new();
    for (from, to) in fields {
        if let Some(v) = value.get(*from).filter(|v| !v.is_null()) {
            out.insert((*to).to_string(), v.clone());
        }
    }
    Value::Object(out)
}

fn summarize_file(file: &Value) -> Value {
    let mut out = pick(
        file,
        &[
            ("id", "id"),
            ("name", "name"),
            ("mimeType", "mimeType"),
            ("size", "size"),
            ("createdTime", "created"),
            ("modifiedTime", "modified"),
            ("webViewLink", "link"),
        ],
    );
    if let Some(owners) = file["owners"].as_array() {
        let emails: Vec<Value> = owners
            .iter()
            .filter_map(|o| o["emailAddress"].as_str())
            .map(|e| json!(e))
            .collect();
        out["owners"] = Value::Array(emails);
    }
    if let Some(shared) = file["shared"].as_bool() {
        out["shared"] = json!(shared);
    }
    out
}

fn error_message(body: &Value) -> Option<String> {
    body["error"]["message"].as_str().map(str::to_string)
}

struct MultipartBody {
    boundary: String,
    body: String,
}

fn random_boundary() -> String {
    let suffix: String = rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{BOUNDARY_PREFIX}{suffix}")
}

/// The boundary must not occur in either part, so candidates are drawn
/// until one is absent from both.
fn multipart_related(
    metadata: &Value,
    mime_type: &str,
    content: &str,
    mut next_boundary: impl FnMut() -> String,
) -> MultipartBody {
    let metadata = metadata.to_string();
    let boundary = loop {
        let candidate = next_boundary();
        if !content.contains(&candidate) && !metadata.contains(&candidate) {
            break candidate;
        }
    };
    let body = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
         --{b}\r\nContent-Type: {mime_type}\r\n\r\n{content}\r\n--{b}--\r\n",
        b = boundary,
    );
    MultipartBody { boundary, body }
}
