//! Dropbox API v2 binding.
//!
//! RPC-style endpoints live on `api.dropboxapi.com` and take a JSON body;
//! content endpoints (upload/download) live on `content.dropboxapi.com` and
//! carry their arguments in the `Dropbox-API-Arg` header.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::backend::{
    Arguments, Backend, BackendError, optional_bool, optional_str, optional_u64, required_str,
};
use crate::credentials::Credential;
use crate::http;

const SERVICE: &str = "Dropbox";
const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";
const DEFAULT_SEARCH_RESULTS: u64 = 20;

/// Operations exposed by the Dropbox integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropboxOp {
    SearchFiles,
    ListFolder,
    GetMetadata,
    UploadFile,
    DownloadFile,
    Delete,
    CreateFolder,
    GetSharedLink,
    MoveFile,
}

/// Dropbox client authenticated with a long-lived access token.
pub struct DropboxClient {
    http: Client,
    token: String,
    api_base: String,
    content_base: String,
}

impl DropboxClient {
    /// Build a client from a resolved credential. Only bearer tokens apply.
    pub fn new(credential: Credential) -> Result<Self, BackendError> {
        let token = match credential {
            Credential::Bearer(token) => token,
            other => {
                return Err(BackendError::UnsupportedCredential {
                    service: SERVICE,
                    kind: other.kind(),
                });
            }
        };
        Ok(Self {
            http: http::build_client(SERVICE)?,
            token,
            api_base: API_BASE.to_string(),
            content_base: CONTENT_BASE.to_string(),
        })
    }

    /// Point the client at different API hosts (proxies, test servers).
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        content_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.content_base = content_base.into();
        self
    }

    async fn rpc(&self, endpoint: &str, body: &Value) -> Result<Value, BackendError> {
        debug!(endpoint, "dropbox rpc");
        let resp = self
            .http
            .post(format!("{}/{endpoint}", self.api_base))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(http::api_error(SERVICE, resp, error_summary).await);
        }
        http::json_body(SERVICE, resp).await
    }

    async fn search_files(&self, args: &Arguments) -> Result<Value, BackendError> {
        let query = required_str(args, "query")?;
        let max_results = optional_u64(args, "max_results")?.unwrap_or(DEFAULT_SEARCH_RESULTS);

        let mut options = Map::new();
        options.insert("max_results".into(), json!(max_results));
        if let Some(path) = optional_str(args, "path")? {
            options.insert("path".into(), json!(path));
        }

        let result = self
            .rpc("files/search_v2", &json!({"query": query, "options": options}))
            .await?;

        let matches: Vec<Value> = array(&result, "matches")
            .iter()
            .map(|m| summarize_entry(&m["metadata"]["metadata"]))
            .collect();

        Ok(json!({
            "query": query,
            "found": matches.len(),
            "has_more": result["has_more"].as_bool().unwrap_or(false),
            "matches": matches,
        }))
    }

    async fn list_folder(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = optional_str(args, "path")?.unwrap_or("");
        let recursive = optional_bool(args, "recursive")?.unwrap_or(false);

        let result = self
            .rpc("files/list_folder", &json!({"path": path, "recursive": recursive}))
            .await?;

        let entries: Vec<Value> = array(&result, "entries").iter().map(summarize_entry).collect();
        let shown_path = if path.is_empty() { "/" } else { path };

        Ok(json!({
            "path": shown_path,
            "entries": entries,
            "has_more": result["has_more"].as_bool().unwrap_or(false),
        }))
    }

    async fn get_metadata(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;
        self.rpc("files/get_metadata", &json!({"path": path})).await
    }

    async fn upload_file(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;
        let content = required_str(args, "content")?;
        let mode = optional_str(args, "mode")?.unwrap_or("add");

        let api_arg = json!({"path": path, "mode": {".tag": mode}});
        let resp = self
            .http
            .post(format!("{}/files/upload", self.content_base))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", header_safe_json(&api_arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(http::api_error(SERVICE, resp, error_summary).await);
        }
        let meta = http::json_body(SERVICE, resp).await?;

        Ok(json!({
            "uploaded": true,
            "path": meta["path_display"],
            "size": meta["size"],
            "id": meta["id"],
        }))
    }

    async fn download_file(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;

        let resp = self
            .http
            .post(format!("{}/files/download", self.content_base))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", header_safe_json(&json!({"path": path})))
            .send()
            .await
            .map_err(|e| http::request_error(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(http::api_error(SERVICE, resp, error_summary).await);
        }

        let meta: Value = resp
            .headers()
            .get("Dropbox-API-Result")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);
        let bytes = resp.bytes().await.map_err(|e| http::request_error(SERVICE, e))?;

        Ok(json!({
            "path": meta.get("path_display").cloned().unwrap_or_else(|| json!(path)),
            "size": meta.get("size").cloned().unwrap_or_else(|| json!(bytes.len())),
            "content": String::from_utf8_lossy(&bytes),
        }))
    }

    async fn delete(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;
        let result = self.rpc("files/delete_v2", &json!({"path": path})).await?;
        Ok(json!({"deleted": true, "metadata": result["metadata"]}))
    }

    async fn create_folder(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;
        let result = self.rpc("files/create_folder_v2", &json!({"path": path})).await?;
        Ok(json!({"created": true, "path": result["metadata"]["path_display"]}))
    }

    /// Reuse an existing shared link when there is one, otherwise create one.
    async fn get_shared_link(&self, args: &Arguments) -> Result<Value, BackendError> {
        let path = required_str(args, "path")?;

        match self
            .rpc("sharing/list_shared_links", &json!({"path": path, "direct_only": true}))
            .await
        {
            Ok(existing) => {
                let links = array(&existing, "links");
                if let Some(url) = links.first().and_then(|l| l["url"].as_str()) {
                    return Ok(json!({"url": url, "existing": true}));
                }
            }
            Err(e) => debug!(error = %e, "listing shared links failed, creating a new one"),
        }

        let created = self
            .rpc("sharing/create_shared_link_with_settings", &json!({"path": path}))
            .await?;
        Ok(json!({"url": created["url"], "existing": false}))
    }

    async fn move_file(&self, args: &Arguments) -> Result<Value, BackendError> {
        let from_path = required_str(args, "from_path")?;
        let to_path = required_str(args, "to_path")?;
        let result = self
            .rpc("files/move_v2", &json!({"from_path": from_path, "to_path": to_path}))
            .await?;
        Ok(json!({
            "moved": true,
            "from": from_path,
            "to": result["metadata"]["path_display"],
        }))
    }
}

#[async_trait]
impl Backend for DropboxClient {
    type Operation = DropboxOp;

    async fn probe(&self) -> Result<(), BackendError> {
        let account = self.rpc("users/get_current_account", &Value::Null).await?;
        debug!(account_id = account["account_id"].as_str().unwrap_or("?"), "dropbox probe ok");
        Ok(())
    }

    async fn invoke(
        &self,
        operation: DropboxOp,
        arguments: Arguments,
    ) -> Result<Value, BackendError> {
        match operation {
            DropboxOp::SearchFiles => self.search_files(&arguments).await,
            DropboxOp::ListFolder => self.list_folder(&arguments).await,
            DropboxOp::GetMetadata => self.get_metadata(&arguments).await,
            DropboxOp::UploadFile => self.upload_file(&arguments).await,
            DropboxOp::DownloadFile => self.download_file(&arguments).await,
            DropboxOp::Delete => self.delete(&arguments).await,
            DropboxOp::CreateFolder => self.create_folder(&arguments).await,
            DropboxOp::GetSharedLink => self.get_shared_link(&arguments).await,
            DropboxOp::MoveFile => self.move_file(&arguments).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value[key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Reduce a Dropbox metadata record to the fields clients care about.
/// Absent fields (e.g. `size` on folders) are left out.
fn summarize_entry(entry: &Value) -> Value {
    let mut out = Map::new();
    for (from, to) in [
        ("path_display", "path"),
        ("name", "name"),
        (".tag", "type"),
        ("size", "size"),
        ("server_modified", "modified"),
    ] {
        if let Some(v) = entry.get(from).filter(|v| !v.is_null()) {
            out.insert(to.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

fn error_summary(body: &Value) -> Option<String> {
    body["error_summary"].as_str().map(str::to_string)
}

/// Serialize JSON for an HTTP header: non-ASCII characters are escaped as
/// `\uXXXX` (surrogate pairs above the BMP).
fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
