//! Credential sources and resolution.
//!
//! A resolver holds an ordered list of sources and returns the first
//! credential any of them yields. A single mandatory token and a multi-step
//! fallback chain are the same resolver with lists of different length.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Why a single source could not produce a credential.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed credentials in {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("environment variable {var} is not set")]
    MissingVar { var: String },
}

/// Terminal resolution failure.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credentials available ({})", describe_tried(.tried))]
    NoCredentialsAvailable { tried: Vec<String> },
}

fn describe_tried(tried: &[String]) -> String {
    if tried.is_empty() {
        "no credential sources configured".to_string()
    } else {
        format!("tried: {}", tried.join(", "))
    }
}

// =============================================================================
// Credential material
// =============================================================================

/// Authorization material handed to a backend during startup.
///
/// `Debug` never prints secrets.
#[derive(Clone)]
pub enum Credential {
    Bearer(String),
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserToken),
}

impl Credential {
    /// Short label used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Bearer(_) => "bearer token",
            Credential::ServiceAccount(_) => "service account",
            Credential::AuthorizedUser(_) => "authorized user",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({}, <redacted>)", self.kind())
    }
}

/// Google service-account key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// OAuth token file for an authorized user.
///
/// `expiry_date` is in epoch milliseconds. Refreshing requires
/// `refresh_token`, `client_id` and `client_secret` together.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserToken {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub expiry_date: Option<i64>,
}

impl AuthorizedUserToken {
    /// Whether the token file carries everything needed for a refresh grant.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl fmt::Debug for AuthorizedUserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUserToken")
            .field("refreshable", &self.is_refreshable())
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

// =============================================================================
// Sources
// =============================================================================

/// One strategy for obtaining a credential.
pub trait CredentialSource: Send + Sync {
    /// Label used in diagnostics.
    fn kind(&self) -> &str;

    fn resolve(&self) -> Result<Credential, SourceError>;
}

/// Google service-account JSON key on disk.
#[derive(Debug, Clone)]
pub struct ServiceAccountFile {
    path: PathBuf,
}

impl ServiceAccountFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialSource for ServiceAccountFile {
    fn kind(&self) -> &str {
        "service account file"
    }

    fn resolve(&self) -> Result<Credential, SourceError> {
        let contents = read_file(&self.path)?;
        let key: ServiceAccountKey =
            serde_json::from_str(&contents).map_err(|e| malformed(&self.path, e.to_string()))?;
        if let Some(kind) = key.key_type.as_deref()
            && kind != "service_account"
        {
            return Err(malformed(
                &self.path,
                format!("expected type \"service_account\", found \"{kind}\""),
            ));
        }
        if key.private_key.trim().is_empty() {
            return Err(malformed(&self.path, "private_key is empty".into()));
        }
        Ok(Credential::ServiceAccount(key))
    }
}

/// OAuth authorized-user token JSON on disk.
#[derive(Debug, Clone)]
pub struct AuthorizedUserFile {
    path: PathBuf,
}

impl AuthorizedUserFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialSource for AuthorizedUserFile {
    fn kind(&self) -> &str {
        "authorized user token file"
    }

    fn resolve(&self) -> Result<Credential, SourceError> {
        let contents = read_file(&self.path)?;
        let token: AuthorizedUserToken =
            serde_json::from_str(&contents).map_err(|e| malformed(&self.path, e.to_string()))?;
        let has_access = token.access_token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_access && !token.is_refreshable() {
            return Err(malformed(
                &self.path,
                "neither an access_token nor refreshable client credentials".into(),
            ));
        }
        Ok(Credential::AuthorizedUser(token))
    }
}

/// A bearer token taken from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
    kind: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        let var = var.into();
        let kind = format!("env {var}");
        Self { var, kind }
    }
}

impl CredentialSource for EnvToken {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn resolve(&self) -> Result<Credential, SourceError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => {
                Ok(Credential::Bearer(token.trim().to_string()))
            }
            _ => Err(SourceError::MissingVar {
                var: self.var.clone(),
            }),
        }
    }
}

fn read_file(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SourceError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn malformed(path: &Path, reason: String) -> SourceError {
    SourceError::Malformed {
        path: path.to_path_buf(),
        reason,
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Ordered list of credential sources; first success wins.
pub struct CredentialResolver {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Resolver with exactly one mandatory source.
    pub fn single(source: impl CredentialSource + 'static) -> Self {
        Self::new(vec![Box::new(source)])
    }

    /// Source labels in priority order.
    pub fn kinds(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Try each source in order, stopping at the first success.
    ///
    /// Individual failures are logged and skipped. Only exhausting every
    /// source is an error.
    pub fn resolve(&self) -> Result<Credential, CredentialError> {
        let mut tried = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.resolve() {
                Ok(credential) => {
                    info!(source = source.kind(), kind = credential.kind(), "credentials resolved");
                    return Ok(credential);
                }
                Err(e) => {
                    warn!(source = source.kind(), error = %e, "credential source unavailable");
                    tried.push(source.kind().to_string());
                }
            }
        }
        Err(CredentialError::NoCredentialsAvailable { tried })
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("sources", &self.kinds())
            .finish()
    }
}
