//! Access-token acquisition for the Drive client.
//!
//! Service-account keys are exchanged through the JWT bearer grant (RS256
//! assertion), authorized-user tokens are refreshed with the refresh-token
//! grant when they carry client credentials, and plain bearer tokens are
//! used as-is. The current token is cached behind an async mutex.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::BackendError;
use crate::credentials::{AuthorizedUserToken, Credential, ServiceAccountKey};

/// OAuth scope requested for service-account assertions.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Lifetime requested for a service-account assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < at,
            None => true,
        }
    }
}

enum Grant {
    Static,
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserToken),
}

pub(crate) struct TokenProvider {
    grant: Grant,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub(crate) fn from_credential(credential: Credential) -> Self {
        match credential {
            Credential::Bearer(token) => Self {
                grant: Grant::Static,
                cached: Mutex::new(Some(AccessToken {
                    value: token,
                    expires_at: None,
                })),
            },
            Credential::ServiceAccount(key) => Self {
                grant: Grant::ServiceAccount(key),
                cached: Mutex::new(None),
            },
            Credential::AuthorizedUser(token) => {
                let seeded = token
                    .access_token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .map(|value| AccessToken {
                        value,
                        expires_at: token
                            .expiry_date
                            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                    });
                Self {
                    grant: Grant::AuthorizedUser(token),
                    cached: Mutex::new(seeded),
                }
            }
        }
    }

    /// Current bearer token, fetching a new one when the cached one is stale.
    pub(crate) async fn bearer(&self, http: &Client) -> Result<String, BackendError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.value.clone());
        }

        let token = match &self.grant {
            // A static token cannot be renewed; keep using it and let the API
            // reject it if it has been revoked.
            Grant::Static => {
                return cached
                    .as_ref()
                    .map(|t| t.value.clone())
                    .ok_or_else(|| BackendError::Auth("no access token available".into()));
            }
            Grant::ServiceAccount(key) => exchange_assertion(http, key, now).await?,
            Grant::AuthorizedUser(user) if user.is_refreshable() => refresh(http, user).await?,
            Grant::AuthorizedUser(_) => {
                return cached.as_ref().map(|t| t.value.clone()).ok_or_else(|| {
                    BackendError::Auth("token expired and cannot be refreshed".into())
                });
            }
        };

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// Build the signed RS256 assertion for the JWT bearer grant.
pub(crate) fn build_assertion(
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
) -> Result<String, BackendError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: DRIVE_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| BackendError::Auth(format!("invalid service account private key: {e}")))?;
    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| BackendError::Auth(format!("failed to sign assertion: {e}")))
}

async fn exchange_assertion(
    http: &Client,
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
) -> Result<AccessToken, BackendError> {
    let assertion = build_assertion(key, now)?;
    debug!(client_email = %key.client_email, "exchanging service account assertion");
    request_token(
        http,
        &key.token_uri,
        &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
    )
    .await
}

async fn refresh(http: &Client, user: &AuthorizedUserToken) -> Result<AccessToken, BackendError> {
    let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
        user.refresh_token.as_deref(),
        user.client_id.as_deref(),
        user.client_secret.as_deref(),
    ) else {
        return Err(BackendError::Auth("token cannot be refreshed".into()));
    };
    debug!("refreshing authorized user token");
    request_token(
        http,
        &user.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ],
    )
    .await
}

async fn request_token(
    http: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<AccessToken, BackendError> {
    let resp = http
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| BackendError::Auth(format!("token request failed: {}", e.without_url())))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v["error_description"]
                    .as_str()
                    .or_else(|| v["error"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| status.to_string());
        return Err(BackendError::Auth(format!("token endpoint rejected the request: {reason}")));
    }

    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| BackendError::Auth(format!("token response parse error: {e}")))?;

    Ok(AccessToken {
        value: token.access_token,
        expires_at: token.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_without_expiry_stay_fresh() {
        let token = AccessToken {
            value: "t".into(),
            expires_at: None,
        };
        assert!(token.is_fresh(Utc::now()));
    }

    #[test]
    fn tokens_inside_the_margin_are_stale() {
        let now = Utc::now();
        let token = AccessToken {
            value: "t".into(),
            expires_at: Some(now + Duration::seconds(30)),
        };
        assert!(!token.is_fresh(now));

        let token = AccessToken {
            value: "t".into(),
            expires_at: Some(now + Duration::seconds(600)),
        };
        assert!(token.is_fresh(now));
    }

    #[test]
    fn invalid_private_key_is_an_auth_error() {
        let key = ServiceAccountKey {
            key_type: Some("service_account".into()),
            client_email: "bot@example.com".into(),
            private_key: "not a pem".into(),
            token_uri: crate::credentials::GOOGLE_TOKEN_URI.into(),
        };
        let err = build_assertion(&key, Utc::now()).unwrap_err();
        assert!(matches!(err, BackendError::Auth(_)));
    }

    #[tokio::test]
    async fn static_token_is_returned_without_network() {
        let provider = TokenProvider::from_credential(Credential::Bearer("ya29.static".into()));
        let http = Client::new();
        assert_eq!(provider.bearer(&http).await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn expired_unrefreshable_token_is_still_used() {
        let token = AuthorizedUserToken {
            access_token: Some("ya29.old".into()),
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_uri: crate::credentials::GOOGLE_TOKEN_URI.into(),
            expiry_date: Some(1_000),
        };
        let provider = TokenProvider::from_credential(Credential::AuthorizedUser(token));
        let http = Client::new();
        assert_eq!(provider.bearer(&http).await.unwrap(), "ya29.old");
    }
}
