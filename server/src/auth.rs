use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};

use crate::{server_config::GmailConfig, HttpClient};

/// Credential persisted after the OAuth consent flow. The access token is
/// optional; the refresh token is the durable part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: Option<String>,
    pub refresh_token: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

/// A live mail API session obtained from a credential.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        // Refresh slightly early so in-flight requests do not race expiry
        self.expires_at - Duration::seconds(30) <= Utc::now()
    }
}

#[derive(Debug, Display)]
pub enum AuthError {
    MissingCredentials,
    RefreshFailed(String),
    TokenStore(String),
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Produce a usable session from a stored credential. If the stored access
/// token is still live it is used as-is, otherwise the refresh token is
/// exchanged once.
pub async fn ensure_session(
    http_client: &HttpClient,
    gmail_config: &GmailConfig,
    credential: &StoredCredential,
) -> AuthResult<Session> {
    if let (Some(token), Some(expiry)) = (&credential.access_token, credential.expiry) {
        let session = Session {
            access_token: token.clone(),
            expires_at: expiry,
        };
        if !session.is_expired() {
            return Ok(session);
        }
    }

    refresh_session(http_client, gmail_config, credential).await
}

/// Exchange the refresh token for a fresh access token. No retry: the caller
/// decides whether a second attempt is allowed.
pub async fn refresh_session(
    http_client: &HttpClient,
    gmail_config: &GmailConfig,
    credential: &StoredCredential,
) -> AuthResult<Session> {
    if credential.refresh_token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let params = [
        ("client_id", gmail_config.client_id.as_str()),
        ("client_secret", gmail_config.client_secret.as_str()),
        ("refresh_token", credential.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let resp = http_client
        .post(&gmail_config.token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::error!("Token refresh failed ({}): {}", status, body);
        return Err(AuthError::RefreshFailed(format!(
            "status {}: {}",
            status, body
        )));
    }

    let token = resp
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

    Ok(Session {
        access_token: token.access_token,
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
    })
}

pub fn load_credential(path: &Path) -> AuthResult<Option<StoredCredential>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| AuthError::TokenStore(e.to_string()))?;
    let credential =
        serde_json::from_str(&raw).map_err(|e| AuthError::TokenStore(e.to_string()))?;
    Ok(Some(credential))
}

pub fn save_credential(path: &Path, credential: &StoredCredential) -> AuthResult<()> {
    let raw = serde_json::to_string_pretty(credential)
        .map_err(|e| AuthError::TokenStore(e.to_string()))?;
    std::fs::write(path, raw).map_err(|e| AuthError::TokenStore(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry() {
        let live = Session {
            access_token: "token".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!live.is_expired());

        let stale = Session {
            access_token: "token".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(stale.is_expired());

        // Tokens within the early-refresh window count as expired
        let nearly = Session {
            access_token: "token".to_string(),
            expires_at: Utc::now() + Duration::seconds(10),
        };
        assert!(nearly.is_expired());
    }

    #[test]
    fn test_credential_round_trip() {
        let dir = std::env::temp_dir().join(format!("automail-auth-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("token.json");

        assert!(load_credential(&path).unwrap().is_none());

        let credential = StoredCredential {
            access_token: Some("abc".to_string()),
            refresh_token: "refresh".to_string(),
            expiry: None,
        };
        save_credential(&path, &credential).unwrap();

        let loaded = load_credential(&path).unwrap().unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("abc"));
        assert_eq!(loaded.refresh_token, "refresh");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
