//! Session token file
//!
//! The token is stored as a single JSON object:
//! `{"access_token": .., "refresh_token": .., "expiry_date": <ms since epoch>}`,
//! optionally with `scope`, `token_type` and `id_token`. A file that cannot be read
//! or parsed is treated as absent so the consent flow runs again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::yup_oauth2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};

use crate::auth::secure_token_file;
use crate::error::Result;

/// Persisted form of the OAuth session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl SessionToken {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn from_token_info(token: TokenInfo) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expiry_date: token
                .expires_at
                .map(|at| (at.unix_timestamp_nanos() / 1_000_000) as i64),
            scope: None,
            token_type: None,
            id_token: token.id_token,
        }
    }

    pub fn into_token_info(self) -> TokenInfo {
        let expires_at = self.expiry_date.and_then(|ms| {
            time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
        });

        TokenInfo {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            id_token: self.id_token,
        }
    }
}

/// Token storage backed by one JSON file, handed to the authenticator
#[derive(Debug, Clone)]
pub struct SessionTokenFile {
    path: PathBuf,
}

impl SessionTokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the cached token; `None` when missing, unreadable or malformed
    pub async fn load(&self) -> Option<SessionToken> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached token at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable token cache {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<SessionToken>(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Ignoring malformed token cache {:?}, consent will be requested: {}",
                    self.path, e
                );
                None
            }
        }
    }

    /// Write `token`, keeping the refresh token, scope and type already on disk
    /// when the new token omits them
    pub async fn store(&self, mut token: SessionToken) -> Result<()> {
        if let Some(previous) = self.load().await {
            if token.refresh_token.is_none() {
                token.refresh_token = previous.refresh_token;
            }
            if token.scope.is_none() {
                token.scope = previous.scope;
            }
            if token.token_type.is_none() {
                token.token_type = previous.token_type;
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(&token)?;
        tokio::fs::write(&self.path, json).await?;
        secure_token_file(&self.path).await?;
        debug!("Token cached at {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for SessionTokenFile {
    async fn set(
        &self,
        _scopes: &[&str],
        token: TokenInfo,
    ) -> std::result::Result<(), TokenStorageError> {
        self.store(SessionToken::from_token_info(token))
            .await
            .map_err(|e| TokenStorageError::Other(e.to_string().into()))
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.load().await.map(SessionToken::into_token_info)
    }
}
