//! OAuth2 authentication and Gmail hub construction
//!
//! Startup obtains one session: a cached token from the token file is used as-is,
//! otherwise the operator is walked through the installed-app consent flow. The
//! token file layout lives in [`crate::token_cache`].

use futures::future::BoxFuture;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::ApplicationSecret;

use crate::config::ConsentMode;
use crate::error::{GmailError, Result};
use crate::token_cache::SessionTokenFile;

/// Scope for reading threads, sending replies and archiving messages
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Every scope the responder requests at consent time
pub const REQUIRED_SCOPES: &[&str] = &[GMAIL_MODIFY_SCOPE];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Credential structure matching Google's OAuth2 credentials JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub installed: InstalledApp,
}

/// Installed application credentials (desktop/CLI app)
#[derive(Debug, Serialize, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl Credentials {
    /// Convert into the secret used by the authenticator; only the first redirect URI is kept
    pub fn into_application_secret(self) -> ApplicationSecret {
        let app = self.installed;
        ApplicationSecret {
            client_id: app.client_id,
            client_secret: app.client_secret,
            auth_uri: app.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: app.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            redirect_uris: app.redirect_uris.into_iter().take(1).collect(),
            project_id: app.project_id,
            ..Default::default()
        }
    }
}

/// Load OAuth2 credentials from a JSON file
pub async fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(path).await?;
    let creds = serde_json::from_str(&content)?;
    Ok(creds)
}

/// Load OAuth2 credentials from environment variables
///
/// # Environment Variables
/// - `GMAIL_CLIENT_ID`: OAuth2 client ID
/// - `GMAIL_CLIENT_SECRET`: OAuth2 client secret
/// - `GMAIL_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GMAIL_CLIENT_ID")
        .map_err(|_| GmailError::ConfigError("GMAIL_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GMAIL_CLIENT_SECRET")
        .map_err(|_| GmailError::ConfigError("GMAIL_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri = env::var("GMAIL_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: DEFAULT_AUTH_URI.to_string(),
        token_uri: DEFAULT_TOKEN_URI.to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Resolve the application secret from the credentials file, or from the
/// environment when the file does not exist
pub async fn resolve_application_secret(credentials_path: &Path) -> Result<ApplicationSecret> {
    if credentials_path.exists() {
        let creds = load_credentials(credentials_path).await.map_err(|e| {
            GmailError::AuthError(format!(
                "Failed to read credentials from {:?}: {}",
                credentials_path, e
            ))
        })?;
        return Ok(creds.into_application_secret());
    }

    debug!(
        "Credentials file {:?} not found, falling back to environment",
        credentials_path
    );
    load_credentials_from_env().map_err(|e| {
        GmailError::AuthError(format!(
            "No credentials file at {:?} and environment is incomplete: {}",
            credentials_path, e
        ))
    })
}

/// Consent prompt used when no token is cached: prints the URL and blocks on one line of stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl InstalledFlowDelegate for ConsolePrompt {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> BoxFuture<'a, std::result::Result<String, String>> {
        Box::pin(async move {
            println!("Authorize this app by visiting this URL: {}", url);
            if !need_code {
                return Ok(String::new());
            }
            read_authorization_code(tokio::io::stdin(), tokio::io::stdout())
                .await
                .map_err(|e| format!("Failed to read authorization code: {}", e))
        })
    }
}

/// Prompt for and read a single authorization code line
async fn read_authorization_code<R, W>(input: R, mut output: W) -> std::io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    output.write_all(b"Enter the code from the URL here: ").await?;
    output.flush().await?;

    let mut line = String::new();
    BufReader::new(input).read_line(&mut line).await?;

    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no authorization code entered",
        ));
    }
    Ok(code)
}

/// Obtain an authenticated Gmail hub
///
/// A token already present in `token_cache_path` is reused; otherwise the consent
/// flow selected by `consent_mode` runs and the new token is persisted there.
/// Every failure here is fatal to startup.
pub async fn obtain_session(
    credentials_path: &Path,
    token_cache_path: &Path,
    consent_mode: ConsentMode,
) -> Result<GmailHub> {
    let secret = resolve_application_secret(credentials_path).await?;

    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let builder = match consent_mode {
        ConsentMode::Console => yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::Interactive,
        )
        .flow_delegate(Box::new(ConsolePrompt)),
        ConsentMode::Redirect => yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        ),
    };

    let auth = builder
        .with_storage(Box::new(SessionTokenFile::new(token_cache_path)))
        .build()
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Resolve the token now so consent happens at startup, not on the first cycle
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    info!("Authenticated; token cached at {:?}", token_cache_path);

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| {
                    GmailError::AuthError(format!("Failed to load TLS roots: {}", e))
                })?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
