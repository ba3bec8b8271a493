use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GmailError, Result};

/// Placeholder in the reply body template that is replaced by the sender address
pub const SENDER_PLACEHOLDER: &str = "{sender}";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub reply_once_per_thread: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            reply_once_per_thread: false,
        }
    }
}

/// What the thread inspector reports when the thread cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Treat the thread as unreplied (may reply twice on transient errors)
    #[default]
    FailOpen,
    /// Treat the thread as replied (may miss a reply on transient errors)
    FailClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InspectorConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Fixed `From` address; Gmail uses the account address when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_body_template")]
    pub body_template: String,
    #[serde(default = "default_thread_replies")]
    pub thread_replies: bool,
    #[serde(default)]
    pub skip_automated: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            sender_address: None,
            subject_prefix: default_subject_prefix(),
            body_template: default_body_template(),
            thread_replies: default_thread_replies(),
            skip_automated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            run_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-call timeout; 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries for transient errors; 0 means every call is attempted once
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
        }
    }
}

/// How the user grants consent when no cached token exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentMode {
    /// Print the URL and read the authorization code from stdin
    #[default]
    Console,
    /// Catch the authorization code on a local loopback redirect
    Redirect,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub consent_mode: ConsentMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    10
}

fn default_subject_prefix() -> String {
    "Re: ".to_string()
}

fn default_body_template() -> String {
    "Thank you for your email, {sender}! Your message has been received.".to_string()
}

fn default_thread_replies() -> bool {
    true
}

fn default_min_interval_secs() -> u64 {
    45
}

fn default_max_interval_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GmailError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.page_size == 0 {
            return Err(GmailError::ConfigError(
                "scan.page_size must be at least 1".to_string(),
            ));
        }
        if self.scan.page_size > 500 {
            return Err(GmailError::ConfigError(
                "scan.page_size cannot exceed 500 (Gmail API maximum)".to_string(),
            ));
        }
        if self.scan.max_pages == 0 {
            return Err(GmailError::ConfigError(
                "scan.max_pages must be at least 1".to_string(),
            ));
        }

        if let Some(sender) = &self.responder.sender_address {
            if !sender.contains('@') {
                return Err(GmailError::ConfigError(format!(
                    "responder.sender_address '{}' is not an email address",
                    sender
                )));
            }
        }
        if !self.responder.body_template.contains(SENDER_PLACEHOLDER) {
            return Err(GmailError::ConfigError(format!(
                "responder.body_template must contain the {} placeholder",
                SENDER_PLACEHOLDER
            )));
        }
        if self.responder.subject_prefix.contains(['\r', '\n']) {
            return Err(GmailError::ConfigError(
                "responder.subject_prefix cannot contain line breaks".to_string(),
            ));
        }

        if self.scheduler.min_interval_secs == 0 {
            return Err(GmailError::ConfigError(
                "scheduler.min_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.scheduler.min_interval_secs > self.scheduler.max_interval_secs {
            return Err(GmailError::ConfigError(format!(
                "scheduler.min_interval_secs ({}) cannot exceed scheduler.max_interval_secs ({})",
                self.scheduler.min_interval_secs, self.scheduler.max_interval_secs
            )));
        }

        if self.client.max_retries > 10 {
            return Err(GmailError::ConfigError(
                "client.max_retries cannot exceed 10".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.scan.page_size, 100);
        assert_eq!(config.scan.max_pages, 10);
        assert!(!config.scan.reply_once_per_thread);

        assert_eq!(config.inspector.failure_policy, FailurePolicy::FailOpen);

        assert!(config.responder.sender_address.is_none());
        assert_eq!(config.responder.subject_prefix, "Re: ");
        assert!(config.responder.body_template.contains("{sender}"));
        assert!(config.responder.thread_replies);
        assert!(!config.responder.skip_automated);

        assert_eq!(config.scheduler.min_interval_secs, 45);
        assert_eq!(config.scheduler.max_interval_secs, 120);
        assert!(!config.scheduler.run_on_start);

        assert_eq!(config.client.request_timeout_secs, 60);
        assert_eq!(config.client.max_retries, 0);

        assert_eq!(config.auth.consent_mode, ConsentMode::Console);
        assert!(!config.execution.dry_run);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_page_size_bounds() {
        let mut config = Config::default();
        config.scan.page_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("at least 1"));

        config.scan.page_size = 501;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 500"));

        config.scan.page_size = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_pages_zero() {
        let mut config = Config::default();
        config.scan.max_pages = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("scan.max_pages"));
    }

    #[test]
    fn test_config_validation_sender_address() {
        let mut config = Config::default();
        config.responder.sender_address = Some("not-an-address".to_string());
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("is not an email address"));

        config.responder.sender_address = Some("me@example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_template_without_placeholder() {
        let mut config = Config::default();
        config.responder.body_template = "Thanks!".to_string();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("{sender} placeholder"));
    }

    #[test]
    fn test_config_validation_prefix_with_newline() {
        let mut config = Config::default();
        config.responder.subject_prefix = "Re:\r\nBcc: x@y.z ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_interval_order() {
        let mut config = Config::default();
        config.scheduler.min_interval_secs = 200;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("cannot exceed scheduler.max_interval_secs"));

        config.scheduler.min_interval_secs = 120;
        assert!(config.validate().is_ok());

        config.scheduler.min_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_max_retries() {
        let mut config = Config::default();
        config.client.max_retries = 11;
        assert!(config.validate().is_err());
        config.client.max_retries = 3;
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.responder.sender_address = Some("me@example.com".to_string());
        config.inspector.failure_policy = FailurePolicy::FailClosed;
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.responder.sender_address.as_deref(), Some("me@example.com"));
        assert_eq!(loaded.inspector.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(loaded.scheduler.max_interval_secs, 120);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-autoresponder-config-12345.toml");

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.scheduler.min_interval_secs, 45);
        assert_eq!(config.scan.page_size, 100);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        tokio::fs::write(path, "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(path).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let partial_config = r#"
[inspector]
failure_policy = "fail-closed"

[auth]
consent_mode = "redirect"

[execution]
dry_run = true
"#;
        tokio::fs::write(path, partial_config).await.unwrap();

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.inspector.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.auth.consent_mode, ConsentMode::Redirect);
        assert!(config.execution.dry_run);

        assert_eq!(config.scheduler.min_interval_secs, 45);
        assert_eq!(config.responder.subject_prefix, "Re: ");
    }

    #[tokio::test]
    async fn test_config_load_rejects_invalid_values() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        tokio::fs::write(path, "[scheduler]\nmin_interval_secs = 500\n")
            .await
            .unwrap();

        assert!(Config::load(path).await.is_err());
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::create_example(&path).await.unwrap();

        assert!(path.exists());
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.scan.max_pages, 10);
    }
}
