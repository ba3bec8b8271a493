//! Gmail Auto-Responder
//!
//! A polling service that acknowledges inbox conversations the account owner has
//! not answered yet, then archives the acknowledged messages.
//!
//! # Overview
//!
//! Each scan cycle:
//! - **Lists** messages labeled `INBOX` (paged, up to a configured page cap)
//! - **Inspects** each message's thread for a message labeled `SENT`
//! - **Replies** to unanswered messages with a templated acknowledgment
//! - **Archives** the original by removing `INBOX`, only after the reply is sent
//!
//! Cycles repeat at a random whole-second interval (45 to 120 seconds by default)
//! until the scheduler is stopped.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_autoresponder::{auth, client::ProductionGmailClient, config::Config, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::obtain_session(
//!         "credentials.json".as_ref(),
//!         "token.json".as_ref(),
//!         config.auth.consent_mode,
//!     )
//!     .await?;
//!     let client = ProductionGmailClient::new(hub, &config.client);
//!
//!     let report = Scanner::from_config(&config).check_emails(&client).await?;
//!     println!("Replied to {} messages", report.replied);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 consent flow, token cache and Gmail hub construction
//! - [`client`] - Gmail API client trait and production implementation
//! - [`cli`] - Command-line interface and command orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`inspector`] - Detects threads that already carry a reply
//! - [`models`] - Core data structures
//! - [`responder`] - Reply composition, sending and archiving
//! - [`scanner`] - One scan cycle over the inbox
//! - [`scheduler`] - Randomized, cancellable polling loop
//! - [`token_cache`] - Session token file read and written by the authenticator

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod inspector;
pub mod models;
pub mod responder;
pub mod scanner;
pub mod scheduler;
pub mod token_cache;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{MessageMetadata, MessagePage, MessageRef, Reply, ThreadSummary};

// Config types
pub use config::{
    ClientConfig, Config, ExecutionConfig, FailurePolicy, ResponderConfig, ScanConfig,
    SchedulerConfig,
};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};

// Cycle components
pub use inspector::ThreadInspector;
pub use responder::{RespondOutcome, RespondStage, Responder};
pub use scanner::{CycleReport, Scanner};
pub use scheduler::{PollInterval, Scheduler, SchedulerHandle};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
