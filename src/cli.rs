//! Command-line interface and command orchestration

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{self, GMAIL_MODIFY_SCOPE};
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::scanner::{CycleReport, Scanner};
use crate::scheduler::{Scheduler, SchedulerHandle};

#[derive(Parser, Debug)]
#[command(name = "gmail-autoresponder")]
#[command(version = "0.1.0")]
#[command(about = "Acknowledges unanswered Gmail conversations and archives them", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = "token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log the replies that would be sent without sending or archiving anything
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Poll the inbox until interrupted (default)
    Run,

    /// Run a single scan cycle and exit
    Once,

    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

/// Load the configuration file and apply command-line overrides
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config).await?;
    if cli.dry_run {
        config.execution.dry_run = true;
    }
    Ok(config)
}

/// Authenticate and build the production client
pub async fn connect(cli: &Cli, config: &Config) -> Result<ProductionGmailClient> {
    let hub = auth::obtain_session(&cli.credentials, &cli.token_cache, config.auth.consent_mode)
        .await?;
    Ok(ProductionGmailClient::new(hub, &config.client))
}

/// Poll until Ctrl-C; returns the number of cycles run
pub async fn run_daemon(cli: &Cli) -> Result<usize> {
    let config = load_config(cli).await?;
    if config.execution.dry_run {
        println!("Running in DRY RUN mode - no replies will be sent");
    }

    let client: Arc<dyn GmailClient> = Arc::new(connect(cli, &config).await?);
    let scheduler = Scheduler::new(client, Scanner::from_config(&config), &config.scheduler)?;

    let handle = scheduler.handle();
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, handle).await == InterruptOutcome::Forced {
            std::process::exit(130);
        }
    });

    Ok(scheduler.run().await)
}

/// How the interrupt listener ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// A second interrupt arrived; the caller should exit immediately
    Forced,
    /// The signal listener itself failed
    ListenerFailed,
}

/// Stop the scheduler on the first interrupt and report `Forced` on the second
pub async fn forward_interrupts<F, Fut>(mut next_interrupt: F, handle: SchedulerHandle) -> InterruptOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        return InterruptOutcome::ListenerFailed;
    }
    info!("Interrupt received, stopping after the current cycle (Ctrl-C again to exit now)");
    handle.stop();

    match next_interrupt().await {
        Ok(()) => {
            warn!("Second interrupt received, exiting without waiting for the current cycle");
            InterruptOutcome::Forced
        }
        Err(e) => {
            warn!("Unable to listen for Ctrl-C: {}", e);
            InterruptOutcome::ListenerFailed
        }
    }
}

/// Run exactly one scan cycle
pub async fn run_once(cli: &Cli) -> Result<CycleReport> {
    let config = load_config(cli).await?;
    let client = connect(cli, &config).await?;
    Scanner::from_config(&config).check_emails(&client).await
}

/// Authenticate (optionally discarding the cached token) and return the connected address
pub async fn authenticate(cli: &Cli, force: bool) -> Result<String> {
    let config = load_config(cli).await?;

    if force && cli.token_cache.exists() {
        tokio::fs::remove_file(&cli.token_cache).await?;
        info!("Removed existing token cache");
    }

    let client = connect(cli, &config).await?;
    let (_, profile) = client
        .hub()
        .users()
        .get_profile("me")
        .add_scope(GMAIL_MODIFY_SCOPE)
        .doit()
        .await?;

    Ok(profile.email_address.unwrap_or_default())
}

/// Write an example configuration file, refusing to overwrite unless `force`
pub async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(GmailError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }
    Config::create_example(output).await
}

pub fn print_cycle_summary(report: &CycleReport) {
    println!("\n========================================");
    println!("Scan Cycle Summary");
    println!("========================================");
    println!("Cycle ID: {}", report.cycle_id);
    println!(
        "Duration: {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    println!("Inbox messages: {}", report.listed);
    if report.truncated {
        println!("  (listing stopped at the page cap)");
    }
    println!("Already replied: {}", report.already_replied);
    println!("Replied: {}", report.replied);
    if report.dry_run > 0 {
        println!("Would reply (dry run): {}", report.dry_run);
    }
    println!("Skipped: {}", report.skipped);
    println!("Failed: {}", report.failed);
    println!("========================================");
}
