use anyhow::Result;
use clap::Parser;
use gmail_autoresponder::cli::{self, Cli, Commands};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-autoresponder --help");
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_autoresponder=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_autoresponder=info,warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if cli.json_logs {
        builder.json().with_current_span(true).init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run() -> Result<()> {
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command() {
        Commands::Run => {
            tracing::info!("Gmail auto-responder starting...");
            let cycles = cli::run_daemon(&cli).await?;
            println!("Stopped after {} scan cycles", cycles);
            Ok(())
        }

        Commands::Once => {
            let report = cli::run_once(&cli).await?;
            cli::print_cycle_summary(&report);
            Ok(())
        }

        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");
            let email = cli::authenticate(&cli, force).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);
            println!("Connected to account: {}", email);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            cli::init_config(&output, force).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - responder.body_template: Acknowledgment text ({{sender}} is replaced)");
            println!("  - responder.sender_address: From address for replies");
            println!("  - scheduler.min_interval_secs / max_interval_secs: Polling window");
            println!("  - inspector.failure_policy: 'fail-open' or 'fail-closed'");
            Ok(())
        }
    }
}
