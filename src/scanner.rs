//! One scan cycle: list the inbox, skip answered threads, reply to the rest

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::client::GmailClient;
use crate::config::{Config, ScanConfig};
use crate::error::Result;
use crate::inspector::ThreadInspector;
use crate::models::{MessageRef, INBOX_LABEL};
use crate::responder::{RespondOutcome, Responder};

/// Counters for a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Inbox messages seen across all listed pages
    pub listed: usize,
    /// Messages whose thread already carries a sent message
    pub already_replied: usize,
    pub replied: usize,
    pub dry_run: usize,
    /// Automated senders, or later messages of a thread answered this cycle
    pub skipped: usize,
    pub failed: usize,
    /// Listing stopped at `max_pages` with more pages available
    pub truncated: bool,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            cycle_id,
            started_at: now,
            finished_at: now,
            listed: 0,
            already_replied: 0,
            replied: 0,
            dry_run: 0,
            skipped: 0,
            failed: 0,
            truncated: false,
        }
    }

    fn record(&mut self, outcome: &RespondOutcome) {
        match outcome {
            RespondOutcome::Replied { .. } => self.replied += 1,
            RespondOutcome::DryRun { .. } => self.dry_run += 1,
            RespondOutcome::SkippedAutomated { .. } => self.skipped += 1,
            RespondOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct Scanner {
    inspector: ThreadInspector,
    responder: Responder,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(inspector: ThreadInspector, responder: Responder, config: ScanConfig) -> Self {
        Self {
            inspector,
            responder,
            config,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ThreadInspector::new(config.inspector.failure_policy),
            Responder::from_config(config),
            config.scan.clone(),
        )
    }

    /// Run a single cycle against `client`.
    ///
    /// Only a listing failure is returned as an error; every per-message
    /// failure is logged and counted in the report.
    pub async fn check_emails(&self, client: &dyn GmailClient) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("scan_cycle", %cycle_id);
        self.run_cycle(client, cycle_id).instrument(span).await
    }

    async fn run_cycle(&self, client: &dyn GmailClient, cycle_id: Uuid) -> Result<CycleReport> {
        let mut report = CycleReport::new(cycle_id);

        let (messages, truncated) = match self.list_inbox(client).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Error checking emails: {}", e);
                return Err(e);
            }
        };
        report.listed = messages.len();
        report.truncated = truncated;

        if messages.is_empty() {
            info!("No new emails found.");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        info!("Found {} inbox messages", messages.len());

        // Every thread is inspected before any reply goes out: a threaded reply
        // marks its own thread SENT.
        let mut thread_state: HashMap<String, bool> = HashMap::new();
        let mut unreplied = Vec::new();

        for message in &messages {
            let replied = match thread_state.get(&message.thread_id) {
                Some(replied) => *replied,
                None => {
                    let replied = self.inspector.is_replied(client, &message.thread_id).await;
                    thread_state.insert(message.thread_id.clone(), replied);
                    replied
                }
            };

            if replied {
                debug!(message_id = %message.id, "Thread already replied to");
                report.already_replied += 1;
            } else {
                unreplied.push(message);
            }
        }

        let mut answered_threads: HashSet<String> = HashSet::new();

        for message in unreplied {
            if self.config.reply_once_per_thread && answered_threads.contains(&message.thread_id)
            {
                debug!(
                    message_id = %message.id,
                    thread_id = %message.thread_id,
                    "Thread already answered this cycle"
                );
                report.skipped += 1;
                continue;
            }

            let outcome = self.responder.respond(client, &message.id).await;
            if matches!(
                outcome,
                RespondOutcome::Replied { .. } | RespondOutcome::DryRun { .. }
            ) {
                answered_threads.insert(message.thread_id.clone());
            }
            report.record(&outcome);
        }

        report.finished_at = Utc::now();
        info!(
            listed = report.listed,
            already_replied = report.already_replied,
            replied = report.replied,
            dry_run = report.dry_run,
            skipped = report.skipped,
            failed = report.failed,
            "Cycle complete"
        );

        Ok(report)
    }

    /// Collect inbox references across pages, up to `max_pages`.
    ///
    /// The full listing is taken before any message is archived so that
    /// removing INBOX labels cannot shift later pages.
    async fn list_inbox(&self, client: &dyn GmailClient) -> Result<(Vec<MessageRef>, bool)> {
        let mut messages = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = client
                .list_messages(INBOX_LABEL, self.config.page_size, page_token.take())
                .await?;
            pages += 1;
            debug!(page = pages, count = page.messages.len(), "Listed inbox page");
            messages.extend(page.messages);

            match page.next_page_token {
                Some(token) if pages < self.config.max_pages => page_token = Some(token),
                Some(_) => {
                    warn!(
                        max_pages = self.config.max_pages,
                        "Page cap reached; remaining inbox messages wait for the next cycle"
                    );
                    return Ok((messages, true));
                }
                None => return Ok((messages, false)),
            }
        }
    }
}
