//! Composes the acknowledgment reply, sends it and archives the original

use std::fmt;
use tracing::{error, info, warn};

use crate::client::GmailClient;
use crate::config::{Config, SENDER_PLACEHOLDER};
use crate::models::{MessageMetadata, Reply, INBOX_LABEL};

/// Step of `respond` that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondStage {
    Fetch,
    Send,
    Archive,
}

impl fmt::Display for RespondStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespondStage::Fetch => write!(f, "fetch"),
            RespondStage::Send => write!(f, "send"),
            RespondStage::Archive => write!(f, "archive"),
        }
    }
}

/// Result of handling one message; errors are captured here, never propagated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    /// Reply sent and original archived
    Replied {
        recipient: String,
        sent_message_id: String,
    },
    /// Dry run: the reply was built but nothing was sent or modified
    DryRun { recipient: String },
    /// Sender looks automated and automated senders are skipped
    SkippedAutomated { sender: String },
    Failed { stage: RespondStage, error: String },
}

impl RespondOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RespondOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Responder {
    sender_address: Option<String>,
    subject_prefix: String,
    body_template: String,
    thread_replies: bool,
    skip_automated: bool,
    dry_run: bool,
}

impl Default for Responder {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Responder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sender_address: config.responder.sender_address.clone(),
            subject_prefix: config.responder.subject_prefix.clone(),
            body_template: config.responder.body_template.clone(),
            thread_replies: config.responder.thread_replies,
            skip_automated: config.responder.skip_automated,
            dry_run: config.execution.dry_run,
        }
    }

    /// Build the acknowledgment for `message`
    pub fn build_reply(&self, message: &MessageMetadata) -> Reply {
        let (thread_id, in_reply_to) = if self.thread_replies {
            (Some(message.thread_id.clone()), message.message_id_header.clone())
        } else {
            (None, None)
        };

        Reply {
            from: self.sender_address.clone().unwrap_or_default(),
            to: message.sender_email.clone(),
            subject: format!("{}{}", self.subject_prefix, message.subject),
            body: self
                .body_template
                .replace(SENDER_PLACEHOLDER, &message.sender_email),
            thread_id,
            in_reply_to,
        }
    }

    /// Reply to `message_id` and archive it.
    ///
    /// INBOX is removed only after the send has been confirmed; a failed send
    /// leaves the message in the inbox for the next cycle.
    pub async fn respond(&self, client: &dyn GmailClient, message_id: &str) -> RespondOutcome {
        let message = match client.get_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                error!(message_id, "Error fetching email to reply to: {}", e);
                return RespondOutcome::Failed {
                    stage: RespondStage::Fetch,
                    error: e.to_string(),
                };
            }
        };

        if self.skip_automated && message.is_automated {
            info!(
                message_id,
                sender = %message.sender_email,
                "Skipping automated sender"
            );
            return RespondOutcome::SkippedAutomated {
                sender: message.sender_email,
            };
        }

        let reply = self.build_reply(&message);

        if self.dry_run {
            info!(
                message_id,
                to = %reply.to,
                subject = %reply.subject,
                "[dry run] Would reply and archive"
            );
            return RespondOutcome::DryRun { recipient: reply.to };
        }

        let sent_message_id = match client.send_message(&reply).await {
            Ok(id) => id,
            Err(e) => {
                error!(message_id, to = %reply.to, "Error sending reply: {}", e);
                return RespondOutcome::Failed {
                    stage: RespondStage::Send,
                    error: e.to_string(),
                };
            }
        };
        info!(message_id, sent_message_id = %sent_message_id, "Reply sent");

        if let Err(e) = client
            .modify_labels(message_id, &[], &[INBOX_LABEL.to_string()])
            .await
        {
            warn!(
                message_id,
                sent_message_id = %sent_message_id,
                "Reply sent but archiving failed: {}", e
            );
            return RespondOutcome::Failed {
                stage: RespondStage::Archive,
                error: e.to_string(),
            };
        }

        info!("Replied to email from {}.", reply.to);
        RespondOutcome::Replied {
            recipient: reply.to,
            sent_message_id,
        }
    }
}
