//! Gmail API client: the five mailbox operations the responder needs

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use google_gmail1::api::{Message, ModifyMessageRequest};
use mime::Mime;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, GMAIL_MODIFY_SCOPE};
use crate::config::ClientConfig;
use crate::error::{GmailError, Result};
use crate::models::{MessageMetadata, MessagePage, MessageRef, Reply, ThreadSummary};

/// All calls act on the authenticated mailbox
const USER_ID: &str = "me";

/// Trait defining the mailbox operations, so cycles can run against a mock
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List one page of messages carrying `label_id`
    async fn list_messages(
        &self,
        label_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage>;

    /// Fetch a message's headers and labels
    async fn get_message(&self, id: &str) -> Result<MessageMetadata>;

    /// Fetch the label sets of every message in a thread
    async fn get_thread(&self, thread_id: &str) -> Result<ThreadSummary>;

    /// Add and remove labels on a single message
    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;

    /// Send a reply; returns the id of the sent message
    async fn send_message(&self, reply: &Reply) -> Result<String>;
}

/// Production Gmail client over the google-gmail1 hub
///
/// Each call is bounded by the configured timeout. Transient failures are
/// retried only when `max_retries` is non-zero.
pub struct ProductionGmailClient {
    hub: GmailHub,
    request_timeout_secs: u64,
    max_retries: u32,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub, config: &ClientConfig) -> Self {
        Self {
            hub,
            request_timeout_secs: config.request_timeout_secs,
            max_retries: config.max_retries,
        }
    }

    /// Get the inner hub reference
    pub fn hub(&self) -> &GmailHub {
        &self.hub
    }

    /// Check if an error is retryable
    fn should_retry(error: &GmailError) -> bool {
        error.is_transient()
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    if let GmailError::RateLimitExceeded { retry_after } = &e {
                        delay = delay.max(Duration::from_secs(*retry_after));
                    }
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name, attempts, max_retries + 1, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one API call under the timeout and retry policy
    async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let timeout_secs = self.request_timeout_secs;
        Self::with_retry(operation_name, self.max_retries, || {
            let call = operation();
            async move {
                if timeout_secs == 0 {
                    return call.await;
                }
                match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Gmail API {} call timed out after {}s", operation_name, timeout_secs);
                        Err(GmailError::Timeout(timeout_secs))
                    }
                }
            }
        })
        .await
    }
}

/// Parse Gmail API Message into our MessageMetadata structure
fn parse_message_metadata(msg: Message) -> Result<MessageMetadata> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let thread_id = msg
        .thread_id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing thread ID".to_string()))?;

    let labels = msg.label_ids.unwrap_or_default();

    let headers = msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .ok_or_else(|| GmailError::InvalidMessageFormat(format!("Message {} has no headers", id)))?;

    let mut from = None;
    let mut subject = String::new();
    let mut message_id_header = None;
    let mut has_unsubscribe = false;

    for header in headers {
        if let (Some(name), Some(value)) = (&header.name, &header.value) {
            match name.to_lowercase().as_str() {
                "from" => from = Some(value.clone()),
                "subject" => subject = value.clone(),
                "message-id" => message_id_header = Some(value.clone()),
                "list-unsubscribe" => has_unsubscribe = true,
                _ => {}
            }
        }
    }

    let from = from
        .ok_or_else(|| GmailError::InvalidMessageFormat(format!("Message {} has no From header", id)))?;

    let (sender_name, sender_email) = match parse_email_header(&from) {
        Some((name, email)) => (name, email),
        None => (String::new(), from.trim().to_string()),
    };

    let is_automated = check_if_automated(&sender_email, &sender_name, has_unsubscribe);

    Ok(MessageMetadata {
        id,
        thread_id,
        from,
        sender_email,
        subject,
        message_id_header,
        labels,
        is_automated,
    })
}

/// Parse email header in "Name <email@example.com>" format
fn parse_email_header(header: &str) -> Option<(String, String)> {
    if let Some(start) = header.find('<') {
        if let Some(end) = header[start..].find('>') {
            let name = header[..start].trim().trim_matches('"').to_string();
            let email = header[start + 1..start + end].trim().to_string();
            return Some((name, email));
        }
    }
    None
}

/// Check if sender appears to be automated
fn check_if_automated(sender_email: &str, sender_name: &str, has_unsubscribe: bool) -> bool {
    let automated_keywords = [
        "noreply",
        "no-reply",
        "notification",
        "automated",
        "donotreply",
        "do-not-reply",
        "mailer",
        "robot",
    ];

    let email_lower = sender_email.to_lowercase();
    let name_lower = sender_name.to_lowercase();

    has_unsubscribe
        || automated_keywords
            .iter()
            .any(|&keyword| email_lower.contains(keyword) || name_lower.contains(keyword))
}

/// Strip line breaks so a header value cannot start a new header
fn sanitize_header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

/// RFC 2047 encode a header value when it is not plain ASCII
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Render a reply as an RFC 2822 message
pub fn compose_rfc2822(reply: &Reply) -> String {
    let mut message = String::new();

    if !reply.from.is_empty() {
        message.push_str(&format!("From: {}\r\n", sanitize_header_value(&reply.from)));
    }
    message.push_str(&format!("To: {}\r\n", sanitize_header_value(&reply.to)));
    message.push_str(&format!(
        "Subject: {}\r\n",
        encode_header_value(&sanitize_header_value(&reply.subject))
    ));
    if let Some(parent) = &reply.in_reply_to {
        let parent = sanitize_header_value(parent);
        message.push_str(&format!("In-Reply-To: {}\r\n", parent));
        message.push_str(&format!("References: {}\r\n", parent));
    }
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    message.push_str("Content-Transfer-Encoding: 8bit\r\n");
    message.push_str("\r\n");
    message.push_str(&reply.body);

    message
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_messages(
        &self,
        label_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let page_token = page_token.as_deref();
        let response = self
            .execute("list_messages", || async move {
                let mut call = self
                    .hub
                    .users()
                    .messages_list(USER_ID)
                    .add_label_ids(label_id)
                    .max_results(max_results);

                if let Some(token) = page_token {
                    call = call.page_token(token);
                }

                let (_, response) = call.add_scope(GMAIL_MODIFY_SCOPE).doit().await?;
                Ok(response)
            })
            .await?;

        let messages: Vec<MessageRef> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| match (m.id, m.thread_id) {
                (Some(id), Some(thread_id)) => Some(MessageRef { id, thread_id }),
                _ => None,
            })
            .collect();

        debug!("Listed {} messages with label {}", messages.len(), label_id);
        Ok(MessagePage {
            messages,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_message(&self, id: &str) -> Result<MessageMetadata> {
        let msg = self
            .execute("get_message", || async move {
                let (_, msg) = self
                    .hub
                    .users()
                    .messages_get(USER_ID, id)
                    .format("metadata")
                    .add_metadata_headers("From")
                    .add_metadata_headers("Subject")
                    .add_metadata_headers("Message-ID")
                    .add_metadata_headers("List-Unsubscribe")
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit()
                    .await?;
                Ok(msg)
            })
            .await?;

        parse_message_metadata(msg)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<ThreadSummary> {
        let thread = self
            .execute("get_thread", || async move {
                let (_, thread) = self
                    .hub
                    .users()
                    .threads_get(USER_ID, thread_id)
                    .format("minimal")
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit()
                    .await?;
                Ok(thread)
            })
            .await?;

        let message_labels = thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.label_ids.unwrap_or_default())
            .collect();

        Ok(ThreadSummary {
            id: thread.id.unwrap_or_else(|| thread_id.to_string()),
            message_labels,
        })
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        self.execute("modify_labels", || async move {
            let request = ModifyMessageRequest {
                add_label_ids: (!add_label_ids.is_empty()).then(|| add_label_ids.to_vec()),
                remove_label_ids: (!remove_label_ids.is_empty()).then(|| remove_label_ids.to_vec()),
            };

            self.hub
                .users()
                .messages_modify(request, USER_ID, message_id)
                .add_scope(GMAIL_MODIFY_SCOPE)
                .doit()
                .await?;
            Ok(())
        })
        .await
    }

    async fn send_message(&self, reply: &Reply) -> Result<String> {
        let raw = compose_rfc2822(reply);

        let sent = self
            .execute("send_message", || {
                let raw = raw.clone();
                async move {
                    let mime_type = "message/rfc822"
                        .parse::<Mime>()
                        .map_err(|e| GmailError::SendError(e.to_string()))?;
                    let request = Message {
                        thread_id: reply.thread_id.clone(),
                        ..Default::default()
                    };

                    let (_, sent) = self
                        .hub
                        .users()
                        .messages_send(request, USER_ID)
                        .add_scope(GMAIL_MODIFY_SCOPE)
                        .upload(Cursor::new(raw.into_bytes()), mime_type)
                        .await?;
                    Ok(sent)
                }
            })
            .await?;

        sent.id
            .ok_or_else(|| GmailError::SendError("Sent message has no ID".to_string()))
    }
}
