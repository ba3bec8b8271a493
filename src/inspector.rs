//! Decides whether a conversation already carries a reply from the account owner

use tracing::{debug, error};

use crate::client::GmailClient;
use crate::config::FailurePolicy;

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadInspector {
    failure_policy: FailurePolicy,
}

impl ThreadInspector {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self { failure_policy }
    }

    /// True iff some message in the thread carries the SENT label.
    ///
    /// A failed thread fetch is logged and resolved by the failure policy:
    /// fail-open reports `false`, fail-closed reports `true`.
    pub async fn is_replied(&self, client: &dyn GmailClient, thread_id: &str) -> bool {
        match client.get_thread(thread_id).await {
            Ok(thread) => {
                let replied = thread.has_sent_message();
                debug!(
                    thread_id,
                    messages = thread.message_labels.len(),
                    replied,
                    "Inspected thread"
                );
                replied
            }
            Err(e) => {
                let assume_replied = self.failure_policy == FailurePolicy::FailClosed;
                error!(
                    thread_id,
                    assume_replied,
                    "Error checking thread: {}", e
                );
                assume_replied
            }
        }
    }
}
