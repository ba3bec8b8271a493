use serde::{Deserialize, Serialize};

/// System label carried by every message currently in the inbox
pub const INBOX_LABEL: &str = "INBOX";

/// System label carried by every message sent from the authenticated account
pub const SENT_LABEL: &str = "SENT";

/// Entry of an inbox listing: just enough to inspect the thread and fetch the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

/// One page of a message listing
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    pub thread_id: String,
    /// Raw `From` header value, e.g. `Jane <jane@example.com>`
    pub from: String,
    /// Bare address extracted from `from`
    pub sender_email: String,
    pub subject: String,
    /// RFC 2822 `Message-ID` header, used for reply threading
    pub message_id_header: Option<String>,
    pub labels: Vec<String>,
    pub is_automated: bool,
}

/// Label sets of every message in a conversation, in thread order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub message_labels: Vec<Vec<String>>,
}

impl ThreadSummary {
    /// True once any message in the thread was sent by the account owner
    pub fn has_sent_message(&self) -> bool {
        self.message_labels
            .iter()
            .any(|labels| labels.iter().any(|l| l == SENT_LABEL))
    }
}

/// Acknowledgment reply, built per message and discarded after sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Thread to file the reply under, when threading is enabled
    pub thread_id: Option<String>,
    /// `Message-ID` of the message being answered
    pub in_reply_to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(labels: &[&[&str]]) -> ThreadSummary {
        ThreadSummary {
            id: "t1".to_string(),
            message_labels: labels
                .iter()
                .map(|ls| ls.iter().map(|l| l.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_thread_with_sent_message() {
        let t = thread(&[&["INBOX", "UNREAD"], &["SENT"]]);
        assert!(t.has_sent_message());
    }

    #[test]
    fn test_thread_without_sent_message() {
        let t = thread(&[&["INBOX"], &["INBOX", "IMPORTANT"]]);
        assert!(!t.has_sent_message());
    }

    #[test]
    fn test_empty_thread_is_unreplied() {
        assert!(!ThreadSummary::default().has_sent_message());
    }

    #[test]
    fn test_sent_label_is_case_sensitive() {
        let t = thread(&[&["sent"]]);
        assert!(!t.has_sent_message());
    }
}
