//! Common test utilities and fixtures

#![allow(dead_code)]

use gmail_autoresponder::client::GmailClient;
use gmail_autoresponder::error::Result;
use gmail_autoresponder::models::{MessageMetadata, MessagePage, MessageRef, Reply, ThreadSummary};
use mockall::mock;

/// Create a test message with default values
pub fn create_test_message(id: &str, thread_id: &str, sender: &str, subject: &str) -> MessageMetadata {
    MessageMetadata {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        from: sender.to_string(),
        sender_email: sender.to_string(),
        subject: subject.to_string(),
        message_id_header: Some(format!("<{}@mail.example.com>", id)),
        labels: vec!["INBOX".to_string(), "UNREAD".to_string()],
        is_automated: false,
    }
}

/// Create a test message with automated sender
pub fn create_automated_message(id: &str, thread_id: &str, sender: &str) -> MessageMetadata {
    let mut message = create_test_message(id, thread_id, sender, "Your Receipt #12345");
    message.is_automated = true;
    message
}

/// Single inbox page holding `(message id, thread id)` pairs
pub fn inbox_page(entries: &[(&str, &str)], next_page_token: Option<&str>) -> MessagePage {
    MessagePage {
        messages: entries
            .iter()
            .map(|(id, thread_id)| MessageRef {
                id: id.to_string(),
                thread_id: thread_id.to_string(),
            })
            .collect(),
        next_page_token: next_page_token.map(String::from),
    }
}

/// Thread whose messages carry only inbox labels
pub fn unreplied_thread(id: &str) -> ThreadSummary {
    ThreadSummary {
        id: id.to_string(),
        message_labels: vec![vec!["INBOX".to_string(), "UNREAD".to_string()]],
    }
}

/// Thread that already holds a message sent by the account owner
pub fn replied_thread(id: &str) -> ThreadSummary {
    ThreadSummary {
        id: id.to_string(),
        message_labels: vec![
            vec!["INBOX".to_string()],
            vec!["SENT".to_string()],
        ],
    }
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_messages(
            &self,
            label_id: &str,
            max_results: u32,
            page_token: Option<String>,
        ) -> Result<MessagePage>;
        async fn get_message(&self, id: &str) -> Result<MessageMetadata>;
        async fn get_thread(&self, thread_id: &str) -> Result<ThreadSummary>;
        async fn modify_labels(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
        async fn send_message(&self, reply: &Reply) -> Result<String>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "t1", "test@example.com", "Test Subject");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.thread_id, "t1");
        assert_eq!(msg.sender_email, "test@example.com");
        assert_eq!(msg.subject, "Test Subject");
        assert!(!msg.is_automated);
    }

    #[test]
    fn test_thread_fixtures() {
        assert!(!unreplied_thread("t1").has_sent_message());
        assert!(replied_thread("t2").has_sent_message());
    }

    #[test]
    fn test_inbox_page() {
        let page = inbox_page(&[("m1", "t1"), ("m2", "t2")], Some("next"));
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[1].thread_id, "t2");
        assert_eq!(page.next_page_token.as_deref(), Some("next"));
    }
}
