//! Scheduler behavior on a paused clock

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{create_test_message, inbox_page, unreplied_thread, MockGmailClient};
use gmail_autoresponder::client::GmailClient;
use gmail_autoresponder::config::Config;
use gmail_autoresponder::error::GmailError;
use gmail_autoresponder::{Scanner, Scheduler};

fn build_scheduler(client: Arc<dyn GmailClient>, config: &Config) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(client, Scanner::from_config(config), &config.scheduler).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_waits_at_least_min_interval() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut client = MockGmailClient::new();
    client.expect_list_messages().returning(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(inbox_page(&[], None))
    });

    let scheduler = build_scheduler(Arc::new(client), &Config::default());
    let handle = scheduler.handle();
    let task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    tokio::time::sleep(Duration::from_secs(44)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // By 121s the first draw (at most 120s) has elapsed
    tokio::time::sleep(Duration::from_secs(77)).await;
    assert!(calls.load(Ordering::SeqCst) >= 1);

    handle.stop();
    let cycles = task.await.unwrap();
    assert_eq!(cycles, calls.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_list_error_then_next_cycle_still_fires() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut client = MockGmailClient::new();
    client.expect_list_messages().returning(move |_, _, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(GmailError::ServerError {
                status: 503,
                message: "backend unavailable".to_string(),
            })
        } else {
            Ok(inbox_page(&[("m1", "t1")], None))
        }
    });
    client
        .expect_get_thread()
        .returning(|id| Ok(unreplied_thread(id)));
    client
        .expect_get_message()
        .returning(|_| Ok(create_test_message("m1", "t1", "a@x.com", "Hi")));
    client
        .expect_send_message()
        .times(1)
        .returning(|_| Ok("sent-1".to_string()));
    client
        .expect_modify_labels()
        .times(1)
        .returning(|_, _, _| Ok(()));

    let mut config = Config::default();
    config.scheduler.min_interval_secs = 60;
    config.scheduler.max_interval_secs = 60;

    let scheduler = build_scheduler(Arc::new(client), &config);
    let handle = scheduler.handle();
    let task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    tokio::time::sleep(Duration::from_secs(150)).await;
    handle.stop();

    assert_eq!(task.await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_wait_ends_loop_promptly() {
    let mut client = MockGmailClient::new();
    client.expect_list_messages().times(0);

    let scheduler = build_scheduler(Arc::new(client), &Config::default());
    let handle = scheduler.handle();
    let task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.stop();

    let cycles = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(cycles, 0);
}
