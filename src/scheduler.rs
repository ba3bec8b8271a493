//! Polling loop: wait a randomized interval, run a scan cycle, repeat until stopped

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::client::GmailClient;
use crate::config::SchedulerConfig;
use crate::error::{GmailError, Result};
use crate::scanner::{CycleReport, Scanner};

/// Inclusive range of whole seconds between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval {
    min_secs: u64,
    max_secs: u64,
}

impl PollInterval {
    pub fn new(min_secs: u64, max_secs: u64) -> Result<Self> {
        if min_secs == 0 || min_secs > max_secs {
            return Err(GmailError::ConfigError(format!(
                "Invalid poll interval: {}s..={}s",
                min_secs, max_secs
            )));
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Self::new(config.min_interval_secs, config.max_interval_secs)
    }

    /// Draw the next wait, uniform over whole seconds in `[min, max]`
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }
}

/// Stops a running [`Scheduler`] from another task
#[derive(Clone)]
pub struct SchedulerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    /// Ends the loop at the next wait; a cycle already running is allowed to finish
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// Clears the in-flight flag when a cycle ends, however it ends
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Owns the mailbox client and runs scan cycles on a randomized schedule
pub struct Scheduler {
    client: Arc<dyn GmailClient>,
    scanner: Scanner,
    interval: PollInterval,
    run_on_start: bool,
    in_flight: AtomicBool,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new(
        client: Arc<dyn GmailClient>,
        scanner: Scanner,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            client,
            scanner,
            interval: PollInterval::from_config(config)?,
            run_on_start: config.run_on_start,
            in_flight: AtomicBool::new(false),
            stop_tx: Arc::new(stop_tx),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Run one cycle now.
    ///
    /// Returns `None` without touching the mailbox if another cycle is still in flight.
    pub async fn run_cycle(&self) -> Option<Result<CycleReport>> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Previous cycle still running; skipping this one");
            return None;
        };
        Some(self.scanner.check_emails(self.client.as_ref()).await)
    }

    /// Loop until stopped; returns the number of cycles run.
    ///
    /// Cycle errors are logged and never end the loop.
    pub async fn run(&self) -> usize {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut cycles = 0;

        if *stop_rx.borrow_and_update() {
            return cycles;
        }

        info!(
            min_secs = self.interval.min_secs,
            max_secs = self.interval.max_secs,
            "Scheduler started"
        );

        if self.run_on_start {
            cycles += self.run_logged().await;
        }

        loop {
            let wait = self.interval.draw(&mut rand::thread_rng());
            info!("Next check in {} seconds", wait.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop_rx.changed() => {}
            }

            if *stop_rx.borrow_and_update() {
                break;
            }

            cycles += self.run_logged().await;
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }

    async fn run_logged(&self) -> usize {
        match self.run_cycle().await {
            Some(Ok(_)) => 1,
            Some(Err(e)) => {
                error!("Scan cycle failed: {}", e);
                1
            }
            None => 0,
        }
    }
}
