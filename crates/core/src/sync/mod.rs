//! Best-effort background sync.
//!
//! `schedule(tag)` only records the request. A worker task owned by the
//! runtime later fires the tag, retrying with exponential backoff. The
//! handler reaches the counter exclusively through the durable store.

pub mod reconcile;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Error;
use crate::config::AppConfig;
use crate::counter::VideoCounter;

pub use reconcile::{COUNTER_SYNC_TAG, SyncReport, reconcile_counter, run_tag};

/// Timing policy for fired tags.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Wait before the first attempt.
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { delay: Duration::from_secs(1), max_attempts: 3 }
    }
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self { delay: config.sync_delay(), max_attempts: config.sync_max_attempts.max(1) }
    }
}

#[derive(Debug, Clone)]
struct Scheduler {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<HashSet<String>>>,
    last: Arc<Mutex<Option<SyncReport>>>,
}

/// Handle for registering sync tags.
#[derive(Debug, Clone)]
pub struct SyncManager {
    scheduler: Option<Scheduler>,
}

impl SyncManager {
    /// A manager for runtimes without background scheduling.
    pub fn unsupported() -> Self {
        Self { scheduler: None }
    }

    /// Start the sync worker on the current tokio runtime.
    ///
    /// The worker exits once every clone of the returned manager is dropped.
    pub fn spawn(counter: VideoCounter, options: SyncOptions) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let last = Arc::new(Mutex::new(None));
        let state = FireState { pending: Arc::clone(&pending), last: Arc::clone(&last), counter, options };
        let handle = tokio::spawn(worker(rx, state));
        (Self { scheduler: Some(Scheduler { tx, pending, last }) }, handle)
    }

    pub fn is_supported(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Report of the most recent successful background run, if any.
    pub fn last_report(&self) -> Option<SyncReport> {
        let scheduler = self.scheduler.as_ref()?;
        scheduler.last.lock().ok().and_then(|last| last.clone())
    }

    /// Ask the runtime to fire `tag` later.
    ///
    /// Registering a tag that is already waiting does not queue a second run.
    ///
    /// # Errors
    ///
    /// Returns `Error::SchedulingUnsupported` when no worker is running.
    pub fn schedule(&self, tag: &str) -> Result<(), Error> {
        let Some(scheduler) = &self.scheduler else {
            return Err(Error::SchedulingUnsupported("background sync is disabled".into()));
        };

        {
            let mut pending = scheduler
                .pending
                .lock()
                .map_err(|_| Error::SchedulingUnsupported("sync registry poisoned".into()))?;
            if !pending.insert(tag.to_string()) {
                tracing::debug!(tag, "sync tag already pending");
                return Ok(());
            }
        }

        scheduler.tx.send(tag.to_string()).map_err(|_| {
            if let Ok(mut pending) = scheduler.pending.lock() {
                pending.remove(tag);
            }
            Error::SchedulingUnsupported("sync worker stopped".into())
        })?;

        tracing::debug!(tag, "sync registered");
        Ok(())
    }

    /// Schedule a tag, logging instead of failing when unsupported.
    pub fn schedule_best_effort(&self, tag: &str) -> bool {
        match self.schedule(tag) {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(tag, error = %e, "background sync not registered");
                false
            }
        }
    }
}

/// What a fired tag needs from the worker.
#[derive(Clone)]
struct FireState {
    pending: Arc<Mutex<HashSet<String>>>,
    last: Arc<Mutex<Option<SyncReport>>>,
    counter: VideoCounter,
    options: SyncOptions,
}

async fn worker(mut rx: mpsc::UnboundedReceiver<String>, state: FireState) {
    while let Some(tag) = rx.recv().await {
        let state = state.clone();
        tokio::spawn(async move {
            fire(&tag, &state).await;
        });
    }
    tracing::debug!("sync worker stopped");
}

async fn fire(tag: &str, state: &FireState) {
    let FireState { pending, last, counter, options } = state;
    let options = *options;
    tokio::time::sleep(options.delay).await;

    // Registrations from here on queue a fresh run.
    if let Ok(mut pending) = pending.lock() {
        pending.remove(tag);
    }

    let mut backoff = options.delay.max(Duration::from_millis(100));
    for attempt in 1..=options.max_attempts {
        match run_tag(tag, counter).await {
            Ok(report) => {
                if let (Some(report), Ok(mut slot)) = (report, last.lock()) {
                    *slot = Some(report);
                }
                return;
            }
            Err(e) => {
                tracing::warn!(tag, attempt, error = %e, "sync handler failed");
                if attempt < options.max_attempts {
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }

    tracing::error!(tag, attempts = options.max_attempts, "giving up on sync tag");
}
