//! The telemetry store: bounded in-memory history, synchronous
//! subscribers, aggregated statistics, and persistence.
//!
//! Persistence runs on a single writer task fed through an unbounded
//! queue, so journal appends never interleave and `stats.json` writes
//! never overlap. Stats saves are debounced: updates arriving within the
//! debounce window coalesce into one write carrying the latest state.
//! Any persistence failure degrades the store to in-memory operation
//! without affecting callers.

use crate::record::ToolCallRecord;
use crate::stats::StatsSnapshot;
use chrono::{NaiveDate, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default in-memory history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Delay between the last stats update and the `stats.json` write.
const STATS_DEBOUNCE: Duration = Duration::from_secs(1);

/// Handle returned by [`TelemetryStore::subscribe`], used to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type SubscriberFn = dyn Fn(&ToolCallRecord) + Send + Sync;

enum WriteJob {
    Append(String),
    SaveStats(String),
}

struct Inner {
    history: VecDeque<ToolCallRecord>,
    stats: StatsSnapshot,
}

/// Shared telemetry singleton: call history, statistics, persistence.
///
/// # Examples
///
/// ```
/// use host_telemetry::TelemetryStore;
///
/// let store = TelemetryStore::new(100);
/// assert_eq!(store.history_len(), 0);
/// assert_eq!(store.capacity(), 100);
/// ```
pub struct TelemetryStore {
    capacity: usize,
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<(u64, Arc<SubscriberFn>)>>,
    next_subscription: AtomicU64,
    writer_tx: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("capacity", &self.capacity)
            .field("history_len", &self.history_len())
            .finish_non_exhaustive()
    }
}

impl TelemetryStore {
    /// Creates an in-memory-only store with the given history capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                history: VecDeque::with_capacity(capacity),
                stats: StatsSnapshot::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            writer_tx: Mutex::new(None),
            writer_task: Mutex::new(None),
        }
    }

    /// Creates a store persisting to `logs_dir`.
    ///
    /// Existing `stats.json` counters are resumed so `since` stays stable
    /// across restarts. If the directory cannot be created the store
    /// degrades to in-memory operation with a warning.
    ///
    /// Must be called from within a tokio runtime (spawns the writer
    /// task).
    #[must_use]
    pub fn with_persistence(capacity: usize, logs_dir: PathBuf) -> Self {
        let store = Self::new(capacity);

        if let Err(e) = std::fs::create_dir_all(&logs_dir) {
            tracing::warn!(
                "Cannot create {}: {e}; telemetry is in-memory only",
                logs_dir.display()
            );
            return store;
        }

        if let Some(previous) = load_stats(&logs_dir) {
            store.inner.lock().expect("telemetry lock poisoned").stats = previous;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(logs_dir, rx));
        *store.writer_tx.lock().expect("telemetry lock poisoned") = Some(tx);
        *store.writer_task.lock().expect("telemetry lock poisoned") = Some(task);
        store
    }

    /// Configured history capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records one call: appends to history (evicting the oldest over
    /// capacity), folds into stats, enqueues persistence, and notifies
    /// subscribers synchronously.
    pub fn record(&self, record: ToolCallRecord) {
        {
            let mut inner = self.inner.lock().expect("telemetry lock poisoned");
            inner.history.push_back(record.clone());
            while inner.history.len() > self.capacity {
                inner.history.pop_front();
            }
            inner.stats.record(&record);

            // Enqueue while holding the lock so queue order matches
            // history order under concurrent callers.
            let tx = self.writer_tx.lock().expect("telemetry lock poisoned");
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send(WriteJob::Append(record.to_journal_line()));
                if let Ok(json) = serde_json::to_string_pretty(&inner.stats) {
                    let _ = tx.send(WriteJob::SaveStats(json));
                }
            }
        }

        self.notify(&record);
    }

    fn notify(&self, record: &ToolCallRecord) {
        let snapshot: Vec<Arc<SubscriberFn>> = self
            .subscribers
            .lock()
            .expect("telemetry lock poisoned")
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for cb in snapshot {
            if catch_unwind(AssertUnwindSafe(|| cb(record))).is_err() {
                tracing::warn!("Telemetry subscriber panicked; continuing");
            }
        }
    }

    /// Attaches a synchronous subscriber; returns a handle for
    /// [`Self::unsubscribe`].
    pub fn subscribe(
        &self,
        callback: impl Fn(&ToolCallRecord) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("telemetry lock poisoned")
            .push((id, Arc::new(callback)));
        SubscriptionId(id)
    }

    /// Detaches a subscriber. Returns `false` when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().expect("telemetry lock poisoned");
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id.0);
        subscribers.len() != before
    }

    /// Snapshot of the full retained history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ToolCallRecord> {
        self.inner
            .lock()
            .expect("telemetry lock poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }

    /// The most recent `limit` records, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ToolCallRecord> {
        let inner = self.inner.lock().expect("telemetry lock poisoned");
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Number of retained history entries.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner
            .lock()
            .expect("telemetry lock poisoned")
            .history
            .len()
    }

    /// Drops all retained history (stats are unaffected).
    pub fn clear_history(&self) {
        self.inner
            .lock()
            .expect("telemetry lock poisoned")
            .history
            .clear();
    }

    /// Snapshot of the aggregated statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner
            .lock()
            .expect("telemetry lock poisoned")
            .stats
            .clone()
    }

    /// Zeroes all counters and restarts accumulation from now; the reset
    /// state is scheduled for persistence.
    pub fn reset_stats(&self) {
        let mut inner = self.inner.lock().expect("telemetry lock poisoned");
        inner.stats.reset();

        let tx = self.writer_tx.lock().expect("telemetry lock poisoned");
        if let Some(tx) = tx.as_ref()
            && let Ok(json) = serde_json::to_string_pretty(&inner.stats)
        {
            let _ = tx.send(WriteJob::SaveStats(json));
        }
    }

    /// Flushes and stops the writer task, draining any queued work.
    ///
    /// In-memory operation continues afterwards; only persistence stops.
    pub async fn shutdown(&self) {
        let tx = self
            .writer_tx
            .lock()
            .expect("telemetry lock poisoned")
            .take();
        drop(tx);

        let task = self
            .writer_task
            .lock()
            .expect("telemetry lock poisoned")
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

fn load_stats(logs_dir: &Path) -> Option<StatsSnapshot> {
    let path = logs_dir.join("stats.json");
    let json = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&json).ok()
}

async fn run_writer(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteJob>) {
    let mut journal: Option<(NaiveDate, std::fs::File)> = None;
    let mut pending_stats: Option<String> = None;
    let mut deadline: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(WriteJob::Append(line)) => append_line(&dir, &mut journal, &line),
                Some(WriteJob::SaveStats(json)) => {
                    pending_stats = Some(json);
                    deadline = Some(tokio::time::Instant::now() + STATS_DEBOUNCE);
                }
                None => break,
            },
            () = sleep_until_deadline(deadline), if deadline.is_some() => {
                if let Some(json) = pending_stats.take() {
                    write_stats(&dir, &json);
                }
                deadline = None;
            }
        }
    }

    // Final flush on shutdown: the queue is closed, nothing can race.
    if let Some(json) = pending_stats.take() {
        write_stats(&dir, &json);
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn append_line(dir: &Path, journal: &mut Option<(NaiveDate, std::fs::File)>, line: &str) {
    let today = Utc::now().date_naive();

    let reopen = !matches!(journal, Some((date, _)) if *date == today);
    if reopen {
        let path = dir.join(format!("calls-{today}.jsonl"));
        match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => *journal = Some((today, file)),
            Err(e) => {
                tracing::warn!("Cannot open {}: {e}; dropping journal entry", path.display());
                *journal = None;
                return;
            }
        }
    }

    if let Some((_, file)) = journal
        && let Err(e) = writeln!(file, "{line}")
    {
        tracing::warn!("Journal append failed: {e}");
    }
}

fn write_stats(dir: &Path, json: &str) {
    let path = dir.join("stats.json");
    if let Err(e) = std::fs::write(&path, json) {
        tracing::warn!("Cannot write {}: {e}", path.display());
    }
}
