//! Polling Controller
//!
//! Runs a refresh action immediately and then once per interval until the
//! handle is stopped.
//!
//! - A failed cycle is logged and the loop carries on with the next tick
//! - Cycles do not overlap: the next tick waits for the current action
//! - `stop` is idempotent, and once it returns the action is never invoked
//!   again. A cycle already in flight is dropped and its result discarded.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Identifies one running poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollHandle(u64);

impl PollHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Counters for one poll loop
#[derive(Debug, Default)]
pub struct PollStats {
    pub cycles: AtomicU64,
    pub failures: AtomicU64,
}

/// Snapshot of poll loop counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatsSnapshot {
    pub cycles: u64,
    pub failures: u64,
}

type Action = Box<dyn FnMut() -> BoxFuture<'static, Result<(), String>> + Send>;

struct PollEntry {
    /// Guards the running flag so the check and the invocation of the action
    /// happen atomically with respect to `stop`
    running: Arc<Mutex<bool>>,
    stats: Arc<PollStats>,
    task: JoinHandle<()>,
}

impl PollEntry {
    fn halt(&self) {
        *self.running.lock() = false;
        self.task.abort();
    }
}

/// Owns every poll loop started through it
#[derive(Default)]
pub struct PollingController {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, PollEntry>>,
}

impl PollingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling. The first cycle runs right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut, T, E>(&self, interval: Duration, mut action: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let running = Arc::new(Mutex::new(true));
        let stats = Arc::new(PollStats::default());

        let boxed: Action = Box::new(move || {
            let fut = action();
            Box::pin(async move { fut.await.map(|_| ()).map_err(|e| e.to_string()) })
        });

        let task = tokio::spawn(run_loop(id, interval, boxed, running.clone(), stats.clone()));

        self.entries.lock().insert(
            id,
            PollEntry {
                running,
                stats,
                task,
            },
        );
        debug!("Poller {} started ({:?} interval)", id, interval);
        PollHandle(id)
    }

    /// Stop a poll loop. Safe to call more than once.
    pub fn stop(&self, handle: PollHandle) {
        if let Some(entry) = self.entries.lock().remove(&handle.0) {
            entry.halt();
            debug!("Poller {} stopped", handle.0);
        }
    }

    /// Stop every loop this controller started
    pub fn stop_all(&self) {
        let entries: Vec<_> = self.entries.lock().drain().collect();
        if entries.is_empty() {
            return;
        }
        for (_, entry) in &entries {
            entry.halt();
        }
        info!("Stopped {} poller(s)", entries.len());
    }

    pub fn is_running(&self, handle: PollHandle) -> bool {
        self.entries.lock().contains_key(&handle.0)
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn stats(&self, handle: PollHandle) -> Option<PollStatsSnapshot> {
        self.entries.lock().get(&handle.0).map(|entry| PollStatsSnapshot {
            cycles: entry.stats.cycles.load(Ordering::Relaxed),
            failures: entry.stats.failures.load(Ordering::Relaxed),
        })
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_loop(
    id: u64,
    period: Duration,
    mut action: Action,
    running: Arc<Mutex<bool>>,
    stats: Arc<PollStats>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let cycle = {
            let running = running.lock();
            if !*running {
                break;
            }
            action()
        };

        stats.cycles.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = cycle.await {
            stats.failures.fetch_add(1, Ordering::Relaxed);
            warn!("Poll cycle {} failed: {}", id, e);
        }
    }
}
