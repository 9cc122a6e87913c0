//! Debounced aggregation of finished uploads
//!
//! Results are accumulated until no upload has finished for a quiescence
//! period. The batch is then handed over in one piece, together with the
//! latest storage snapshot. A second deadline, armed by every flush check,
//! tells the owner to clear its progress bars.
//!
//! The debouncer never sleeps. The owner asks [`BatchDebouncer::next_deadline`]
//! when to wake up and calls [`BatchDebouncer::poll`] with the current time,
//! so tests can drive it with a [`ManualClock`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }

    /// Move to `at` after the origin. Never goes backwards.
    pub fn set(&self, at: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = (*elapsed).max(at);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// The two fixed delays of the batch completion detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceTimings {
    /// Wait after the last finished item before checking for a flush
    pub quiescence: Duration,
    /// Wait after a flush check before progress bars are cleared
    pub clear_after: Duration,
}

impl Default for DebounceTimings {
    fn default() -> Self {
        DebounceTimings {
            quiescence: Duration::from_millis(500),
            clear_after: Duration::from_millis(2000),
        }
    }
}

/// A flushed batch: every accumulated item plus the snapshot that came with the last of them
#[derive(Debug, Clone, PartialEq)]
pub struct FlushedBatch<T, S> {
    pub items: Vec<T>,
    pub snapshot: S,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebounceSignal<T, S> {
    Flush(FlushedBatch<T, S>),
    ClearProgress,
}

#[derive(Debug)]
pub struct BatchDebouncer<T, S> {
    timings: DebounceTimings,
    pending: Vec<T>,
    snapshot: Option<S>,
    flush_at: Option<Instant>,
    clear_at: Option<Instant>,
}

impl<T, S> BatchDebouncer<T, S> {
    pub fn new(timings: DebounceTimings) -> Self {
        BatchDebouncer {
            timings,
            pending: Vec::new(),
            snapshot: None,
            flush_at: None,
            clear_at: None,
        }
    }

    pub fn timings(&self) -> DebounceTimings {
        self.timings
    }

    /// Note a finished item. Either part may be missing; the flush
    /// check is rescheduled regardless.
    pub fn record(&mut self, item: Option<T>, snapshot: Option<S>, now: Instant) {
        if let Some(item) = item {
            self.pending.push(item);
        }
        if let Some(snapshot) = snapshot {
            self.snapshot = Some(snapshot);
        }
        self.flush_at = Some(now + self.timings.quiescence);
    }

    /// Earliest instant at which [`poll`](Self::poll) has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.flush_at, self.clear_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every deadline that has passed at `now`, flush first
    pub fn poll(&mut self, now: Instant) -> Vec<DebounceSignal<T, S>> {
        let mut signals = Vec::new();

        if let Some(flush_at) = self.flush_at {
            if flush_at <= now {
                self.flush_at = None;
                if !self.pending.is_empty() {
                    if let Some(snapshot) = self.snapshot.take() {
                        signals.push(DebounceSignal::Flush(FlushedBatch {
                            items: std::mem::take(&mut self.pending),
                            snapshot,
                        }));
                    } else {
                        tracing::debug!(
                            "holding {} finished uploads until a storage snapshot arrives",
                            self.pending.len()
                        );
                    }
                }
                self.clear_at = Some(flush_at + self.timings.clear_after);
            }
        }

        if let Some(clear_at) = self.clear_at {
            if clear_at <= now {
                self.clear_at = None;
                signals.push(DebounceSignal::ClearProgress);
            }
        }

        signals
    }

    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    pub fn snapshot(&self) -> Option<&S> {
        self.snapshot.as_ref()
    }

    /// Drop accumulated items, snapshot and both deadlines
    pub fn reset(&mut self) {
        self.pending.clear();
        self.snapshot = None;
        self.flush_at = None;
        self.clear_at = None;
    }
}

/// Wait until `deadline`, forever when there is none
///
/// Meant as a `tokio::select!` arm next to the event sources that re-arm it.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
