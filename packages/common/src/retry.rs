use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;

/// Result of recording a failure in the RetryTracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again; `attempt` is the 1-based attempt that just failed.
    Retry { attempt: u8 },
    /// Max retries reached; `attempts` is the total number of failures seen.
    Exhausted { attempts: u8 },
}

#[derive(Debug, Clone)]
struct RetryState {
    attempt: u8,
    last_updated: Instant,
}

/// Tracks retry state for multiple in-flight jobs by ID.
#[derive(Debug, Default)]
pub struct RetryTracker {
    state: HashMap<String, RetryState>,
    max_retries: u8,
}

impl RetryTracker {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: HashMap::new(),
            max_retries,
        }
    }

    /// Record a failure for the given job ID.
    pub fn record_failure(&mut self, id: &str) -> RetryDecision {
        let retry_state = self.state.entry(id.to_string()).or_insert(RetryState {
            attempt: 0,
            last_updated: Instant::now(),
        });

        retry_state.attempt += 1;
        retry_state.last_updated = Instant::now();

        if retry_state.attempt <= self.max_retries {
            RetryDecision::Retry {
                attempt: retry_state.attempt,
            }
        } else {
            let attempts = retry_state.attempt;
            self.state.remove(id);
            RetryDecision::Exhausted { attempts }
        }
    }

    /// Clear retry state for a job.
    pub fn clear(&mut self, id: &str) {
        self.state.remove(id);
    }

    /// Get current attempt count for a job.
    pub fn get_attempt(&self, id: &str) -> u8 {
        self.state.get(id).map(|s| s.attempt).unwrap_or(0)
    }

    /// Remove entries that haven't been updated within `max_age`.
    pub fn cleanup_stale(&mut self, max_age: Duration) {
        let now = Instant::now();
        self.state
            .retain(|_, state| now.duration_since(state.last_updated) < max_age);
    }

    /// Get the number of jobs currently being tracked.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Check if the tracker has no entries.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// Formula: `min(base_ms * 2^(attempt-1) + jitter, max_ms)` (0-25% jitter)
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

/// Guard that cleans up retry state on drop.
pub struct RetryCleanupGuard<'a> {
    tracker: &'a Arc<Mutex<RetryTracker>>,
    job_id: String,
    defused: bool,
}

impl<'a> RetryCleanupGuard<'a> {
    /// Create a new cleanup guard for the given job ID.
    pub fn new(tracker: &'a Arc<Mutex<RetryTracker>>, job_id: impl Into<String>) -> Self {
        Self {
            tracker,
            job_id: job_id.into(),
            defused: false,
        }
    }

    /// Defuse the guard (call this when cleanup has been handled explicitly).
    pub fn defuse(&mut self) {
        self.defused = true;
    }
}

impl Drop for RetryCleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.defused {
            if let Ok(mut tracker) = self.tracker.try_lock() {
                tracker.clear(&self.job_id);
            }
        }
    }
}

/// Spawn a background task that periodically cleans up stale entries in a RetryTracker.
pub fn spawn_cleanup_task(
    tracker: Arc<Mutex<RetryTracker>>,
    cleanup_interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);

        loop {
            interval.tick().await;
            let removed = {
                let mut guard = tracker.lock().await;
                let before = guard.len();
                guard.cleanup_stale(max_age);
                before - guard.len()
            };
            if removed > 0 {
                info!(removed, "Cleaned up stale retry tracker entries");
            }
        }
    })
}
