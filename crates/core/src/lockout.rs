//! Failed-attempt tracking and temporary lockout
//!
//! # AttemptTracker
//!
//! Counts authentication failures per client identifier. Once a client
//! reaches `max_attempts` it is locked out for `lockout_duration`, measured
//! from the failure that crossed the threshold.
//!
//! ## Expiry
//!
//! Expiry is lazy: a lockout is only lifted when `is_locked_out()` observes
//! that the window has elapsed, at which point the record is dropped. Keys
//! that fail once and never return are only reclaimed by `sweep()`, which
//! `spawn_sweeper()` can run on an interval.
//!
//! ## Locking
//!
//! The whole map sits behind one `std::sync::Mutex`. Every operation takes
//! the lock exactly once, so a read-modify-write on a key can never
//! interleave with another. No operation awaits while holding it.

use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Failures before a client is locked out
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How long a lockout lasts
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Threshold and window for lockouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lockout_duration: Duration,
}

impl LockoutPolicy {
    /// Create a policy
    ///
    /// # Errors
    /// - `InvalidConfig` if `max_attempts` is zero (every client would be
    ///   locked out before its first attempt)
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            lockout_duration,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }
}

/// Accumulated failures for one client
#[derive(Debug, Clone, Copy)]
struct AttemptRecord {
    attempts: u32,
    /// Set once, when `attempts` first reaches the threshold
    lockout_start: Option<Instant>,
    last_failure: Instant,
}

impl AttemptRecord {
    fn lockout_elapsed(&self, now: Instant, window: Duration) -> bool {
        self.lockout_start
            .is_some_and(|start| now.saturating_duration_since(start) > window)
    }
}

/// Per-client failure tracker shared by all request handlers
#[derive(Debug, Default)]
pub struct AttemptTracker {
    policy: LockoutPolicy,
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl AttemptTracker {
    /// Create a tracker with the given policy
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Check whether `key` is currently locked out
    ///
    /// Drops the record if its lockout window has elapsed.
    pub fn is_locked_out(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut records = self.lock();

        let Some(&record) = records.get(key) else {
            return false;
        };

        if record.lockout_elapsed(now, self.policy.lockout_duration) {
            records.remove(key);
            tracing::info!("Lockout expired for {}", key);
            return false;
        }

        record.attempts >= self.policy.max_attempts
    }

    /// Record a failed attempt for `key`
    ///
    /// Returns the failure count after this attempt. The lockout window
    /// starts on the attempt that reaches the threshold.
    pub fn record_failure(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut records = self.lock();

        let record = records.entry(key.to_string()).or_insert(AttemptRecord {
            attempts: 0,
            lockout_start: None,
            last_failure: now,
        });
        record.attempts = record.attempts.saturating_add(1);
        record.last_failure = now;

        if record.attempts >= self.policy.max_attempts && record.lockout_start.is_none() {
            record.lockout_start = Some(now);
            tracing::warn!(
                "Locked out {} for {}s after {} failed attempts",
                key,
                self.policy.lockout_duration.as_secs(),
                record.attempts
            );
        }

        record.attempts
    }

    /// Forget all failures for `key` (call on successful auth)
    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Current failure count for `key`
    pub fn failure_count(&self, key: &str) -> u32 {
        self.lock().get(key).map_or(0, |r| r.attempts)
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove stale records
    ///
    /// Drops records whose lockout window has elapsed, and records that
    /// never reached the threshold and have not failed for `retention`.
    /// Live lockouts are always kept. Returns the number of records removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let window = self.policy.lockout_duration;
        let mut records = self.lock();
        let before = records.len();

        records.retain(|_, record| match record.lockout_start {
            Some(_) => !record.lockout_elapsed(now, window),
            None => now.saturating_duration_since(record.last_failure) <= retention,
        });

        before - records.len()
    }

    /// Run `sweep(retention)` every `every` on the current tokio runtime
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, retention: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = self.sweep(retention);
                if removed > 0 {
                    tracing::debug!("Swept {} stale attempt records, {} remain", removed, self.len());
                }
            }
        })
    }

    /// The map is never left half-updated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<String, AttemptRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
