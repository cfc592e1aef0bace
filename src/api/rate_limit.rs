//! Rate limiting for password verification.
//!
//! Attempts are keyed by calling identity (client address) and counted over a
//! rolling window. Every call to the verify endpoint registers an attempt,
//! success or failure alike. State is memory only; a restart clears it.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

pub const ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const ATTEMPT_LIMIT: usize = 5;

/// Bucket for callers whose address could not be determined.
const UNKNOWN_IDENTITY: &str = "unknown";

/// Every this many registrations, drop identities whose attempts have all
/// aged out of the window. Identities are caller supplied, so without the
/// sweep the map grows for the life of the process.
const SWEEP_INTERVAL: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    /// Register one verification attempt for `identity` and decide whether it
    /// may proceed.
    fn register_attempt(&self, identity: Option<&str>) -> RateLimitDecision;
}

/// Limiter that never rejects; used by tests that exercise other paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn register_attempt(&self, _identity: Option<&str>) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// In-memory rolling-window limiter.
#[derive(Debug)]
pub struct MemoryRateLimiter {
    window: Duration,
    limit: usize,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    attempts: HashMap<String, Vec<Instant>>,
    calls_since_sweep: usize,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::with_policy(ATTEMPT_WINDOW, ATTEMPT_LIMIT)
    }
}

impl MemoryRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(window: Duration, limit: usize) -> Self {
        Self {
            window,
            limit,
            state: Mutex::new(LimiterState::default()),
        }
    }

    fn register_at(&self, identity: Option<&str>, now: Instant) -> RateLimitDecision {
        let key = identity.unwrap_or(UNKNOWN_IDENTITY).to_string();

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        state.calls_since_sweep += 1;
        if state.calls_since_sweep >= SWEEP_INTERVAL {
            state.calls_since_sweep = 0;
            let window = self.window;
            state.attempts.retain(|_, attempts| {
                attempts.retain(|at| now.duration_since(*at) < window);
                !attempts.is_empty()
            });
        }

        let entry = state.attempts.entry(key).or_default();
        entry.retain(|at| now.duration_since(*at) < self.window);

        if entry.len() >= self.limit {
            // Rejected calls do not extend the window, so a caller recovers
            // once the earliest counted attempt ages out.
            return RateLimitDecision::Limited;
        }

        entry.push(now);
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn register_attempt(&self, identity: Option<&str>) -> RateLimitDecision {
        self.register_at(identity, Instant::now())
    }
}
