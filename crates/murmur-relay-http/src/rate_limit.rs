//! Best-effort per-client throttle.
//!
//! Counts requests per hashed client identifier in a sliding one-minute
//! window. State is local to one relay instance and lost on restart; it
//! complements, and does not replace, any edge rate limiting in front of
//! the relay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::RelayError;

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Checks between sweeps of idle clients.
const SWEEP_INTERVAL: u64 = 1024;

/// Sliding-window request limiter keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    clients: DashMap<String, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// Allow `limit` requests per client per minute; `0` disables the limiter.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            clients: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// A limiter that admits everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Whether the limiter admits everything.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.limit == 0
    }

    /// Reject `client` early if it is already at its limit, without recording.
    ///
    /// Runs before the body is read so throttled clients cost no upload. A
    /// client the limiter has never admitted is not inserted.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RateLimited`] when `client` already has `limit`
    /// admitted requests in the last minute.
    pub fn precheck(&self, client: &str) -> Result<(), RelayError> {
        self.precheck_at(client, Instant::now())
    }

    /// [`precheck`](Self::precheck) against an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RateLimited`] when the client is at its limit.
    pub fn precheck_at(&self, client: &str, now: Instant) -> Result<(), RelayError> {
        if self.is_disabled() {
            return Ok(());
        }
        let Some(mut hits) = self.clients.get_mut(client) else {
            return Ok(());
        };
        evict_expired(&mut hits, now);
        if hits.len() >= self.limit as usize {
            Err(RelayError::RateLimited)
        } else {
            Ok(())
        }
    }

    /// Record an authenticated request from `client` and decide whether to admit it.
    ///
    /// Only requests that passed signature verification reach this call, so
    /// unauthenticated traffic never consumes a client's quota.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RateLimited`] when `client` already made `limit`
    /// requests in the last minute. Rejected requests are not counted.
    pub fn check(&self, client: &str) -> Result<(), RelayError> {
        self.check_at(client, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RateLimited`] when the client is over its limit.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), RelayError> {
        if self.is_disabled() {
            return Ok(());
        }

        let admitted = match self.clients.entry(client.to_owned()) {
            Entry::Occupied(mut entry) => {
                let hits = entry.get_mut();
                evict_expired(hits, now);
                if hits.len() >= self.limit as usize {
                    false
                } else {
                    hits.push_back(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::from([now]));
                true
            }
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now);
        }

        if admitted {
            Ok(())
        } else {
            Err(RelayError::RateLimited)
        }
    }

    /// Drop clients with no requests inside the window.
    pub fn sweep(&self, now: Instant) {
        self.clients.retain(|_, hits| {
            evict_expired(hits, now);
            !hits.is_empty()
        });
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

fn evict_expired(hits: &mut VecDeque<Instant>, now: Instant) {
    while hits
        .front()
        .is_some_and(|first| now.saturating_duration_since(*first) >= WINDOW)
    {
        hits.pop_front();
    }
}
