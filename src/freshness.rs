//! Per-device freshness tracking.
//!
//! Each shade carries an independent "last seen" timestamp. A device is due
//! for a forced refresh only when it has been silent longer than the
//! configured interval; any push notification resets its clock for free.
//! This keeps the shared low-bandwidth RF channel quiet while still
//! guaranteeing periodic freshness of slow-changing telemetry.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    /// `None` means "never seen" and is treated as older than any interval,
    /// so a fresh record qualifies for refresh on the first tick.
    last_seen: Option<Instant>,
    updates_enabled: bool,
}

/// Last-confirmed-fresh timestamp plus an enable flag for one device.
///
/// Both the tick path and the notification path touch this state
/// concurrently, so reads and writes go through a single mutex to keep
/// snapshots consistent.
#[derive(Debug)]
pub struct FreshnessTracker {
    inner: Mutex<Inner>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_seen: None,
                updates_enabled: true,
            }),
        }
    }

    /// True iff updates are enabled and the device has been silent strictly
    /// longer than `interval`.
    pub fn should_refresh(&self, now: Instant, interval: Duration) -> bool {
        let inner = self.inner.lock();
        if !inner.updates_enabled {
            return false;
        }
        match inner.last_seen {
            None => true,
            Some(seen) => now.saturating_duration_since(seen) > interval,
        }
    }

    /// Optimistic reset at refresh start, so the next tick does not schedule
    /// a redundant request while one is already in flight.
    pub fn mark_refresh_started(&self, now: Instant) {
        self.inner.lock().last_seen = Some(now);
    }

    /// The device pushed a notification, which means it actually responded.
    pub fn mark_notified(&self, now: Instant) {
        self.inner.lock().last_seen = Some(now);
    }

    /// Stop scheduling new refreshes. Idempotent; shutdown only.
    pub fn disable(&self) {
        self.inner.lock().updates_enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().updates_enabled
    }
}

impl Default for FreshnessTracker {
    fn default() -> Self {
        Self::new()
    }
}
