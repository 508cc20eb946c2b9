//! Bus counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct BusMetrics {
    sent: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    token_mismatches: AtomicU64,
    forged: AtomicU64,
    handshake_timeouts: AtomicU64,
}

impl BusMetrics {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_mismatch(&self) {
        self.token_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forged(&self) {
        self.forged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handshake_timeout(&self) {
        self.handshake_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            token_mismatches: self.token_mismatches.load(Ordering::Relaxed),
            forged: self.forged.load(Ordering::Relaxed),
            handshake_timeouts: self.handshake_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the bus counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusMetricsSnapshot {
    /// Envelopes accepted by a channel (or delivered directly).
    pub sent: u64,
    /// Envelopes parked on an early queue.
    pub queued: u64,
    /// Envelopes silently discarded: fallback sends, teardown, exhausted
    /// handshakes.
    pub dropped: u64,
    /// Inbound payloads that failed to parse.
    pub malformed: u64,
    /// Envelopes whose auth token did not match the stored token.
    pub token_mismatches: u64,
    /// Envelopes with a claimed origin contradicting the verified origin.
    pub forged: u64,
    /// Peers demoted after exhausting the handshake retry budget.
    pub handshake_timeouts: u64,
}
