//! Monitoring session state, settings and outcome types.

use std::net::SocketAddr;

use telemetry_core::protocol::frame::{FRAME_SIZE, READ_BUFFER_SIZE};
use telemetry_core::{DedupPolicy, DedupTracker, DeviceCount, Frame, ReadingStore};
use uuid::Uuid;

use crate::domain::error::MonitorError;

/// Tunables for one monitor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Pending-connection queue length passed to `listen`.
    pub backlog: u32,
    /// Bytes requested per receive; each receive gets a fresh zeroed buffer.
    pub buffer_size: usize,
    /// Sequence comparison policy for retransmission detection.
    pub dedup_policy: DedupPolicy,
    /// Consecutive accept/receive failures after which the session gives up.
    pub max_consecutive_errors: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            backlog: 100,
            buffer_size: READ_BUFFER_SIZE,
            dedup_policy: DedupPolicy::LastSeen,
            max_consecutive_errors: 16,
        }
    }
}

impl MonitorSettings {
    /// Checks that the settings can drive a session.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] when the receive buffer cannot
    /// hold a whole frame, or when the backlog or error budget is zero.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.buffer_size < FRAME_SIZE {
            return Err(MonitorError::InvalidConfig(format!(
                "buffer_size must be at least {FRAME_SIZE} bytes, got {}",
                self.buffer_size
            )));
        }
        if self.backlog == 0 {
            return Err(MonitorError::InvalidConfig(
                "backlog must be greater than zero".to_string(),
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_consecutive_errors must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the connection loop currently is.
///
/// ```text
/// Idle ──start──► Listening ──accept──► Accepted ──stop / EOF──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// No session has been started, or a new one is being prepared.
    Idle,
    /// The listener is bound and waiting for the device to connect.
    Listening(SocketAddr),
    /// The device is connected; frames are being received.
    Accepted(SocketAddr),
    /// The session is over; listener and connection are closed.
    Closed,
}

/// Snapshot published to callers waiting on the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub readings: usize,
    pub phase: LoopPhase,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            readings: 0,
            phase: LoopPhase::Idle,
        }
    }
}

/// Why a session's connection loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop` was called (or the monitor was dropped).
    Stopped,
    /// The device closed its side of the connection.
    PeerClosed,
    /// Too many consecutive accept or receive failures.
    TooManyErrors,
}

/// Counters collected by one run of the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub peer: Option<SocketAddr>,
    pub end: SessionEnd,
    /// Successful receives (one buffer each).
    pub buffers_received: u64,
    pub readings_stored: u64,
    pub duplicates_dropped: u64,
    pub acks_sent: u64,
    pub accept_errors: u64,
    pub receive_errors: u64,
    pub send_errors: u64,
}

impl SessionReport {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            peer: None,
            end: SessionEnd::Stopped,
            buffers_received: 0,
            readings_stored: 0,
            duplicates_dropped: 0,
            acks_sent: 0,
            accept_errors: 0,
            receive_errors: 0,
            send_errors: 0,
        }
    }
}

/// Deduplication state and stored readings of the current session.
///
/// Both halves live in one struct so they are always cleared together and a
/// reader never observes a reading without its dedup entry.
#[derive(Debug, Default)]
pub struct MonitorState {
    dedup: DedupTracker,
    store: ReadingStore,
}

impl MonitorState {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            dedup: DedupTracker::new(policy),
            store: ReadingStore::new(),
        }
    }

    /// Stores the frame's reading unless it repeats the device's sequence
    /// byte.  Returns `true` when the reading was stored.
    pub fn record(&mut self, frame: &Frame) -> bool {
        if self.dedup.is_repeat(frame.device_id, frame.sequence) {
            return false;
        }
        self.store.append(frame.reading());
        true
    }

    /// Empties both the dedup map and the store, switching to `policy`.
    pub fn reset(&mut self, policy: DedupPolicy) {
        self.dedup = DedupTracker::new(policy);
        self.store.clear();
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn summary(&self) -> Vec<DeviceCount> {
        self.store.grouped_by_device()
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
