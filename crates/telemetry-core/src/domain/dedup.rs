//! Per-device retransmission detection.
//!
//! # How retransmission works (for beginners)
//!
//! A device puts a one-byte rolling counter (the *sequence byte*) in every
//! frame.  When the device does not receive an acknowledgment in time it
//! sends the same frame again, with the same sequence byte.  The monitor
//! therefore treats a frame whose sequence byte equals the one it has on
//! record for that device as a repeat and does not store it twice.
//!
//! # Update policies
//!
//! [`DedupPolicy::FirstSeen`] records the sequence byte the first time a
//! device is seen and compares every later frame against that value, so a
//! device cycling through sequence bytes has every frame carrying the first
//! byte dropped, even when it is genuinely new.  The default,
//! [`DedupPolicy::LastSeen`], compares against the immediately preceding
//! accepted frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::reading::DeviceId;

/// Which sequence byte a new frame is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Compare against the sequence byte of the previous accepted frame.
    #[default]
    LastSeen,
    /// Compare against the sequence byte of the very first frame only.
    FirstSeen,
}

/// Remembers one sequence byte per device.
///
/// The map only grows: one entry per distinct device id, until [`clear`]
/// is called when a new monitoring session starts.
///
/// [`clear`]: DedupTracker::clear
#[derive(Debug, Default)]
pub struct DedupTracker {
    policy: DedupPolicy,
    last_sequence: HashMap<DeviceId, u8>,
}

impl DedupTracker {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            last_sequence: HashMap::new(),
        }
    }

    /// Returns `true` when `sequence` repeats the byte on record for `device_id`.
    ///
    /// A device seen for the first time is never a repeat; its sequence byte
    /// becomes the recorded one.  Under [`DedupPolicy::LastSeen`] every
    /// non-repeat also replaces the recorded byte.
    pub fn is_repeat(&mut self, device_id: DeviceId, sequence: u8) -> bool {
        match self.last_sequence.get_mut(&device_id) {
            Some(recorded) if *recorded == sequence => {
                trace!(device_id, sequence, "repeated frame");
                true
            }
            Some(recorded) => {
                if self.policy == DedupPolicy::LastSeen {
                    *recorded = sequence;
                }
                false
            }
            None => {
                self.last_sequence.insert(device_id, sequence);
                false
            }
        }
    }

    /// The sequence byte on record for `device_id`, if the device was seen.
    pub fn last_sequence(&self, device_id: DeviceId) -> Option<u8> {
        self.last_sequence.get(&device_id).copied()
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Number of distinct devices seen.
    pub fn len(&self) -> usize {
        self.last_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sequence.is_empty()
    }

    /// Forgets every device.
    pub fn clear(&mut self) {
        self.last_sequence.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_of_device_is_not_a_repeat() {
        // Arrange
        let mut tracker = DedupTracker::new(DedupPolicy::LastSeen);

        // Act
        let repeat = tracker.is_repeat(1, 0);

        // Assert
        assert!(!repeat);
        assert_eq!(tracker.last_sequence(1), Some(0));
    }

    #[test]
    fn test_same_sequence_twice_is_a_repeat() {
        let mut tracker = DedupTracker::default();
        assert!(!tracker.is_repeat(1, 7));
        assert!(tracker.is_repeat(1, 7));
        assert!(tracker.is_repeat(1, 7));
    }

    #[test]
    fn test_devices_are_tracked_independently() {
        let mut tracker = DedupTracker::default();
        assert!(!tracker.is_repeat(1, 3));
        assert!(!tracker.is_repeat(2, 3));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_last_seen_policy_accepts_alternating_sequences() {
        // Arrange
        let mut tracker = DedupTracker::new(DedupPolicy::LastSeen);

        // Act – 0,1,0,1,... must never be flagged
        let repeats = (0..10u8)
            .filter(|i| tracker.is_repeat(9, i % 2))
            .count();

        // Assert
        assert_eq!(repeats, 0);
        assert_eq!(tracker.last_sequence(9), Some(1));
    }

    #[test]
    fn test_last_seen_policy_handles_sequence_wrap() {
        let mut tracker = DedupTracker::new(DedupPolicy::LastSeen);
        assert!(!tracker.is_repeat(1, 254));
        assert!(!tracker.is_repeat(1, 255));
        assert!(!tracker.is_repeat(1, 0));
        assert!(tracker.is_repeat(1, 0));
    }

    #[test]
    fn test_first_seen_policy_never_updates_recorded_sequence() {
        // Arrange
        let mut tracker = DedupTracker::new(DedupPolicy::FirstSeen);

        // Act
        let first = tracker.is_repeat(1, 0);
        let second = tracker.is_repeat(1, 1);
        let third = tracker.is_repeat(1, 0);

        // Assert – the third frame matches the first-ever byte
        assert!(!first);
        assert!(!second);
        assert!(third);
        assert_eq!(tracker.last_sequence(1), Some(0));
    }

    #[test]
    fn test_clear_forgets_all_devices() {
        let mut tracker = DedupTracker::default();
        tracker.is_repeat(1, 5);
        tracker.is_repeat(2, 5);

        tracker.clear();

        assert!(tracker.is_empty());
        assert!(!tracker.is_repeat(1, 5), "cleared device must start fresh");
    }

    #[test]
    fn test_default_policy_is_last_seen() {
        assert_eq!(DedupTracker::default().policy(), DedupPolicy::LastSeen);
    }
}
