//! Append-only in-memory log of accepted readings.

use std::collections::HashMap;

use crate::domain::reading::{DeviceCount, DeviceId, Reading};

/// Accepted readings in arrival order.
///
/// Nothing is ever evicted; the store only empties when a new monitoring
/// session starts and calls [`ReadingStore::clear`].
#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: Vec<Reading>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reading after all previously stored ones.
    pub fn append(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    /// Total number of stored readings.
    pub fn count(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// All readings, oldest first.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Counts readings per device.
    ///
    /// Groups appear in the order their device was first stored, not sorted
    /// by id.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use telemetry_core::{DeviceCount, Reading, ReadingStore};
    ///
    /// let mut store = ReadingStore::new();
    /// store.append(Reading::new(2, 10));
    /// store.append(Reading::new(1, 11));
    /// store.append(Reading::new(2, 12));
    ///
    /// assert_eq!(
    ///     store.grouped_by_device(),
    ///     vec![
    ///         DeviceCount { device_id: 2, count: 2 },
    ///         DeviceCount { device_id: 1, count: 1 },
    ///     ]
    /// );
    /// ```
    pub fn grouped_by_device(&self) -> Vec<DeviceCount> {
        let mut groups: Vec<DeviceCount> = Vec::new();
        let mut slot_of: HashMap<DeviceId, usize> = HashMap::new();

        for reading in &self.readings {
            match slot_of.get(&reading.device_id) {
                Some(&slot) => groups[slot].count += 1,
                None => {
                    slot_of.insert(reading.device_id, groups.len());
                    groups.push(DeviceCount {
                        device_id: reading.device_id,
                        count: 1,
                    });
                }
            }
        }
        groups
    }

    /// Removes every reading.
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}
