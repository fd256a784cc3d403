//! Reading and summary value types.

use serde::{Deserialize, Serialize};

/// Identifier a device reports in every frame.
pub type DeviceId = i32;

/// One accepted measurement.
///
/// Readings are only created from decoded frames and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: DeviceId,
    pub measured_value: i32,
}

impl Reading {
    pub fn new(device_id: DeviceId, measured_value: i32) -> Self {
        Self {
            device_id,
            measured_value,
        }
    }
}

/// Number of readings received from one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCount {
    pub device_id: DeviceId,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_new_stores_fields() {
        let reading = Reading::new(4, -17);
        assert_eq!(reading.device_id, 4);
        assert_eq!(reading.measured_value, -17);
    }

    #[test]
    fn test_device_count_serializes_with_field_names() {
        let row = DeviceCount {
            device_id: 2,
            count: 5,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"device_id":2,"count":5}"#);
    }
}
