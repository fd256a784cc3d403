//! Domain layer: reading values, sequence deduplication and the reading store.
//!
//! Everything here is plain synchronous state.  The device monitor wraps it
//! in a lock and drives it from the connection task.

pub mod dedup;
pub mod reading;
pub mod store;

pub use dedup::{DedupPolicy, DedupTracker};
pub use reading::{DeviceCount, DeviceId, Reading};
pub use store::ReadingStore;
