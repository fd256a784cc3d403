//! # telemetry-core
//!
//! Shared library for the device monitor containing the telemetry frame
//! codec, the per-device sequence deduplication logic, and the in-memory
//! reading store.
//!
//! It has zero dependencies on sockets or an async runtime, so every piece
//! can be tested with plain byte buffers.
//!
//! # Architecture overview (for beginners)
//!
//! A measuring device connects to the monitor over TCP and sends small
//! fixed-layout *frames*.  Each frame carries a one-byte rolling sequence
//! number, the device id, and one measured value, followed by an
//! end-of-message marker.  The monitor acknowledges every complete frame and
//! keeps the readings it has not seen before.
//!
//! - **`protocol`** – How bytes travel over the wire.  Frames are decoded at
//!   fixed offsets and acknowledgments are built by echoing the sequence byte
//!   and device id back to the device.
//!
//! - **`domain`** – Pure state tracking.  `DedupTracker` remembers the
//!   sequence byte per device so retransmitted frames are dropped, and
//!   `ReadingStore` keeps accepted readings in arrival order and groups them
//!   per device for reporting.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `telemetry_core::ReadingStore` instead of the full module path.
pub use domain::dedup::{DedupPolicy, DedupTracker};
pub use domain::reading::{DeviceCount, DeviceId, Reading};
pub use domain::store::ReadingStore;
pub use protocol::frame::{
    build_ack, decode_device_id, decode_measured_value, decode_sequence, encode_frame,
    frame_is_complete, parse_ack, Acknowledgment, Frame, FrameError,
};
