//! Fixed-offset codec for telemetry frames and their acknowledgments.
//!
//! Inbound frame format:
//! ```text
//! [seq:1][device_id:4][measured_value:4][<|EOM|>:7]
//! ```
//! Acknowledgment format:
//! ```text
//! [seq:1][device_id:4][<|ACK|>:7]
//! ```
//! Integers use the host's native byte order, exactly as the devices write
//! them.  There is no length prefix: a frame is considered complete when the
//! end-of-message marker starts at byte offset 9 of the receive buffer.

use thiserror::Error;

use crate::domain::reading::{DeviceId, Reading};

/// Size of the buffer a single receive fills.  Frames are far shorter; the
/// rest of the buffer stays zero-padded.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Offset of the rolling sequence byte.
pub const SEQUENCE_OFFSET: usize = 0;
/// Offset of the 4-byte device id.
pub const DEVICE_ID_OFFSET: usize = 1;
/// Offset of the 4-byte measured value.
pub const MEASURED_VALUE_OFFSET: usize = 5;
/// Offset at which the end-of-message marker must start.
pub const MARKER_OFFSET: usize = 9;

/// End-of-message marker terminating every inbound frame.
pub const EOM_MARKER: &[u8] = b"<|EOM|>";
/// Marker terminating every acknowledgment.
pub const ACK_MARKER: &[u8] = b"<|ACK|>";

/// Minimum number of bytes needed to decode all fixed fields.
pub const HEADER_SIZE: usize = MARKER_OFFSET;
/// Length of a complete inbound frame (header + marker).
pub const FRAME_SIZE: usize = HEADER_SIZE + EOM_MARKER.len();
/// Length of an acknowledgment frame.
pub const ACK_SIZE: usize = 1 + 4 + ACK_MARKER.len();

/// Errors produced by the frame codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice is shorter than the field being read requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// An acknowledgment did not have the fixed acknowledgment length.
    #[error("acknowledgment must be {expected} bytes, got {actual}")]
    AckLength { expected: usize, actual: usize },

    /// An acknowledgment did not end with the `<|ACK|>` marker.
    #[error("acknowledgment marker missing")]
    AckMarkerMissing,
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Reads the rolling sequence byte (offset 0).
///
/// # Errors
///
/// Returns [`FrameError::InsufficientData`] for an empty buffer.
pub fn decode_sequence(buf: &[u8]) -> Result<u8, FrameError> {
    buf.get(SEQUENCE_OFFSET)
        .copied()
        .ok_or(FrameError::InsufficientData {
            needed: SEQUENCE_OFFSET + 1,
            available: buf.len(),
        })
}

/// Reads the device id from bytes `[1, 5)`.
///
/// # Errors
///
/// Returns [`FrameError::InsufficientData`] if the buffer is shorter than 5 bytes.
pub fn decode_device_id(buf: &[u8]) -> Result<DeviceId, FrameError> {
    read_i32_ne(buf, DEVICE_ID_OFFSET)
}

/// Reads the measured value from bytes `[5, 9)`.
///
/// # Errors
///
/// Returns [`FrameError::InsufficientData`] if the buffer is shorter than 9 bytes.
pub fn decode_measured_value(buf: &[u8]) -> Result<i32, FrameError> {
    read_i32_ne(buf, MEASURED_VALUE_OFFSET)
}

/// Returns `true` iff the `<|EOM|>` marker starts exactly at offset 9.
///
/// This is a fixed-offset check, not a search: a marker anywhere else (for
/// example shifted by one stray byte) leaves the frame incomplete.  Trailing
/// zero-padding after the marker is ignored.
///
/// # Examples
///
/// ```rust
/// use telemetry_core::{encode_frame, frame_is_complete};
///
/// let frame = encode_frame(1, 7, 42);
/// assert!(frame_is_complete(&frame));
///
/// let mut shifted = vec![0u8];
/// shifted.extend_from_slice(&frame);
/// assert!(!frame_is_complete(&shifted));
/// ```
pub fn frame_is_complete(buf: &[u8]) -> bool {
    buf.get(MARKER_OFFSET..MARKER_OFFSET + EOM_MARKER.len()) == Some(EOM_MARKER)
}

// ── Acknowledgments ───────────────────────────────────────────────────────────

/// Builds the acknowledgment for an inbound buffer.
///
/// The sequence byte and the four device-id bytes are copied verbatim from
/// the inbound buffer (they are echoed, not re-encoded), followed by
/// `<|ACK|>`.
///
/// # Errors
///
/// Returns [`FrameError::InsufficientData`] if the buffer is shorter than 5 bytes.
///
/// # Examples
///
/// ```rust
/// use telemetry_core::{build_ack, encode_frame};
///
/// let ack = build_ack(&encode_frame(0x05, 7, 42)).unwrap();
/// assert_eq!(ack[0], 0x05);
/// assert_eq!(&ack[5..], b"<|ACK|>");
/// ```
pub fn build_ack(buf: &[u8]) -> Result<[u8; ACK_SIZE], FrameError> {
    let echoed_end = DEVICE_ID_OFFSET + 4;
    if buf.len() < echoed_end {
        return Err(FrameError::InsufficientData {
            needed: echoed_end,
            available: buf.len(),
        });
    }

    let mut ack = [0u8; ACK_SIZE];
    ack[..echoed_end].copy_from_slice(&buf[..echoed_end]);
    ack[echoed_end..].copy_from_slice(ACK_MARKER);
    Ok(ack)
}

/// An acknowledgment as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgment {
    pub sequence: u8,
    pub device_id: DeviceId,
}

/// Parses an acknowledgment received by a device.
///
/// # Errors
///
/// Returns [`FrameError::AckLength`] when `bytes` is not exactly
/// [`ACK_SIZE`] long and [`FrameError::AckMarkerMissing`] when the trailing
/// marker is wrong.
pub fn parse_ack(bytes: &[u8]) -> Result<Acknowledgment, FrameError> {
    if bytes.len() != ACK_SIZE {
        return Err(FrameError::AckLength {
            expected: ACK_SIZE,
            actual: bytes.len(),
        });
    }
    if &bytes[DEVICE_ID_OFFSET + 4..] != ACK_MARKER {
        return Err(FrameError::AckMarkerMissing);
    }
    Ok(Acknowledgment {
        sequence: bytes[SEQUENCE_OFFSET],
        device_id: read_i32_ne(bytes, DEVICE_ID_OFFSET)?,
    })
}

// ── Device-side encoding ──────────────────────────────────────────────────────

/// Encodes a complete frame the way a device sends it.
pub fn encode_frame(sequence: u8, device_id: DeviceId, measured_value: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_SIZE);
    buf.push(sequence);
    buf.extend_from_slice(&device_id.to_ne_bytes());
    buf.extend_from_slice(&measured_value.to_ne_bytes());
    buf.extend_from_slice(EOM_MARKER);
    buf
}

// ── Structured view ───────────────────────────────────────────────────────────

/// All fields of an inbound buffer, decoded at once.
///
/// Decoding never validates content: a buffer that is not really a frame
/// still yields (meaningless) integers.  Only [`Frame::complete`] says
/// whether the end-of-message marker was where it belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u8,
    pub device_id: DeviceId,
    pub measured_value: i32,
    pub complete: bool,
}

impl Frame {
    /// Decodes the fixed fields of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InsufficientData`] if the buffer is shorter than
    /// [`HEADER_SIZE`].
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::InsufficientData {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }
        Ok(Self {
            sequence: decode_sequence(buf)?,
            device_id: decode_device_id(buf)?,
            measured_value: decode_measured_value(buf)?,
            complete: frame_is_complete(buf),
        })
    }

    /// The reading carried by this frame.
    pub fn reading(&self) -> Reading {
        Reading::new(self.device_id, self.measured_value)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_i32_ne(buf: &[u8], offset: usize) -> Result<i32, FrameError> {
    match buf.get(offset..offset + 4) {
        Some(&[a, b, c, d]) => Ok(i32::from_ne_bytes([a, b, c, d])),
        _ => Err(FrameError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
