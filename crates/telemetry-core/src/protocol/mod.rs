//! Protocol module containing the fixed-layout frame codec.

pub mod frame;

pub use frame::{
    build_ack, decode_device_id, decode_measured_value, decode_sequence, encode_frame,
    frame_is_complete, parse_ack, Acknowledgment, Frame, FrameError,
};
