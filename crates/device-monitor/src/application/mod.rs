//! Application layer for the device monitor.
//!
//! # Responsibilities
//!
//! - [`DeviceMonitor`]: the start / stop / count / summary facade that owns
//!   the connection task and the shared session state.
//! - Rendering the per-device summary as XML or JSON.
//!
//! Socket handling lives in the infrastructure layer; this layer only
//! decides when a session starts, stops and is joined.

pub mod monitor;
pub mod report;

pub use monitor::DeviceMonitor;
pub use report::{render, render_json, render_xml, ReportFormat};
