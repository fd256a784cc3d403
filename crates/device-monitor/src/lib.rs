//! device-monitor library crate.
//!
//! A single-client TCP telemetry monitor.  One measuring device connects,
//! sends fixed-layout frames, and receives an acknowledgment for every
//! complete frame.  Retransmitted frames are recognised by their sequence
//! byte and dropped; every other reading is kept and counted per device.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Device (binary frames over TCP)
//!         ↕
//! [device-monitor]
//!   ├── domain/           Endpoint, settings, session state, MonitorError
//!   ├── application/      DeviceMonitor facade, summary rendering
//!   └── infrastructure/
//!         ├── network/    Listener, connection loop, host resolution
//!         └── storage/    TOML config file
//!         ↕
//! telemetry-core  (frame codec, dedup tracker, reading store)
//! ```
//!
//! # Layer rules
//!
//! - `domain` opens no sockets and spawns no tasks.
//! - `infrastructure` depends on `domain` and `telemetry-core` only.
//! - `application` ties the two together and is what the binary uses.

/// Domain layer: plain types shared by every other layer.
pub mod domain;

/// Application layer: the monitor facade and report rendering.
pub mod application;

/// Infrastructure layer: sockets and the config file.
pub mod infrastructure;
