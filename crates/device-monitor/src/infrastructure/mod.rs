//! Infrastructure layer for the device monitor.
//!
//! Contains the OS-facing adapters: the TCP listener and connection loop,
//! host-name resolution, and the TOML config file.
//!
//! **Dependency rule**: this layer may depend on `domain` and
//! `telemetry_core`, but MUST NOT import the `application` layer.

pub mod network;
pub mod storage;
