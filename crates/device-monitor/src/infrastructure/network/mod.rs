//! Network infrastructure for the device monitor.
//!
//! # Sub-modules
//!
//! - **`connection_loop`** – Binds the listener, accepts the single device
//!   connection and runs the receive → acknowledge → dedup → store loop.
//!   Also owns [`SharedState`], the lock-guarded session state read by the
//!   monitor facade.
//!
//! - **`resolver`** – Turns a host name into the endpoint the listener binds.

pub mod connection_loop;
pub mod resolver;

pub use connection_loop::{bind_listener, ConnectionLoop, SharedState};
pub use resolver::resolve_endpoint;
