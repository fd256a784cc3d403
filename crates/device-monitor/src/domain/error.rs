//! Error type for monitor construction and lifecycle operations.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced to the caller of the device monitor.
///
/// Transient socket failures inside a running session (a failed receive or
/// acknowledgment send) are not represented here: they are logged and
/// counted in the [`SessionReport`](crate::domain::SessionReport) so a single
/// bad read never stops monitoring.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// An address or port could not be parsed.
    #[error("invalid endpoint '{input}': {reason}")]
    InvalidEndpoint { input: String, reason: String },

    /// Host-name resolution failed.
    #[error("failed to resolve host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Host-name resolution succeeded but returned no address.
    #[error("host '{host}' resolved to no addresses")]
    NoAddress { host: String },

    /// The listening socket could not be bound or put into listening mode.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called while a session is still receiving.
    #[error("monitor is already running")]
    AlreadyRunning,

    /// The operation needs a started session.
    #[error("monitor is not running")]
    NotRunning,

    /// The connection loop closed before the awaited condition was met.
    #[error("session ended after {readings} reading(s)")]
    SessionEnded { readings: usize },

    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The connection task panicked or was aborted.
    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
