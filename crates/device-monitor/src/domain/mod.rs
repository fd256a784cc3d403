//! Domain layer for the device monitor.
//!
//! Plain types shared by the connection loop and the monitor facade: the
//! listening endpoint, session settings and outcome, and the error type.
//! Nothing in here opens a socket.

pub mod endpoint;
pub mod error;
pub mod session;

pub use endpoint::{pick_address, Endpoint};
pub use error::MonitorError;
pub use session::{
    LoopPhase, MonitorSettings, MonitorState, Progress, SessionEnd, SessionReport,
};
