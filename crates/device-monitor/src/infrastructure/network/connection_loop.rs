//! Single-client TCP receive loop.
//!
//! This module is responsible for:
//!
//! 1. Binding the listener on the monitor's endpoint with a bounded backlog.
//! 2. Accepting exactly one device connection, then closing the listener so
//!    later clients are refused.
//! 3. Receiving one buffer at a time, acknowledging complete frames, and
//!    passing every buffer through deduplication into the reading store.
//! 4. Stopping as soon as the session's shutdown signal fires, even while
//!    suspended on `accept` or `read`.
//!
//! # One frame per receive
//!
//! The device protocol is stop-and-wait: a device sends one frame and waits
//! for its acknowledgment before sending the next (or retransmits the same
//! frame when no acknowledgment arrives).  Each `read()` therefore carries at
//! most one frame, and the loop decodes the fixed offsets of every buffer
//! without any reassembly.  The buffer is zeroed before each read, so a
//! short read decodes the missing bytes as zero.
//!
//! # Shutdown
//!
//! Shutdown is a `tokio::sync::watch` channel.  Only the two suspension
//! points (`accept` and `read`) race against it; an acknowledgment that has
//! started sending is always allowed to complete.

use std::net::SocketAddr;
use std::sync::Arc;

use telemetry_core::{build_ack, frame_is_complete, DeviceCount, Frame};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::domain::{
    Endpoint, LoopPhase, MonitorError, MonitorSettings, MonitorState, Progress, SessionEnd,
    SessionReport,
};

// ── Shared state ──────────────────────────────────────────────────────────────

/// State shared between the connection task (sole writer) and the monitor
/// facade (reader on behalf of the caller).
///
/// The dedup map and the store sit behind one `RwLock`, so a `count()` and
/// a `summary()` taken under the same read guard always agree.  Every
/// change is also published on a `watch` channel so callers can await
/// progress instead of polling.
pub struct SharedState {
    state: RwLock<MonitorState>,
    progress: watch::Sender<Progress>,
}

impl SharedState {
    pub fn new(settings: &MonitorSettings) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            state: RwLock::new(MonitorState::new(settings.dedup_policy)),
            progress,
        }
    }

    /// Runs the dedup check and, for a new frame, stores its reading.
    ///
    /// Returns `true` when the reading was stored.
    pub async fn record(&self, frame: &Frame) -> bool {
        let mut state = self.state.write().await;
        let stored = state.record(frame);
        if stored {
            let readings = state.count();
            self.progress.send_modify(|p| p.readings = readings);
        }
        stored
    }

    /// Clears all session state and resets published progress to `Idle`.
    pub async fn reset(&self, settings: &MonitorSettings) {
        let mut state = self.state.write().await;
        state.reset(settings.dedup_policy);
        self.progress.send_replace(Progress::default());
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.count()
    }

    pub async fn summary(&self) -> Vec<DeviceCount> {
        self.state.read().await.summary()
    }

    pub fn set_phase(&self, phase: LoopPhase) {
        self.progress.send_modify(|p| p.phase = phase);
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Binds a TCP listener on `endpoint` with the given backlog.
///
/// `TcpListener::bind` does not expose the backlog, so the socket is built
/// with `TcpSocket` and put into listening mode explicitly.
///
/// # Errors
///
/// Returns [`MonitorError::BindFailed`] if the socket cannot be created,
/// bound (e.g. the port is in use) or put into listening mode.
pub fn bind_listener(endpoint: &Endpoint, backlog: u32) -> Result<TcpListener, MonitorError> {
    let addr = endpoint.socket_addr();
    let bind_failed = |source| MonitorError::BindFailed { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_failed)?;

    // Lets a restarted session rebind while the previous connection sits in
    // TIME_WAIT.  On Windows the same option would allow port hijacking.
    #[cfg(unix)]
    socket.set_reuseaddr(true).map_err(bind_failed)?;

    socket.bind(addr).map_err(bind_failed)?;
    socket.listen(backlog).map_err(bind_failed)
}

// ── Connection loop ───────────────────────────────────────────────────────────

/// One monitoring session's receive loop.
///
/// Built by the monitor facade after the listener is bound, then moved into
/// a Tokio task with [`ConnectionLoop::run`].
pub struct ConnectionLoop {
    listener: TcpListener,
    shared: Arc<SharedState>,
    shutdown: watch::Receiver<bool>,
    settings: MonitorSettings,
    session_id: Uuid,
}

impl ConnectionLoop {
    pub fn new(
        listener: TcpListener,
        shared: Arc<SharedState>,
        shutdown: watch::Receiver<bool>,
        settings: MonitorSettings,
        session_id: Uuid,
    ) -> Self {
        Self {
            listener,
            shared,
            shutdown,
            settings,
            session_id,
        }
    }

    /// Runs the session to completion and returns its counters.
    ///
    /// Always leaves the published phase at [`LoopPhase::Closed`].
    pub async fn run(self) -> SessionReport {
        let ConnectionLoop {
            listener,
            shared,
            mut shutdown,
            settings,
            session_id,
        } = self;
        let mut report = SessionReport::new(session_id);

        if let Ok(local) = listener.local_addr() {
            info!("session {session_id}: listening on {local}");
            shared.set_phase(LoopPhase::Listening(local));
        }

        // ── Listening → Accepted ──────────────────────────────────────────────
        let accepted =
            accept_one(&listener, &mut shutdown, &settings, &mut report, session_id).await;

        // Only one device is ever served; refuse everybody else from here on.
        drop(listener);

        let (mut stream, peer) = match accepted {
            Some(pair) => pair,
            None => {
                shared.set_phase(LoopPhase::Closed);
                info!("session {session_id}: closed before a device connected");
                return report;
            }
        };

        report.peer = Some(peer);
        shared.set_phase(LoopPhase::Accepted(peer));
        info!("session {session_id}: device connected from {peer}");

        // ── Receiving ─────────────────────────────────────────────────────────
        let end = receive_frames(
            &mut stream,
            &shared,
            &mut shutdown,
            &settings,
            &mut report,
            session_id,
        )
        .await;
        report.end = end;

        // ── Closed ────────────────────────────────────────────────────────────
        if let Err(e) = stream.shutdown().await {
            debug!("session {session_id}: connection shutdown failed: {e}");
        }
        drop(stream);
        shared.set_phase(LoopPhase::Closed);

        info!(
            "session {session_id}: closed ({:?}), {} stored, {} duplicate(s), {} ack(s), \
             {} receive error(s)",
            report.end,
            report.readings_stored,
            report.duplicates_dropped,
            report.acks_sent,
            report.receive_errors
        );
        report
    }
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // An error means the monitor was dropped, which also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Waits for the single device connection.
///
/// Accept failures are logged and retried; `None` means the session was
/// stopped or ran out of its error budget before a device connected.
async fn accept_one(
    listener: &TcpListener,
    shutdown: &mut watch::Receiver<bool>,
    settings: &MonitorSettings,
    report: &mut SessionReport,
    session_id: Uuid,
) -> Option<(TcpStream, SocketAddr)> {
    let mut consecutive_errors = 0u32;

    loop {
        let accepted = tokio::select! {
            biased;
            _ = stopped(shutdown) => {
                report.end = SessionEnd::Stopped;
                return None;
            }
            result = listener.accept() => result,
        };

        match accepted {
            Ok(pair) => return Some(pair),
            Err(e) => {
                report.accept_errors += 1;
                consecutive_errors += 1;
                warn!("session {session_id}: accept failed: {e}");
                if consecutive_errors >= settings.max_consecutive_errors {
                    error!(
                        "session {session_id}: giving up after {consecutive_errors} accept errors"
                    );
                    report.end = SessionEnd::TooManyErrors;
                    return None;
                }
            }
        }
    }
}

/// Receives buffers until stop, peer EOF or too many consecutive failures.
async fn receive_frames<S>(
    stream: &mut S,
    shared: &SharedState,
    shutdown: &mut watch::Receiver<bool>,
    settings: &MonitorSettings,
    report: &mut SessionReport,
    session_id: Uuid,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut consecutive_errors = 0u32;

    loop {
        let mut buf = vec![0u8; settings.buffer_size];

        let received = tokio::select! {
            biased;
            _ = stopped(shutdown) => return SessionEnd::Stopped,
            result = stream.read(&mut buf) => result,
        };

        match received {
            Ok(0) => {
                info!("session {session_id}: device closed the connection");
                return SessionEnd::PeerClosed;
            }
            Ok(n) => {
                consecutive_errors = 0;
                report.buffers_received += 1;
                trace!("session {session_id}: received {n} byte(s)");
                process_buffer(stream, shared, &buf, report, session_id).await;
            }
            Err(e) => {
                report.receive_errors += 1;
                consecutive_errors += 1;
                warn!("session {session_id}: receive failed: {e}");
                if consecutive_errors >= settings.max_consecutive_errors {
                    error!(
                        "session {session_id}: giving up after {consecutive_errors} receive errors"
                    );
                    return SessionEnd::TooManyErrors;
                }
            }
        }
    }
}

/// Acknowledge → decode → dedup → store for one received buffer.
///
/// The acknowledgment depends only on the end-of-message marker.  Storing
/// depends only on deduplication, so an incomplete buffer is still decoded
/// and a duplicate is still acknowledged.
async fn process_buffer<S>(
    stream: &mut S,
    shared: &SharedState,
    buf: &[u8],
    report: &mut SessionReport,
    session_id: Uuid,
) where
    S: AsyncWrite + Unpin,
{
    if frame_is_complete(buf) {
        match build_ack(buf) {
            Ok(ack) => match stream.write_all(&ack).await {
                Ok(()) => report.acks_sent += 1,
                Err(e) => {
                    report.send_errors += 1;
                    warn!("session {session_id}: acknowledgment send failed: {e}");
                }
            },
            Err(e) => warn!("session {session_id}: cannot build acknowledgment: {e}"),
        }
    }

    let frame = match Frame::decode(buf) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("session {session_id}: cannot decode buffer: {e}");
            return;
        }
    };

    if shared.record(&frame).await {
        report.readings_stored += 1;
        debug!(
            "session {session_id}: device {} seq {} value {}",
            frame.device_id, frame.sequence, frame.measured_value
        );
    } else {
        report.duplicates_dropped += 1;
        debug!(
            "session {session_id}: dropped repeat from device {} (seq {})",
            frame.device_id, frame.sequence
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
