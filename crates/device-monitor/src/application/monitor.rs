//! The device monitor facade.
//!
//! [`DeviceMonitor`] is what callers hold.  It owns the listening endpoint,
//! the shared session state and, while a session is live, the handle of the
//! connection task:
//!
//! ```text
//! caller ──start()──► bind listener ──spawn──► ConnectionLoop::run
//!        ──stop()───► watch<bool> ───────────► (accept / read abandoned)
//!        ──join()───► JoinHandle<SessionReport>
//!        ──count() / summary() / wait_for_readings()──► SharedState
//! ```
//!
//! `start` returns as soon as the task is spawned; it never waits for the
//! device to connect.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use telemetry_core::DeviceCount;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Endpoint, LoopPhase, MonitorError, MonitorSettings, Progress, SessionReport};
use crate::infrastructure::network::{bind_listener, resolve_endpoint, ConnectionLoop, SharedState};
use crate::infrastructure::storage::MonitorConfig;

/// Handles of the session currently owned by the monitor.
struct ActiveSession {
    id: Uuid,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<SessionReport>,
    local_addr: SocketAddr,
}

impl ActiveSession {
    /// A session is live until it is told to stop, its task exits, or the
    /// task has published `Closed` (which happens just before it exits).
    fn is_live(&self, phase: LoopPhase) -> bool {
        !*self.shutdown.borrow() && !self.handle.is_finished() && phase != LoopPhase::Closed
    }
}

/// Single-device telemetry monitor.
///
/// # Example
///
/// ```no_run
/// use device_monitor::application::DeviceMonitor;
///
/// # async fn demo() -> Result<(), device_monitor::domain::MonitorError> {
/// let mut monitor = DeviceMonitor::from_socket_addr("127.0.0.1:6666".parse().unwrap());
/// monitor.start().await?;
/// monitor.wait_for_readings(11).await?;
/// monitor.stop();
/// monitor.join().await?;
/// for device in monitor.summary().await {
///     println!("device {} sent {} reading(s)", device.device_id, device.count);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DeviceMonitor {
    endpoint: Endpoint,
    settings: MonitorSettings,
    shared: Arc<SharedState>,
    session: Option<ActiveSession>,
}

impl DeviceMonitor {
    pub fn new(endpoint: Endpoint, settings: MonitorSettings) -> Self {
        let shared = Arc::new(SharedState::new(&settings));
        Self {
            endpoint,
            settings,
            shared,
            session: None,
        }
    }

    /// Monitor on `ip:port` with default settings.
    pub fn from_ip(ip: IpAddr, port: u16) -> Self {
        Self::new(Endpoint::new(ip, port), MonitorSettings::default())
    }

    /// Monitor on `addr` with default settings.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self::new(Endpoint::from(addr), MonitorSettings::default())
    }

    /// Resolves `host` and builds a monitor on the chosen address.
    ///
    /// When the name has several addresses the first IPv4 one wins.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Resolve`] or [`MonitorError::NoAddress`] if
    /// the name cannot be resolved.
    pub async fn resolve(
        host: &str,
        port: u16,
        settings: MonitorSettings,
    ) -> Result<Self, MonitorError> {
        let endpoint = resolve_endpoint(host, port).await?;
        Ok(Self::new(endpoint, settings))
    }

    /// Builds a monitor from a loaded config file.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidEndpoint`] if `listener.bind_address`
    /// is not an IP literal.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, MonitorError> {
        Ok(Self::new(config.endpoint()?, config.settings()))
    }

    /// Replaces the settings used by the next [`start`](Self::start).
    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Clears all readings and dedup state, binds the listener and launches
    /// the connection task.
    ///
    /// Returns the address actually bound, which differs from the endpoint
    /// when port `0` was requested.  A session that was stopped (or ended on
    /// its own) is joined first.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::AlreadyRunning`] if the current session is live.
    /// - [`MonitorError::InvalidConfig`] if the settings are out of range.
    /// - [`MonitorError::BindFailed`] if the listener cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr, MonitorError> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }
        if let Some(report) = self.join().await? {
            debug!("previous session {} joined before restart", report.session_id);
        }

        self.settings.validate()?;
        self.shared.reset(&self.settings).await;

        let listener = bind_listener(&self.endpoint, self.settings.backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MonitorError::BindFailed {
                addr: self.endpoint.socket_addr(),
                source,
            })?;

        let id = Uuid::new_v4();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let connection = ConnectionLoop::new(
            listener,
            Arc::clone(&self.shared),
            shutdown_rx,
            self.settings.clone(),
            id,
        );
        let handle = tokio::spawn(connection.run());

        info!("session {id} started on {local_addr}");
        self.session = Some(ActiveSession {
            id,
            shutdown,
            handle,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Signals the session to stop.  Does not wait; use [`join`](Self::join)
    /// for that.  Calling it without a session, or twice, is a no-op.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            if !session.shutdown.send_replace(true) {
                info!("session {} stopping", session.id);
            }
        }
    }

    /// Waits for the connection task to exit and returns its report.
    ///
    /// Without a prior [`stop`](Self::stop) this waits until the session ends
    /// on its own (device disconnect or too many errors).  Returns `None`
    /// when there is no session to join.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Task`] if the connection task panicked.
    pub async fn join(&mut self) -> Result<Option<SessionReport>, MonitorError> {
        match self.session.take() {
            Some(session) => Ok(Some(session.handle.await?)),
            None => Ok(None),
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Readings stored in the current session.
    pub async fn count(&self) -> usize {
        self.shared.count().await
    }

    /// Per-device reading counts, in the order devices were first seen.
    pub async fn summary(&self) -> Vec<DeviceCount> {
        self.shared.summary().await
    }

    /// Suspends until at least `target` readings are stored.
    ///
    /// Returns the reading count observed when the target was reached.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::NotRunning`] if no session was started.
    /// - [`MonitorError::SessionEnded`] if the session closes first.
    pub async fn wait_for_readings(&self, target: usize) -> Result<usize, MonitorError> {
        if self.session.is_none() {
            return Err(MonitorError::NotRunning);
        }

        let mut progress = self.shared.subscribe();
        let reached: Progress = *progress
            .wait_for(|p| p.readings >= target || p.phase == LoopPhase::Closed)
            .await
            .map_err(|_| MonitorError::NotRunning)?;

        if reached.readings >= target {
            Ok(reached.readings)
        } else {
            Err(MonitorError::SessionEnded {
                readings: reached.readings,
            })
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.shared.progress().phase
    }

    pub fn progress(&self) -> Progress {
        self.shared.progress()
    }

    /// Receiver that observes every reading and phase change.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.shared.subscribe()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Address bound by the current session, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(|s| s.local_addr)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// `true` while a session is started, not stopped and not yet closed.
    pub fn is_running(&self) -> bool {
        let phase = self.phase();
        self.session.as_ref().is_some_and(|s| s.is_live(phase))
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionEnd;
    use std::net::Ipv4Addr;

    fn loopback_monitor() -> DeviceMonitor {
        DeviceMonitor::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        // Arrange
        let mut monitor = loopback_monitor();

        // Act
        let addr = monitor.start().await.unwrap();

        // Assert
        assert_ne!(addr.port(), 0);
        assert_eq!(monitor.local_addr(), Some(addr));
        assert!(monitor.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_returns_already_running() {
        let mut monitor = loopback_monitor();
        monitor.start().await.unwrap();

        let second = monitor.start().await;

        assert!(matches!(second, Err(MonitorError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_stop_then_join_reports_stopped() {
        // Arrange
        let mut monitor = loopback_monitor();
        monitor.start().await.unwrap();

        // Act
        monitor.stop();
        let report = monitor.join().await.unwrap().unwrap();

        // Assert
        assert_eq!(report.end, SessionEnd::Stopped);
        assert_eq!(monitor.phase(), LoopPhase::Closed);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_session_is_noop() {
        let mut monitor = loopback_monitor();
        monitor.stop();
        assert!(monitor.join().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restart_after_stop_gets_new_session_id() {
        let mut monitor = loopback_monitor();
        monitor.start().await.unwrap();
        let first = monitor.session_id();

        monitor.stop();
        monitor.start().await.unwrap();

        assert!(monitor.is_running());
        assert_ne!(monitor.session_id(), first);
    }

    #[tokio::test]
    async fn test_wait_for_readings_before_start_returns_not_running() {
        let monitor = loopback_monitor();
        let result = monitor.wait_for_readings(1).await;
        assert!(matches!(result, Err(MonitorError::NotRunning)));
    }

    #[tokio::test]
    async fn test_wait_for_readings_after_stop_returns_session_ended() {
        // Arrange
        let mut monitor = loopback_monitor();
        monitor.start().await.unwrap();

        // Act
        monitor.stop();
        let result = monitor.wait_for_readings(5).await;

        // Assert
        assert!(matches!(
            result,
            Err(MonitorError::SessionEnded { readings: 0 })
        ));
    }

    #[tokio::test]
    async fn test_start_with_invalid_settings_fails() {
        let mut monitor = loopback_monitor().with_settings(MonitorSettings {
            buffer_size: 4,
            ..MonitorSettings::default()
        });

        let result = monitor.start().await;

        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_from_config_uses_listener_section() {
        let mut config = MonitorConfig::default();
        config.listener.port = 0;
        config.listener.backlog = 7;

        let monitor = DeviceMonitor::from_config(&config).unwrap();

        assert_eq!(monitor.endpoint().port(), 0);
        assert_eq!(monitor.settings().backlog, 7);
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let monitor = DeviceMonitor::resolve("localhost", 0, MonitorSettings::default())
            .await
            .unwrap();
        assert!(monitor.endpoint().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_new_monitor_is_idle_and_empty() {
        let monitor = loopback_monitor();
        assert_eq!(monitor.phase(), LoopPhase::Idle);
        assert_eq!(monitor.count().await, 0);
        assert!(monitor.summary().await.is_empty());
    }
}
