//! Listening endpoint of the monitor.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::domain::error::MonitorError;

/// IP address and port the listener binds to.
///
/// An `Endpoint` is fixed once a monitor is built; there is no setter.
/// Port `0` asks the OS for a free port, which is how the tests run many
/// monitors side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::new(ip, port),
        }
    }

    /// Builds an endpoint from a textual IP address.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidEndpoint`] if `ip` is not an IPv4 or
    /// IPv6 literal.  Host names go through
    /// [`resolve_endpoint`](crate::infrastructure::network::resolve_endpoint).
    pub fn parse(ip: &str, port: u16) -> Result<Self, MonitorError> {
        let ip: IpAddr = ip.trim().parse().map_err(|e| MonitorError::InvalidEndpoint {
            input: format!("{ip}:{port}"),
            reason: format!("{e}"),
        })?;
        Ok(Self::new(ip, port))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl FromStr for Endpoint {
    type Err = MonitorError;

    /// Parses `"ip:port"` (IPv6 as `"[::1]:port"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<SocketAddr>()
            .map(Self::from)
            .map_err(|e| MonitorError::InvalidEndpoint {
                input: s.to_string(),
                reason: format!("{e}"),
            })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Chooses the address to bind from a resolved address list.
///
/// The first IPv4 address wins; without one, the first address of any
/// family is used.  Callers must not rely on a particular list index.
pub fn pick_address<I>(addrs: I) -> Option<SocketAddr>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}

// ── Tests ─────────────────────────────────────────────────────────────────────
