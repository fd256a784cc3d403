//! Host-name resolution for the listening endpoint.

use tokio::net::lookup_host;
use tracing::debug;

use crate::domain::{pick_address, Endpoint, MonitorError};

/// Resolves `host` with the system resolver and builds an [`Endpoint`].
///
/// IP literals pass through unchanged.  For names with several addresses the
/// first IPv4 address is used (see [`pick_address`]).
///
/// # Errors
///
/// Returns [`MonitorError::Resolve`] when the lookup fails and
/// [`MonitorError::NoAddress`] when it returns an empty list.
pub async fn resolve_endpoint(host: &str, port: u16) -> Result<Endpoint, MonitorError> {
    let addrs: Vec<_> = lookup_host((host, port))
        .await
        .map_err(|source| MonitorError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    debug!("resolved {host} to {addrs:?}");

    pick_address(addrs)
        .map(Endpoint::from)
        .ok_or_else(|| MonitorError::NoAddress {
            host: host.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literal_passes_through() {
        let endpoint = resolve_endpoint("127.0.0.1", 6666).await.unwrap();
        assert_eq!(endpoint.to_string(), "127.0.0.1:6666");
    }

    #[tokio::test]
    async fn test_resolve_localhost_yields_loopback() {
        let endpoint = resolve_endpoint("localhost", 7000).await.unwrap();
        assert!(endpoint.ip().is_loopback());
        assert_eq!(endpoint.port(), 7000);
    }

    #[tokio::test]
    async fn test_resolve_invalid_name_returns_error() {
        // `.invalid` is reserved and never resolves.
        let result = resolve_endpoint("no-such-host.invalid", 80).await;
        assert!(matches!(
            result,
            Err(MonitorError::Resolve { .. }) | Err(MonitorError::NoAddress { .. })
        ));
    }
}
