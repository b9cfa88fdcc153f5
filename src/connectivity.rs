//! Connectivity check against the feed host
//!
//! Before any show is processed the feed host must accept a TCP connection.
//! Without it every fetch would fail, so the whole run is aborted instead.

use crate::config::RetryConfig;
use crate::retry::{IsRetryable, with_retry};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while probing the feed host
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The feed URL has no host to probe
    #[error("Invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The host could not be reached
    #[error("Can't reach {host}:{port}, are you connected to the internet? ({source})")]
    Unreachable {
        host: String,
        port: u16,
        source: io::Error,
    },
}

impl IsRetryable for ConnectivityError {
    fn is_retryable(&self) -> bool {
        matches!(self, ConnectivityError::Unreachable { .. })
    }
}

/// Extracts host and port from a feed URL or URL template
pub fn feed_host(url: &str) -> Result<(String, u16), ConnectivityError> {
    // Templates are accepted too, only the host matters
    let url = url.replace("{name}", "x");
    let parsed = reqwest::Url::parse(&url).map_err(|e| ConnectivityError::InvalidUrl {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let host = parsed
        .host_str()
        .ok_or_else(|| ConnectivityError::InvalidUrl {
            url: url.clone(),
            reason: "no host".to_string(),
        })?
        .to_string();

    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| ConnectivityError::InvalidUrl {
            url: url.clone(),
            reason: "no port".to_string(),
        })?;

    Ok((host, port))
}

/// Opens a single TCP connection to the host
fn probe(host: &str, port: u16, timeout: Duration) -> Result<(), ConnectivityError> {
    let to_error = |source: io::Error| ConnectivityError::Unreachable {
        host: host.to_string(),
        port,
        source,
    };

    let addrs = (host, port).to_socket_addrs().map_err(to_error)?;

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host has no addresses");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(()),
            Err(e) => last_error = e,
        }
    }

    Err(to_error(last_error))
}

/// Checks that the feed host accepts connections, retrying as configured
pub fn check_connectivity(
    url: &str,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<(), ConnectivityError> {
    let (host, port) = feed_host(url)?;
    tracing::debug!("Checking connectivity to {}:{}", host, port);

    with_retry(retry, "Connectivity check", || probe(&host, port, timeout))
}
