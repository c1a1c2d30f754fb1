//! Centralized configuration for the object gateway.
//!
//! Constant structs hold protocol limits and defaults; [`ServerConfig`] is the
//! validated, immutable configuration a server is started with.

use crate::{GatewayError, Result};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Server-side limits and defaults.
pub struct GatewayConfig;

impl GatewayConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 18011;
    /// Registered, non-privileged ports.
    pub const PORT_RANGE: RangeInclusive<u16> = 1024..=49151;
    pub const DEFAULT_WORKERS: usize = 2;
    pub const WORKER_RANGE: RangeInclusive<usize> = 1..=16;
    pub const DEFAULT_MAX_WAITING: usize = 10;
    pub const MAX_WAITING_RANGE: RangeInclusive<usize> = 1..=1024;
    /// Longest request line accepted before the connection is dropped.
    pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;
}

/// Client-side defaults.
pub struct ClientConfig;

impl ClientConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
}

/// Immutable configuration of one gateway server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServerConfig {
    host: String,
    port: u16,
    workers: usize,
    max_waiting: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: GatewayConfig::DEFAULT_HOST.to_string(),
            port: GatewayConfig::DEFAULT_PORT,
            workers: GatewayConfig::DEFAULT_WORKERS,
            max_waiting: GatewayConfig::DEFAULT_MAX_WAITING,
        }
    }
}

impl ServerConfig {
    /// Build a validated configuration bound to the default host.
    ///
    /// Port `0` asks the OS for an ephemeral port; any other port must lie in
    /// [`GatewayConfig::PORT_RANGE`].
    pub fn new(port: u16, workers: usize, max_waiting: usize) -> Result<Self> {
        Self::with_host(GatewayConfig::DEFAULT_HOST, port, workers, max_waiting)
    }

    pub fn with_host(
        host: impl Into<String>,
        port: u16,
        workers: usize,
        max_waiting: usize,
    ) -> Result<Self> {
        let config = Self {
            host: host.into(),
            port,
            workers,
            max_waiting,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.port != 0 && !GatewayConfig::PORT_RANGE.contains(&self.port) {
            return Err(out_of_range("port", self.port, &GatewayConfig::PORT_RANGE));
        }
        if !GatewayConfig::WORKER_RANGE.contains(&self.workers) {
            return Err(out_of_range(
                "workers",
                self.workers,
                &GatewayConfig::WORKER_RANGE,
            ));
        }
        if !GatewayConfig::MAX_WAITING_RANGE.contains(&self.max_waiting) {
            return Err(out_of_range(
                "max_waiting",
                self.max_waiting,
                &GatewayConfig::MAX_WAITING_RANGE,
            ));
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn max_waiting(&self) -> usize {
        self.max_waiting
    }

    /// Socket address to bind. The host is an IPv4 or IPv6 literal (IPv6
    /// optionally in brackets) or `localhost`.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self.host.trim();
        let ip = if host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            host.trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map_err(|e| GatewayError::Config {
                    field: "host".to_string(),
                    message: format!("{} is not an IP address: {}", self.host, e),
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn out_of_range<T: std::fmt::Display>(
    field: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> GatewayError {
    GatewayError::Config {
        field: field.to_string(),
        message: format!(
            "{} is outside {}..={}",
            value,
            range.start(),
            range.end()
        ),
    }
}
