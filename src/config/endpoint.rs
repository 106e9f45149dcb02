use log::debug;
use std::fmt;
use std::net::SocketAddr;

use crate::modbus::protocol::DEFAULT_PORT;
use crate::utils::error::ModbusError;

/// Target device address as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parses `host[:port]`, splitting on the last `:`.
    ///
    /// A bracketed IPv6 literal (`[::1]:1502`) has its brackets removed.
    pub fn parse(spec: &str) -> Result<Self, ModbusError> {
        let spec = spec.trim();

        // A colon inside the brackets of an IPv6 literal is not a port separator
        let port_sep = match spec.rfind(']') {
            Some(close) if spec.starts_with('[') => spec[close..].rfind(':').map(|i| close + i),
            _ => spec.rfind(':'),
        };

        let (host, port) = match port_sep {
            Some(idx) => {
                let port_str = &spec[idx + 1..];
                let port = port_str
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| {
                        ModbusError::ConfigError(format!("Invalid port '{}' in '{}'", port_str, spec))
                    })?;
                (&spec[..idx], port)
            }
            None => (spec, DEFAULT_PORT),
        };

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(ModbusError::ConfigError(format!("Missing host in '{}'", spec)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Resolves the host to the first socket address it maps to.
    pub async fn resolve(&self) -> Result<SocketAddr, ModbusError> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| ModbusError::ConfigError(format!("Cannot resolve host '{}': {}", self.host, e)))?;

        let addr = addrs.next().ok_or_else(|| {
            ModbusError::ConfigError(format!("Host '{}' resolved to no addresses", self.host))
        })?;
        debug!("Resolved {} to {}", self, addr);
        Ok(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
