//! Local port allocation for the worker's HTTP listener.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use tracing::trace;

use super::error::{WorkerError, WorkerResult};

/// Finds a free TCP port by probing upwards from a preferred value.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    host: IpAddr,
    max_port: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), u16::MAX)
    }
}

impl PortAllocator {
    pub fn new(host: IpAddr, max_port: u16) -> Self {
        Self { host, max_port }
    }

    /// Return the first port at or above `preferred` that can be bound.
    ///
    /// The probe listener is closed before returning so the worker can bind
    /// the same port. Another process may still grab it in between; the
    /// supervisor notices that through the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::PortExhausted`] when every port up to the
    /// ceiling is taken.
    pub fn acquire(&self, preferred: u16) -> WorkerResult<u16> {
        let exhausted = WorkerError::PortExhausted {
            start: preferred,
            end: self.max_port,
        };
        if preferred == 0 || preferred > self.max_port {
            return Err(exhausted);
        }

        for port in preferred..=self.max_port {
            match TcpListener::bind(SocketAddr::new(self.host, port)) {
                Ok(listener) => {
                    drop(listener);
                    return Ok(port);
                }
                Err(e) => trace!(port, error = %e, "port unavailable"),
            }
        }

        Err(exhausted)
    }
}
