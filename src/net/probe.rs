//! TCP reachability probe

use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use super::HostProbe;
use crate::constants::DEFAULT_NETWORK_TIMEOUT;

pub const EMPTY_HOST_MESSAGE: &str = "Host name must not be null or empty.";
pub const PORT_RANGE_MESSAGE: &str = "Port number is out of range.";

/// Single-attempt TCP connect bounded by a timeout
#[derive(Debug, Clone)]
pub struct TcpHostProbe {
    timeout: Duration,
}

impl Default for TcpHostProbe {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_TIMEOUT)
    }
}

impl TcpHostProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HostProbe for TcpHostProbe {
    fn probe(&self, host: &str, port: u32) -> Option<String> {
        if host.is_empty() {
            return Some(EMPTY_HOST_MESSAGE.to_string());
        }
        let Ok(port) = u16::try_from(port) else {
            return Some(PORT_RANGE_MESSAGE.to_string());
        };

        let addrs: Vec<_> = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(err) => return Some(err.to_string()),
        };
        if addrs.is_empty() {
            return Some(format!("No addresses found for {}", host));
        }

        let mut last_error = None;
        for addr in &addrs {
            debug!("Probing {}:{} at {}", host, port, addr);
            match TcpStream::connect_timeout(addr, self.timeout) {
                Ok(_) => return None,
                Err(err) => last_error = Some(err),
            }
        }

        last_error.map(|err| describe_socket_error(&err))
    }
}

/// `<kind> (error <code>): <description>`; errors raised without an OS code
/// (such as a connect timeout) carry a fixed label instead
fn describe_socket_error(err: &io::Error) -> String {
    let code = match (err.raw_os_error(), err.kind()) {
        (Some(code), _) => code.to_string(),
        (None, ErrorKind::TimedOut) => "timeout".to_string(),
        (None, _) => "unknown".to_string(),
    };
    format!("{:?} (error {}): {}", err.kind(), code, err)
}
