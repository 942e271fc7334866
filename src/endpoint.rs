//! `host:port` endpoints and input-file reading.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A single target to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint, rejecting an empty host and port 0.
    pub fn new(host: &str, port: u16) -> Result<Endpoint, InputError> {
        let token = format!("{}:{}", host, port);
        if host.is_empty() {
            return Err(malformed(&token, "host is empty"));
        }
        if port == 0 {
            return Err(malformed(&token, "port must be between 1 and 65535"));
        }
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
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

impl FromStr for Endpoint {
    type Err = InputError;

    /// Parses `host:port` or `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let (host, port) = if let Some(rest) = token.strip_prefix('[') {
            rest.split_once("]:")
                .ok_or_else(|| malformed(token, "expected [address]:port"))?
        } else {
            let (host, port) = token
                .rsplit_once(':')
                .ok_or_else(|| malformed(token, "expected host:port"))?;
            if host.contains(':') {
                return Err(malformed(token, "IPv6 addresses must be bracketed"));
            }
            (host, port)
        };

        let port: u16 = port
            .parse()
            .map_err(|_| malformed(token, "port must be between 1 and 65535"))?;
        Endpoint::new(host, port).map_err(|_| {
            if host.is_empty() {
                malformed(token, "host is empty")
            } else {
                malformed(token, "port must be between 1 and 65535")
            }
        })
    }
}

fn malformed(token: &str, reason: &str) -> InputError {
    InputError::Malformed {
        token: token.to_string(),
        line: None,
        reason: reason.to_string(),
    }
}

/// Parses endpoints from text with one `host:port` per line.
///
/// Blank lines and lines starting with `#` are skipped. Any other line that
/// does not parse fails the whole read with its 1-based line number.
pub fn parse_endpoints(content: &str) -> Result<Vec<Endpoint>, InputError> {
    let mut endpoints = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let endpoint = line.parse::<Endpoint>().map_err(|err| match err {
            InputError::Malformed { token, reason, .. } => InputError::Malformed {
                token,
                line: Some(index + 1),
                reason,
            },
            other => other,
        })?;
        endpoints.push(endpoint);
    }
    Ok(endpoints)
}

/// Reads endpoints from a file, see [`parse_endpoints`].
pub fn read_endpoints<P: AsRef<Path>>(path: P) -> Result<Vec<Endpoint>, InputError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|source| InputError::Unreadable {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    parse_endpoints(&content)
}

/// Sorts by host, then numerically by port.
pub fn sort_endpoints(endpoints: &mut [Endpoint]) {
    endpoints.sort();
}
