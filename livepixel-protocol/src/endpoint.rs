//! Server endpoint parsed from a `ws://host[:port][/path]` URL

use heapless::String;

/// Maximum host name length
pub const MAX_HOST_LEN: usize = 64;

/// Maximum request path length
pub const MAX_PATH_LEN: usize = 64;

/// Port used when the URL has none
pub const DEFAULT_PORT: u16 = 80;

/// URL parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointError {
    /// Only plain `ws://` is supported
    UnsupportedScheme,
    /// Nothing between the scheme and the port/path
    MissingHost,
    /// Port is not a number in 1..=65535
    InvalidPort,
    /// Host or path longer than the fixed buffers
    TooLong,
}

/// WebSocket server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String<MAX_HOST_LEN>,
    port: u16,
    path: String<MAX_PATH_LEN>,
}

impl Endpoint {
    /// Parse a `ws://` URL
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let rest = url
            .trim()
            .strip_prefix("ws://")
            .ok_or(EndpointError::UnsupportedScheme)?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| EndpointError::InvalidPort)?;
                if port == 0 {
                    return Err(EndpointError::InvalidPort);
                }
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(EndpointError::MissingHost);
        }

        Ok(Self {
            host: String::try_from(host).map_err(|_| EndpointError::TooLong)?,
            port,
            path: String::try_from(path).map_err(|_| EndpointError::TooLong)?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request path, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host as a dotted IPv4 address, if it is one
    pub fn ipv4(&self) -> Option<[u8; 4]> {
        let mut octets = [0u8; 4];
        let mut parts = self.host.split('.');

        for octet in octets.iter_mut() {
            *octet = parts.next()?.parse().ok()?;
        }

        if parts.next().is_some() {
            return None;
        }
        Some(octets)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Endpoint {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ws://{}:{}{}", self.host.as_str(), self.port, self.path.as_str())
    }
}
