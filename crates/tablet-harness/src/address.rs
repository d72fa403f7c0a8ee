//! Externally reachable address of a started server.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::transport::{ListenerError, VARS_PATH};

/// `http://host:port` address of the diagnostic listener.
///
/// Values are only created inside the crate, and the harness only hands
/// them out once the readiness probe has succeeded against them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    url: Url,
    socket: SocketAddr,
}

impl ServerAddress {
    pub(crate) fn from_socket_addr(socket: SocketAddr) -> Result<Self, ListenerError> {
        let rendered = format!("http://{socket}");
        let url = Url::parse(&rendered).map_err(|source| ListenerError::Address {
            addr: socket.to_string(),
            source,
        })?;
        Ok(Self { url, socket })
    }

    /// Address as a string of the form `http://host:port`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// Base URL of the server.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Socket address the listener is bound to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        self.socket
    }

    /// URL of the exported variables endpoint.
    #[must_use]
    pub fn vars_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_path(VARS_PATH);
        url
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn renders_scheme_host_and_port() {
        let socket = SocketAddr::from((Ipv4Addr::LOCALHOST, 41_234));
        let address = ServerAddress::from_socket_addr(socket).expect("valid address");
        assert_eq!(address.as_str(), "http://127.0.0.1:41234");
        assert_eq!(address.to_string(), "http://127.0.0.1:41234");
        assert_eq!(
            address.vars_url().as_str(),
            "http://127.0.0.1:41234/debug/vars"
        );
    }

    #[test]
    fn brackets_ipv6_hosts() {
        let socket = SocketAddr::from((Ipv6Addr::LOCALHOST, 8080));
        let address = ServerAddress::from_socket_addr(socket).expect("valid address");
        assert_eq!(address.as_str(), "http://[::1]:8080");
        assert_eq!(address.socket_addr().port(), 8080);
    }
}
