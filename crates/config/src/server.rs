use std::net::SocketAddr;

use serde::Deserialize;

/// HTTP server configuration for the AI gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The address and port the gateway binds to. Defaults to 0.0.0.0:8000
    /// when not set.
    pub listen_address: Option<SocketAddr>,
}

impl ServerConfig {
    /// The address to bind to, falling back to the default port.
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)))
    }
}
