use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings for the relay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Set-top box to forward to at startup. Controllers can change it later.
    pub roku_ip: Option<String>,
    /// Port the device control protocol listens on.
    pub ecp_port: u16,
    /// Budget for one downstream command request.
    pub forward_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            roku_ip: None,
            ecp_port: 8060,
            forward_timeout: Duration::from_millis(500),
        }
    }
}
