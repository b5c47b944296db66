//! Gateway configuration

use codai_core::CodaiConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{GatewayError, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Permissive CORS for the browser dashboards
    pub cors: bool,

    /// Store and flag configuration
    pub core: CodaiConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors: true,
            core: CodaiConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the service name flags are scoped against
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.core.service_name = name.into();
        self
    }

    /// Replace the core configuration
    pub fn with_core(mut self, core: CodaiConfig) -> Self {
        self.core = core;
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::InvalidConfig(format!("{}:{}: {e}", self.host, self.port)))
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.core.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &str) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_host("0.0.0.0")
            .with_port(8080)
            .with_service_name("dashboard");

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.core.service_name, "dashboard");
    }

    #[test]
    fn test_bad_host() {
        let config = GatewayConfig::new().with_host("not a host");
        assert!(matches!(
            config.socket_addr(),
            Err(GatewayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        let path = path.to_str().unwrap();

        let config = GatewayConfig::new().with_port(9000).with_service_name("wallet");
        config.to_file(path).unwrap();

        let parsed = GatewayConfig::from_file(path).unwrap();
        assert_eq!(parsed.port, 9000);
        assert_eq!(parsed.core.service_name, "wallet");
    }
}
