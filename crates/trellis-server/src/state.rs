//! Shared application state and server configuration

use std::sync::Arc;

use trellis_gateway::{CommandRouter, SessionRegistry};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Live session registry
    pub registry: Arc<SessionRegistry>,
    /// Command router
    pub router: Arc<CommandRouter>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        registry: Arc<SessionRegistry>,
        router: Arc<CommandRouter>,
    ) -> Self {
        Self {
            config,
            registry,
            router,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Base URL of the backing CRUD API
    pub crud_api_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            crud_api_url: trellis_crud::DEFAULT_CRUD_API_URL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            crud_api_url: std::env::var("CRUD_API_URL")
                .unwrap_or_else(|_| trellis_crud::DEFAULT_CRUD_API_URL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.crud_api_url, "http://localhost:3000");
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("HTTP_PORT", "9090");
        std::env::set_var("CRUD_API_URL", "http://crud:3000");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9090);
        assert_eq!(config.crud_api_url, "http://crud:3000");

        std::env::remove_var("HTTP_PORT");
        std::env::remove_var("CRUD_API_URL");
    }
}
