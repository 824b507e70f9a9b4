//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Complete server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address.
    pub bind: SocketAddr,
    /// Maximum number of concurrently live rooms.
    pub max_rooms: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

impl ServerConfig {
    /// Load configuration from environment variables, with CLI overrides
    /// taking precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => match std::env::var("SERVER_BIND") {
                Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "SERVER_BIND".to_string(),
                    value,
                })?,
                Err(_) => DEFAULT_BIND
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: "SERVER_BIND".to_string(),
                        value: DEFAULT_BIND.to_string(),
                    })?,
            },
        };

        Ok(Self {
            bind,
            max_rooms: parse_env_or("MAX_ROOMS", 1000),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| {
                SocketAddr::from(([127, 0, 0, 1], 3000))
            }),
            max_rooms: 1000,
        }
    }
}

/// Parse an environment variable, falling back to a default when unset or
/// unparseable.
fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_override_wins() {
        let bind: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::from_env(Some(bind)).unwrap();
        assert_eq!(config.bind, bind);
    }

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.port(), 3000);
        assert!(config.max_rooms > 0);
    }

    #[test]
    fn parse_env_or_falls_back() {
        assert_eq!(parse_env_or("DEFINITELY_NOT_SET_12345", 7usize), 7);
    }
}
