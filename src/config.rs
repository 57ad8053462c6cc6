//! Runtime configuration, read from the environment (and `.env` in development).

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `focuslog=debug`.
    pub log_filter: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source, so tests stay hermetic.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:data/focuslog.db".to_string());

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let secure_cookies = match lookup("SECURE_COOKIES").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "SECURE_COOKIES".to_string(),
                    format!("'{other}' is not a boolean"),
                ));
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_filter,
            secure_cookies,
        })
    }
}
