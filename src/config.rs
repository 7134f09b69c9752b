use std::env;

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Process-wide settings, read once at startup and passed around by
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub host: String,
    pub port: u16,
    pub api_base_url: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the value of a variable, or `None` if it is unset.
    ///
    /// # Returns
    ///
    /// The configuration, or a `ConfigError` when the API key is missing or
    /// the port is not a valid `u16`.
    ///
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            None => DEFAULT_PORT,
        };

        let api_base_url = lookup("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Config {
            api_key,
            host,
            port,
            api_base_url,
        })
    }

    /// `host:port`, as handed to the resolver when binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
