//! Shared HTTP connection pool.

use reqwest::Client;

use crate::config::Settings;
use crate::error::ConfigError;

/// Build the process-wide client. Clone it into every component; clones share
/// the same pool.
pub fn build_client(settings: &Settings) -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.request_timeout())
        .build()
        .map_err(ConfigError::HttpClient)
}
