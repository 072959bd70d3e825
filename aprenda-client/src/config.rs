//! Client configuration

use std::time::Duration;

/// Connection settings for the hosted gateway
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the gateway, e.g. `https://project.example.co`
    pub gateway_url: String,

    /// Public (anon) API key sent with every request
    pub gateway_key: String,

    /// Transport timeout for gateway requests
    pub request_timeout: Duration,

    /// Poll cadence for the table change feed
    pub change_poll_interval: Duration,
}

impl Config {
    /// Read configuration from `APRENDA_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            gateway_url: std::env::var("APRENDA_GATEWAY_URL")
                .unwrap_or(defaults.gateway_url),
            gateway_key: std::env::var("APRENDA_GATEWAY_KEY")
                .unwrap_or(defaults.gateway_key),
            request_timeout: env_secs("APRENDA_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            change_poll_interval: env_secs("APRENDA_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.change_poll_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway_url: "http://localhost:54321".to_string(),
            gateway_key: String::new(),
            request_timeout: Duration::from_secs(10),
            change_poll_interval: Duration::from_secs(5),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
