// Service and provider configuration, resolved once at startup

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::provider::{HotelsProvider, ProviderError, RetryConfig};
use crate::simulator::HotelsSimulatorProvider;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_CLIENT_ORIGIN: &str = "*";
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl SimulatorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            retry: RetryConfig::disabled(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub client_origin: String,
    pub simulator: SimulatorConfig,
    // Ceiling on concurrently running provider calls per request; None = all at once
    pub max_in_flight: Option<usize>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let url = lookup("HOTELS_SIMULATOR_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("HOTELS_SIMULATOR_URL"))?;

        let mut simulator = SimulatorConfig::new(url);
        simulator.timeout_ms = parse_or(&lookup, "PROVIDER_TIMEOUT_MS", DEFAULT_PROVIDER_TIMEOUT_MS)?;
        simulator.retry.max_retries = parse_or(&lookup, "PROVIDER_MAX_RETRIES", 0)?;

        let max_in_flight = match lookup("SEARCH_MAX_IN_FLIGHT") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SEARCH_MAX_IN_FLIGHT",
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| DEFAULT_CLIENT_ORIGIN.to_string()),
            simulator,
            max_in_flight,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    // Explicit registry: every configured backend becomes one provider
    pub fn build_providers(&self) -> Result<Vec<Arc<dyn HotelsProvider>>, ProviderError> {
        let simulator = HotelsSimulatorProvider::new(self.simulator.clone())?;
        Ok(vec![Arc::new(simulator)])
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
