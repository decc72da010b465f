use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::slug::{SlugFallback, SlugPolicy};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub request_timeout: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub slug: SlugPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout: Duration::from_secs(15),
            default_page_size: 10,
            max_page_size: 100,
            slug: SlugPolicy::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_address = parse_or(&lookup, "VARTA_BIND_ADDRESS", defaults.bind_address)?;
        let timeout_secs: u64 = parse_or(
            &lookup,
            "VARTA_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        let max_page_size: u32 = parse_or(&lookup, "VARTA_MAX_PAGE_SIZE", defaults.max_page_size)?;
        let default_page_size: u32 =
            parse_or(&lookup, "VARTA_DEFAULT_PAGE_SIZE", defaults.default_page_size)?;

        if max_page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "VARTA_MAX_PAGE_SIZE",
                value: max_page_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(ConfigError::Invalid {
                name: "VARTA_DEFAULT_PAGE_SIZE",
                value: default_page_size.to_string(),
                reason: format!("must be between 1 and {max_page_size}"),
            });
        }

        let slug = SlugPolicy {
            fallback: parse_or(&lookup, "VARTA_SLUG_FALLBACK", defaults.slug.fallback)?,
            max_conflict_retries: parse_or(
                &lookup,
                "VARTA_SLUG_MAX_CONFLICT_RETRIES",
                defaults.slug.max_conflict_retries,
            )?,
            max_probes: parse_or(&lookup, "VARTA_SLUG_MAX_PROBES", defaults.slug.max_probes)?,
        };

        Ok(Self {
            database_url,
            bind_address,
            request_timeout: Duration::from_secs(timeout_secs),
            default_page_size,
            max_page_size,
            slug,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: err.to_string(),
            }),
    }
}
