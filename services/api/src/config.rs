//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which content-generation strategies are wired up, and in what order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorStrategy {
    /// Only the hosted backend endpoint, which holds its own key.
    Backend,
    /// Only the direct API call with a locally configured key.
    Direct,
    /// Backend first; on failure fall back to the direct call.
    Fallback,
}

impl std::str::FromStr for GeneratorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "direct" => Ok(Self::Direct),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("'{}' is not one of backend, direct, fallback", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database the service keeps stats in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub cors_origin: String,
    pub generator_strategy: GeneratorStrategy,
    pub generator_backend_url: Option<String>,
    pub generator_api_key: Option<String>,
    pub generator_api_base: Option<String>,
    pub generation_model: String,
    pub auto_extract: bool,
    pub daily_source: Option<String>,
    pub practice_utc_offset_minutes: i32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Content Generation Settings ---
        let generator_strategy = match var("GENERATOR_STRATEGY") {
            Some(raw) => raw
                .parse::<GeneratorStrategy>()
                .map_err(|e| ConfigError::InvalidValue("GENERATOR_STRATEGY".to_string(), e))?,
            None => GeneratorStrategy::Fallback,
        };
        let generator_backend_url = var("GENERATOR_BACKEND_URL");
        let generator_api_key = var("GENERATOR_API_KEY");
        let generator_api_base = var("GENERATOR_API_BASE");

        match generator_strategy {
            GeneratorStrategy::Backend if generator_backend_url.is_none() => {
                return Err(ConfigError::MissingVar("GENERATOR_BACKEND_URL".to_string()));
            }
            GeneratorStrategy::Direct if generator_api_key.is_none() => {
                return Err(ConfigError::MissingVar("GENERATOR_API_KEY".to_string()));
            }
            GeneratorStrategy::Fallback
                if generator_backend_url.is_none() && generator_api_key.is_none() =>
            {
                return Err(ConfigError::MissingVar(
                    "GENERATOR_BACKEND_URL or GENERATOR_API_KEY".to_string(),
                ));
            }
            _ => {}
        }

        let generation_model =
            var("GENERATION_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string());

        let auto_extract = match var("AUTO_EXTRACT") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::InvalidValue("AUTO_EXTRACT".to_string(), raw))?,
            None => true,
        };
        let daily_source = var("DAILY_SOURCE");

        // --- Load Calendar Settings ---
        let practice_utc_offset_minutes = match var("PRACTICE_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|m| m.abs() < 24 * 60)
                .ok_or_else(|| {
                    ConfigError::InvalidValue("PRACTICE_UTC_OFFSET_MINUTES".to_string(), raw)
                })?,
            None => 0,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            generator_strategy,
            generator_backend_url,
            generator_api_key,
            generator_api_base,
            generation_model,
            auto_extract,
            daily_source,
            practice_utc_offset_minutes,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_with_backend_url_only() {
        let config = load(&[("GENERATOR_BACKEND_URL", "http://localhost:8787/api/generate")]).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.generator_strategy, GeneratorStrategy::Fallback);
        assert!(config.database_url.is_none());
        assert!(config.auto_extract);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.practice_utc_offset_minutes, 0);
    }

    #[test]
    fn direct_strategy_requires_key() {
        let err = load(&[("GENERATOR_STRATEGY", "direct")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "GENERATOR_API_KEY"));

        let config = load(&[("GENERATOR_STRATEGY", "Direct"), ("GENERATOR_API_KEY", "k")]).unwrap();
        assert_eq!(config.generator_strategy, GeneratorStrategy::Direct);
    }

    #[test]
    fn fallback_needs_at_least_one_generator() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn rejects_bad_values() {
        let base = ("GENERATOR_API_KEY", "k");
        assert!(load(&[base, ("GENERATOR_STRATEGY", "carrier-pigeon")]).is_err());
        assert!(load(&[base, ("AUTO_EXTRACT", "maybe")]).is_err());
        assert!(load(&[base, ("PRACTICE_UTC_OFFSET_MINUTES", "1440")]).is_err());
        assert!(load(&[base, ("BIND_ADDRESS", "nowhere")]).is_err());
        assert!(load(&[base, ("RUST_LOG", "chatty")]).is_err());
    }

    #[test]
    fn reads_optional_settings() {
        let config = load(&[
            ("GENERATOR_API_KEY", "k"),
            ("AUTO_EXTRACT", "off"),
            ("DAILY_SOURCE", "The Hindu"),
            ("PRACTICE_UTC_OFFSET_MINUTES", "330"),
            ("DATABASE_URL", "postgres://localhost/rc"),
        ])
        .unwrap();
        assert!(!config.auto_extract);
        assert_eq!(config.daily_source.as_deref(), Some("The Hindu"));
        assert_eq!(config.practice_utc_offset_minutes, 330);
        assert!(config.database_url.is_some());
    }
}
