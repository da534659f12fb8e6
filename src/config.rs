use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};

/// Where mood entries and emotion events live. Chosen once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,

    pub store_backend: StoreBackend,

    // Emotion model (text classification inference endpoint)
    pub classifier_api_url: String,
    pub classifier_model: String,
    pub hf_api_token: Option<String>,
    pub classifier_timeout_secs: u64,

    // Response generator
    pub claude_api_url: String,
    pub claude_api_key: String,
    pub claude_model: String,
    pub generator_timeout_secs: u64,
    pub generator_max_attempts: u32,
    pub generator_retry_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let store_backend = match or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: var("DATABASE_URL")
                    .ok_or_else(|| anyhow!("DATABASE_URL must be set when STORE_BACKEND=postgres"))?,
                max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS", 20)?,
            },
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        };

        Ok(Self {
            host: or("HOST", "0.0.0.0"),
            port: parse(&var, "PORT", 8080)?,
            frontend_url: or("FRONTEND_URL", "http://localhost:3000"),
            cors_extra_origins: var("CORS_EXTRA_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,

            store_backend,

            classifier_api_url: or("CLASSIFIER_API_URL", "https://api-inference.huggingface.co"),
            classifier_model: or(
                "CLASSIFIER_MODEL",
                "j-hartmann/emotion-english-distilroberta-base",
            ),
            hf_api_token: var("HF_API_TOKEN"),
            classifier_timeout_secs: parse(&var, "CLASSIFIER_TIMEOUT_SECS", 20)?,

            claude_api_url: or("CLAUDE_API_URL", "https://api.anthropic.com"),
            claude_api_key: or("CLAUDE_API_KEY", ""),
            claude_model: or("CLAUDE_MODEL", "claude-sonnet-4-20250514"),
            generator_timeout_secs: parse(&var, "GENERATOR_TIMEOUT_SECS", 30)?,
            generator_max_attempts: parse::<u32>(&var, "GENERATOR_MAX_ATTEMPTS", 2)?.clamp(1, 2),
            generator_retry_delay_ms: parse(&var, "GENERATOR_RETRY_DELAY_MS", 500)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs)
    }

    pub fn generator_retry_delay(&self) -> Duration {
        Duration::from_millis(self.generator_retry_delay_ms)
    }
}

fn parse<T>(var: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} must be a number: {}", key, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_memory_backend_with_defaults() {
        let config = config_from(&[("JWT_SECRET", "s3cret"), ("STORE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.generator_max_attempts, 2);
        assert_eq!(config.generator_retry_delay(), Duration::from_millis(500));
        assert!(config.hf_api_token.is_none());
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let err = config_from(&[("JWT_SECRET", "s3cret")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let config = config_from(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/moodwell"),
        ])
        .unwrap();
        assert_eq!(
            config.store_backend,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/moodwell".into(),
                max_connections: 20,
            }
        );
    }

    #[test]
    fn test_rejects_unknown_backend_and_bad_numbers() {
        assert!(config_from(&[("JWT_SECRET", "x"), ("STORE_BACKEND", "redis")]).is_err());
        assert!(config_from(&[
            ("JWT_SECRET", "x"),
            ("STORE_BACKEND", "memory"),
            ("PORT", "eighty"),
        ])
        .is_err());
    }

    #[test]
    fn test_retry_attempts_are_clamped() {
        let config = config_from(&[
            ("JWT_SECRET", "x"),
            ("STORE_BACKEND", "memory"),
            ("GENERATOR_MAX_ATTEMPTS", "9"),
        ])
        .unwrap();
        assert_eq!(config.generator_max_attempts, 2);
    }

    #[test]
    fn test_missing_jwt_secret_fails() {
        assert!(config_from(&[("STORE_BACKEND", "memory")]).is_err());
    }
}
