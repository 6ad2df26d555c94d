//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Rate limit: requests per minute per API key
    pub rate_limit_per_minute: i32,

    /// Maximum accepted JSON body size, in bytes
    pub payload_size_limit_bytes: usize,

    /// Width of the scheduling-conflict window around an owner's existing
    /// event, in minutes, applied on both sides of the candidate time.
    pub scheduling_conflict_window_minutes: i64,

    /// Minimum lead time between "now" and an event's `date_time` on create.
    pub min_event_offset_minutes: i64,

    /// Maximum lead time between "now" and an event's `date_time` on create.
    pub max_event_offset_days: i64,

    /// Lower bound accepted for `Event::capacity`.
    pub min_capacity: i32,

    /// Upper bound accepted for `Event::capacity`.
    pub max_capacity: i32,

    /// Comma-separated list of origins allowed by CORS; "*" allows any.
    pub allowed_origins: String,

    /// Credential signing key. The identity adapter resolves bearer
    /// credentials by looking up a SHA-256 digest rather than verifying a
    /// signature, so this is carried but unused by the current scheme;
    /// reserved for a future move to signed (JWT-style) credentials.
    pub credential_signing_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let rate_limit_per_minute = env::var("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("RATE_LIMIT_PER_MINUTE"))?;

        let payload_size_limit_bytes = env::var("PAYLOAD_SIZE_LIMIT_BYTES")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PAYLOAD_SIZE_LIMIT_BYTES"))?;

        let scheduling_conflict_window_minutes = env::var("SCHEDULING_CONFLICT_WINDOW_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SCHEDULING_CONFLICT_WINDOW_MINUTES"))?;

        let min_event_offset_minutes = env::var("MIN_EVENT_OFFSET_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MIN_EVENT_OFFSET_MINUTES"))?;

        let max_event_offset_days = env::var("MAX_EVENT_OFFSET_DAYS")
            .unwrap_or_else(|_| "365".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MAX_EVENT_OFFSET_DAYS"))?;

        let min_capacity = env::var("MIN_CAPACITY")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MIN_CAPACITY"))?;

        let max_capacity = env::var("MAX_CAPACITY")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MAX_CAPACITY"))?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string());

        let credential_signing_key = env::var("CREDENTIAL_SIGNING_KEY").unwrap_or_default();

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            rate_limit_per_minute,
            payload_size_limit_bytes,
            scheduling_conflict_window_minutes,
            min_event_offset_minutes,
            max_event_offset_days,
            min_capacity,
            max_capacity,
            allowed_origins,
            credential_signing_key,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Scheduling-conflict window as a `chrono::Duration`.
    pub fn scheduling_conflict_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.scheduling_conflict_window_minutes)
    }

    /// Minimum event lead time as a `chrono::Duration`.
    pub fn min_event_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_event_offset_minutes)
    }

    /// Maximum event lead time as a `chrono::Duration`.
    pub fn max_event_offset(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_event_offset_days)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
