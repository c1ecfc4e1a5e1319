use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use tracing::{info, warn};

use crate::reputation::{SCORE_MAX, SCORE_MIN, TrustThresholds};

/// Shortest bearer token accepted from configuration
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Configuration for the meetup server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetupConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Trust score thresholds
    pub trust: TrustThresholds,
    /// Principal resolution
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses the in-memory store)
    pub postgres_enabled: bool,
    /// Pool size
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit span open/close events for requests
    pub log_requests: bool,
    /// Mask client addresses and credentials in logs
    pub sanitize_logs: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token -> user id. Never serialized.
    #[serde(skip)]
    pub tokens: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 120,
            max_request_size: 64 * 1024, // 64KB
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/letsmeet".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_requests: false,
            sanitize_logs: true,
        }
    }
}

fn parse_var<T>(key: &str, value: String) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value", key))
}

/// Parse `token=user_id` pairs separated by commas
pub fn parse_tokens(raw: &str) -> Result<HashMap<String, String>> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (token, user_id) = pair
            .split_once('=')
            .context("LETSMEET_AUTH_TOKENS entries must look like token=user_id")?;
        let (token, user_id) = (token.trim(), user_id.trim());
        if token.is_empty() || user_id.is_empty() {
            anyhow::bail!("LETSMEET_AUTH_TOKENS contains an empty token or user id");
        }
        tokens.insert(token.to_string(), user_id.to_string());
    }
    Ok(tokens)
}

impl MeetupConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, over the defaults
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = lookup("LETSMEET_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("LETSMEET_PORT") {
            config.server.port = parse_var("LETSMEET_PORT", port)?;
        }

        // Security configuration
        if let Some(limit) = lookup("LETSMEET_RATE_LIMIT_PER_MINUTE") {
            config.security.rate_limit_per_minute = parse_var("LETSMEET_RATE_LIMIT_PER_MINUTE", limit)?;
        }
        if let Some(size) = lookup("LETSMEET_MAX_REQUEST_SIZE") {
            config.security.max_request_size = parse_var("LETSMEET_MAX_REQUEST_SIZE", size)?;
        }

        // Database configuration
        if let Some(url) = lookup("LETSMEET_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Some(enabled) = lookup("LETSMEET_POSTGRES_ENABLED") {
            config.database.postgres_enabled = parse_var("LETSMEET_POSTGRES_ENABLED", enabled)?;
        }
        if let Some(max) = lookup("LETSMEET_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = parse_var("LETSMEET_POSTGRES_MAX_CONNECTIONS", max)?;
        }

        // Logging configuration
        if let Some(level) = lookup("LETSMEET_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(log_requests) = lookup("LETSMEET_LOG_REQUESTS") {
            config.logging.log_requests = parse_var("LETSMEET_LOG_REQUESTS", log_requests)?;
        }
        if let Some(sanitize) = lookup("LETSMEET_SANITIZE_LOGS") {
            config.logging.sanitize_logs = parse_var("LETSMEET_SANITIZE_LOGS", sanitize)?;
        }

        // Trust thresholds
        if let Some(score) = lookup("LETSMEET_TRUST_HOST_MIN_SCORE") {
            config.trust.host_min_score = parse_var("LETSMEET_TRUST_HOST_MIN_SCORE", score)?;
        }
        if let Some(score) = lookup("LETSMEET_TRUST_APPLY_MIN_SCORE") {
            config.trust.apply_min_score = parse_var("LETSMEET_TRUST_APPLY_MIN_SCORE", score)?;
        }
        if let Some(score) = lookup("LETSMEET_TRUST_INITIAL_SCORE") {
            config.trust.initial_score = parse_var("LETSMEET_TRUST_INITIAL_SCORE", score)?;
        }

        // Principal resolution
        match lookup("LETSMEET_AUTH_TOKENS") {
            Some(raw) => config.auth.tokens = parse_tokens(&raw)?,
            None => warn!("LETSMEET_AUTH_TOKENS not set; every request will be anonymous"),
        }

        config.validate()?;

        info!(
            host = %config.server.host,
            port = config.server.port,
            postgres = config.database.postgres_enabled,
            tokens = config.auth.tokens.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }

        if self.security.rate_limit_per_minute == 0 {
            anyhow::bail!("Rate limit must be at least 1 request per minute");
        }
        if self.security.max_request_size == 0 {
            anyhow::bail!("Maximum request size must be non-zero");
        }

        if self.database.postgres_enabled && self.database.postgres_url.is_empty() {
            anyhow::bail!("PostgreSQL is enabled but no connection string is set");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("PostgreSQL pool needs at least one connection");
        }

        let score_range = SCORE_MIN..=SCORE_MAX;
        for (name, value) in [
            ("host_min_score", self.trust.host_min_score),
            ("apply_min_score", self.trust.apply_min_score),
            ("initial_score", self.trust.initial_score),
        ] {
            if !score_range.contains(&value) {
                anyhow::bail!(
                    "Trust threshold {} must be between {} and {} (got {})",
                    name,
                    SCORE_MIN,
                    SCORE_MAX,
                    value
                );
            }
        }

        for token in self.auth.tokens.keys() {
            if token.len() < MIN_TOKEN_LENGTH {
                anyhow::bail!(
                    "Auth token is too short (minimum {} characters)",
                    MIN_TOKEN_LENGTH
                );
            }
        }

        Ok(())
    }
}
