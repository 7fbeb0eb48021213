use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub requests_per_minute: u32,
    pub rate_window: Duration,
    pub token_ttl: Duration,
    pub token_key: String,
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    /// Time an open circuit waits before letting a probe through.
    pub timeout: Duration,
    pub state_ttl: Duration,
    pub key: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("BRIDGE_API_BASE_URL") {
            config.base_url = value.trim().trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("BRIDGE_API_USERNAME") {
            config.username = value;
        }
        if let Some(value) = lookup("BRIDGE_API_PASSWORD") {
            config.password = value;
        }
        if let Some(value) = lookup("BRIDGE_API_TIMEOUT_SECS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.timeout = Duration::from_secs(parsed.max(1));
        }
        if let Some(value) = lookup("BRIDGE_RATE_LIMIT_PER_MINUTE")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.requests_per_minute = parsed.max(1);
        }
        if let Some(value) = lookup("BRIDGE_TOKEN_TTL_SECS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.token_ttl = Duration::from_secs(parsed);
        }
        if let Some(value) = lookup("BRIDGE_RETRY_MAX_ATTEMPTS")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.retry.max_attempts = parsed.max(1);
        }
        if let Some(value) = lookup("BRIDGE_RETRY_INITIAL_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry.initial_delay = Duration::from_millis(parsed);
        }
        if let Some(value) = lookup("BRIDGE_RETRY_MULTIPLIER")
            && let Ok(parsed) = value.parse::<f64>()
        {
            config.retry.multiplier = parsed;
        }
        if let Some(value) = lookup("BRIDGE_RETRY_MAX_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry.max_delay = Duration::from_millis(parsed);
        }
        if let Some(value) = lookup("BRIDGE_CIRCUIT_ENABLED")
            && let Ok(parsed) = value.parse::<bool>()
        {
            config.breaker.enabled = parsed;
        }
        if let Some(value) = lookup("BRIDGE_CIRCUIT_FAILURE_THRESHOLD")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.breaker.failure_threshold = parsed.max(1);
        }
        if let Some(value) = lookup("BRIDGE_CIRCUIT_TIMEOUT_SECS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.breaker.timeout = Duration::from_secs(parsed);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing("BRIDGE_API_BASE_URL"));
        }
        reqwest::Url::parse(&self.base_url).map_err(|err| ConfigError::Invalid {
            field: "BRIDGE_API_BASE_URL",
            message: err.to_string(),
        })?;
        if self.username.is_empty() {
            return Err(ConfigError::Missing("BRIDGE_API_USERNAME"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Missing("BRIDGE_API_PASSWORD"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "BRIDGE_RETRY_MULTIPLIER",
                message: format!("must be >= 1.0, got {}", self.retry.multiplier),
            });
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
            requests_per_minute: 60,
            rate_window: Duration::from_secs(60),
            token_ttl: Duration::from_secs(3600),
            token_key: "bridge:auth_token".to_string(),
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("rate_window", &self.rate_window)
            .field("token_ttl", &self.token_ttl)
            .field("token_key", &self.token_key)
            .field("retry", &self.retry)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout: Duration::from_secs(300),
            state_ttl: Duration::from_secs(24 * 60 * 60),
            key: "bridge:circuit:target".to_string(),
        }
    }
}
