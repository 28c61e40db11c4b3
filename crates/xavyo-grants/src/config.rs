//! Grants configuration.

use std::time::Duration;

use crate::cache::CacheScope;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for the remote client and the refresh gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantsConfig {
    /// Authorization server base URI, without a trailing slash.
    pub base_uri: String,

    /// When false every cache entry is written without a TTL and is
    /// refetched on the next request.
    pub use_cache: bool,

    /// Entry TTL applied when `use_cache` is on.
    pub cache_ttl: Duration,

    /// Budget for one outbound call.
    pub request_timeout: Duration,

    /// Whether cache keys carry the userspace id.
    pub cache_scope: CacheScope,

    /// Also fetch the system-packet map for users that have none cached.
    pub resolve_system_packets: bool,
}

impl GrantsConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GRANTS_BASE_URI`
    ///
    /// Optional:
    /// - `GRANTS_USE_CACHE` (default `false`)
    /// - `GRANTS_CACHE_TTL_SECS` (default `60`)
    /// - `GRANTS_REQUEST_TIMEOUT_SECS` (default `30`)
    /// - `GRANTS_CACHE_SCOPE`: `user` or `userspace` (default)
    /// - `GRANTS_RESOLVE_SYSTEM_PACKETS` (default `false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let base_uri = reader("GRANTS_BASE_URI")
            .map_err(|_| ConfigError::MissingVar("GRANTS_BASE_URI".into()))?;

        let use_cache = parse_or(&reader, "GRANTS_USE_CACHE", false)?;
        let cache_ttl_secs = parse_or(&reader, "GRANTS_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let request_timeout_secs = parse_or(
            &reader,
            "GRANTS_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let cache_scope = parse_or(&reader, "GRANTS_CACHE_SCOPE", CacheScope::Userspace)?;
        let resolve_system_packets = parse_or(&reader, "GRANTS_RESOLVE_SYSTEM_PACKETS", false)?;

        Self::builder()
            .base_uri(base_uri)
            .use_cache(use_cache)
            .cache_ttl(Duration::from_secs(cache_ttl_secs))
            .request_timeout(Duration::from_secs(request_timeout_secs))
            .cache_scope(cache_scope)
            .resolve_system_packets(resolve_system_packets)
            .build()
    }

    #[must_use]
    pub fn builder() -> GrantsConfigBuilder {
        GrantsConfigBuilder::new()
    }

    /// TTL to write cache entries with.
    #[must_use]
    pub fn entry_ttl(&self) -> Option<Duration> {
        self.use_cache.then_some(self.cache_ttl)
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Builder for [`GrantsConfig`].
#[derive(Debug, Default)]
pub struct GrantsConfigBuilder {
    base_uri: Option<String>,
    use_cache: Option<bool>,
    cache_ttl: Option<Duration>,
    request_timeout: Option<Duration>,
    cache_scope: Option<CacheScope>,
    resolve_system_packets: Option<bool>,
}

impl GrantsConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn cache_scope(mut self, scope: CacheScope) -> Self {
        self.cache_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn resolve_system_packets(mut self, resolve: bool) -> Self {
        self.resolve_system_packets = Some(resolve);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<GrantsConfig, ConfigError> {
        let base_uri = self
            .base_uri
            .map(|uri| uri.trim().trim_end_matches('/').to_string())
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GRANTS_BASE_URI".into()))?;

        if !(base_uri.starts_with("http://") || base_uri.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "GRANTS_BASE_URI".into(),
                format!("'{base_uri}' is not an http(s) URI"),
            ));
        }

        let request_timeout = self
            .request_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "GRANTS_REQUEST_TIMEOUT_SECS".into(),
                "must be greater than zero".into(),
            ));
        }

        Ok(GrantsConfig {
            base_uri,
            use_cache: self.use_cache.unwrap_or(false),
            cache_ttl: self
                .cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            request_timeout,
            cache_scope: self.cache_scope.unwrap_or_default(),
            resolve_system_packets: self.resolve_system_packets.unwrap_or(false),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
