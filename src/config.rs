/// Configuration management for the identity engine service
use crate::{
    engine::IdentityEngineConfig,
    error::{IdentityError, IdentityResult},
    identity::{
        cache::{DEFAULT_SIZE, DEFAULT_TTL},
        parse_resolver_address,
    },
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr, time::Duration};

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "identity_engine=debug,tower_http=debug";

/// Main service configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub service: ServiceConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Which resolver implementation backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverBackend {
    /// Remote resolver over HTTP(S)
    Rest,
    /// Process-local documents, lost on restart
    Memory,
}

impl FromStr for ResolverBackend {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(ResolverBackend::Rest),
            "memory" => Ok(ResolverBackend::Memory),
            other => Err(IdentityError::InvalidArgument(format!(
                "Unknown resolver backend '{}' (expected rest or memory)",
                other
            ))),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Default resolver, used for token issuance
    pub url: String,
    pub backend: ResolverBackend,
    pub timeout: Duration,
}

/// Identity cache policy at startup
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub size: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `identity_engine=info`
    pub level: String,
    pub format: LogFormat,
}

impl EngineConfig {
    /// Load configuration from environment variables (and `.env`)
    pub fn from_env() -> IdentityResult<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> IdentityResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = var("IDENTITY_HOSTNAME").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("IDENTITY_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| IdentityError::InvalidArgument("Invalid port number".to_string()))?;
        let version = var("IDENTITY_VERSION")
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

        let resolver_url =
            var("IDENTITY_RESOLVER_URL").unwrap_or_else(|| "http://localhost:5000".to_string());
        let backend = var("IDENTITY_RESOLVER_BACKEND")
            .map(|b| b.parse::<ResolverBackend>())
            .transpose()?
            .unwrap_or(ResolverBackend::Rest);
        let timeout_secs: u64 = var("IDENTITY_RESOLVER_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| {
                IdentityError::InvalidArgument("Invalid resolver timeout".to_string())
            })?;

        let cache_ttl = var("IDENTITY_CACHE_TTL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|_| IdentityError::InvalidArgument("Invalid cache ttl".to_string()))?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);
        let cache_size = var("IDENTITY_CACHE_SIZE")
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|_| IdentityError::InvalidArgument("Invalid cache size".to_string()))?
            .unwrap_or(DEFAULT_SIZE);

        let log_level = var("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let log_format = match var("IDENTITY_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(EngineConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            resolver: ResolverConfig {
                url: resolver_url,
                backend,
                timeout: Duration::from_secs(timeout_secs),
            },
            cache: CacheSettings {
                ttl: cache_ttl,
                size: cache_size,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> IdentityResult<()> {
        if self.service.hostname.is_empty() {
            return Err(IdentityError::InvalidArgument(
                "Hostname cannot be empty".to_string(),
            ));
        }

        parse_resolver_address(&self.resolver.url)?;

        if self.resolver.timeout.is_zero() {
            return Err(IdentityError::InvalidArgument(
                "Resolver timeout must be at least 1 second".to_string(),
            ));
        }
        if self.cache.ttl.is_zero() || self.cache.size == 0 {
            return Err(IdentityError::InvalidArgument(
                "Cache ttl and size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Default resolver as a parsed URL
    pub fn resolver_url(&self) -> IdentityResult<Url> {
        parse_resolver_address(&self.resolver.url)
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> IdentityResult<IdentityEngineConfig> {
        Ok(IdentityEngineConfig {
            default_resolver: Some(self.resolver_url()?),
            cache_ttl: self.cache.ttl,
            cache_size: self.cache.size,
        })
    }
}
