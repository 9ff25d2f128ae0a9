/// Application context and dependency injection
use crate::{
    config::{EngineConfig, ResolverBackend},
    engine::IdentityEngine,
    error::IdentityResult,
    identity::{InMemoryResolver, ResolverClient, RestResolverClient, RestResolverConfig},
};
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<EngineConfig>,
    pub engine: Arc<IdentityEngine>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: EngineConfig) -> IdentityResult<Self> {
        config.validate()?;

        let resolver: Arc<dyn ResolverClient> = match config.resolver.backend {
            ResolverBackend::Rest => Arc::new(RestResolverClient::new(RestResolverConfig {
                timeout: config.resolver.timeout,
                ..Default::default()
            })?),
            ResolverBackend::Memory => Arc::new(InMemoryResolver::new()),
        };

        Self::with_resolver(config, resolver)
    }

    /// Create a context around an already built resolver backend
    pub fn with_resolver(
        config: EngineConfig,
        resolver: Arc<dyn ResolverClient>,
    ) -> IdentityResult<Self> {
        let engine = IdentityEngine::new(resolver, config.engine_config()?)?;

        info!(
            "Identity engine ready (resolver={} via {:?}, cache ttl={:?} size={})",
            config.resolver.url, config.resolver.backend, config.cache.ttl, config.cache.size
        );

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        })
    }
}
