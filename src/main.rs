/// Identity Engine - DID identity service
use identity_engine::{
    config::{EngineConfig, LogFormat, DEFAULT_LOG_FILTER},
    server, AppContext, IdentityResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> IdentityResult<()> {
    // Load configuration first so the log format is known
    let config = EngineConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!(
        "Identity engine v{} starting",
        config.service.version
    );

    let ctx = AppContext::new(config)?;

    server::serve(ctx).await?;

    Ok(())
}
