/// Resolver client - register, fetch and update DID documents on a resolver
use crate::{
    error::{IdentityError, IdentityResult},
    identity::DidDocument,
};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolver backend
///
/// `resolver` is the base address of the resolver service; one client can
/// talk to any number of resolvers.
#[async_trait]
pub trait ResolverClient: Send + Sync {
    /// Register a document, returning its DID
    ///
    /// Registering an identical document again is a no-op. A different
    /// document for the same DID is a `Conflict` unless `override_existing`.
    async fn register(
        &self,
        resolver: &Url,
        document: &DidDocument,
        override_existing: bool,
    ) -> IdentityResult<String>;

    /// Fetch the document for a DID
    async fn fetch(&self, resolver: &Url, did: &str) -> IdentityResult<DidDocument>;

    /// Replace the document of an already registered DID
    async fn update(&self, resolver: &Url, did: &str, document: &DidDocument)
        -> IdentityResult<()>;
}

/// Parse and check a resolver base address
pub fn parse_resolver_address(address: &str) -> IdentityResult<Url> {
    let address = address.trim();
    if address.is_empty() {
        return Err(IdentityError::InvalidArgument(
            "resolver address is empty".to_string(),
        ));
    }

    let url = Url::parse(address).map_err(|e| {
        IdentityError::InvalidArgument(format!("invalid resolver address '{}': {}", address, e))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(IdentityError::InvalidArgument(format!(
            "unsupported resolver scheme '{}'",
            other
        ))),
    }
}

/// REST resolver configuration
#[derive(Debug, Clone)]
pub struct RestResolverConfig {
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RestResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("identity-engine/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    document: &'a DidDocument,
    #[serde(rename = "override")]
    override_existing: bool,
}

/// Resolver reached over HTTP(S)
///
/// Layout:
/// - `GET  {resolver}/1.0/discover/{did}` fetches a document
/// - `POST {resolver}/1.0/register` registers `{document, override}`
/// - `PUT  {resolver}/1.0/discover/{did}` replaces a document
#[derive(Clone)]
pub struct RestResolverClient {
    http_client: reqwest::Client,
}

impl RestResolverClient {
    /// Create a new REST resolver client
    pub fn new(config: RestResolverConfig) -> IdentityResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| IdentityError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    fn endpoint(resolver: &Url, path: &str) -> IdentityResult<Url> {
        let url = format!("{}/1.0/{}", resolver.as_str().trim_end_matches('/'), path);
        Url::parse(&url)
            .map_err(|e| IdentityError::InvalidArgument(format!("invalid resolver URL {}: {}", url, e)))
    }

    /// Map non-success statuses onto the error taxonomy
    async fn check_status(response: reqwest::Response, did: &str) -> IdentityResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound(format!("DID {} not registered", did))),
            StatusCode::CONFLICT => Err(IdentityError::Conflict(format!(
                "DID {} already registered with a different document: {}",
                did, body
            ))),
            _ => {
                warn!("Resolver returned {} for {}: {}", status, did, body);
                Err(IdentityError::Resolver(format!(
                    "resolver returned {}: {}",
                    status, body
                )))
            }
        }
    }
}

/// Transport failures (connect, timeout, reset) mean the resolver is unreachable
fn unreachable(resolver: &Url, e: reqwest::Error) -> IdentityError {
    warn!("Resolver {} unreachable: {}", resolver, e);
    IdentityError::Unreachable(format!("{}: {}", resolver, e))
}

#[async_trait]
impl ResolverClient for RestResolverClient {
    async fn register(
        &self,
        resolver: &Url,
        document: &DidDocument,
        override_existing: bool,
    ) -> IdentityResult<String> {
        let url = Self::endpoint(resolver, "register")?;
        debug!("POST {} ({}, override={})", url, document.id, override_existing);

        let response = self
            .http_client
            .post(url)
            .json(&RegisterRequest {
                document,
                override_existing,
            })
            .send()
            .await
            .map_err(|e| unreachable(resolver, e))?;

        Self::check_status(response, &document.id).await?;

        Ok(document.id.clone())
    }

    async fn fetch(&self, resolver: &Url, did: &str) -> IdentityResult<DidDocument> {
        let url = Self::endpoint(resolver, &format!("discover/{}", did))?;
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(resolver, e))?;

        let response = Self::check_status(response, did).await?;

        response
            .json()
            .await
            .map_err(|e| IdentityError::Resolver(format!("Invalid DID document for {}: {}", did, e)))
    }

    async fn update(
        &self,
        resolver: &Url,
        did: &str,
        document: &DidDocument,
    ) -> IdentityResult<()> {
        let url = Self::endpoint(resolver, &format!("discover/{}", did))?;
        debug!("PUT {}", url);

        let response = self
            .http_client
            .put(url)
            .json(document)
            .send()
            .await
            .map_err(|e| unreachable(resolver, e))?;

        Self::check_status(response, did).await?;

        Ok(())
    }
}
