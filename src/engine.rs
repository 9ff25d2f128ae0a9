/// Identity engine
///
/// Front door for every identity operation: derives identities, keeps the
/// resolver in sync with them, and hands out delegations and tokens.
/// Operations on one DID are serialized; different DIDs proceed in parallel.
use crate::{
    crypto::{keys::secret_fingerprint, Seed},
    delegation::DelegationEngine,
    error::{IdentityError, IdentityResult},
    identity::{
        cache::{DEFAULT_SIZE, DEFAULT_TTL},
        parse_resolver_address, CreateIdentityOptions, DelegationRecord, DidDocument, DidLocks,
        DocumentBuilder, GetIdentityOptions, Identity, IdentityCache, ResolverClient, SubjectType,
    },
    token::{AuthClaims, AuthToken, TokenIssuer},
};
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Engine settings
#[derive(Debug, Clone)]
pub struct IdentityEngineConfig {
    /// Resolver used where an operation takes no resolver address (token issuance)
    pub default_resolver: Option<Url>,
    pub cache_ttl: Duration,
    pub cache_size: usize,
}

impl Default for IdentityEngineConfig {
    fn default() -> Self {
        Self {
            default_resolver: None,
            cache_ttl: DEFAULT_TTL,
            cache_size: DEFAULT_SIZE,
        }
    }
}

/// Identity cache policy update; absent fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    pub ttl_sec: Option<u64>,
    #[serde(default)]
    pub size: Option<usize>,
}

pub struct IdentityEngine {
    resolver: Arc<dyn ResolverClient>,
    cache: IdentityCache,
    locks: DidLocks,
    delegations: DelegationEngine,
    default_resolver: Option<Url>,
}

impl IdentityEngine {
    pub fn new(
        resolver: Arc<dyn ResolverClient>,
        config: IdentityEngineConfig,
    ) -> IdentityResult<Self> {
        Ok(Self {
            cache: IdentityCache::new(config.cache_ttl, config.cache_size)?,
            locks: DidLocks::new(),
            delegations: DelegationEngine::new(resolver.clone()),
            resolver,
            default_resolver: config.default_resolver,
        })
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn default_resolver(&self) -> Option<&Url> {
        self.default_resolver.as_ref()
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }

    /// Fresh random 256-bit seed
    pub fn create_default_seed(&self) -> Seed {
        Seed::generate()
    }

    /// Change the identity cache policy
    pub async fn set_identities_cache_config(&self, config: &CacheConfig) -> IdentityResult<()> {
        if config.ttl_sec == Some(0) {
            return Err(IdentityError::InvalidArgument(
                "ttlSec must be at least 1".to_string(),
            ));
        }

        self.cache
            .set_policy(config.ttl_sec.map(Duration::from_secs), config.size)
            .await
    }

    /// Create (register) an identity, returning its DID
    ///
    /// Without override an identity already known to the cache or the
    /// resolver is returned as-is and nothing is registered.
    pub async fn create_identity(
        &self,
        resolver_address: &str,
        opts: &CreateIdentityOptions,
        subject_type: SubjectType,
    ) -> IdentityResult<String> {
        let resolver = parse_resolver_address(resolver_address)?;
        let identity = opts.derive(subject_type)?;
        let did = identity.did().to_string();

        let _guard = self.locks.lock(&did).await;

        if !opts.override_existing {
            if let Some(cached) = self.cache.get(&did).await {
                if cached.matches_secrets(identity.fingerprint(), identity.name())
                    && cached.subject_type() == subject_type
                {
                    debug!("Identity {} already known, skipping registration", did);
                    return Ok(did);
                }
            }

            match self.resolver.fetch(&resolver, &did).await {
                Ok(existing) if existing.subject_type != subject_type => {
                    return Err(IdentityError::TypeMismatch(format!(
                        "{} is registered as a {}, not a {}",
                        did, existing.subject_type, subject_type
                    )));
                }
                Ok(existing) => {
                    debug!("Identity {} already registered on {}", did, resolver);
                    if publishes_key(&existing, &identity) {
                        self.cache.put(&did, identity).await;
                    }
                    return Ok(did);
                }
                Err(IdentityError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let document = DocumentBuilder::build(&identity, &[])?;
        self.resolver
            .register(&resolver, &document, opts.override_existing)
            .await?;

        info!(
            "Registered {} identity {} on {} (override={})",
            subject_type, did, resolver, opts.override_existing
        );

        self.cache.put(&did, identity).await;
        Ok(did)
    }

    pub async fn create_agent_identity(
        &self,
        resolver_address: &str,
        opts: &CreateIdentityOptions,
    ) -> IdentityResult<String> {
        self.create_identity(resolver_address, opts, SubjectType::Agent)
            .await
    }

    pub async fn create_user_identity(
        &self,
        resolver_address: &str,
        opts: &CreateIdentityOptions,
    ) -> IdentityResult<String> {
        self.create_identity(resolver_address, opts, SubjectType::User)
            .await
    }

    pub async fn create_twin_identity(
        &self,
        resolver_address: &str,
        opts: &CreateIdentityOptions,
    ) -> IdentityResult<String> {
        self.create_identity(resolver_address, opts, SubjectType::Twin)
            .await
    }

    /// Fetch a registered document and check its proof
    pub async fn get_registered_document(
        &self,
        resolver_address: &str,
        did: &str,
    ) -> IdentityResult<DidDocument> {
        let resolver = parse_resolver_address(resolver_address)?;
        let document = self.resolver.fetch(&resolver, did).await?;

        if let Err(e) = DocumentBuilder::verify(&document) {
            warn!("Resolver {} served a bad document for {}: {}", resolver, did, e);
            return Err(IdentityError::Resolver(format!(
                "document proof invalid for {}",
                did
            )));
        }

        Ok(document)
    }

    /// Let `agent` control `twin`
    pub async fn delegate_control(
        &self,
        resolver_address: &str,
        twin: &GetIdentityOptions,
        agent: &GetIdentityOptions,
        delegation_name: &str,
    ) -> IdentityResult<DelegationRecord> {
        let resolver = parse_resolver_address(resolver_address)?;
        let twin = self.resolve_identity(&resolver, twin).await?;
        let agent = self.resolve_identity(&resolver, agent).await?;

        let _guard = self.locks.lock(twin.did()).await;
        self.delegations
            .delegate_control(&resolver, &twin, &agent, delegation_name)
            .await
    }

    /// Let `agent` authenticate as `user`
    pub async fn delegate_authentication(
        &self,
        resolver_address: &str,
        user: &GetIdentityOptions,
        agent: &GetIdentityOptions,
        delegation_name: &str,
    ) -> IdentityResult<DelegationRecord> {
        let resolver = parse_resolver_address(resolver_address)?;
        let user = self.resolve_identity(&resolver, user).await?;
        let agent = self.resolve_identity(&resolver, agent).await?;

        let _guard = self.locks.lock(user.did()).await;
        self.delegations
            .delegate_authentication(&resolver, &user, &agent, delegation_name)
            .await
    }

    /// Token letting the agent act as `user_did` towards `audience`
    pub async fn create_agent_auth_token(
        &self,
        agent: &GetIdentityOptions,
        user_did: &str,
        duration_ms: i64,
        audience: &str,
    ) -> IdentityResult<AuthToken> {
        if duration_ms <= 0 {
            return Err(IdentityError::InvalidDuration(format!(
                "durationMs must be positive, got {}",
                duration_ms
            )));
        }

        let resolver = self.require_default_resolver()?;
        let agent = self.resolve_identity(resolver, agent).await?;
        if agent.subject_type() != SubjectType::Agent {
            return Err(IdentityError::TypeMismatch(format!(
                "{} is a {}, expected an agent",
                agent.did(),
                agent.subject_type()
            )));
        }

        let _guard = self.locks.lock(user_did).await;
        self.delegations
            .verify_authentication(resolver, user_did, &agent)
            .await?;

        let token = TokenIssuer::issue(&agent, user_did, duration_ms, audience, Utc::now())?;
        info!(
            "Issued token {} for {} acting as {} (aud={}, {}ms)",
            token.claims.jti,
            agent.did(),
            user_did,
            audience,
            duration_ms
        );

        Ok(token)
    }

    /// Check a token against its issuer's published key and live delegation
    pub async fn validate_agent_auth_token(
        &self,
        token: &str,
        audience: &str,
    ) -> IdentityResult<AuthClaims> {
        let resolver = self.require_default_resolver()?;
        let unverified = TokenIssuer::decode_unverified(token)?;

        let issuer = match self.resolver.fetch(resolver, unverified.issuer_did()).await {
            Ok(document) => document,
            Err(IdentityError::NotFound(_)) => {
                return Err(IdentityError::Unauthorized(format!(
                    "token issuer {} is not registered",
                    unverified.issuer_did()
                )))
            }
            Err(e) => return Err(e),
        };
        DocumentBuilder::verify(&issuer)?;

        let key_name = unverified
            .iss
            .find('#')
            .map(|idx| &unverified.iss[idx..])
            .unwrap_or_default();
        let key = issuer.public_key(key_name).ok_or_else(|| {
            IdentityError::Unauthorized(format!("issuer key {} is not published", unverified.iss))
        })?;

        let claims = TokenIssuer::validate(token, audience, &key.public_key_base58, Utc::now())?;
        self.delegations
            .verify_authentication_for(
                resolver,
                &claims.sub,
                claims.issuer_did(),
                &key.public_key_base58,
            )
            .await?;

        Ok(claims)
    }

    /// Load a registered identity from its secrets
    ///
    /// The secrets must derive `opts.did`; the subject type comes from the
    /// registered document.
    pub(crate) async fn resolve_identity(
        &self,
        resolver: &Url,
        opts: &GetIdentityOptions,
    ) -> IdentityResult<Identity> {
        let seed = Seed::parse(&opts.seed)?;
        let fingerprint = secret_fingerprint(&seed, &opts.key, opts.password());

        if let Some(cached) = self.cache.get(&opts.did).await {
            if cached.matches_secrets(&fingerprint, &opts.name) {
                return Ok(cached);
            }
        }

        let identity = Identity::derive(
            SubjectType::Agent,
            &seed,
            &opts.key,
            &opts.name,
            opts.password(),
        )?;
        if identity.did() != opts.did {
            return Err(IdentityError::InvalidArgument(format!(
                "seed and key {} derive {}, not {}",
                opts.key,
                identity.did(),
                opts.did
            )));
        }

        let document = self.resolver.fetch(resolver, &opts.did).await?;
        if !publishes_key(&document, &identity) {
            return Err(IdentityError::InvalidArgument(format!(
                "{} publishes no key {} for these secrets",
                opts.did, opts.name
            )));
        }
        let identity = identity.with_subject_type(document.subject_type);

        self.cache.put(&opts.did, identity.clone()).await;
        Ok(identity)
    }

    fn require_default_resolver(&self) -> IdentityResult<&Url> {
        self.default_resolver.as_ref().ok_or_else(|| {
            IdentityError::InvalidArgument("no default resolver configured".to_string())
        })
    }
}

/// True when the document lists the identity's public key under its name
fn publishes_key(document: &DidDocument, identity: &Identity) -> bool {
    document
        .public_key(identity.name())
        .map(|key| key.public_key_base58 == identity.keys().public_key_base58())
        .unwrap_or(false)
}
