/// Identity cache - bounded, time-expiring LRU of identities keyed by DID
use crate::{
    error::{IdentityError, IdentityResult},
    identity::Identity,
};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use tokio::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::debug;

/// Default time-to-live for cached identities
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Default maximum number of cached identities
pub const DEFAULT_SIZE: usize = 128;

/// Current cache policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicy {
    pub ttl_sec: u64,
    pub size: usize,
}

struct CacheEntry {
    identity: Identity,
    inserted_at: Instant,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl CacheState {
    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.inserted_at.elapsed() >= self.ttl
    }

    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(did, _)| did.clone())
            .collect();

        for did in &expired {
            self.entries.pop(did);
        }

        expired.len()
    }
}

/// Identity cache manager
pub struct IdentityCache {
    state: Mutex<CacheState>,
}

impl IdentityCache {
    /// Create a cache with an explicit policy
    pub fn new(ttl: Duration, size: usize) -> IdentityResult<Self> {
        let capacity = capacity(size)?;
        if ttl.is_zero() {
            return Err(IdentityError::InvalidArgument(
                "cache ttl must be positive".to_string(),
            ));
        }

        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                ttl,
            }),
        })
    }

    /// Apply a new policy (ttl in seconds, max entries)
    ///
    /// Existing entries are re-evaluated: anything already older than the new
    /// ttl is dropped and the least recently used entries are evicted down to
    /// the new size.
    pub async fn configure(&self, ttl_secs: u64, size: usize) -> IdentityResult<()> {
        if ttl_secs < 1 {
            return Err(IdentityError::InvalidArgument(
                "cache ttl must be at least 1 second".to_string(),
            ));
        }
        self.set_policy(Some(Duration::from_secs(ttl_secs)), Some(size))
            .await
    }

    /// Update only the parts of the policy that are given
    pub async fn set_policy(&self, ttl: Option<Duration>, size: Option<usize>) -> IdentityResult<()> {
        let capacity = size.map(capacity).transpose()?;
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(IdentityError::InvalidArgument(
                "cache ttl must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        if let Some(ttl) = ttl {
            state.ttl = ttl;
        }
        if let Some(capacity) = capacity {
            state.entries.resize(capacity);
        }
        let purged = state.purge_expired();

        debug!(
            "Cache policy: ttl={:?} size={} (purged {} expired)",
            state.ttl,
            state.entries.cap(),
            purged
        );

        Ok(())
    }

    /// Current policy
    pub async fn policy(&self) -> CachePolicy {
        let state = self.state.lock().await;
        CachePolicy {
            ttl_sec: state.ttl.as_secs(),
            size: state.entries.cap().get(),
        }
    }

    /// Get a cached identity; `None` on miss or expiry
    pub async fn get(&self, did: &str) -> Option<Identity> {
        let mut state = self.state.lock().await;

        let expired = match state.entries.peek(did) {
            Some(entry) => state.is_expired(entry),
            None => {
                debug!("Cache MISS: {}", did);
                return None;
            }
        };

        if expired {
            state.entries.pop(did);
            debug!("Cache EXPIRED: {}", did);
            return None;
        }

        debug!("Cache HIT: {}", did);
        state.entries.get(did).map(|entry| entry.identity.clone())
    }

    /// Insert or overwrite an identity, evicting the least recently used on overflow
    pub async fn put(&self, did: &str, identity: Identity) {
        let mut state = self.state.lock().await;

        // Prefer dropping dead entries over live ones
        if state.entries.len() == state.entries.cap().get() && !state.entries.contains(did) {
            state.purge_expired();
        }

        let entry = CacheEntry {
            identity,
            inserted_at: Instant::now(),
        };

        if let Some((evicted, _)) = state.entries.push(did.to_string(), entry) {
            if evicted != did {
                debug!("Cache EVICT: {}", evicted);
            }
        }
    }

    /// Remove a DID from the cache
    pub async fn invalidate(&self, did: &str) -> bool {
        self.state.lock().await.entries.pop(did).is_some()
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(
                    NonZeroUsize::new(DEFAULT_SIZE).unwrap_or(NonZeroUsize::MIN),
                ),
                ttl: DEFAULT_TTL,
            }),
        }
    }
}

fn capacity(size: usize) -> IdentityResult<NonZeroUsize> {
    NonZeroUsize::new(size).ok_or_else(|| {
        IdentityError::InvalidArgument("cache size must be at least 1".to_string())
    })
}
