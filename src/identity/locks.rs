/// Per-DID mutual exclusion
///
/// Operations that read-modify-write the resolver record of one DID take that
/// DID's lock, so creation and delegation for the same DID never interleave
/// while operations on different DIDs still run in parallel.
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by DID
#[derive(Default)]
pub struct DidLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DidLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `did`; released when the guard drops
    pub async fn lock(&self, did: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Forget locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(did.to_string()).or_default())
        };

        lock.lock_owned().await
    }

    /// Number of DIDs currently locked or waited on
    pub async fn active(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
