//! Per-resource serialization of mutating calls
//!
//! Two mutations on the same resource (for example a delete racing a start
//! on `us-central1-a/vm1`) are run one after the other. Mutations on
//! different resources never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Guard held for the duration of one mutating call
pub type ResourceGuard = OwnedMutexGuard<()>;

/// Keyed async mutexes, one per `kind/location/name`
#[derive(Debug, Default, Clone)]
pub struct ResourceLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a resource
    pub async fn acquire(&self, kind: &str, location: &str, name: &str) -> ResourceGuard {
        let key = format!("{}/{}/{}", kind, location, name);
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody is holding or waiting on
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(key.clone()).or_default().clone()
        };

        debug!(resource = %key, "Acquiring resource lock");
        lock.lock_owned().await
    }

    /// Number of resources currently locked or awaited
    pub fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_resource_is_serialized() {
        let locks = ResourceLocks::new();
        let guard = locks.acquire("instance", "us-central1-a", "vm1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("instance", "us-central1-a", "vm1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_resources_do_not_block() {
        let locks = ResourceLocks::new();
        let _a = locks.acquire("instance", "us-central1-a", "vm1").await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("instance", "us-central1-a", "vm2"),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = ResourceLocks::new();
        drop(locks.acquire("service", "us-central1", "web").await);
        assert_eq!(locks.active(), 0);
    }
}
