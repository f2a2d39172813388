//! Fan-out persistence: one worker per storage, joined before return.
//!
//! Individual failures are logged and never fail the caller; the shared
//! save deadline cancels whatever is still pending.

use super::context::RequestContext;
use super::core::Engine;
use crate::blob::Blob;
use crate::store::Storage;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

impl Engine {
    /// Writes `blob` to every storage concurrently under the save
    /// deadline, then waits for all workers.
    pub(super) async fn save_all(
        &self,
        ctx: &RequestContext,
        storages: &[Arc<dyn Storage>],
        key: &str,
        blob: Arc<Blob>,
    ) {
        if storages.is_empty() {
            return;
        }
        let ctx = ctx.with_timeout(self.config.save_timeout);
        let mut workers = Vec::with_capacity(storages.len());
        for storage in storages {
            let storage = Arc::clone(storage);
            let ctx = ctx.clone();
            let key = key.to_string();
            let blob = Arc::clone(&blob);
            workers.push(tokio::spawn(async move {
                tokio::select! {
                    result = storage.put(&ctx, &key, &blob) => match result {
                        Ok(()) => debug!(key = %key, "saved"),
                        Err(error) => warn!(key = %key, %error, "save failed"),
                    },
                    _ = ctx.cancelled() => warn!(key = %key, "save cancelled"),
                }
            }));
        }
        let _ = join_all(workers).await;
    }

    /// Deletes `key` from every storage concurrently, then waits for all
    /// workers.
    pub(super) async fn delete_all(
        &self,
        ctx: &RequestContext,
        storages: &[Arc<dyn Storage>],
        key: &str,
    ) {
        if storages.is_empty() {
            return;
        }
        let mut workers = Vec::with_capacity(storages.len());
        for storage in storages {
            let storage = Arc::clone(storage);
            let ctx = ctx.clone();
            let key = key.to_string();
            workers.push(tokio::spawn(async move {
                match storage.delete(&ctx, &key).await {
                    Ok(()) => debug!(key = %key, "deleted"),
                    Err(error) => warn!(key = %key, %error, "delete failed"),
                }
            }));
        }
        let _ = join_all(workers).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::builder().build()
    }

    #[tokio::test]
    async fn test_save_fans_out_to_all_storages() {
        let engine = engine();
        let (ctx, _scope) = RequestContext::root();
        let first = Arc::new(MemoryStore::new());
        let second = Arc::new(MemoryStore::new());

        let storages: Vec<Arc<dyn Storage>> = vec![first.clone(), second.clone()];
        engine
            .save_all(&ctx, &storages, "a.jpg", Arc::new(Blob::new(&b"x"[..])))
            .await;

        assert_eq!(first.save_count("a.jpg"), 1);
        assert_eq!(second.save_count("a.jpg"), 1);
    }

    #[tokio::test]
    async fn test_one_failing_storage_does_not_block_others() {
        let engine = engine();
        let (ctx, _scope) = RequestContext::root();
        let failing = Arc::new(MemoryStore::new().failing_writes());
        let healthy = Arc::new(MemoryStore::new());

        let storages: Vec<Arc<dyn Storage>> = vec![failing, healthy.clone()];
        engine
            .save_all(&ctx, &storages, "a.jpg", Arc::new(Blob::new(&b"x"[..])))
            .await;

        assert_eq!(healthy.save_count("a.jpg"), 1);
    }

    #[tokio::test]
    async fn test_save_timeout_cancels_pending_writes() {
        let engine = Engine::builder()
            .save_timeout(Duration::from_millis(20))
            .build();
        let (ctx, _scope) = RequestContext::root();
        let slow = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(5)));

        let storages: Vec<Arc<dyn Storage>> = vec![slow.clone()];
        let started = std::time::Instant::now();
        engine
            .save_all(&ctx, &storages, "a.jpg", Arc::new(Blob::new(&b"x"[..])))
            .await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(slow.save_count("a.jpg"), 0);
    }

    #[tokio::test]
    async fn test_delete_fans_out() {
        let engine = engine();
        let (ctx, _scope) = RequestContext::root();
        let store = Arc::new(MemoryStore::new());
        store.insert("a.jpg", &b"x"[..]);

        let storages: Vec<Arc<dyn Storage>> = vec![store.clone()];
        engine.delete_all(&ctx, &storages, "a.jpg").await;

        assert!(!store.contains("a.jpg"));
    }
}
