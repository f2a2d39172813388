//! In-memory store, usable as both loader and storage.
//!
//! Backs development setups and tests. Tracks per-key load and save
//! counts so cache behavior (save-back, coalescing) is observable.

use super::{Fetched, Loader, Storage};
use crate::blob::{Blob, Meta, Stat};
use crate::engine::{Request, RequestContext};
use crate::error::Error;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Clone)]
struct Entry {
    data: Bytes,
    content_type: Option<String>,
    meta: Option<Meta>,
    modified_time: DateTime<Utc>,
}

/// Concurrent map-backed image store.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    load_counts: DashMap<String, u64>,
    save_counts: DashMap<String, u64>,
    latency: Option<Duration>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay to every operation, for timeout tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes `put` fail, for fan-out error handling tests.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Seeds an entry directly, without counting a save.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.entries.insert(
            key.into(),
            Entry {
                data: data.into(),
                content_type: None,
                meta: None,
                modified_time: Utc::now(),
            },
        );
    }

    /// Attaches sidecar metadata to an existing or new entry.
    pub fn set_meta(&self, key: impl Into<String>, meta: Meta) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(mut entry) => entry.meta = Some(meta),
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        data: Bytes::new(),
                        content_type: None,
                        meta: Some(meta),
                        modified_time: Utc::now(),
                    },
                );
            }
        }
    }

    /// Backdates an entry's modification time, for freshness tests.
    pub fn set_modified_time(&self, key: &str, modified_time: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.modified_time = modified_time;
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of successful reads of `key`.
    pub fn load_count(&self, key: &str) -> u64 {
        self.load_counts.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Number of writes of `key`.
    pub fn save_count(&self, key: &str) -> u64 {
        self.save_counts.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Sleeps out the configured latency, aborting early when the
    /// context fires.
    async fn simulate_latency(&self, ctx: &RequestContext) -> Result<(), Error> {
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {}
                _ = ctx.cancelled() => {
                    return Err(ctx.error().unwrap_or(Error::Cancelled));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Loader for MemoryStore {
    async fn get(&self, req: &Request, key: &str) -> Fetched {
        if let Err(error) = self.simulate_latency(&req.ctx).await {
            return Fetched::err(error);
        }
        let Some(entry) = self.entries.get(key).map(|e| e.value().clone()) else {
            return Fetched::err(Error::NotFound);
        };
        *self.load_counts.entry(key.to_string()).or_insert(0) += 1;
        let mut blob = Blob::new(entry.data);
        if let Some(content_type) = entry.content_type {
            blob = blob.with_content_type(content_type);
        }
        if let Some(meta) = entry.meta {
            blob = blob.with_meta(meta);
        }
        Fetched::ok(blob)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn put(&self, ctx: &RequestContext, key: &str, blob: &Blob) -> Result<(), Error> {
        self.simulate_latency(ctx).await?;
        if self.fail_writes {
            return Err(Error::Internal("write refused".into()));
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                data: blob.data(),
                content_type: Some(blob.content_type().to_string()),
                meta: blob.meta().cloned(),
                modified_time: Utc::now(),
            },
        );
        *self.save_counts.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), Error> {
        self.simulate_latency(ctx).await?;
        self.entries.remove(key);
        Ok(())
    }

    async fn stat(&self, ctx: &RequestContext, key: &str) -> Result<Stat, Error> {
        self.simulate_latency(ctx).await?;
        let entry = self.entries.get(key).ok_or(Error::NotFound)?;
        Ok(Stat {
            modified_time: entry.modified_time,
            size: entry.data.len() as u64,
        })
    }

    async fn meta(&self, ctx: &RequestContext, key: &str) -> Result<Meta, Error> {
        self.simulate_latency(ctx).await?;
        let entry = self.entries.get(key).ok_or(Error::NotFound)?;
        entry.meta.clone().ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RequestContext;

    fn request() -> (Request, crate::engine::RequestScope) {
        let (ctx, scope) = RequestContext::root();
        (Request::new(ctx), scope)
    }

    #[tokio::test]
    async fn test_miss_does_not_count_a_load() {
        let store = MemoryStore::new();
        let (req, _scope) = request();

        let fetched = store.get(&req, "missing").await;
        assert_eq!(fetched.error, Some(Error::NotFound));
        assert_eq!(store.load_count("missing"), 0);
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = MemoryStore::new();
        let (req, _scope) = request();
        let (ctx, _scope2) = RequestContext::root();

        let blob = Blob::new(&b"payload"[..]).with_content_type("image/png");
        store.put(&ctx, "a.png", &blob).await.unwrap();

        let fetched = store.get(&req, "a.png").await;
        let got = fetched.blob.unwrap();
        assert_eq!(got.data().as_ref(), b"payload");
        assert_eq!(got.content_type(), "image/png");
        assert_eq!(store.save_count("a.png"), 1);
        assert_eq!(store.load_count("a.png"), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let store = MemoryStore::new();
        let (ctx, _scope) = RequestContext::root();
        store.insert("a.jpg", &b"x"[..]);

        store.delete(&ctx, "a.jpg").await.unwrap();
        assert!(!store.contains("a.jpg"));
        // Deleting an absent key is not an error.
        store.delete(&ctx, "a.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_stat_reports_size_and_mtime() {
        let store = MemoryStore::new();
        let (ctx, _scope) = RequestContext::root();
        store.insert("a.jpg", &b"12345"[..]);

        let stat = store.stat(&ctx, "a.jpg").await.unwrap();
        assert_eq!(stat.size, 5);

        let backdated = Utc::now() - chrono::Duration::hours(1);
        store.set_modified_time("a.jpg", backdated);
        let stat = store.stat(&ctx, "a.jpg").await.unwrap();
        assert_eq!(stat.modified_time, backdated);
    }

    #[tokio::test]
    async fn test_meta_requires_sidecar() {
        let store = MemoryStore::new();
        let (ctx, _scope) = RequestContext::root();
        store.insert("a.jpg", &b"x"[..]);

        assert_eq!(store.meta(&ctx, "a.jpg").await, Err(Error::NotFound));

        store.set_meta(
            "a.jpg",
            Meta {
                format: "jpeg".into(),
                content_type: "image/jpeg".into(),
                width: 2,
                height: 3,
                orientation: 1,
            },
        );
        let meta = store.meta(&ctx, "a.jpg").await.unwrap();
        assert_eq!((meta.width, meta.height), (2, 3));
    }
}
