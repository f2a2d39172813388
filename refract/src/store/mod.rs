//! Capability traits for image sources and caches.
//!
//! A [`Loader`] is a read-only origin; a [`Storage`] is also a loader
//! (same `get`) plus write, delete, stat and metadata capabilities. The
//! engine probes storages before loaders and uses the distinction to
//! decide save-back: a hit served by a loader is opportunistically
//! written to the configured storages, a hit served by a storage is not.

pub mod file;
pub mod http;
pub mod memory;

use crate::blob::{Blob, Meta, Stat};
use crate::engine::{Request, RequestContext};
use crate::error::Error;
use async_trait::async_trait;

pub use file::FileStore;
pub use http::HttpLoader;
pub use memory::MemoryStore;

/// Outcome of a single loader or storage fetch.
///
/// A handler may yield bytes and an error together (a truncated origin
/// read, for instance); the load pipeline checks both independently and
/// decides which wins.
#[derive(Debug, Default)]
pub struct Fetched {
    pub blob: Option<Blob>,
    pub error: Option<Error>,
}

impl Fetched {
    pub fn ok(blob: Blob) -> Self {
        Self {
            blob: Some(blob),
            error: None,
        }
    }

    pub fn err(error: Error) -> Self {
        Self {
            blob: None,
            error: Some(error),
        }
    }

    /// Bytes and an error together; the pipeline may still serve the
    /// bytes if nothing better turns up.
    pub fn partial(blob: Blob, error: Error) -> Self {
        Self {
            blob: Some(blob),
            error: Some(error),
        }
    }

    /// Whether a non-empty blob is present.
    pub fn has_blob(&self) -> bool {
        self.blob.as_ref().is_some_and(|b| !b.is_empty())
    }
}

impl From<Result<Blob, Error>> for Fetched {
    fn from(result: Result<Blob, Error>) -> Self {
        match result {
            Ok(blob) => Fetched::ok(blob),
            Err(error) => Fetched::err(error),
        }
    }
}

/// Read-only source of images.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn get(&self, req: &Request, key: &str) -> Fetched;
}

/// Read/write image cache with stat and metadata capabilities.
#[async_trait]
pub trait Storage: Loader {
    async fn put(&self, ctx: &RequestContext, key: &str, blob: &Blob) -> Result<(), Error>;

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), Error>;

    /// Modification metadata for freshness checks.
    async fn stat(&self, ctx: &RequestContext, key: &str) -> Result<Stat, Error>;

    /// Sidecar image metadata for meta-mode requests.
    async fn meta(&self, ctx: &RequestContext, key: &str) -> Result<Meta, Error>;
}
