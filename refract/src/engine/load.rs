//! Multi-tier load: walk storages, then loaders, first usable hit wins.

use super::core::{Engine, Request};
use crate::blob::Blob;
use crate::error::Error;
use crate::store::{Loader, Storage};
use std::sync::Arc;
use tracing::debug;

/// Result of a load walk. `origin` is the index of the storage that
/// served the hit; `None` means a loader (or nothing) did, which is what
/// makes save-back skip the serving storage.
pub(super) struct Loaded {
    pub blob: Option<Arc<Blob>>,
    pub origin: Option<usize>,
    pub error: Option<Error>,
}

impl Loaded {
    fn err(error: Error) -> Self {
        Self {
            blob: None,
            origin: None,
            error: Some(error),
        }
    }
}

impl Engine {
    /// Walks `storages` then `loaders` for `key` under the load
    /// deadline.
    ///
    /// List order is authoritative. A non-empty blob arriving together
    /// with an error is retained as a tentative answer and returned only
    /// if no later handler produces a clean hit. In meta mode only
    /// storages are consulted, for sidecar metadata.
    pub(super) async fn load_from(
        &self,
        req: &Request,
        storages: &[Arc<dyn Storage>],
        loaders: &[Arc<dyn Loader>],
        key: &str,
        meta_mode: bool,
    ) -> Loaded {
        if key.is_empty() {
            return Loaded::err(Error::NotFound);
        }
        let ctx = req.ctx.with_timeout(self.config.load_timeout);
        let req = req.with_context(ctx.clone());

        if meta_mode {
            let mut error = None;
            for (index, storage) in storages.iter().enumerate() {
                match storage.meta(&ctx, key).await {
                    Ok(meta) => {
                        return Loaded {
                            blob: Some(Arc::new(Blob::empty().with_meta(meta))),
                            origin: Some(index),
                            error: None,
                        };
                    }
                    Err(e) => error = Some(e),
                }
            }
            return Loaded {
                blob: None,
                origin: None,
                error,
            };
        }

        let mut blob: Option<Arc<Blob>> = None;
        let mut error: Option<Error> = None;

        for (index, storage) in storages.iter().enumerate() {
            let fetched = storage.get(&req, key).await;
            if fetched.has_blob() {
                if fetched.error.is_none() {
                    return Loaded {
                        blob: fetched.blob.map(Arc::new),
                        origin: Some(index),
                        error: None,
                    };
                }
                blob = fetched.blob.map(Arc::new);
            }
            error = fetched.error;
        }
        for loader in loaders {
            let fetched = loader.get(&req, key).await;
            if fetched.has_blob() {
                if fetched.error.is_none() {
                    return Loaded {
                        blob: fetched.blob.map(Arc::new),
                        origin: None,
                        error: None,
                    };
                }
                blob = fetched.blob.map(Arc::new);
            }
            error = fetched.error;
        }

        if error.is_none() && !blob.as_ref().is_some_and(|b| !b.is_empty()) {
            error = Some(Error::NotFound);
        }
        match &error {
            None => debug!(key, "loaded"),
            Some(e) => debug!(key, error = %e, "load failed"),
        }
        Loaded {
            blob,
            origin: None,
            error,
        }
    }
}
