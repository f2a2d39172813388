//! Filesystem-backed storage rooted at a directory.
//!
//! Keys map to paths under the root; writes go through a temporary file
//! and a rename so readers never observe partial content.

use super::{Fetched, Loader, Storage};
use crate::blob::{Blob, Meta, Stat};
use crate::engine::{Request, RequestContext};
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Directory-rooted image storage.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a key to a path under the root, rejecting traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(Error::NotFound);
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(Error::NotFound),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Loader for FileStore {
    async fn get(&self, _req: &Request, key: &str) -> Fetched {
        let path = match self.resolve(key) {
            Ok(path) => path,
            Err(error) => return Fetched::err(error),
        };
        match fs::read(&path).await {
            Ok(data) => Fetched::ok(Blob::new(data)),
            Err(err) => Fetched::err(err.into()),
        }
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn put(&self, _ctx: &RequestContext, key: &str, blob: &Blob) -> Result<(), Error> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, blob.data()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, key: &str) -> Result<(), Error> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn stat(&self, _ctx: &RequestContext, key: &str) -> Result<Stat, Error> {
        let path = self.resolve(key)?;
        let metadata = fs::metadata(&path).await?;
        let modified = metadata.modified()?;
        Ok(Stat {
            modified_time: DateTime::<Utc>::from(modified),
            size: metadata.len(),
        })
    }

    async fn meta(&self, _ctx: &RequestContext, _key: &str) -> Result<Meta, Error> {
        // No sidecar metadata on plain files.
        Err(Error::NotFound)
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
    async fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (req, _scope) = request();
        let (ctx, _scope2) = RequestContext::root();

        store
            .put(&ctx, "a/b/c.jpg", &Blob::new(&b"bytes"[..]))
            .await
            .unwrap();

        let fetched = store.get(&req, "a/b/c.jpg").await;
        assert_eq!(fetched.blob.unwrap().data().as_ref(), b"bytes");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (req, _scope) = request();

        let fetched = store.get(&req, "nope.jpg").await;
        assert_eq!(fetched.error, Some(Error::NotFound));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (req, _scope) = request();

        let fetched = store.get(&req, "../escape").await;
        assert_eq!(fetched.error, Some(Error::NotFound));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (ctx, _scope) = RequestContext::root();

        store.put(&ctx, "a.jpg", &Blob::new(&b"x"[..])).await.unwrap();
        store.delete(&ctx, "a.jpg").await.unwrap();
        store.delete(&ctx, "a.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_stat_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (ctx, _scope) = RequestContext::root();

        store.put(&ctx, "a.jpg", &Blob::new(&b"12345"[..])).await.unwrap();
        let stat = store.stat(&ctx, "a.jpg").await.unwrap();
        assert_eq!(stat.size, 5);
    }

    #[tokio::test]
    async fn test_meta_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (ctx, _scope) = RequestContext::root();
        assert_eq!(store.meta(&ctx, "a.jpg").await, Err(Error::NotFound));
    }
}
