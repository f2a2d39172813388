//! Request-scoped context: hierarchical cancellation with causes,
//! deadline derivation, deferred release actions and singleflight
//! hold markers.
//!
//! A request owns a root [`RequestContext`] plus a [`RequestScope`]
//! guard. Deadline layers derive child cancellation tokens; a timer
//! firing records [`Error::Timeout`] as that layer's cause, while root
//! termination records [`Error::Cancelled`], so downstream code can tell
//! a deadline from a vanished caller. No child survives its parent's
//! cancellation.

use crate::error::Error;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One cancellation layer: a token, the reason it fired (if it did), and
/// the parent layer for cause lookup.
struct CancelLayer {
    token: CancellationToken,
    cause: OnceLock<Error>,
    parent: Option<Arc<CancelLayer>>,
}

/// Singleflight hold marker, kept as a shared cons list so deriving a
/// context stays allocation-cheap.
struct HeldKey {
    key: String,
    parent: Option<Arc<HeldKey>>,
}

/// Request-scoped list of release actions, executed exactly once when
/// the request terminates (normally or by cancellation).
#[derive(Default)]
pub struct DeferBag {
    actions: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl DeferBag {
    /// Registers a release action.
    pub fn push(&self, action: impl FnOnce() + Send + 'static) {
        self.actions.lock().unwrap().push(Box::new(action));
    }

    /// Runs and clears all registered actions.
    pub fn run(&self) {
        let actions = std::mem::take(&mut *self.actions.lock().unwrap());
        for action in actions {
            action();
        }
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cheaply cloneable handle to a request's cancellation tree.
#[derive(Clone)]
pub struct RequestContext {
    layer: Arc<CancelLayer>,
    defer: Arc<DeferBag>,
    held: Option<Arc<HeldKey>>,
}

/// RAII guard for the root of a request. Dropping it cancels the whole
/// tree and runs the deferred release actions, so timers and fan-out
/// workers never outlive the request.
pub struct RequestScope {
    ctx: RequestContext,
}

impl RequestContext {
    /// Creates a root context and its owning scope.
    pub fn root() -> (RequestContext, RequestScope) {
        let ctx = RequestContext {
            layer: Arc::new(CancelLayer {
                token: CancellationToken::new(),
                cause: OnceLock::new(),
                parent: None,
            }),
            defer: Arc::new(DeferBag::default()),
            held: None,
        };
        let scope = RequestScope { ctx: ctx.clone() };
        (ctx, scope)
    }

    /// Derives a child context that cancels itself after `timeout`.
    ///
    /// A zero timeout disables the deadline: no child is derived and the
    /// context is returned as-is. The timer is registered with the
    /// request's [`DeferBag`] so it is released when the root terminates.
    pub fn with_timeout(&self, timeout: Duration) -> RequestContext {
        if timeout.is_zero() {
            return self.clone();
        }
        let layer = Arc::new(CancelLayer {
            token: self.layer.token.child_token(),
            cause: OnceLock::new(),
            parent: Some(self.layer.clone()),
        });
        let timer_layer = layer.clone();
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    let _ = timer_layer.cause.set(Error::Timeout);
                    timer_layer.token.cancel();
                }
                _ = timer_layer.token.cancelled() => {}
            }
        });
        self.defer.push(move || timer.abort());
        RequestContext {
            layer,
            defer: self.defer.clone(),
            held: self.held.clone(),
        }
    }

    /// Cancels this context subtree, recording caller cancellation as
    /// the cause.
    pub fn cancel(&self) {
        let _ = self.layer.cause.set(Error::Cancelled);
        self.layer.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.layer.token.is_cancelled()
    }

    /// Resolves once this context is cancelled (directly, by a deadline,
    /// or by an ancestor).
    pub async fn cancelled(&self) {
        self.layer.token.cancelled().await;
    }

    /// Why this context is cancelled: `Timeout` when the nearest fired
    /// deadline caused it, `Cancelled` when the caller went away.
    /// `None` while the context is live.
    pub fn error(&self) -> Option<Error> {
        if !self.is_cancelled() {
            return None;
        }
        let mut layer = Some(&self.layer);
        while let Some(l) = layer {
            if let Some(cause) = l.cause.get() {
                return Some(cause.clone());
            }
            layer = l.parent.as_ref();
        }
        Some(Error::Cancelled)
    }

    /// Registers a release action on the request's defer bag.
    pub fn defer(&self, action: impl FnOnce() + Send + 'static) {
        self.defer.push(action);
    }

    /// Derives a context marked as holding the given singleflight key.
    pub fn holding(&self, key: &str) -> RequestContext {
        RequestContext {
            layer: self.layer.clone(),
            defer: self.defer.clone(),
            held: Some(Arc::new(HeldKey {
                key: key.to_string(),
                parent: self.held.clone(),
            })),
        }
    }

    /// Whether this context (or an ancestor derivation) holds the key.
    pub fn holds(&self, key: &str) -> bool {
        let mut held = self.held.as_ref();
        while let Some(h) = held {
            if h.key == key {
                return true;
            }
            held = h.parent.as_ref();
        }
        false
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let _ = self.ctx.layer.cause.set(Error::Cancelled);
        self.ctx.layer.token.cancel();
        self.ctx.defer.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_live_context_has_no_error() {
        let (ctx, _scope) = RequestContext::root();
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.error(), None);
    }

    #[tokio::test]
    async fn test_cancel_records_cancellation() {
        let (ctx, _scope) = RequestContext::root();
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.error(), Some(Error::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_records_timeout() {
        let (ctx, _scope) = RequestContext::root();
        let child = ctx.with_timeout(Duration::from_millis(10));
        child.cancelled().await;
        assert_eq!(child.error(), Some(Error::Timeout));
        // The deadline never touches the parent.
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_zero_timeout_derives_nothing() {
        let (ctx, _scope) = RequestContext::root();
        let child = ctx.with_timeout(Duration::ZERO);
        ctx.cancel();
        assert!(child.is_cancelled());
        assert_eq!(ctx.defer.len(), 0);
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_children() {
        let (ctx, _scope) = RequestContext::root();
        let child = ctx.with_timeout(Duration::from_secs(60));
        ctx.cancel();
        child.cancelled().await;
        assert_eq!(child.error(), Some(Error::Cancelled));
    }

    #[tokio::test]
    async fn test_nested_deadlines_clamp_to_parent() {
        let (ctx, _scope) = RequestContext::root();
        let outer = ctx.with_timeout(Duration::from_millis(10));
        let inner = outer.with_timeout(Duration::from_secs(60));
        inner.cancelled().await;
        // The outer deadline fired; the inner layer has no cause of its
        // own and reports the ancestor's.
        assert_eq!(inner.error(), Some(Error::Timeout));
    }

    #[tokio::test]
    async fn test_scope_drop_runs_defers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (ctx, scope) = RequestContext::root();
        for _ in 0..3 {
            let counter = counter.clone();
            ctx.defer(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        drop(scope);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_held_keys() {
        let (ctx, _scope) = RequestContext::root();
        assert!(!ctx.holds("img:a"));

        let holding = ctx.holding("img:a");
        assert!(holding.holds("img:a"));
        assert!(!holding.holds("img:b"));

        let nested = holding.holding("res:x");
        assert!(nested.holds("img:a"));
        assert!(nested.holds("res:x"));

        // Derivation does not leak back to the parent.
        assert!(!ctx.holds("img:a"));
    }

    #[tokio::test]
    async fn test_timeout_context_shares_held_keys() {
        let (ctx, _scope) = RequestContext::root();
        let holding = ctx.holding("img:a");
        let bounded = holding.with_timeout(Duration::from_secs(5));
        assert!(bounded.holds("img:a"));
    }
}
