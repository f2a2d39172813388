//! Processor capability: the pluggable transformation seam.
//!
//! The engine feeds the source blob through an ordered chain of
//! processors. A processor either transforms the blob, declines with
//! [`ProcessError::Pass`] (optionally forwarding a replacement blob to
//! the rest of the chain), or fails. Processors may request auxiliary
//! images (masks, overlays) through the [`ContextLoader`] handed to
//! them; those loads share the request's deadlines and coalescing and
//! bypass signature checks by construction.

use crate::blob::Blob;
use crate::engine::{ContextLoader, RequestContext};
use crate::error::Error;
use crate::params::Params;
use async_trait::async_trait;
use std::sync::Arc;

/// Non-success outcomes of a single processor invocation.
#[derive(Debug, Clone)]
pub enum ProcessError {
    /// The processor declines this request; the next one gets a turn.
    /// An accompanying non-empty blob replaces the working blob for the
    /// rest of the chain.
    Pass(Option<Arc<Blob>>),

    /// The processor failed. The chain keeps going unless the failure
    /// was a deadline expiry.
    Failed(Error),
}

/// A single stage of the transformation chain.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Called once before the engine starts serving.
    async fn startup(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Applies this processor to the working blob.
    async fn process(
        &self,
        ctx: &RequestContext,
        blob: Arc<Blob>,
        params: &Params,
        loader: &ContextLoader<'_>,
    ) -> Result<Arc<Blob>, ProcessError>;

    /// Called once during engine shutdown.
    async fn shutdown(&self) -> Result<(), Error> {
        Ok(())
    }
}
