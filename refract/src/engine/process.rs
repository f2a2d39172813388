//! The processor chain: ordered pass-through under a process deadline
//! and an optional global concurrency bound.

use super::context::RequestContext;
use super::core::{Engine, Outcome, Request};
use crate::blob::Blob;
use crate::error::Error;
use crate::params::Params;
use crate::processor::ProcessError;
use std::sync::Arc;
use tracing::{debug, warn};

impl Engine {
    /// Feeds `source` through the processor chain.
    ///
    /// Pass-through protocol per processor:
    /// - success adopts the returned blob and ends the chain;
    /// - a pass carrying a non-empty blob adopts it as the working blob
    ///   and continues;
    /// - an empty pass keeps the working blob and continues;
    /// - any other failure is recorded and the chain continues, except a
    ///   deadline expiry which stops it immediately.
    pub(super) async fn process_chain(
        &self,
        ctx: &RequestContext,
        source: Arc<Blob>,
        params: &Params,
        req: &Request,
    ) -> Outcome {
        if self.config.processors.is_empty() {
            return Outcome::ok(source);
        }
        let ctx = ctx.with_timeout(self.config.process_timeout);

        let _permit = match &self.semaphore {
            Some(semaphore) => {
                tokio::select! {
                    permit = Arc::clone(semaphore).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            return Outcome::err(Error::Internal(
                                "process semaphore closed".into(),
                            ))
                        }
                    },
                    _ = ctx.cancelled() => {
                        debug!(path = %params.path, "gave up waiting for a process permit");
                        return Outcome {
                            blob: Some(source),
                            error: ctx.error(),
                        };
                    }
                }
            }
            None => None,
        };

        let loader = self.context_loader(req);
        let mut current = source;
        let mut error: Option<Error> = None;

        for processor in &self.config.processors {
            match processor
                .process(&ctx, Arc::clone(&current), params, &loader)
                .await
            {
                Ok(blob) => {
                    debug!(path = %params.path, "processed");
                    current = blob;
                    error = None;
                    break;
                }
                Err(ProcessError::Pass(replacement)) => {
                    if let Some(blob) = replacement {
                        if !blob.is_empty() {
                            current = blob;
                        }
                    }
                    debug!(path = %params.path, "processor passed");
                }
                Err(ProcessError::Failed(e)) => {
                    warn!(path = %params.path, error = %e, "process failed");
                    let expired = e == Error::Timeout;
                    error = Some(e);
                    if expired {
                        break;
                    }
                }
            }
        }

        Outcome {
            blob: Some(current),
            error,
        }
    }
}
