//! The orchestrator: wires the signature gate, params normalization,
//! result-cache probe, coalesced source fetch, processor chain and
//! result-cache write into one request flow.

use super::coalesce::FlightGroup;
use super::config::EngineConfig;
use super::context::RequestContext;
use crate::blob::Blob;
use crate::error::Error;
use crate::params::{apply_base, constant_time_eq, generate_path, parse_fragment, Filter, Params};
use crate::VERSION;
use http::header::ACCEPT;
use http::{HeaderMap, Method};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Terminal result of an engine run. A request may carry both a blob
/// and an error (a processor failure still serves the source bytes);
/// the HTTP adapter renders both.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub blob: Option<Arc<Blob>>,
    pub error: Option<Error>,
}

impl Outcome {
    pub fn ok(blob: Arc<Blob>) -> Self {
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

    /// Whether a non-empty blob is present.
    pub fn has_blob(&self) -> bool {
        self.blob.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(Error::Cancelled))
    }
}

/// Engine-facing view of an HTTP request: cancellation tree plus the
/// header material loaders and normalization need.
#[derive(Clone)]
pub struct Request {
    pub ctx: RequestContext,
    pub method: Method,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(ctx: RequestContext) -> Self {
        Self {
            ctx,
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }

    /// Same request bound to a derived context.
    pub fn with_context(&self, ctx: RequestContext) -> Self {
        Self {
            ctx,
            method: self.method.clone(),
            headers: self.headers.clone(),
        }
    }

    /// The `Accept` header, or empty when absent or non-UTF-8.
    pub fn accept(&self) -> &str {
        self.headers
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }
}

/// Capability handed to processors for loading auxiliary images.
/// Delegates to the engine's coalesced source fetch, inheriting the
/// request's deadlines; signature checks do not apply here.
pub struct ContextLoader<'a> {
    engine: &'a Engine,
    req: &'a Request,
}

impl ContextLoader<'_> {
    pub async fn load(&self, key: &str) -> Result<Arc<Blob>, Error> {
        let (outcome, _) = self.engine.fetch_source(self.req, key).await;
        if let Some(error) = outcome.error {
            return Err(error);
        }
        outcome.blob.ok_or(Error::NotFound)
    }
}

/// The request orchestration engine.
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) flights: FlightGroup,
    pub(super) semaphore: Option<Arc<Semaphore>>,
    pub(super) base_params: Option<Params>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let semaphore = if config.process_concurrency > 0 {
            Some(Arc::new(Semaphore::new(config.process_concurrency)))
        } else {
            None
        };
        let base = config.base_params.trim().trim_matches('/');
        let base_params = if base.is_empty() {
            None
        } else {
            Some(parse_fragment(base))
        };
        debug!(
            version = VERSION,
            unsafe_requests = config.unsafe_requests,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            load_timeout_ms = config.load_timeout.as_millis() as u64,
            process_timeout_ms = config.process_timeout.as_millis() as u64,
            save_timeout_ms = config.save_timeout.as_millis() as u64,
            process_concurrency = config.process_concurrency,
            loaders = config.loaders.len(),
            storages = config.storages.len(),
            result_storages = config.result_storages.len(),
            processors = config.processors.len(),
            "engine configured"
        );
        Self {
            config,
            flights: FlightGroup::new(),
            semaphore,
            base_params,
        }
    }

    pub fn builder() -> super::config::EngineBuilder {
        super::config::EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts all processors, in order. The first failure aborts.
    pub async fn startup(&self) -> Result<(), Error> {
        for processor in &self.config.processors {
            processor.startup().await?;
        }
        Ok(())
    }

    /// Shuts down all processors, in order.
    pub async fn shutdown(&self) -> Result<(), Error> {
        for processor in &self.config.processors {
            processor.shutdown().await?;
        }
        Ok(())
    }

    /// Serves one parsed request to a terminal outcome.
    pub async fn execute(&self, req: &Request, params: Params) -> Outcome {
        let ctx = req.ctx.with_timeout(self.config.request_timeout);
        let req = req.with_context(ctx.clone());

        if !(self.config.unsafe_requests && params.unsafe_request) {
            let expected = self.config.signer.sign(&params.path);
            if !constant_time_eq(&expected, &params.hash) {
                debug!(path = %params.path, "signature mismatch");
                return Outcome::err(Error::SignatureMismatch);
            }
        }

        let mut params = params;
        if let Some(base) = &self.base_params {
            params = apply_base(base, &params);
        }
        self.auto_format(&req, &mut params);

        let result_key = match &self.config.result_key {
            Some(generator) => generator.generate(&params),
            None => params
                .path
                .strip_prefix("meta/")
                .unwrap_or(&params.path)
                .to_string(),
        };

        // Meta mode probes before entering the flight: a sidecar lookup
        // is cheap and coalescing it would serialize unrelated requests.
        if params.meta {
            if let Some(blob) = self
                .load_result(&req, &result_key, &params.image, true)
                .await
            {
                return Outcome::ok(blob);
            }
        }

        let flight_key = format!("res:{result_key}");
        self.flights
            .run(&ctx, &flight_key, |fctx| {
                let req = req.with_context(fctx);
                let params = params.clone();
                let result_key = result_key.clone();
                async move { self.perform(&req, &params, &result_key).await }
            })
            .await
    }

    /// The expensive middle of the pipeline; runs at most once among
    /// concurrent identical requests.
    async fn perform(&self, req: &Request, params: &Params, result_key: &str) -> Outcome {
        if !params.meta {
            if let Some(blob) = self
                .load_result(req, result_key, &params.image, false)
                .await
            {
                return Outcome::ok(blob);
            }
        }

        let (outcome, attempted_save) = self.fetch_source(req, &params.image).await;
        if outcome.error.is_some() {
            return outcome;
        }
        let source = match &outcome.blob {
            Some(blob) if !blob.is_empty() => Arc::clone(blob),
            _ => return outcome,
        };

        let result = self.process_chain(&req.ctx, source, params, req).await;

        if result.error.is_none() {
            if result.has_blob() && !self.config.result_storages.is_empty() {
                if let Some(blob) = &result.blob {
                    self.save_all(
                        &req.ctx,
                        &self.config.result_storages,
                        result_key,
                        Arc::clone(blob),
                    )
                    .await;
                }
            }
        } else if attempted_save {
            // The source was speculatively saved by this very request;
            // a failed transform must not leave it behind.
            self.delete_all(&req.ctx, &self.config.storages, &params.image).await;
        }
        result
    }

    /// Coalesced source fetch with save-back. Returns whether this
    /// caller's flight attempted a save-back (only the leader knows).
    pub(super) async fn fetch_source(&self, req: &Request, key: &str) -> (Outcome, bool) {
        let attempted_save = Arc::new(AtomicBool::new(false));
        let flight_key = format!("img:{key}");
        let outcome = self
            .flights
            .run(&req.ctx, &flight_key, |fctx| {
                let req = req.with_context(fctx);
                let key = key.to_string();
                let attempted_save = Arc::clone(&attempted_save);
                async move {
                    let loaded = self
                        .load_from(
                            &req,
                            &self.config.storages,
                            &self.config.loaders,
                            &key,
                            false,
                        )
                        .await;
                    if loaded.error.is_none()
                        && loaded.origin.is_none()
                        && !self.config.storages.is_empty()
                    {
                        if let Some(blob) = &loaded.blob {
                            if !blob.is_empty() {
                                // A loader served the miss; write it
                                // back to the source storages.
                                attempted_save.store(true, Ordering::SeqCst);
                                self.save_all(
                                    &req.ctx,
                                    &self.config.storages,
                                    &key,
                                    Arc::clone(blob),
                                )
                                .await;
                            }
                        }
                    }
                    Outcome {
                        blob: loaded.blob,
                        error: loaded.error,
                    }
                }
            })
            .await;
        let attempted = attempted_save.load(Ordering::SeqCst);
        (outcome, attempted)
    }

    /// Probes the result storages for a previously processed output.
    /// Returns `None` on a miss, an error, or a stale hit.
    pub(super) async fn load_result(
        &self,
        req: &Request,
        result_key: &str,
        image_key: &str,
        meta_mode: bool,
    ) -> Option<Arc<Blob>> {
        let loaded = self
            .load_from(req, &self.config.result_storages, &[], result_key, meta_mode)
            .await;
        if loaded.error.is_some() {
            return None;
        }
        let non_empty = loaded.blob.as_ref().is_some_and(|b| !b.is_empty());
        if !non_empty && !meta_mode {
            return None;
        }
        if self.config.modified_time_check {
            if let Some(origin) = loaded.origin {
                let ctx = &req.ctx;
                let result_stat = self.config.result_storages[origin]
                    .stat(ctx, result_key)
                    .await
                    .ok()?;
                let source_stat = self.storage_stat(ctx, image_key).await?;
                if result_stat.modified_time >= source_stat.modified_time {
                    return loaded.blob;
                }
                debug!(result_key, "stale result ignored");
                return None;
            }
        }
        loaded.blob
    }

    /// First source storage that can stat the image.
    async fn storage_stat(&self, ctx: &RequestContext, key: &str) -> Option<crate::blob::Stat> {
        for storage in &self.config.storages {
            if let Ok(stat) = storage.stat(ctx, key).await {
                return Some(stat);
            }
        }
        None
    }

    /// Appends an output-format filter matching the `Accept` header so
    /// that clients negotiating different formats get distinct cache
    /// keys. AVIF takes precedence over WebP.
    fn auto_format(&self, req: &Request, params: &mut Params) {
        if !self.config.auto_webp && !self.config.auto_avif {
            return;
        }
        if params.filters.iter().any(|f| f.name == "format") {
            return;
        }
        let accept = req.accept();
        let format = if self.config.auto_avif && accept.contains("image/avif") {
            Some("avif")
        } else if self.config.auto_webp && accept.contains("image/webp") {
            Some("webp")
        } else {
            None
        };
        if let Some(format) = format {
            params.filters.push(Filter::new("format", format));
            params.path = generate_path(params);
        }
    }

    pub(super) fn context_loader<'a>(&'a self, req: &'a Request) -> ContextLoader<'a> {
        ContextLoader { engine: self, req }
    }
}
