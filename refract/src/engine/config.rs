//! Engine configuration: recognized options, defaults and the builder.

use crate::params::{HmacSigner, Params, Signer};
use crate::processor::Processor;
use crate::store::{Loader, Storage};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Default cache header lifetime: 7 days.
pub const DEFAULT_CACHE_HEADER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Default stale-while-revalidate window: 1 day.
pub const DEFAULT_CACHE_HEADER_SWR: Duration = Duration::from_secs(24 * 60 * 60);

/// Pluggable result-cache key derivation. The default strips a leading
/// `meta/` from the canonical path so the meta variant of a request
/// shares its cache entry with the bytes variant.
pub trait ResultKeyGenerator: Send + Sync {
    fn generate(&self, params: &Params) -> String;
}

/// Everything the engine recognizes. All timeouts treat zero as
/// "disabled"; `process_concurrency` zero means unlimited.
pub struct EngineConfig {
    pub unsafe_requests: bool,
    pub signer: Arc<dyn Signer>,
    pub base_path_redirect: Option<String>,
    pub loaders: Vec<Arc<dyn Loader>>,
    pub storages: Vec<Arc<dyn Storage>>,
    pub result_storages: Vec<Arc<dyn Storage>>,
    pub processors: Vec<Arc<dyn Processor>>,
    pub request_timeout: Duration,
    pub load_timeout: Duration,
    pub process_timeout: Duration,
    pub save_timeout: Duration,
    pub cache_header_ttl: Duration,
    pub cache_header_swr: Duration,
    pub process_concurrency: usize,
    pub auto_webp: bool,
    pub auto_avif: bool,
    pub modified_time_check: bool,
    pub disable_error_body: bool,
    pub disable_params_endpoint: bool,
    pub base_params: String,
    pub result_key: Option<Arc<dyn ResultKeyGenerator>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unsafe_requests: false,
            signer: Arc::new(HmacSigner::new("")),
            base_path_redirect: None,
            loaders: Vec::new(),
            storages: Vec::new(),
            result_storages: Vec::new(),
            processors: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            save_timeout: DEFAULT_SAVE_TIMEOUT,
            cache_header_ttl: DEFAULT_CACHE_HEADER_TTL,
            cache_header_swr: DEFAULT_CACHE_HEADER_SWR,
            process_concurrency: 0,
            auto_webp: false,
            auto_avif: false,
            modified_time_check: false,
            disable_error_body: false,
            disable_params_endpoint: false,
            base_params: String::new(),
            result_key: None,
        }
    }
}

/// Fluent construction for [`super::Engine`].
///
/// ```ignore
/// let engine = Engine::builder()
///     .secret("my-secret")
///     .storage(store.clone())
///     .loader(origin)
///     .auto_webp(true)
///     .build();
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Allows requests carrying the `unsafe` marker to skip signature
    /// verification.
    pub fn unsafe_requests(mut self, enabled: bool) -> Self {
        self.config.unsafe_requests = enabled;
        self
    }

    /// Uses the default HMAC signer keyed by `secret`.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.signer = Arc::new(HmacSigner::new(secret));
        self
    }

    /// Replaces the signer wholesale.
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.config.signer = signer;
        self
    }

    /// Redirect target for the bare root path instead of version JSON.
    pub fn base_path_redirect(mut self, target: impl Into<String>) -> Self {
        self.config.base_path_redirect = Some(target.into());
        self
    }

    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.config.loaders.push(loader);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.config.storages.push(storage);
        self
    }

    pub fn result_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.config.result_storages.push(storage);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.config.processors.push(processor);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    pub fn process_timeout(mut self, timeout: Duration) -> Self {
        self.config.process_timeout = timeout;
        self
    }

    pub fn save_timeout(mut self, timeout: Duration) -> Self {
        self.config.save_timeout = timeout;
        self
    }

    pub fn cache_header_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_header_ttl = ttl;
        self
    }

    pub fn cache_header_swr(mut self, swr: Duration) -> Self {
        self.config.cache_header_swr = swr;
        self
    }

    /// Bounds concurrent processor-chain executions. Zero disables the
    /// bound.
    pub fn process_concurrency(mut self, limit: usize) -> Self {
        self.config.process_concurrency = limit;
        self
    }

    pub fn auto_webp(mut self, enabled: bool) -> Self {
        self.config.auto_webp = enabled;
        self
    }

    pub fn auto_avif(mut self, enabled: bool) -> Self {
        self.config.auto_avif = enabled;
        self
    }

    /// Rejects result-cache hits older than the source image.
    pub fn modified_time_check(mut self, enabled: bool) -> Self {
        self.config.modified_time_check = enabled;
        self
    }

    pub fn disable_error_body(mut self, disabled: bool) -> Self {
        self.config.disable_error_body = disabled;
        self
    }

    pub fn disable_params_endpoint(mut self, disabled: bool) -> Self {
        self.config.disable_params_endpoint = disabled;
        self
    }

    /// Transform fragment prepended to every request, e.g.
    /// `filters:watermark(logo.png)`.
    pub fn base_params(mut self, fragment: impl Into<String>) -> Self {
        self.config.base_params = fragment.into();
        self
    }

    pub fn result_key(mut self, generator: Arc<dyn ResultKeyGenerator>) -> Self {
        self.config.result_key = Some(generator);
        self
    }

    pub fn build(self) -> super::Engine {
        super::Engine::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.load_timeout, Duration::from_secs(20));
        assert_eq!(config.process_timeout, Duration::from_secs(20));
        assert_eq!(config.save_timeout, Duration::from_secs(20));
        assert_eq!(config.cache_header_ttl, Duration::from_secs(604_800));
        assert_eq!(config.cache_header_swr, Duration::from_secs(86_400));
        assert_eq!(config.process_concurrency, 0);
        assert!(!config.unsafe_requests);
        assert!(config.loaders.is_empty());
        assert!(config.storages.is_empty());
    }
}
