//! HTTP origin loader backed by reqwest.

use super::{Fetched, Loader};
use crate::blob::Blob;
use crate::engine::Request;
use crate::error::Error;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_ORIGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only loader fetching images from an HTTP(S) origin.
///
/// With a base URL configured, keys are joined onto it; without one,
/// only keys that are themselves absolute `http(s)` URLs are accepted.
pub struct HttpLoader {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl HttpLoader {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_ORIGIN_TIMEOUT)
            .build()
            .map_err(|err| Error::Internal(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Restricts and roots fetches at the given base URL.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn resolve(&self, key: &str) -> Result<Url, Error> {
        match &self.base_url {
            Some(base) => base
                .join(key.trim_start_matches('/'))
                .map_err(|_| Error::NotFound),
            None => {
                let url = Url::parse(key).map_err(|_| Error::NotFound)?;
                match url.scheme() {
                    "http" | "https" => Ok(url),
                    _ => Err(Error::NotFound),
                }
            }
        }
    }
}

#[async_trait]
impl Loader for HttpLoader {
    async fn get(&self, req: &Request, key: &str) -> Fetched {
        let url = match self.resolve(key) {
            Ok(url) => url,
            Err(error) => return Fetched::err(error),
        };
        debug!(url = %url, "fetching origin");

        let response = tokio::select! {
            response = self.client.get(url.clone()).send() => response,
            _ = req.ctx.cancelled() => {
                return Fetched::err(req.ctx.error().unwrap_or(Error::Cancelled));
            }
        };
        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Fetched::err(Error::Timeout),
            Err(err) => return Fetched::err(Error::Internal(format!("origin: {err}"))),
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Fetched::err(Error::NotFound);
        }
        if !status.is_success() {
            return Fetched::err(Error::Internal(format!("origin returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(data) => {
                let mut blob = Blob::new(data);
                if let Some(content_type) = content_type {
                    blob = blob.with_content_type(content_type);
                }
                Fetched::ok(blob)
            }
            Err(err) => Fetched::err(Error::Internal(format!("origin body: {err}"))),
        }
    }
}
