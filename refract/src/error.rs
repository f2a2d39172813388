//! Error model for the request engine and HTTP surface.
//!
//! Failures form a closed set so that every error an image request can
//! surface has a well-defined HTTP status and JSON body. The one special
//! member is [`Error::Pass`]: a handler declining the request so the next
//! handler in its chain gets a turn. It is rewritten to [`Error::NotFound`]
//! before anything user-visible is produced.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// HTTP status used when the client went away before a result was ready.
///
/// Not part of the RFC status registry but widely understood by proxies.
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// Failures an image request can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The supplied URL signature does not match the canonical path.
    #[error("refract: url signature mismatch")]
    SignatureMismatch,

    /// No storage or loader produced the requested image.
    #[error("refract: not found")]
    NotFound,

    /// The caller went away before a terminal result was produced.
    #[error("refract: request cancelled")]
    Cancelled,

    /// A request, load, process or save deadline expired.
    #[error("refract: timeout")]
    Timeout,

    /// The requested output format is not supported.
    #[error("refract: unsupported image format")]
    UnsupportedFormat,

    /// The requested dimensions exceed the configured resolution ceiling.
    #[error("refract: maximum resolution exceeded")]
    MaxResolutionExceeded,

    /// The source image exceeds the configured size ceiling.
    #[error("refract: maximum size exceeded")]
    MaxSizeExceeded,

    /// Unclassified failure from a collaborator.
    #[error("refract: {0}")]
    Internal(String),

    /// Handler declined; the next handler in the chain should be tried.
    /// Never user-visible.
    #[error("refract: pass")]
    Pass,
}

impl Error {
    /// HTTP status code for this error kind.
    pub fn status(&self) -> u16 {
        match self {
            Error::SignatureMismatch => 403,
            Error::NotFound => 404,
            Error::Cancelled => STATUS_CLIENT_CLOSED_REQUEST,
            Error::Timeout => 408,
            Error::UnsupportedFormat => 406,
            Error::MaxResolutionExceeded => 422,
            Error::MaxSizeExceeded => 422,
            Error::Internal(_) => 500,
            // Pass must never reach a response writer; wrap() rewrites it.
            Error::Pass => 500,
        }
    }

    /// Normalizes an error for the response surface.
    ///
    /// [`Error::Pass`] is an internal chain-control sentinel and renders
    /// as a miss. Cancellation and deadline expiry stay distinguishable.
    pub fn wrap(self) -> Error {
        match self {
            Error::Pass => Error::NotFound,
            other => other,
        }
    }

    /// Whether this error means the caller itself went away.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("status", &self.status())?;
        state.end()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            _ => Error::Internal(err.to_string()),
        }
    }
}
