//! Blob: the unit of image data moving through the engine.
//!
//! A [`Blob`] is a cheap handle over an immutable byte buffer plus
//! optional metadata. Cloning shares the buffer, so a blob handed to the
//! save fan-out can be re-read by every destination without copying.
//! Emptiness is decidable without consuming anything.

mod sniff;

use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sniff::detect_content_type;

/// Image metadata, produced by storages (sidecar lookup) or by the
/// processor chain. When present it is authoritative over sniffed
/// content-type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub format: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub orientation: u8,
}

/// Storage metadata record used for result-cache freshness decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub modified_time: DateTime<Utc>,
    pub size: u64,
}

/// Handle to image bytes with lazy content-type detection and optional
/// [`Meta`].
#[derive(Debug, Clone, Default)]
pub struct Blob {
    data: Bytes,
    content_type: Option<String>,
    meta: Option<Meta>,
}

impl Blob {
    /// Creates a blob over the given bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            meta: None,
        }
    }

    /// Creates an empty blob, typically as a carrier for [`Meta`] in
    /// meta-mode responses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets an explicit content type, overriding sniffing.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attaches metadata. Meta is authoritative over sniffed content-type.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Whether the blob carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes. Always known.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// A shared view of the underlying buffer.
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    /// A fresh reader over the buffer. Each call yields an independent
    /// cursor, so concurrent consumers never interfere.
    pub fn reader(&self) -> impl std::io::Read {
        self.data.clone().reader()
    }

    /// Attached metadata, if any.
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Effective content type: meta first, then the explicit override,
    /// then magic-byte sniffing.
    pub fn content_type(&self) -> &str {
        if let Some(meta) = &self.meta {
            return &meta.content_type;
        }
        if let Some(content_type) = &self.content_type {
            return content_type;
        }
        detect_content_type(&self.data)
    }
}
