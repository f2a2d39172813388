//! Refract - HTTP image transformation service
//!
//! This library provides the request orchestration engine behind an
//! image transformation endpoint: a client requests a derived image by a
//! URL that encodes a source identifier and a declarative transformation
//! pipeline, and the engine resolves the source through a multi-tier
//! fetch strategy, runs the processor chain, caches the derived result,
//! and returns bytes with correct content-type and HTTP caching metadata.
//!
//! # High-Level API
//!
//! For most use cases, build an [`engine::Engine`] and hand it to the
//! HTTP adapter:
//!
//! ```ignore
//! use refract::engine::Engine;
//! use refract::http::serve;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(
//!     Engine::builder()
//!         .secret("my-secret")
//!         .storage(file_store)
//!         .loader(http_loader)
//!         .build(),
//! );
//!
//! serve(engine, "127.0.0.1:8000".parse()?).await?;
//! ```

pub mod blob;
pub mod engine;
pub mod error;
pub mod http;
pub mod logging;
pub mod params;
pub mod processor;
pub mod store;

/// Version of the refract library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
