//! Request orchestration engine.
//!
//! The engine sits between the HTTP adapter and the pluggable loaders,
//! storages and processors, and owns the hard parts of serving a
//! transformed image:
//!
//! ```text
//! Request → signature gate → normalize params → result-cache probe
//!         → coalesced source fetch (storages, loaders, save-back)
//!         → processor chain (bounded) → result-cache write → response
//! ```
//!
//! # Coalescing
//!
//! Identical concurrent requests collapse onto one computation via
//! [`FlightGroup`], layered twice: once around the full
//! probe-load-process sequence (keyed by result key) and once around the
//! source fetch (keyed by image key). Reentrant loads from processors
//! short-circuit through hold markers on the [`RequestContext`].
//!
//! # Deadlines
//!
//! A root request deadline parents load, process and save deadlines.
//! Timers register their release in the request's [`DeferBag`] and are
//! dropped deterministically when the request scope ends.

mod coalesce;
mod config;
mod context;
mod core;
mod load;
mod process;
mod save;

pub use coalesce::FlightGroup;
pub use config::{
    EngineBuilder, EngineConfig, ResultKeyGenerator, DEFAULT_CACHE_HEADER_SWR,
    DEFAULT_CACHE_HEADER_TTL, DEFAULT_LOAD_TIMEOUT, DEFAULT_PROCESS_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SAVE_TIMEOUT,
};
pub use context::{DeferBag, RequestContext, RequestScope};
pub use core::{ContextLoader, Engine, Outcome, Request};
