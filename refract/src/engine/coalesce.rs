//! Keyed singleflight: at most one in-flight computation per key.
//!
//! When concurrent identical requests arrive, one caller becomes the
//! leader and runs the computation; everyone else subscribes to its
//! broadcast channel and shares the result by reference.
//!
//! Three behaviors beyond plain coalescing:
//!
//! - **Reentrancy**: a context already holding a key (set when the
//!   leader's closure is invoked) calls the closure directly, so a
//!   processor requesting the very image being processed cannot
//!   deadlock on itself.
//! - **Cancellation isolation**: the key is removed from the map before
//!   the result is broadcast, so a leader that failed with
//!   [`Error::Cancelled`] never poisons still-alive followers.
//! - **Follower retry**: a follower observing a cancelled leader (or a
//!   leader whose future was dropped mid-flight) re-enters and may
//!   become the new leader, as long as its own context is alive.

use super::context::RequestContext;
use super::core::Outcome;
use crate::error::Error;
use dashmap::DashMap;
use std::future::Future;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast capacity per flight. One result is ever sent; capacity
/// only needs to absorb the subscribe/send race.
const FLIGHT_CHANNEL_CAPACITY: usize = 16;

/// Keyed coalescer for request outcomes.
#[derive(Default)]
pub struct FlightGroup {
    flights: DashMap<String, broadcast::Sender<Outcome>>,
}

enum Role {
    Leader(broadcast::Sender<Outcome>),
    Follower(broadcast::Receiver<Outcome>),
}

/// Removes the flight entry when the leader finishes or its future is
/// dropped, so followers always get to re-elect.
struct FlightGuard<'a> {
    flights: &'a DashMap<String, broadcast::Sender<Outcome>>,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.remove(self.key);
    }
}

impl FlightGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` under the flight for `key`, coalescing with concurrent
    /// callers. The leader's closure receives a context marked as
    /// holding the key.
    pub async fn run<F, Fut>(&self, ctx: &RequestContext, key: &str, f: F) -> Outcome
    where
        F: Fn(RequestContext) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        if ctx.holds(key) {
            // Reentrant load from inside this very flight; coalescing
            // would wait on ourselves.
            return f(ctx.clone()).await;
        }
        loop {
            let role = match self.flights.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    Role::Follower(entry.get().subscribe())
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let (tx, _rx) = broadcast::channel(FLIGHT_CHANNEL_CAPACITY);
                    entry.insert(tx.clone());
                    Role::Leader(tx)
                }
            };
            match role {
                Role::Leader(tx) => {
                    debug!(key, "leading flight");
                    let guard = FlightGuard {
                        flights: &self.flights,
                        key,
                    };
                    let outcome = f(ctx.holding(key)).await;
                    // Forget the key before emitting so a cancelled
                    // leader never poisons followers.
                    drop(guard);
                    let _ = tx.send(outcome.clone());
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    debug!(key, "joining in-flight request");
                    tokio::select! {
                        res = rx.recv() => match res {
                            Ok(outcome) => {
                                if outcome.is_cancelled() && !ctx.is_cancelled() {
                                    continue;
                                }
                                return outcome;
                            }
                            // Leader future dropped without a result.
                            Err(_) => {
                                if ctx.is_cancelled() {
                                    return Outcome::err(
                                        ctx.error().unwrap_or(Error::Cancelled),
                                    );
                                }
                                continue;
                            }
                        },
                        _ = ctx.cancelled() => {
                            return Outcome::err(ctx.error().unwrap_or(Error::Cancelled));
                        }
                    }
                }
            }
        }
    }

    /// Drops the in-flight entry for a key, forcing the next caller to
    /// recompute.
    pub fn forget(&self, key: &str) {
        self.flights.remove(key);
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}
