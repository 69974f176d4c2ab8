//! Per-client rate limiting.
//!
//! Each client gets a one-second window that restarts on the first request
//! after the window lapses. The visitor table lives in process memory; a
//! background sweep evicts clients that have gone quiet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::response::ErrorCode;
use crate::state::AppState;

/// Length of one counting window.
const WINDOW: Duration = Duration::from_secs(1);

/// Visitors unseen for longer than this are evicted by the sweep.
const STALE_AFTER: Duration = Duration::from_secs(3 * 60);

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Visitor {
    last_seen: Instant,
    count: u32,
}

/// In-memory fixed-window rate limiter keyed by client id.
#[derive(Clone)]
pub struct RateLimiter {
    rate: u32,
    visitors: Arc<DashMap<String, Visitor>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per client per second.
    pub fn new(rate: u32) -> Self {
        Self::with_clock(rate, Arc::new(SystemClock))
    }

    pub fn with_clock(rate: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate,
            visitors: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Decide whether a request from `client` may proceed.
    ///
    /// The entry lock is held across the read-modify-write, so concurrent
    /// callers for the same client serialize while other clients proceed.
    pub fn allow(&self, client: &str) -> bool {
        let now = self.clock.now();

        match self.visitors.entry(client.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Visitor {
                    last_seen: now,
                    count: 1,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let visitor = slot.get_mut();
                if now.duration_since(visitor.last_seen) > WINDOW {
                    visitor.count = 1;
                    visitor.last_seen = now;
                    true
                } else if visitor.count >= self.rate {
                    false
                } else {
                    visitor.count += 1;
                    visitor.last_seen = now;
                    true
                }
            }
        }
    }

    /// Evict visitors unseen for longer than the stale threshold.
    ///
    /// Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.visitors.len();
        self.visitors
            .retain(|_, v| now.duration_since(v.last_seen) <= STALE_AFTER);
        before.saturating_sub(self.visitors.len())
    }

    /// Number of tracked clients.
    pub fn tracked(&self) -> usize {
        self.visitors.len()
    }

    /// Run [`sweep`](Self::sweep) every minute until `shutdown` fires.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("rate limiter sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep();
                        if evicted > 0 {
                            debug!(evicted, remaining = limiter.tracked(), "rate limiter sweep");
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("tracked", &self.visitors.len())
            .finish_non_exhaustive()
    }
}

/// Middleware rejecting clients over their per-second budget.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = state.trusted_proxies().client_id(&request);

    if !state.rate_limiter().allow(&client) {
        debug!(client = %client, path = %request.uri().path(), "rate limit exceeded");
        return AppError::new(ErrorCode::TooManyRequests).into_response();
    }

    next.run(request).await
}
