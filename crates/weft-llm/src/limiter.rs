use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use weft_core::config::RateLimitConfig;

/// Process-wide gate enforcing a minimum spacing between provider call
/// starts, across all concurrently running workflows.
///
/// Each acquisition reserves the slot `last_grant + interval` under the lock,
/// then sleeps until its slot outside of it, so N concurrent callers are
/// granted at least `(N-1) * interval` apart. Recent provider rate-limit
/// errors widen the interval.
pub struct RateLimiter {
    min_interval: Duration,
    error_backoff: Duration,
    max_error_backoff: Duration,
    error_window: Duration,
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    last_grant: Option<Instant>,
    error_count: u32,
    last_error_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            error_backoff: Duration::from_millis(config.error_backoff_ms),
            max_error_backoff: Duration::from_millis(config.max_error_backoff_ms),
            error_window: Duration::from_secs(config.error_window_secs),
            state: Mutex::new(GateState::default()),
        }
    }

    /// The configured base spacing.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until this caller's slot. Returns how long it waited.
    pub async fn acquire(&self) -> Duration {
        let slot = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let interval = self.min_interval + self.extra_delay(&state, now);

            let slot = match state.last_grant {
                Some(last) => {
                    let earliest = last + interval;
                    if earliest > now { earliest } else { now }
                }
                None => now,
            };
            state.last_grant = Some(slot);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if wait > Duration::from_millis(100) {
            info!(wait_ms = wait.as_millis() as u64, "Rate limit gate: waiting");
        } else {
            debug!(wait_ms = wait.as_millis() as u64, "Rate limit gate");
        }
        if !wait.is_zero() {
            tokio::time::sleep_until(slot).await;
        }
        wait
    }

    /// Record a provider-side rate-limit error. Subsequent acquisitions
    /// within the error window are spaced further apart.
    pub async fn record_error(&self) {
        let mut state = self.state.lock().await;
        state.error_count += 1;
        state.last_error_at = Some(Instant::now());
        warn!(
            error_count = state.error_count,
            "Provider rate limit hit, widening call spacing"
        );
    }

    fn extra_delay(&self, state: &GateState, now: Instant) -> Duration {
        match state.last_error_at {
            Some(at) if now.duration_since(at) < self.error_window => {
                let extra = self.error_backoff * state.error_count;
                extra.min(self.max_error_backoff)
            }
            _ => Duration::ZERO,
        }
    }
}
