//! Rate governor for remote calls.
//!
//! Combines a hard sliding-window quota (`max_rate` calls per `period`) with
//! an adaptive backoff delay that grows on errors, decays on success and is
//! applied with random jitter. [`RateGovernor::run`] wraps a single remote
//! operation and retries it on flood errors a bounded number of times.
//!
//! The state sits behind a `std::sync::Mutex` that is only ever locked for
//! short, non-suspending sections; no lock is held across an `.await`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::GovernorSettings;
use crate::error::Result;
use crate::metrics;

/// Multiplier applied to the delay on every success.
const SUCCESS_DECAY: f64 = 0.9;
/// Multiplier applied to the delay (or the server hint) on every error.
const ERROR_GROWTH: f64 = 1.5;
/// Backoff stays active for `delay * ERROR_MEMORY` seconds after an error.
const ERROR_MEMORY: f64 = 10.0;

#[derive(Debug)]
struct RateState {
    delay: f64,
    last_error: Option<Instant>,
    window: VecDeque<Instant>,
}

#[derive(Debug)]
pub struct RateGovernor {
    settings: GovernorSettings,
    state: Mutex<RateState>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(GovernorSettings::default())
    }
}

/// Uniform jitter factor in `[low, high]`.
fn jitter(low: f64, high: f64) -> f64 {
    rand::thread_rng().gen_range(low..=high)
}

impl RateGovernor {
    pub fn new(settings: GovernorSettings) -> Self {
        let initial = settings.min_delay;
        Self::with_initial_delay(settings, initial)
    }

    /// Start from a specific backoff delay (clamped to the configured bounds).
    pub fn with_initial_delay(settings: GovernorSettings, delay: f64) -> Self {
        let delay = delay.clamp(settings.min_delay, settings.max_delay);
        Self {
            state: Mutex::new(RateState {
                delay,
                last_error: None,
                window: VecDeque::with_capacity(settings.max_rate),
            }),
            settings,
        }
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, RateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current backoff delay in seconds.
    pub fn delay(&self) -> f64 {
        self.state().delay
    }

    /// Calls currently counted in the rolling window.
    pub fn in_window(&self) -> usize {
        let mut state = self.state();
        Self::prune(&mut state.window, Instant::now(), self.settings.period);
        state.window.len()
    }

    fn prune(window: &mut VecDeque<Instant>, now: Instant, period: Duration) {
        while let Some(front) = window.front() {
            if now.saturating_duration_since(*front) >= period {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Reserve a slot in the window, or report how long until one frees up.
    fn try_reserve(&self) -> Option<Duration> {
        let mut state = self.state();
        let now = Instant::now();
        Self::prune(&mut state.window, now, self.settings.period);

        if state.window.len() < self.settings.max_rate {
            state.window.push_back(now);
            return None;
        }

        state.window.front().map(|oldest| {
            self.settings
                .period
                .saturating_sub(now.saturating_duration_since(*oldest))
        })
    }

    /// Backoff to apply when an error was seen recently.
    fn pending_backoff(&self) -> Option<f64> {
        let state = self.state();
        let last_error = state.last_error?;
        let since = last_error.elapsed().as_secs_f64();
        (since < state.delay * ERROR_MEMORY).then_some(state.delay)
    }

    /// Wait until a remote call is allowed.
    pub async fn acquire(&self) {
        while let Some(wait) = self.try_reserve() {
            debug!(wait_ms = wait.as_millis() as u64, "Rate window full");
            sleep(wait).await;
        }

        if let Some(delay) = self.pending_backoff() {
            let factor = jitter(0.5, 1.5);
            info!("ℹ️ Backoff {:.2}s×{:.2}", delay, factor);
            sleep(Duration::from_secs_f64(delay * factor)).await;
        }
    }

    /// A call completed without a rate-limit error.
    pub fn record_success(&self) {
        let delay = {
            let mut state = self.state();
            state.delay = (state.delay * SUCCESS_DECAY).max(self.settings.min_delay);
            state.delay
        };
        metrics::set_governor_delay(delay);
    }

    /// A call failed; `hint` is the server's wait suggestion for flood errors.
    pub fn record_error(&self, hint: Option<f64>) {
        let delay = {
            let mut state = self.state();
            state.last_error = Some(Instant::now());
            let base = hint.filter(|h| *h > 0.0).unwrap_or(state.delay);
            state.delay =
                (base * ERROR_GROWTH).clamp(self.settings.min_delay, self.settings.max_delay);
            state.delay
        };
        metrics::set_governor_delay(delay);
    }

    /// Run one remote operation under the governor.
    ///
    /// Flood errors are retried after sleeping `hint × [0.8, 1.2]`, up to
    /// `max_attempts` attempts in total; the last flood error is returned when
    /// attempts run out. Other errors are returned immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.acquire().await;

            match op().await {
                Ok(value) => {
                    self.record_success();
                    metrics::record_remote_call("ok");
                    return Ok(value);
                }
                Err(err) => match err.flood_wait_seconds() {
                    Some(seconds) => {
                        self.record_error(Some(seconds as f64));
                        metrics::record_remote_call("flood");

                        if attempt >= max_attempts {
                            warn!(
                                "⚠️ Flood wait {}s persists after {} attempts, giving up",
                                seconds, attempt
                            );
                            return Err(err);
                        }

                        let wait = seconds as f64 * jitter(0.8, 1.2);
                        warn!(
                            "⚠️ Flood wait {:.1}s (attempt {}/{})",
                            wait, attempt, max_attempts
                        );
                        sleep(Duration::from_secs_f64(wait)).await;
                    }
                    None => {
                        self.record_error(None);
                        metrics::record_remote_call("error");
                        return Err(err);
                    }
                },
            }
        }
    }
}
