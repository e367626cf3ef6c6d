//! Armable fixed-period timers for yiodock.
//!
//! The client runs two supervisors, heartbeat and reconnection, and each is
//! clocked by one [`PeriodicTimer`]. A timer is either **armed** (ticks every
//! `period`, first tick immediately) or **disarmed** (never ticks). Both
//! operations are idempotent, so the owner can call them without first
//! checking the current state.
//!
//! # Integration
//!
//! The timer is designed to sit inside the dock actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = heartbeat.wait_for_tick() => { /* probe or check */ }
//!         _ = reconnect.wait_for_tick() => { /* retry the link */ }
//!     }
//! }
//! ```
//!
//! While disarmed, [`PeriodicTimer::wait_for_tick`] pends forever, so the
//! branch simply never fires.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Lifetime counters for a timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Total ticks fired across all arm cycles.
    pub total_ticks: u64,
    /// How many times the timer went from disarmed to armed.
    pub times_armed: u64,
}

/// A fixed-delay periodic timer that can be armed and disarmed.
///
/// After each tick the next one is scheduled `period` from *now*, not from
/// the missed deadline, so a stalled event loop never produces a burst of
/// catch-up ticks.
#[derive(Debug)]
pub struct PeriodicTimer {
    name: &'static str,
    period: Duration,
    /// When the next tick fires. `None` means disarmed.
    next_tick: Option<Instant>,
    tick_count: u64,
    metrics: TimerMetrics,
}

impl PeriodicTimer {
    /// Shortest period accepted; smaller values are clamped up.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// Creates a disarmed timer. `name` only appears in logs.
    pub fn new(name: &'static str, period: Duration) -> Self {
        let period = if period < Self::MIN_PERIOD {
            warn!(name, ?period, "timer period too small, clamping");
            Self::MIN_PERIOD
        } else {
            period
        };
        Self {
            name,
            period,
            next_tick: None,
            tick_count: 0,
            metrics: TimerMetrics::default(),
        }
    }

    /// Arms the timer with its first tick due immediately.
    ///
    /// Returns `false` (and changes nothing) if it was already armed, so a
    /// repeated arm request never resets the running cadence.
    pub fn arm(&mut self) -> bool {
        if self.next_tick.is_some() {
            trace!(name = self.name, "timer already armed");
            return false;
        }
        self.next_tick = Some(Instant::now());
        self.tick_count = 0;
        self.metrics.times_armed += 1;
        debug!(name = self.name, period = ?self.period, "timer armed");
        true
    }

    /// Disarms the timer. Returns `false` if it was not armed.
    pub fn disarm(&mut self) -> bool {
        if self.next_tick.take().is_some() {
            debug!(name = self.name, ticks = self.tick_count, "timer disarmed");
            true
        } else {
            false
        }
    }

    /// Whether the timer is currently armed.
    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Waits until the next tick is due and returns its number since the
    /// timer was last armed (starting at 1).
    ///
    /// Pends forever while disarmed. Cancel-safe: the timer state only
    /// changes once the deadline has actually passed.
    pub async fn wait_for_tick(&mut self) -> u64 {
        let Some(deadline) = self.next_tick else {
            // This future never completes; select! handles other branches.
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        self.tick_count += 1;
        self.next_tick = Some(Instant::now() + self.period);
        self.metrics.total_ticks += 1;
        trace!(name = self.name, tick = self.tick_count, "timer tick");
        self.tick_count
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks since the timer was last armed.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Snapshot of lifetime counters.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}
