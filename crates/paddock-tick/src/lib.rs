//! Cancellable countdown tick source for Paddock.
//!
//! A [`TickScheduler`] fires at a fixed interval, but only while it is
//! *armed*. Every call to [`TickScheduler::arm`] starts a new generation;
//! each [`TickInfo`] carries the generation it was produced for, so a
//! consumer can discard a tick that belongs to a countdown it has already
//! cancelled.
//!
//! # Integration
//!
//! The scheduler sits inside a lobby actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* may arm() or disarm() */ }
//!         info = scheduler.wait_for_tick() => {
//!             let msgs = directory.tick(info.generation);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_tick` does not touch scheduler state until its sleep has
//! completed, so a `disarm()` made by the command branch is always seen
//! before the next tick can fire.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the consumer falls behind the tick interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and schedule the next one from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next tick fires at its planned time.
    Drop,
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between two ticks while armed.
    pub interval: Duration,
    pub policy: TickPolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: TickPolicy::default(),
        }
    }
}

impl TickConfig {
    /// Smallest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number within the current generation (starts at 1).
    pub tick: u64,
    /// Generation the tick was scheduled for.
    pub generation: u64,
    /// Fixed delta, always the configured interval.
    pub dt: Duration,
    /// `true` if the tick fired more than 10% late.
    pub overrun: bool,
    /// Intervals skipped because of the overrun (Skip policy only).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    pub arms: u64,
    pub disarms: u64,
    /// Longest time between a tick firing and `record_tick_end`.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick source that is silent until armed.
pub struct TickScheduler {
    config: TickConfig,
    generation: u64,
    tick_count: u64,
    /// `Some` while armed.
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a disarmed scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            config,
            generation: 0,
            tick_count: 0,
            next_tick: None,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Start a new generation. The first tick fires one interval from now.
    ///
    /// Re-arming an armed scheduler restarts the interval and abandons the
    /// previous generation.
    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.tick_count = 0;
        self.tick_start = None;
        self.next_tick = Some(TokioInstant::now() + self.config.interval);
        self.metrics.arms += 1;
        debug!(generation = self.generation, "tick scheduler armed");
        self.generation
    }

    /// Stop ticking. Idempotent.
    pub fn disarm(&mut self) {
        if self.next_tick.take().is_some() {
            self.metrics.disarms += 1;
            debug!(
                generation = self.generation,
                ticks = self.tick_count,
                "tick scheduler disarmed"
            );
        }
    }

    /// Wait until the next tick is due.
    ///
    /// Pends forever while disarmed, which leaves `tokio::select!` free to
    /// serve its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let interval = self.config.interval;
        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            generation = self.generation,
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        generation = self.generation,
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "tick overrun, keeping original cadence"
                    );
                }
                next + interval
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(generation = self.generation, tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            generation: self.generation,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the consumer finished handling the current tick.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
        if elapsed >= self.config.interval {
            warn!(
                generation = self.generation,
                elapsed_ms = elapsed.as_millis() as u64,
                "tick handling exceeded the interval"
            );
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Current generation; 0 until the first `arm()`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ticks fired in the current generation.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
