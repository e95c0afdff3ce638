//! Adaptive polling decisions.
//!
//! A physical hold action on some device families makes the pyrometer
//! stream readings much faster than the active poll rate; polling on top of
//! that stream wastes radio time and device battery. The controller watches
//! the arrival cadence of inbound frames and decides when to stop active
//! polling (device is streaming) and when to resume it (stream went idle).
//!
//! The controller is a pure state machine: the session drives it from its
//! serialized context with [`PollingController::on_frame`] per accepted
//! frame and [`PollingController::on_tick`] once per second, and acts on
//! the returned [`PollDecision`]. Timestamps are injected so the logic is
//! deterministic under test.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// EWMA smoothing factor for the inter-arrival interval.
pub const EWMA_ALPHA: f64 = 0.25;

/// Cadence of polling decisions.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between active poll requests (5 requests/second).
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Hold-off window after entering streaming, during which no polling
/// restart is considered even if the rate dips.
pub const STREAM_HOLDOFF: Duration = Duration::from_secs(3);

/// Notifications per tick at or above which a tick counts as fast.
const FAST_RATE: u64 = 3;

/// Notifications per tick below which a tick counts as slow. The dead zone
/// between the two thresholds avoids flapping.
const SLOW_RATE: u64 = 2;

/// Consecutive fast ticks before polling stops.
const FAST_TICKS_TO_STREAM: u32 = 2;

/// Consecutive slow ticks before polling resumes.
const SLOW_TICKS_TO_POLL: u32 = 2;

/// Decision returned by a polling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Stop active polling; the device is streaming.
    StopPolling,
    /// Resume active polling at [`POLL_INTERVAL`].
    StartPolling,
}

/// Arrival-cadence statistics, owned exclusively by the controller.
#[derive(Debug, Clone, Default)]
pub struct PollingMetrics {
    /// Running count of accepted frames.
    pub notify_count: u64,
    /// Arrival time of the previous frame.
    pub last_arrival: Option<Instant>,
    /// EWMA of the inter-arrival interval, in seconds.
    pub ema_interval_secs: Option<f64>,
    /// Consecutive fast ticks.
    pub fast_ticks: u32,
    /// Consecutive slow ticks.
    pub slow_ticks: u32,
}

impl PollingMetrics {
    /// Instantaneous notification rate derived from the smoothed interval.
    pub fn rate_hz(&self) -> Option<f64> {
        self.ema_interval_secs
            .filter(|&secs| secs > 0.0)
            .map(|secs| 1.0 / secs)
    }
}

/// Decides between active polling and letting the device stream.
#[derive(Debug, Default)]
pub struct PollingController {
    metrics: PollingMetrics,
    count_at_last_tick: u64,
    streaming_until: Option<Instant>,
    polling_active: bool,
    start_pending: bool,
}

impl PollingController {
    /// Create a controller with empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted inbound frame.
    pub fn on_frame(&mut self, now: Instant) {
        self.metrics.notify_count += 1;

        if let Some(previous) = self.metrics.last_arrival {
            let dt = now.duration_since(previous).as_secs_f64();
            if dt > 0.0 {
                let ema = match self.metrics.ema_interval_secs {
                    Some(ema) => ema * (1.0 - EWMA_ALPHA) + dt * EWMA_ALPHA,
                    None => dt,
                };
                self.metrics.ema_interval_secs = Some(ema);
            }
        }
        self.metrics.last_arrival = Some(now);
    }

    /// Run one polling decision, to be called every [`TICK_INTERVAL`].
    ///
    /// `sink_ready` reports whether a write channel is currently attached.
    /// A resume decision with no sink is deferred, not dropped: it fires
    /// from [`Self::on_sink_ready`] once the channel appears.
    pub fn on_tick(&mut self, now: Instant, sink_ready: bool) -> Option<PollDecision> {
        let rate = self.metrics.notify_count - self.count_at_last_tick;
        self.count_at_last_tick = self.metrics.notify_count;

        if rate >= FAST_RATE {
            self.metrics.fast_ticks += 1;
            self.metrics.slow_ticks = 0;
        } else if rate < SLOW_RATE {
            self.metrics.slow_ticks += 1;
            self.metrics.fast_ticks = 0;
        } else {
            self.metrics.fast_ticks = 0;
            self.metrics.slow_ticks = 0;
        }

        if self.metrics.fast_ticks >= FAST_TICKS_TO_STREAM {
            self.metrics.fast_ticks = 0;
            // Burst confirmed: hold off any restart for the whole window so
            // natural jitter inside the burst cannot re-trigger polling.
            self.streaming_until = Some(now + STREAM_HOLDOFF);
            if self.polling_active {
                debug!("device streaming at {} frames/tick, stopping poll", rate);
                self.polling_active = false;
                return Some(PollDecision::StopPolling);
            }
            return None;
        }

        if let Some(until) = self.streaming_until {
            if now < until {
                return None;
            }
            self.streaming_until = None;
        }

        if self.metrics.slow_ticks >= SLOW_TICKS_TO_POLL && !self.polling_active {
            if sink_ready {
                debug!("stream idle ({} frames/tick), resuming poll", rate);
                self.polling_active = true;
                self.start_pending = false;
                return Some(PollDecision::StartPolling);
            }
            // No write channel yet; remember the request instead of
            // dropping it.
            self.start_pending = true;
        }

        None
    }

    /// Notify the controller that a write channel became available.
    ///
    /// Returns `StartPolling` when a resume decision was deferred while no
    /// sink was attached.
    pub fn on_sink_ready(&mut self) -> Option<PollDecision> {
        if self.start_pending && !self.polling_active {
            self.start_pending = false;
            self.polling_active = true;
            return Some(PollDecision::StartPolling);
        }
        None
    }

    /// Record that the session started or stopped the poll loop itself
    /// (e.g. on unlock or disconnect).
    pub fn set_polling(&mut self, active: bool) {
        self.polling_active = active;
        if active {
            self.start_pending = false;
        }
    }

    /// Whether active polling is currently running.
    pub fn is_polling(&self) -> bool {
        self.polling_active
    }

    /// Current arrival metrics.
    pub fn metrics(&self) -> &PollingMetrics {
        &self.metrics
    }

    /// Clear all state. Called on disconnect.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
