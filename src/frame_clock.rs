//! Frame tick abstraction.
//!
//! The host's per-frame callback chain is modelled as a broadcast channel of
//! timestamps. Whatever drives the display (a real vsync callback, a winit
//! redraw loop, or [`SyntheticFrames`] in a headless run) publishes one
//! [`FrameTick`] per presented frame; consumers such as the frame monitor and
//! refresh-rate detection subscribe to it.

use tokio::sync::broadcast;

/// Number of ticks buffered per subscriber before it starts lagging.
pub const TICK_CHANNEL_CAPACITY: usize = 256;

/// One presented frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Host clock timestamp of the frame in milliseconds.
    pub timestamp_ms: f64,
}

impl FrameTick {
    pub fn new(timestamp_ms: f64) -> Self {
        Self { timestamp_ms }
    }
}

/// Publisher side of the per-frame callback chain.
#[derive(Debug, Clone)]
pub struct FrameTicker {
    sender: broadcast::Sender<FrameTick>,
}

impl FrameTicker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a frame. Returns the number of subscribers that will see it.
    pub fn tick(&self, timestamp_ms: f64) -> usize {
        self.sender.send(FrameTick::new(timestamp_ms)).unwrap_or(0)
    }

    /// Register a new callback on the chain.
    pub fn subscribe(&self) -> broadcast::Receiver<FrameTick> {
        self.sender.subscribe()
    }

    /// Number of callbacks currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FrameTicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic frame timestamp generator for headless hosts and tests.
///
/// Yields an endless sequence of timestamps, cycling through the configured
/// intervals. A single interval produces a steady cadence.
#[derive(Debug, Clone)]
pub struct SyntheticFrames {
    intervals_ms: Vec<f64>,
    next_index: usize,
    now_ms: f64,
}

impl SyntheticFrames {
    /// Steady cadence with a fixed inter-frame interval.
    pub fn steady(interval_ms: f64) -> Self {
        Self::scripted(vec![interval_ms])
    }

    /// Steady cadence matching a refresh rate in Hz.
    pub fn at_hz(hz: f64) -> Self {
        Self::steady(1000.0 / hz)
    }

    /// Cycle through a scripted list of intervals. An empty script falls back
    /// to a 60 Hz cadence.
    pub fn scripted(intervals_ms: Vec<f64>) -> Self {
        let intervals_ms = if intervals_ms.is_empty() {
            vec![1000.0 / 60.0]
        } else {
            intervals_ms
        };
        Self {
            intervals_ms,
            next_index: 0,
            now_ms: 0.0,
        }
    }
}

impl Iterator for SyntheticFrames {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let interval = self.intervals_ms[self.next_index];
        self.next_index = (self.next_index + 1) % self.intervals_ms.len();
        self.now_ms += interval;
        Some(self.now_ms)
    }
}
