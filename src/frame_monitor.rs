//! Frame monitor: per-frame timing aggregation and a local quality ladder.
//!
//! While active, the monitor is registered on the frame ticker and folds
//! every frame into a sliding window. Roughly once per second it publishes a
//! [`FrameMetrics`] snapshot, accounts for dropped frames and nudges its own
//! quality tier up or down the ladder with hysteresis.

use crate::collaborators::{push_particles, Collaborators};
use crate::device_profiler::{DeviceProfile, DeviceTier};
use crate::frame_clock::FrameTicker;
use crate::frame_window::FrameWindow;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Minimum time between metrics snapshots.
pub const AGGREGATION_INTERVAL_MS: f64 = 1000.0;

/// Below `target × SLOW_RATIO` a window counts as slow.
pub const SLOW_RATIO: f64 = 0.85;

/// At or above `target × FAST_RATIO` a window counts as fast.
pub const FAST_RATIO: f64 = 0.95;

/// Slow windows (exclusive) before the ladder steps down.
pub const SLOW_WINDOWS_TO_DROP: u32 = 5;

/// Fast windows (exclusive) before the ladder steps up.
pub const FAST_WINDOWS_TO_RAISE: u32 = 10;

/// A window with fewer than `expected × DROP_TOLERANCE` frames records drops.
pub const DROP_TOLERANCE: f64 = 0.9;

/// Discrete visual quality presets, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Ultra,
    High,
    Medium,
    Low,
    Extreme,
}

impl QualityTier {
    fn rank(&self) -> u8 {
        match self {
            QualityTier::Ultra => 4,
            QualityTier::High => 3,
            QualityTier::Medium => 2,
            QualityTier::Low => 1,
            QualityTier::Extreme => 0,
        }
    }

    /// One step down the ladder; `Extreme` stays put.
    pub fn lower(&self) -> Self {
        match self {
            QualityTier::Ultra => QualityTier::High,
            QualityTier::High => QualityTier::Medium,
            QualityTier::Medium => QualityTier::Low,
            QualityTier::Low | QualityTier::Extreme => QualityTier::Extreme,
        }
    }

    /// One step up the ladder, never above `ceiling`.
    pub fn raised_within(&self, ceiling: QualityTier) -> Self {
        let raised = match self {
            QualityTier::Extreme => QualityTier::Low,
            QualityTier::Low => QualityTier::Medium,
            QualityTier::Medium => QualityTier::High,
            QualityTier::High | QualityTier::Ultra => QualityTier::Ultra,
        };
        raised.capped_at(ceiling)
    }

    pub fn capped_at(&self, ceiling: QualityTier) -> Self {
        if self.rank() > ceiling.rank() {
            ceiling
        } else {
            *self
        }
    }

    /// Best quality a device tier is allowed to reach.
    pub fn ceiling_for(tier: DeviceTier) -> Self {
        match tier {
            DeviceTier::Flagship => QualityTier::Ultra,
            DeviceTier::High | DeviceTier::Mid => QualityTier::High,
            DeviceTier::Low => QualityTier::Medium,
            DeviceTier::VeryLow => QualityTier::Low,
        }
    }

    /// Lever defaults for this preset, before the device pixel-ratio cap.
    pub fn settings(&self) -> RecommendedSettings {
        let (pixel_ratio, particle_intensity, bot_count, food_count) = match self {
            QualityTier::Ultra => (2.0, 1.0, 18, 500),
            QualityTier::High => (1.5, 0.8, 15, 400),
            QualityTier::Medium => (1.25, 0.6, 10, 250),
            QualityTier::Low => (1.0, 0.3, 6, 150),
            QualityTier::Extreme => (0.75, 0.0, 4, 100),
        };
        RecommendedSettings {
            quality: *self,
            pixel_ratio,
            particles_enabled: particle_intensity > 0.0,
            particle_intensity,
            bot_count,
            food_count,
        }
    }
}

/// Concrete lever values for a quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecommendedSettings {
    pub quality: QualityTier,
    pub pixel_ratio: f64,
    pub particles_enabled: bool,
    pub particle_intensity: f64,
    pub bot_count: u32,
    pub food_count: u32,
}

/// Snapshot published once per aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMetrics {
    /// fps over the last window.
    pub current: f64,
    /// fps implied by the mean interval of the sliding window.
    pub average: f64,
    /// Lowest window fps since activation.
    pub min: f64,
    /// Highest window fps since activation.
    pub max: f64,
    /// Cumulative dropped frames.
    pub dropped_frames: u64,
    /// Last inter-frame interval, rounded to 0.1ms.
    pub frame_time_ms: f64,
    pub quality_tier: QualityTier,
}

impl FrameMetrics {
    fn initial(quality_tier: QualityTier) -> Self {
        Self {
            current: 0.0,
            average: 0.0,
            min: 0.0,
            max: 0.0,
            dropped_frames: 0,
            frame_time_ms: 0.0,
            quality_tier,
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    generation: u64,
    active: bool,
    target_fps: f64,
    quality_ceiling: QualityTier,
    window: FrameWindow,
    last_frame_ms: Option<f64>,
    window_start_ms: f64,
    frame_count: u32,
    /// Frames the tick task missed since the last delivered frame.
    skipped_pending: u32,
    min_fps: Option<f64>,
    max_fps: Option<f64>,
    slow_count: u32,
    fast_count: u32,
    frames_seen: u64,
    metrics: FrameMetrics,
}

impl MonitorState {
    fn new(target_fps: u32, quality_ceiling: QualityTier) -> Self {
        Self {
            generation: 0,
            active: false,
            target_fps: target_fps.max(1) as f64,
            quality_ceiling,
            window: FrameWindow::new(),
            last_frame_ms: None,
            window_start_ms: 0.0,
            frame_count: 0,
            skipped_pending: 0,
            min_fps: None,
            max_fps: None,
            slow_count: 0,
            fast_count: 0,
            frames_seen: 0,
            metrics: FrameMetrics::initial(quality_ceiling),
        }
    }

    /// Enter the active state with fresh timing. Dropped frames and the
    /// quality tier carry over.
    fn activate(&mut self) -> u64 {
        self.generation += 1;
        self.active = true;
        self.window.clear();
        self.last_frame_ms = None;
        self.frame_count = 0;
        self.skipped_pending = 0;
        self.min_fps = None;
        self.max_fps = None;
        self.slow_count = 0;
        self.fast_count = 0;
        self.metrics.min = 0.0;
        self.metrics.max = 0.0;
        self.generation
    }

    fn deactivate(&mut self) {
        self.generation += 1;
        self.active = false;
    }

    fn accepts(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }

    fn on_frame(&mut self, timestamp_ms: f64) {
        let Some(last) = self.last_frame_ms else {
            self.rebase(timestamp_ms);
            return;
        };

        let delta = timestamp_ms - last;
        if !delta.is_finite() || delta < 0.0 {
            debug!(delta, "Frame clock moved backwards, restarting window");
            self.rebase(timestamp_ms);
            return;
        }

        // A delta after a lag spans every missed frame.
        let interval = delta / (self.skipped_pending as f64 + 1.0);
        self.skipped_pending = 0;

        self.last_frame_ms = Some(timestamp_ms);
        self.window.push(interval);
        self.frame_count += 1;
        self.frames_seen += 1;

        let elapsed = timestamp_ms - self.window_start_ms;
        if elapsed >= AGGREGATION_INTERVAL_MS {
            self.aggregate(elapsed, interval);
            self.frame_count = 0;
            self.window_start_ms = timestamp_ms;
        }
    }

    /// Account for frames the host presented but the tick task never saw.
    ///
    /// Without a baseline frame there is nothing to measure them against.
    fn on_missed_frames(&mut self, skipped: u64) {
        if self.last_frame_ms.is_none() {
            return;
        }
        let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
        self.frame_count = self.frame_count.saturating_add(skipped);
        self.skipped_pending = self.skipped_pending.saturating_add(skipped);
        self.frames_seen += skipped as u64;
    }

    fn rebase(&mut self, timestamp_ms: f64) {
        self.last_frame_ms = Some(timestamp_ms);
        self.window_start_ms = timestamp_ms;
        self.frame_count = 0;
        self.skipped_pending = 0;
    }

    fn aggregate(&mut self, elapsed_ms: f64, last_delta_ms: f64) {
        let frames = self.frame_count as f64;
        let fps = (frames * 1000.0 / elapsed_ms).round();

        let min = self.min_fps.map_or(fps, |min| min.min(fps));
        let max = self.max_fps.map_or(fps, |max| max.max(fps));
        self.min_fps = Some(min);
        self.max_fps = Some(max);

        let mean_interval = self.window.mean();
        let average = if mean_interval > 0.0 {
            1000.0 / mean_interval
        } else {
            0.0
        };

        let frame_budget_ms = 1000.0 / self.target_fps;
        let expected = (elapsed_ms / frame_budget_ms).round();
        if frames < expected * DROP_TOLERANCE {
            self.metrics.dropped_frames += (expected - frames) as u64;
        }

        self.adjust_quality(fps);

        self.metrics.current = fps;
        self.metrics.average = average;
        self.metrics.min = min;
        self.metrics.max = max;
        self.metrics.frame_time_ms = (last_delta_ms * 10.0).round() / 10.0;

        debug!(
            fps,
            average,
            dropped_frames = self.metrics.dropped_frames,
            quality = ?self.metrics.quality_tier,
            "Frame window aggregated"
        );
    }

    fn adjust_quality(&mut self, fps: f64) {
        let current = self.metrics.quality_tier;

        if fps < self.target_fps * SLOW_RATIO {
            self.slow_count += 1;
            self.fast_count = self.fast_count.saturating_sub(1);
            if self.slow_count > SLOW_WINDOWS_TO_DROP {
                self.set_quality(current.lower(), fps);
                self.slow_count = 0;
            }
        } else if fps >= self.target_fps * FAST_RATIO {
            self.fast_count += 1;
            self.slow_count = self.slow_count.saturating_sub(1);
            if self.fast_count > FAST_WINDOWS_TO_RAISE {
                self.set_quality(current.raised_within(self.quality_ceiling), fps);
                self.fast_count = 0;
            }
        }
    }

    fn set_quality(&mut self, quality: QualityTier, fps: f64) {
        if quality != self.metrics.quality_tier {
            info!(
                from = ?self.metrics.quality_tier,
                to = ?quality,
                fps,
                target_fps = self.target_fps,
                "Quality tier changed"
            );
            self.metrics.quality_tier = quality;
        }
    }
}

fn lock(state: &Mutex<MonitorState>) -> MutexGuard<'_, MonitorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame timing monitor for one host.
///
/// `Idle` until [`start`](Self::start), which registers one callback on the
/// frame ticker. [`stop`](Self::stop) deregisters it; no tick touches the
/// monitor after `stop` returns.
pub struct FrameMonitor {
    state: Arc<Mutex<MonitorState>>,
    registration: Option<JoinHandle<()>>,
    pixel_ratio_cap: f64,
}

impl FrameMonitor {
    pub fn new(target_fps: u32, quality_ceiling: QualityTier, pixel_ratio_cap: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState::new(target_fps, quality_ceiling))),
            registration: None,
            pixel_ratio_cap,
        }
    }

    /// Monitor seeded from a device profile's refresh rate and tier.
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        Self::new(
            profile.refresh_hz.hz(),
            QualityTier::ceiling_for(profile.tier),
            profile.pixel_ratio_cap,
        )
    }

    /// Whether a tick task is registered. A task that ended because its
    /// ticker closed no longer counts.
    pub fn is_active(&self) -> bool {
        self.registration
            .as_ref()
            .is_some_and(|registration| !registration.is_finished())
    }

    pub fn target_fps(&self) -> u32 {
        lock(&self.state).target_fps as u32
    }

    pub fn set_target_fps(&self, target_fps: u32) {
        let mut state = lock(&self.state);
        state.target_fps = target_fps.max(1) as f64;
        debug!(target_fps, "Frame monitor target updated");
    }

    /// Register on the frame ticker. Returns `false` if already active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, ticker: &FrameTicker) -> bool {
        if self.is_active() {
            return false;
        }
        if self.registration.take().is_some() {
            debug!("Previous frame ticker closed, re-registering");
        }

        let (generation, target_fps) = {
            let mut state = lock(&self.state);
            (state.activate(), state.target_fps)
        };

        let mut frames = ticker.subscribe();
        let state = Arc::clone(&self.state);
        self.registration = Some(tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(tick) => {
                        let mut state = lock(&state);
                        if !state.accepts(generation) {
                            break;
                        }
                        state.on_frame(tick.timestamp_ms);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Frame monitor lagged behind the frame ticker");
                        let mut state = lock(&state);
                        if !state.accepts(generation) {
                            break;
                        }
                        state.on_missed_frames(skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Frame ticker closed, frame monitor deregistered");
                        break;
                    }
                }
            }
        }));

        info!(target_fps, "Frame monitor started");
        true
    }

    /// Deregister from the frame ticker. Returns `false` if already idle.
    pub fn stop(&mut self) -> bool {
        let Some(registration) = self.registration.take() else {
            return false;
        };

        let was_running = !registration.is_finished();
        lock(&self.state).deactivate();
        registration.abort();
        if was_running {
            info!("Frame monitor stopped");
        }
        was_running
    }

    /// Copy of the latest metrics snapshot.
    pub fn metrics(&self) -> FrameMetrics {
        lock(&self.state).metrics
    }

    pub fn quality_tier(&self) -> QualityTier {
        lock(&self.state).metrics.quality_tier
    }

    /// Lever defaults for the current quality tier, capped by the device
    /// pixel ratio.
    pub fn recommended_settings(&self) -> RecommendedSettings {
        let mut settings = self.quality_tier().settings();
        settings.pixel_ratio = settings.pixel_ratio.min(self.pixel_ratio_cap);
        settings
    }

    /// Push the recommended settings to the renderer, particle system and
    /// entity spawner.
    pub fn apply_settings(&self, collaborators: &mut Collaborators<'_>) {
        let settings = self.recommended_settings();
        collaborators.renderer.set_pixel_ratio(settings.pixel_ratio);
        push_particles(collaborators.particles, settings.particle_intensity);
        collaborators
            .spawner
            .set_target_population(settings.bot_count, settings.food_count);
    }
}

impl Drop for FrameMonitor {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            lock(&self.state).deactivate();
            registration.abort();
        }
    }
}
