//! Governance context: the one object a host builds to wire the profiler,
//! frame monitor and governor together.

use crate::config::{Config, QualityPreset};
use crate::device_profiler::{DeviceProfile, DeviceProfiler, DeviceSignals, RefreshRate};
use crate::frame_clock::FrameTicker;
use crate::frame_monitor::FrameMonitor;
use crate::metrics::GovernorTelemetry;
use crate::performance_governor::{
    PerformanceBase, PerformanceDecision, PerformanceGovernor, RuntimeMetrics,
};
use std::sync::Arc;
use tracing::info;

/// Owns every piece of governance state for one host.
///
/// Classification happens once at construction; [`reinit`](Self::reinit) is
/// the only way to reclassify.
pub struct GovernanceContext {
    profiler: DeviceProfiler,
    monitor: FrameMonitor,
    governor: PerformanceGovernor,
    telemetry: Arc<GovernorTelemetry>,
    quality: QualityPreset,
    force_governor: bool,
}

impl GovernanceContext {
    pub fn new(signals: DeviceSignals, config: &Config) -> Self {
        let profiler = DeviceProfiler::new(signals)
            .with_sampling(config.refresh_sample_frames, config.refresh_timeout());
        let (monitor, governor) =
            build_controllers(&profiler.profile(), config.quality, config.force_governor);

        Self {
            profiler,
            monitor,
            governor,
            telemetry: Arc::new(GovernorTelemetry::new()),
            quality: config.quality,
            force_governor: config.force_governor,
        }
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profiler.profile()
    }

    pub fn profiler(&self) -> &DeviceProfiler {
        &self.profiler
    }

    pub fn monitor(&self) -> &FrameMonitor {
        &self.monitor
    }

    pub fn governor(&self) -> &PerformanceGovernor {
        &self.governor
    }

    pub fn telemetry(&self) -> Arc<GovernorTelemetry> {
        Arc::clone(&self.telemetry)
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    /// Detect the refresh rate and retarget the frame monitor to it.
    pub async fn detect_refresh_rate(&self, ticker: &FrameTicker) -> RefreshRate {
        let rate = self.profiler.refresh_rate(ticker).await;
        self.monitor.set_target_fps(rate.hz());
        rate
    }

    pub fn start_monitor(&mut self, ticker: &FrameTicker) -> bool {
        self.monitor.start(ticker)
    }

    pub fn stop_monitor(&mut self) -> bool {
        self.monitor.stop()
    }

    /// Run one governor tick and record it in telemetry.
    pub fn decide(&mut self, metrics: RuntimeMetrics) -> Option<PerformanceDecision> {
        if !self.governor.is_enabled() {
            return None;
        }

        let previous_level = self.governor.level();
        let decision = self.governor.decide(metrics);
        self.telemetry
            .record_tick(previous_level, self.governor.level(), decision.is_some());
        decision
    }

    /// Switch the quality preset. The throttling episode carries over.
    pub fn set_quality_preset(&mut self, quality: QualityPreset) {
        if quality == self.quality {
            return;
        }
        info!(from = ?self.quality, to = ?quality, "Quality preset changed");
        self.quality = quality;
        self.governor
            .set_base(quality.apply(PerformanceBase::from_profile(&self.profiler.profile())));
    }

    /// Reclassify from new signals.
    ///
    /// Stops the frame monitor, drops the cached profile and refresh
    /// measurement, and rebuilds the monitor and governor from scratch.
    pub fn reinit(&mut self, signals: DeviceSignals) {
        self.monitor.stop();
        self.profiler.reinit(signals);
        let (monitor, governor) =
            build_controllers(&self.profiler.profile(), self.quality, self.force_governor);
        self.monitor = monitor;
        self.governor = governor;
        info!(tier = %self.profiler.profile().tier, "Governance context reinitialized");
    }
}

fn build_controllers(
    profile: &DeviceProfile,
    quality: QualityPreset,
    force_governor: bool,
) -> (FrameMonitor, PerformanceGovernor) {
    let base = quality.apply(PerformanceBase::from_profile(profile));
    let governor = PerformanceGovernor::new(base, profile.is_touch || force_governor);
    (FrameMonitor::for_profile(profile), governor)
}
