//! Performance governor: closed-loop severity control over the levers.
//!
//! The governor is a pure decision function driven by the host's simulation
//! loop. Every decision tick it receives fps and per-phase cost, updates a
//! severity level in `0..=3` and maps that level onto lever values below the
//! current ceilings.
//!
//! # Hysteresis
//! - Any bad tick escalates one level immediately (fast escalation).
//! - Three consecutive good ticks de-escalate one level (slow recovery).
//! - Ticks that are neither bad nor good reset the good streak only.

use crate::collaborators::{push_particles, Collaborators};
use crate::device_profiler::DeviceProfile;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Highest severity level.
pub const MAX_LEVEL: u8 = 3;

/// Consecutive good ticks required before de-escalating.
pub const GOOD_STREAK_TO_RECOVER: u32 = 3;

/// Upper bound of the refresh confidence counter.
pub const MAX_REFRESH_CONFIDENCE: u8 = 5;

/// Confidence at which the governor targets 120fps.
pub const REFRESH_CONFIDENCE_FOR_120: u8 = 3;

/// fps at or above which a tick counts toward 120fps confidence.
pub const HIGH_REFRESH_FPS: f64 = 95.0;

/// Update cost (ms) above which a tick is bad regardless of fps.
pub const UPDATE_BUDGET_MS: f64 = 12.0;

/// Render cost (ms) above which a tick is bad regardless of fps.
pub const RENDER_BUDGET_MS: f64 = 14.0;

/// Float lever tolerance when comparing against the last decision.
pub const LEVER_TOLERANCE: f64 = 0.01;

const PIXEL_RATIO_STEP: f64 = 0.15;
const PIXEL_RATIO_FLOOR: f64 = 1.0;
const PARTICLE_STEP: f64 = 0.25;
const PARTICLE_FLOOR: f64 = 0.35;
const BOT_STEP: f64 = 2.0;
const BOT_FLOOR: u32 = 6;
const FOOD_STEP: f64 = 60.0;
const FOOD_FLOOR: u32 = 180;
const UI_INTERVALS_MS: [u32; 4] = [0, 60, 90, 120];

/// Frame rate the governor is currently aiming for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Hz60,
    Hz120,
}

impl TargetMode {
    pub fn fps(&self) -> u32 {
        match self {
            TargetMode::Hz60 => 60,
            TargetMode::Hz120 => 120,
        }
    }

    /// `(target_min, target_good)` fps thresholds.
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            TargetMode::Hz60 => (55.0, 58.0),
            TargetMode::Hz120 => (95.0, 110.0),
        }
    }
}

impl Serialize for TargetMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.fps())
    }
}

/// Lever ceilings for the current tier and settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBase {
    pub pixel_ratio: f64,
    pub particle_intensity: f64,
    pub bot_count: u32,
    pub food_count: u32,
}

impl PerformanceBase {
    /// Ceilings derived from a device profile's tier table.
    pub fn from_profile(profile: &DeviceProfile) -> Self {
        let ceilings = profile.ceilings();
        Self {
            pixel_ratio: profile.pixel_ratio_cap,
            particle_intensity: (ceilings.particles as f64 / 100.0).min(1.0),
            bot_count: ceilings.bots,
            food_count: ceilings.food,
        }
    }
}

/// Cost measurements for one decision tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub fps: f64,
    pub update_ms: f64,
    pub render_ms: f64,
    pub dropped_steps: u32,
}

impl RuntimeMetrics {
    /// Non-finite or negative values become 0.
    pub fn sanitized(&self) -> Self {
        Self {
            fps: finite_or_zero(self.fps),
            update_ms: finite_or_zero(self.update_ms),
            render_ms: finite_or_zero(self.render_ms),
            dropped_steps: self.dropped_steps,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Lever values for one severity level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceDecision {
    pub level: u8,
    pub target_mode: TargetMode,
    pub pixel_ratio: f64,
    pub particle_intensity: f64,
    pub bot_count: u32,
    pub food_count: u32,
    pub recommended_ui_interval_ms: u32,
}

impl PerformanceDecision {
    /// Map a level onto lever values under the given ceilings.
    ///
    /// Each lever is reduced linearly with the level and held above its floor,
    /// except that the ceiling always wins when a floor exceeds it.
    pub fn for_level(level: u8, target_mode: TargetMode, base: &PerformanceBase) -> Self {
        let level = level.min(MAX_LEVEL);
        let l = level as f64;

        let pixel_ratio = (base.pixel_ratio - PIXEL_RATIO_STEP * l)
            .max(PIXEL_RATIO_FLOOR)
            .min(base.pixel_ratio);
        let particle_intensity = (base.particle_intensity * (1.0 - PARTICLE_STEP * l))
            .max(PARTICLE_FLOOR)
            .min(base.particle_intensity);
        let bot_count = reduce_count(base.bot_count, BOT_STEP * l, BOT_FLOOR);
        let food_count = reduce_count(base.food_count, FOOD_STEP * l, FOOD_FLOOR);

        Self {
            level,
            target_mode,
            pixel_ratio,
            particle_intensity,
            bot_count,
            food_count,
            recommended_ui_interval_ms: UI_INTERVALS_MS[level as usize],
        }
    }

    /// Same level, mode and integer levers; float levers within tolerance.
    pub fn is_equivalent(&self, other: &PerformanceDecision) -> bool {
        self.level == other.level
            && self.target_mode == other.target_mode
            && self.bot_count == other.bot_count
            && self.food_count == other.food_count
            && self.recommended_ui_interval_ms == other.recommended_ui_interval_ms
            && (self.pixel_ratio - other.pixel_ratio).abs() <= LEVER_TOLERANCE
            && (self.particle_intensity - other.particle_intensity).abs() <= LEVER_TOLERANCE
    }

    /// Push the levers into the collaborators.
    pub fn apply(&self, collaborators: &mut Collaborators<'_>) {
        collaborators.renderer.set_pixel_ratio(self.pixel_ratio);
        push_particles(collaborators.particles, self.particle_intensity);
        collaborators
            .spawner
            .set_target_population(self.bot_count, self.food_count);
        if let Some(ui) = collaborators.ui.as_deref_mut() {
            ui.set_min_interval_ms(self.recommended_ui_interval_ms);
        }
    }
}

fn reduce_count(ceiling: u32, reduction: f64, floor: u32) -> u32 {
    let reduced = (ceiling as f64 - reduction).round().max(0.0) as u32;
    reduced.max(floor).min(ceiling)
}

/// Severity controller for one host.
#[derive(Debug, Clone)]
pub struct PerformanceGovernor {
    enabled: bool,
    base: PerformanceBase,
    level: u8,
    good_streak: u32,
    refresh_confidence: u8,
    last_decision: Option<PerformanceDecision>,
}

impl PerformanceGovernor {
    /// Create a governor. Only touch-class devices are governed; a disabled
    /// governor answers every tick with `None`.
    pub fn new(base: PerformanceBase, enabled: bool) -> Self {
        Self {
            enabled,
            base,
            level: 0,
            good_streak: 0,
            refresh_confidence: 0,
            last_decision: None,
        }
    }

    /// Governor for a classified device.
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        Self::new(PerformanceBase::from_profile(profile), profile.is_touch)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn good_streak(&self) -> u32 {
        self.good_streak
    }

    pub fn refresh_confidence(&self) -> u8 {
        self.refresh_confidence
    }

    pub fn base(&self) -> &PerformanceBase {
        &self.base
    }

    pub fn last_decision(&self) -> Option<&PerformanceDecision> {
        self.last_decision.as_ref()
    }

    pub fn target_mode(&self) -> TargetMode {
        if self.refresh_confidence >= REFRESH_CONFIDENCE_FOR_120 {
            TargetMode::Hz120
        } else {
            TargetMode::Hz60
        }
    }

    /// Replace the ceilings.
    ///
    /// The next tick re-emits a decision even if nothing else changed. The
    /// level, good streak and refresh confidence carry over.
    pub fn set_base(&mut self, base: PerformanceBase) {
        debug!(?base, level = self.level, "Performance base replaced");
        self.base = base;
        self.last_decision = None;
    }

    /// Run one decision tick.
    ///
    /// Returns `None` when the governor is disabled or the resulting levers
    /// match the previously emitted decision.
    pub fn decide(&mut self, metrics: RuntimeMetrics) -> Option<PerformanceDecision> {
        if !self.enabled {
            return None;
        }

        let metrics = metrics.sanitized();

        self.refresh_confidence = if metrics.fps >= HIGH_REFRESH_FPS {
            (self.refresh_confidence + 1).min(MAX_REFRESH_CONFIDENCE)
        } else {
            self.refresh_confidence.saturating_sub(1)
        };
        let target_mode = self.target_mode();
        let (target_min, target_good) = target_mode.thresholds();

        let bad = metrics.dropped_steps > 0
            || metrics.fps < target_min
            || metrics.update_ms > UPDATE_BUDGET_MS
            || metrics.render_ms > RENDER_BUDGET_MS;
        let good = metrics.fps >= target_good && metrics.dropped_steps == 0;

        let previous_level = self.level;
        if bad {
            self.good_streak = 0;
            self.level = (self.level + 1).min(MAX_LEVEL);
        } else if good {
            self.good_streak = self.good_streak.saturating_add(1);
            if self.good_streak >= GOOD_STREAK_TO_RECOVER && self.level > 0 {
                self.level -= 1;
                self.good_streak = 0;
            }
        } else {
            self.good_streak = 0;
        }

        if self.level != previous_level {
            info!(
                from = previous_level,
                to = self.level,
                fps = metrics.fps,
                update_ms = metrics.update_ms,
                render_ms = metrics.render_ms,
                dropped_steps = metrics.dropped_steps,
                "Performance level changed"
            );
        }

        let decision = PerformanceDecision::for_level(self.level, target_mode, &self.base);
        if let Some(last) = &self.last_decision {
            if last.is_equivalent(&decision) {
                return None;
            }
        }

        self.last_decision = Some(decision);
        Some(decision)
    }
}
