//! Device profiler: hardware tier classification and resource ceilings.
//!
//! Classification works from best-effort signals that are frequently absent
//! (a device-memory hint, logical core count, pixel density, a platform
//! identifier and touch capability). Missing signals are replaced by safe
//! defaults, so the profiler never fails; the worst case is a conservative
//! tier.
//!
//! The display refresh rate is the one measured property. It is sampled
//! from the frame ticker once, shared by every concurrent caller, and falls
//! back to 60Hz when no frames arrive in time.

use crate::frame_clock::{FrameTick, FrameTicker};
use crate::frame_window::FrameWindow;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Logical core count assumed when the host cannot report one.
pub const DEFAULT_CORES: u32 = 4;

/// Device memory (GB) assumed when the host cannot report it.
pub const DEFAULT_MEMORY_GB: f64 = 4.0;

/// Pixel ratio assumed when the host cannot report it.
pub const DEFAULT_PIXEL_RATIO: f64 = 1.0;

/// Number of inter-frame intervals sampled for refresh detection.
pub const REFRESH_SAMPLE_FRAMES: usize = 30;

/// Upper bound on refresh detection before falling back to 60Hz.
pub const REFRESH_SAMPLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Device-memory buckets reported by the host, largest first.
const MEMORY_BUCKETS_GB: [f64; 6] = [8.0, 4.0, 2.0, 1.0, 0.5, 0.25];

/// Platform identifier fragments that indicate a handheld device.
const MOBILE_PLATFORM_MARKERS: &[&str] = &["android", "iphone", "ipad", "ipod", "mobile"];

/// Coarse hardware capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceTier {
    VeryLow,
    Low,
    Mid,
    High,
    Flagship,
}

impl DeviceTier {
    /// Tiers that get the reduced-effects treatment.
    pub fn is_low_end(&self) -> bool {
        matches!(self, DeviceTier::VeryLow | DeviceTier::Low)
    }

    /// Resource ceilings for this tier.
    pub fn ceilings(&self) -> TierCeilings {
        match self {
            DeviceTier::VeryLow => TierCeilings::new(10, 4, 100, 1.0, true, false),
            DeviceTier::Low => TierCeilings::new(30, 6, 150, 1.0, true, false),
            DeviceTier::Mid => TierCeilings::new(60, 10, 250, 1.5, false, true),
            DeviceTier::High => TierCeilings::new(100, 15, 400, 2.0, false, true),
            DeviceTier::Flagship => TierCeilings::new(150, 18, 500, 2.5, false, true),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTier::VeryLow => "very-low",
            DeviceTier::Low => "low",
            DeviceTier::Mid => "mid",
            DeviceTier::High => "high",
            DeviceTier::Flagship => "flagship",
        }
    }
}

impl std::fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier maximum resource budgets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCeilings {
    /// Particle budget (percent of the full-quality particle count).
    pub particles: u32,
    /// Maximum bot population.
    pub bots: u32,
    /// Maximum food population.
    pub food: u32,
    /// Upper bound for the render pixel ratio.
    pub dpr_cap: f64,
    /// Whether the renderer may skip frames under load.
    pub frame_skip: bool,
    /// Whether secondary visual effects are enabled.
    pub effects: bool,
}

impl TierCeilings {
    const fn new(
        particles: u32,
        bots: u32,
        food: u32,
        dpr_cap: f64,
        frame_skip: bool,
        effects: bool,
    ) -> Self {
        Self {
            particles,
            bots,
            food,
            dpr_cap,
            frame_skip,
            effects,
        }
    }
}

/// Display refresh rate class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshRate {
    #[default]
    Hz60,
    Hz90,
    Hz120,
}

impl RefreshRate {
    pub fn hz(&self) -> u32 {
        match self {
            RefreshRate::Hz60 => 60,
            RefreshRate::Hz90 => 90,
            RefreshRate::Hz120 => 120,
        }
    }

    /// Classify a median inter-frame interval.
    ///
    /// Implied rate ≥110Hz is 120, ≥80Hz is 90, everything else (including
    /// unusable intervals) is 60.
    pub fn from_interval_ms(interval_ms: f64) -> Self {
        if !interval_ms.is_finite() || interval_ms <= 0.0 {
            return RefreshRate::Hz60;
        }

        let implied_hz = 1000.0 / interval_ms;
        if implied_hz >= 110.0 {
            RefreshRate::Hz120
        } else if implied_hz >= 80.0 {
            RefreshRate::Hz90
        } else {
            RefreshRate::Hz60
        }
    }
}

impl Serialize for RefreshRate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.hz())
    }
}

/// Raw hardware signals as reported by the host. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignals {
    /// Approximate device memory in GB.
    pub device_memory_gb: Option<f64>,
    /// Logical core count.
    pub hardware_concurrency: Option<u32>,
    /// Device pixel ratio of the primary display.
    pub device_pixel_ratio: Option<f64>,
    /// Free-text platform or device identifier.
    pub platform: Option<String>,
    /// Touch input available.
    pub touch: Option<bool>,
    /// Primary pointer is coarse (finger rather than mouse).
    pub coarse_pointer: Option<bool>,
}

impl DeviceSignals {
    /// Read the local machine. Anything that cannot be read stays `None`.
    pub fn from_environment() -> Self {
        let hardware_concurrency = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32);
        let device_memory_gb = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|contents| parse_meminfo_gb(&contents));

        Self {
            device_memory_gb,
            hardware_concurrency,
            device_pixel_ratio: None,
            platform: Some(std::env::consts::OS.to_string()),
            touch: None,
            coarse_pointer: None,
        }
    }

    pub fn memory_gb(&self) -> f64 {
        self.device_memory_gb
            .filter(|gb| gb.is_finite() && *gb > 0.0)
            .unwrap_or(DEFAULT_MEMORY_GB)
    }

    pub fn cores(&self) -> u32 {
        self.hardware_concurrency
            .filter(|cores| *cores > 0)
            .unwrap_or(DEFAULT_CORES)
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or(DEFAULT_PIXEL_RATIO)
    }

    /// Whether the platform identifier names a handheld device.
    pub fn is_mobile_platform(&self) -> bool {
        self.platform
            .as_deref()
            .map(|platform| {
                let platform = platform.to_lowercase();
                MOBILE_PLATFORM_MARKERS
                    .iter()
                    .any(|marker| platform.contains(marker))
            })
            .unwrap_or(false)
    }

    pub fn is_touch(&self) -> bool {
        self.touch.unwrap_or(false)
            || self.coarse_pointer.unwrap_or(false)
            || self.is_mobile_platform()
    }

    fn resolve(&self) -> ResolvedSignals {
        ResolvedSignals {
            memory_gb: self.memory_gb(),
            cores: self.cores(),
            is_touch: self.is_touch(),
        }
    }
}

/// Parse `MemTotal` from `/proc/meminfo` into a device-memory bucket.
fn parse_meminfo_gb(contents: &str) -> Option<f64> {
    let kib: f64 = contents
        .lines()
        .find(|line| line.starts_with("MemTotal:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()?;

    let gb = kib / (1024.0 * 1024.0);
    let bucket = MEMORY_BUCKETS_GB
        .iter()
        .copied()
        .find(|bucket| gb >= *bucket)
        .unwrap_or(MEMORY_BUCKETS_GB[MEMORY_BUCKETS_GB.len() - 1]);
    Some(bucket)
}

/// Signals with defaults applied; what the tier rules see.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSignals {
    pub memory_gb: f64,
    pub cores: u32,
    pub is_touch: bool,
}

/// One classification rule: the first matching rule decides the tier.
pub struct TierRule {
    pub name: &'static str,
    pub tier: DeviceTier,
    pub matches: fn(&ResolvedSignals) -> bool,
}

fn very_low_memory_or_cores(s: &ResolvedSignals) -> bool {
    s.memory_gb <= 2.0 || s.cores <= 2
}

fn low_memory_or_cores(s: &ResolvedSignals) -> bool {
    s.memory_gb < 4.0 || s.cores < 4 || (s.is_touch && s.memory_gb <= 4.0 && s.cores <= 4)
}

fn flagship_memory_and_cores(s: &ResolvedSignals) -> bool {
    s.memory_gb >= 8.0 && s.cores >= 8
}

fn high_memory_or_cores(s: &ResolvedSignals) -> bool {
    s.memory_gb >= 8.0 || s.cores >= 8 || (s.memory_gb >= 6.0 && s.cores >= 6)
}

/// Classification rules in evaluation order.
///
/// Low-end rules run before high-end ones, so a device with conflicting
/// signals (plenty of memory, two cores) lands in the conservative tier.
pub const TIER_RULES: &[TierRule] = &[
    TierRule {
        name: "very-low-memory-or-cores",
        tier: DeviceTier::VeryLow,
        matches: very_low_memory_or_cores,
    },
    TierRule {
        name: "low-memory-or-cores",
        tier: DeviceTier::Low,
        matches: low_memory_or_cores,
    },
    TierRule {
        name: "flagship-memory-and-cores",
        tier: DeviceTier::Flagship,
        matches: flagship_memory_and_cores,
    },
    TierRule {
        name: "high-memory-or-cores",
        tier: DeviceTier::High,
        matches: high_memory_or_cores,
    },
];

/// Tier used when no rule matches.
pub const FALLBACK_TIER: DeviceTier = DeviceTier::Mid;

/// First rule matching the signals, if any.
pub fn matching_rule(signals: &DeviceSignals) -> Option<&'static TierRule> {
    let resolved = signals.resolve();
    TIER_RULES.iter().find(|rule| (rule.matches)(&resolved))
}

/// Classify signals into a tier.
pub fn classify(signals: &DeviceSignals) -> DeviceTier {
    matching_rule(signals)
        .map(|rule| rule.tier)
        .unwrap_or(FALLBACK_TIER)
}

/// Cached classification result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub tier: DeviceTier,
    pub refresh_hz: RefreshRate,
    pub is_touch: bool,
    pub pixel_ratio_cap: f64,
}

impl DeviceProfile {
    /// Derived from the tier; not independently settable.
    pub fn is_low_end(&self) -> bool {
        self.tier.is_low_end()
    }

    pub fn ceilings(&self) -> TierCeilings {
        self.tier.ceilings()
    }
}

/// Owns the device classification and refresh measurement for one host.
pub struct DeviceProfiler {
    signals: DeviceSignals,
    profile: OnceLock<DeviceProfile>,
    refresh: OnceCell<RefreshRate>,
    sampling_passes: AtomicUsize,
    sample_frames: usize,
    sample_timeout: Duration,
}

impl DeviceProfiler {
    pub fn new(signals: DeviceSignals) -> Self {
        Self {
            signals,
            profile: OnceLock::new(),
            refresh: OnceCell::new(),
            sampling_passes: AtomicUsize::new(0),
            sample_frames: REFRESH_SAMPLE_FRAMES,
            sample_timeout: REFRESH_SAMPLE_TIMEOUT,
        }
    }

    /// Override how many intervals refresh detection samples and how long it
    /// may take.
    pub fn with_sampling(mut self, frames: usize, timeout: Duration) -> Self {
        self.sample_frames = frames.max(1);
        self.sample_timeout = timeout;
        self
    }

    pub fn signals(&self) -> &DeviceSignals {
        &self.signals
    }

    /// The cached profile. The refresh rate reads 60Hz until detection has
    /// resolved.
    pub fn profile(&self) -> DeviceProfile {
        let mut profile = *self.profile.get_or_init(|| self.classify_device());
        profile.refresh_hz = self.detected_refresh_rate().unwrap_or_default();
        profile
    }

    pub fn ceilings(&self) -> TierCeilings {
        self.profile().ceilings()
    }

    /// Drop the cached profile and refresh measurement and classify from new
    /// signals on next access.
    pub fn reinit(&mut self, signals: DeviceSignals) {
        self.signals = signals;
        self.profile = OnceLock::new();
        self.refresh = OnceCell::new();
        self.sampling_passes.store(0, Ordering::SeqCst);
    }

    /// Refresh rate if detection has already resolved.
    pub fn detected_refresh_rate(&self) -> Option<RefreshRate> {
        self.refresh.get().copied()
    }

    /// Number of sampling passes started since construction or `reinit`.
    pub fn sampling_passes(&self) -> usize {
        self.sampling_passes.load(Ordering::SeqCst)
    }

    /// Detect the display refresh rate from the frame ticker.
    ///
    /// Memoized. Concurrent callers wait on the pass already in flight; if the
    /// caller driving that pass is dropped, the next waiter starts over.
    pub async fn refresh_rate(&self, ticker: &FrameTicker) -> RefreshRate {
        self.refresh_rate_from(ticker.subscribe()).await
    }

    /// Like [`refresh_rate`](Self::refresh_rate), with an explicit frame
    /// subscription. The subscription is only consumed if this caller ends up
    /// running the sampling pass.
    pub async fn refresh_rate_from(&self, frames: broadcast::Receiver<FrameTick>) -> RefreshRate {
        *self
            .refresh
            .get_or_init(|| self.measure_refresh_rate(frames))
            .await
    }

    async fn measure_refresh_rate(&self, mut frames: broadcast::Receiver<FrameTick>) -> RefreshRate {
        let pass = self.sampling_passes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(pass, frames = self.sample_frames, "Sampling display refresh rate");

        let sampled = tokio::time::timeout(
            self.sample_timeout,
            sample_median_interval(&mut frames, self.sample_frames),
        )
        .await;

        match sampled {
            Ok(Some(median_ms)) => {
                let rate = RefreshRate::from_interval_ms(median_ms);
                info!(
                    median_ms,
                    hz = rate.hz(),
                    "Display refresh rate detected"
                );
                rate
            }
            Ok(None) => {
                warn!("Frame ticker closed during refresh sampling, assuming 60Hz");
                RefreshRate::Hz60
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.sample_timeout.as_millis() as u64,
                    "Refresh sampling did not complete in time, assuming 60Hz"
                );
                RefreshRate::Hz60
            }
        }
    }

    fn classify_device(&self) -> DeviceProfile {
        let rule = matching_rule(&self.signals);
        let tier = rule.map(|rule| rule.tier).unwrap_or(FALLBACK_TIER);
        let pixel_ratio_cap = self.signals.pixel_ratio().min(tier.ceilings().dpr_cap);

        let profile = DeviceProfile {
            tier,
            refresh_hz: RefreshRate::Hz60,
            is_touch: self.signals.is_touch(),
            pixel_ratio_cap,
        };

        info!(
            tier = %tier,
            rule = rule.map(|rule| rule.name).unwrap_or("fallback"),
            memory_gb = self.signals.memory_gb(),
            cores = self.signals.cores(),
            is_touch = profile.is_touch,
            pixel_ratio_cap,
            "Device classified"
        );
        profile
    }
}

/// Collect `count` consecutive inter-frame intervals and return their median.
///
/// Returns `None` if the ticker goes away first. A lagged subscription drops
/// the pending interval rather than measuring across the gap.
async fn sample_median_interval(
    frames: &mut broadcast::Receiver<FrameTick>,
    count: usize,
) -> Option<f64> {
    let mut window = FrameWindow::with_capacity(count);
    let mut previous: Option<f64> = None;

    while !window.is_full() {
        match frames.recv().await {
            Ok(tick) => {
                if let Some(prev) = previous {
                    let interval = tick.timestamp_ms - prev;
                    if interval.is_finite() && interval > 0.0 {
                        window.push(interval);
                    }
                }
                previous = Some(tick.timestamp_ms);
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Refresh sampling lagged behind the frame ticker");
                previous = None;
            }
            Err(RecvError::Closed) => return None,
        }
    }

    Some(window.median())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_clock::SyntheticFrames;

    fn signals(memory_gb: f64, cores: u32) -> DeviceSignals {
        DeviceSignals {
            device_memory_gb: Some(memory_gb),
            hardware_concurrency: Some(cores),
            ..DeviceSignals::default()
        }
    }

    /// Publish `count` synthetic frames once somebody is listening.
    async fn feed(ticker: &FrameTicker, frames: SyntheticFrames, count: usize) {
        while ticker.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        for timestamp in frames.take(count) {
            ticker.tick(timestamp);
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_flagship_classification() {
        assert_eq!(classify(&signals(8.0, 8)), DeviceTier::Flagship);
    }

    #[test]
    fn test_very_low_classification() {
        assert_eq!(classify(&signals(2.0, 2)), DeviceTier::VeryLow);
    }

    #[test]
    fn test_conservative_rules_take_precedence() {
        // Matches both the flagship memory bound and the very-low core bound.
        assert_eq!(classify(&signals(8.0, 2)), DeviceTier::VeryLow);
        assert_eq!(classify(&signals(1.0, 16)), DeviceTier::VeryLow);
        assert_eq!(classify(&signals(3.0, 12)), DeviceTier::Low);
    }

    #[test]
    fn test_remaining_tiers() {
        assert_eq!(classify(&signals(8.0, 6)), DeviceTier::High);
        assert_eq!(classify(&signals(6.0, 6)), DeviceTier::High);
        assert_eq!(classify(&signals(4.0, 4)), DeviceTier::Mid);
        assert_eq!(classify(&signals(4.0, 6)), DeviceTier::Mid);
    }

    #[test]
    fn test_absent_signals_use_defaults() {
        let desktop = DeviceSignals::default();
        assert_eq!(desktop.memory_gb(), DEFAULT_MEMORY_GB);
        assert_eq!(desktop.cores(), DEFAULT_CORES);
        assert_eq!(classify(&desktop), DeviceTier::Mid);

        // The same defaults on a touch device are treated as low end.
        let phone = DeviceSignals {
            touch: Some(true),
            ..DeviceSignals::default()
        };
        assert_eq!(classify(&phone), DeviceTier::Low);
    }

    #[test]
    fn test_garbage_signals_fall_back_to_defaults() {
        let garbage = DeviceSignals {
            device_memory_gb: Some(f64::NAN),
            hardware_concurrency: Some(0),
            device_pixel_ratio: Some(-2.0),
            ..DeviceSignals::default()
        };
        assert_eq!(garbage.memory_gb(), DEFAULT_MEMORY_GB);
        assert_eq!(garbage.cores(), DEFAULT_CORES);
        assert_eq!(garbage.pixel_ratio(), DEFAULT_PIXEL_RATIO);
    }

    #[test]
    fn test_touch_detection_sources() {
        let coarse = DeviceSignals {
            coarse_pointer: Some(true),
            ..DeviceSignals::default()
        };
        assert!(coarse.is_touch());

        let android = DeviceSignals {
            platform: Some("Linux; Android 14; Pixel 8".to_string()),
            ..DeviceSignals::default()
        };
        assert!(android.is_touch());

        let desktop = DeviceSignals {
            platform: Some("Win32".to_string()),
            touch: Some(false),
            ..DeviceSignals::default()
        };
        assert!(!desktop.is_touch());
    }

    #[test]
    fn test_parse_meminfo_buckets() {
        let meminfo = "MemTotal:       16303744 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_meminfo_gb(meminfo), Some(8.0));

        let small = "MemTotal:        3000000 kB\n";
        assert_eq!(parse_meminfo_gb(small), Some(2.0));

        assert_eq!(parse_meminfo_gb("nothing here"), None);
    }

    #[test]
    fn test_profile_is_cached_until_reinit() {
        let mut profiler = DeviceProfiler::new(DeviceSignals {
            device_pixel_ratio: Some(3.0),
            ..signals(8.0, 8)
        });

        let profile = profiler.profile();
        assert_eq!(profile.tier, DeviceTier::Flagship);
        assert_eq!(profile.pixel_ratio_cap, 2.5);
        assert_eq!(profile.refresh_hz, RefreshRate::Hz60);
        assert!(!profile.is_low_end());
        assert_eq!(profiler.profile(), profile);

        profiler.reinit(signals(2.0, 2));
        let profile = profiler.profile();
        assert_eq!(profile.tier, DeviceTier::VeryLow);
        assert!(profile.is_low_end());
        assert_eq!(profile.pixel_ratio_cap, 1.0);
    }

    #[test]
    fn test_refresh_rate_classification() {
        assert_eq!(RefreshRate::from_interval_ms(8.33), RefreshRate::Hz120);
        assert_eq!(RefreshRate::from_interval_ms(11.1), RefreshRate::Hz90);
        assert_eq!(RefreshRate::from_interval_ms(16.7), RefreshRate::Hz60);
        assert_eq!(RefreshRate::from_interval_ms(0.0), RefreshRate::Hz60);
        assert_eq!(RefreshRate::from_interval_ms(f64::NAN), RefreshRate::Hz60);
    }

    #[tokio::test]
    async fn test_detects_120hz() {
        let profiler = DeviceProfiler::new(DeviceSignals::default());
        let ticker = FrameTicker::new();

        let (rate, _) = tokio::join!(
            profiler.refresh_rate(&ticker),
            feed(&ticker, SyntheticFrames::steady(8.33), 40),
        );

        assert_eq!(rate, RefreshRate::Hz120);
        assert_eq!(profiler.profile().refresh_hz, RefreshRate::Hz120);
    }

    #[tokio::test]
    async fn test_detects_90hz() {
        let profiler = DeviceProfiler::new(DeviceSignals::default());
        let ticker = FrameTicker::new();

        let (rate, _) = tokio::join!(
            profiler.refresh_rate(&ticker),
            feed(&ticker, SyntheticFrames::steady(11.1), 40),
        );

        assert_eq!(rate, RefreshRate::Hz90);
    }

    #[tokio::test]
    async fn test_median_ignores_hitches() {
        let profiler = DeviceProfiler::new(DeviceSignals::default());
        let ticker = FrameTicker::new();
        let frames = SyntheticFrames::scripted(vec![16.6, 16.7, 16.8, 50.0]);

        let (rate, _) = tokio::join!(profiler.refresh_rate(&ticker), feed(&ticker, frames, 40));

        assert_eq!(rate, RefreshRate::Hz60);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_sampling_pass() {
        let profiler = DeviceProfiler::new(DeviceSignals::default());
        let ticker = FrameTicker::new();

        let (first, second, _) = tokio::join!(
            profiler.refresh_rate(&ticker),
            profiler.refresh_rate(&ticker),
            feed(&ticker, SyntheticFrames::at_hz(120.0), 40),
        );

        assert_eq!(first, RefreshRate::Hz120);
        assert_eq!(second, RefreshRate::Hz120);
        assert_eq!(profiler.sampling_passes(), 1);

        // Memoized: resolves without any further frames.
        assert_eq!(profiler.refresh_rate(&ticker).await, RefreshRate::Hz120);
        assert_eq!(profiler.sampling_passes(), 1);
    }

    #[tokio::test]
    async fn test_no_frames_times_out_to_60hz() {
        let profiler = DeviceProfiler::new(DeviceSignals::default())
            .with_sampling(REFRESH_SAMPLE_FRAMES, Duration::from_millis(50));
        let ticker = FrameTicker::new();

        assert_eq!(profiler.refresh_rate(&ticker).await, RefreshRate::Hz60);
        assert_eq!(profiler.detected_refresh_rate(), Some(RefreshRate::Hz60));
        assert_eq!(profiler.sampling_passes(), 1);
    }

    #[tokio::test]
    async fn test_ticker_teardown_resolves_to_60hz() {
        let profiler = DeviceProfiler::new(DeviceSignals::default());
        let ticker = FrameTicker::new();
        let frames = ticker.subscribe();
        for timestamp in SyntheticFrames::at_hz(120.0).take(5) {
            ticker.tick(timestamp);
        }
        drop(ticker);

        assert_eq!(profiler.refresh_rate_from(frames).await, RefreshRate::Hz60);
    }

    #[tokio::test]
    async fn test_reinit_allows_a_new_measurement() {
        let mut profiler = DeviceProfiler::new(DeviceSignals::default())
            .with_sampling(REFRESH_SAMPLE_FRAMES, Duration::from_millis(200));
        let ticker = FrameTicker::new();
        assert_eq!(profiler.refresh_rate(&ticker).await, RefreshRate::Hz60);

        profiler.reinit(DeviceSignals::default());
        assert!(profiler.detected_refresh_rate().is_none());
        assert_eq!(profiler.sampling_passes(), 0);

        let (rate, _) = tokio::join!(
            profiler.refresh_rate(&ticker),
            feed(&ticker, SyntheticFrames::at_hz(90.0), 40),
        );
        assert_eq!(rate, RefreshRate::Hz90);
    }
}
