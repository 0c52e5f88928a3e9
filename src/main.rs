//! frame-governor headless harness.
//!
//! Runs the governance context against a synthetic 60Hz display and a
//! minimal simulation loop, logging every lever the governor pushes out.

use frame_governor::collaborators::{
    AsymptoticPopulation, Collaborators, ParticleSystem, Renderer, UiScheduler,
};
use frame_governor::config::{Config, ConfigManager};
use frame_governor::device_profiler::DeviceSignals;
use frame_governor::error::AppError;
use frame_governor::frame_clock::{FrameTicker, SyntheticFrames};
use frame_governor::frame_monitor::QualityTier;
use frame_governor::logging;
use frame_governor::performance_governor::RuntimeMetrics;
use frame_governor::GovernanceContext;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Cadence of the synthetic display.
const SYNTHETIC_REFRESH_HZ: f64 = 60.0;

/// Graceful shutdown timeout in seconds.
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = ConfigManager::default_path();
    let config_manager = ConfigManager::load_or_default(&config_path)?;
    let config = config_manager.get();

    let _log_guard = logging::init_logging(&config.log_level).map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!(path = ?config_path, "frame-governor harness starting");

    match config_manager.save_if_missing() {
        Ok(true) => info!(path = ?config_manager.path(), "Wrote default configuration"),
        Ok(false) => {}
        Err(e) => warn!("Failed to write default configuration: {}", e),
    }

    let result = run(config).await;

    match &result {
        Ok(()) => info!("frame-governor harness shut down gracefully"),
        Err(e) => error!("frame-governor harness error: {}", e),
    }

    result
}

async fn run(config: Config) -> Result<(), AppError> {
    let mut context = GovernanceContext::new(DeviceSignals::from_environment(), &config);
    let ticker = FrameTicker::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let frame_handle = tokio::spawn(run_frame_source(ticker.clone(), shutdown_rx.clone()));

    let refresh = context.detect_refresh_rate(&ticker).await;
    context.start_monitor(&ticker);

    let profile = context.profile();
    info!(
        tier = %profile.tier,
        refresh_hz = refresh.hz(),
        is_touch = profile.is_touch,
        governed = context.governor().is_enabled(),
        quality = ?context.quality(),
        "Governance context ready"
    );

    run_decision_loop(&mut context, &config, shutdown_rx).await;

    context.stop_monitor();
    let telemetry = context.telemetry().snapshot();
    info!(
        ticks = telemetry.ticks,
        decisions_emitted = telemetry.decisions_emitted,
        escalations = telemetry.escalations,
        deescalations = telemetry.deescalations,
        uptime_sec = telemetry.uptime_sec,
        "Governor telemetry at shutdown"
    );

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    match tokio::time::timeout(shutdown_timeout, frame_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(AppError::Runtime(format!("frame source failed: {}", e))),
        Err(_) => warn!("Frame source did not stop within the shutdown timeout"),
    }

    Ok(())
}

/// Publish synthetic frames on the ticker in real time until shutdown.
async fn run_frame_source(ticker: FrameTicker, mut shutdown_rx: watch::Receiver<bool>) {
    let start = Instant::now();

    for timestamp_ms in SyntheticFrames::at_hz(SYNTHETIC_REFRESH_HZ) {
        let deadline = start + Duration::from_secs_f64(timestamp_ms / 1000.0);
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                ticker.tick(timestamp_ms);
            }
        }
    }

    info!("Frame source stopped");
}

/// Fixed-interval simulation loop feeding monitor fps into the governor.
async fn run_decision_loop(
    context: &mut GovernanceContext,
    config: &Config,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.decision_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let base = *context.governor().base();
    let mut population = AsymptoticPopulation::new(base.bot_count, base.food_count);
    let mut renderer = LogRenderer;
    let mut particles = LogParticles;
    let mut ui = LogUiScheduler;
    let mut applied_quality: Option<QualityTier> = None;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Decision loop shutting down");
                    break;
                }
            }
            _ = interval.tick() => {
                let started = Instant::now();
                population.step();
                let update_ms = started.elapsed().as_secs_f64() * 1000.0;

                // No fps until the monitor has closed its first window.
                let frame = context.monitor().metrics();
                if frame.current <= 0.0 {
                    continue;
                }

                let metrics = RuntimeMetrics {
                    fps: frame.current,
                    update_ms,
                    render_ms: 0.0,
                    dropped_steps: 0,
                };

                let mut collaborators = Collaborators {
                    renderer: &mut renderer,
                    particles: &mut particles,
                    spawner: &mut population,
                    ui: Some(&mut ui),
                };

                if context.governor().is_enabled() {
                    if let Some(decision) = context.decide(metrics) {
                        decision.apply(&mut collaborators);
                    }
                } else {
                    // Ungoverned hosts follow the monitor's quality ladder.
                    let quality = context.monitor().quality_tier();
                    if applied_quality != Some(quality) {
                        context.monitor().apply_settings(&mut collaborators);
                        applied_quality = Some(quality);
                    }
                }
            }
        }
    }
}

struct LogRenderer;

impl Renderer for LogRenderer {
    fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        info!(pixel_ratio, "Renderer pixel ratio");
    }
}

struct LogParticles;

impl ParticleSystem for LogParticles {
    fn set_enabled(&mut self, enabled: bool) {
        info!(enabled, "Particles enabled");
    }

    fn set_intensity(&mut self, intensity: f64) {
        info!(intensity, "Particle intensity");
    }
}

struct LogUiScheduler;

impl UiScheduler for LogUiScheduler {
    fn set_min_interval_ms(&mut self, interval_ms: u32) {
        info!(interval_ms, "UI redraw interval");
    }
}

/// Set up signal handlers for graceful shutdown on SIGTERM and SIGINT.
#[cfg(unix)]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

#[cfg(not(unix))]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
