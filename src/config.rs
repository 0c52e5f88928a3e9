//! Configuration module for persistent settings.
//!
//! This module handles loading, saving, and validating governor configuration.

use crate::error::ConfigError;
use crate::performance_governor::PerformanceBase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_SAMPLE_FRAMES: usize = 3;
pub const MAX_SAMPLE_FRAMES: usize = 240;
pub const MIN_REFRESH_TIMEOUT_MS: u64 = 100;
pub const MIN_DECISION_INTERVAL_MS: u64 = 16;
pub const MAX_DECISION_INTERVAL_MS: u64 = 5000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// User-selected quality preset layered over the device tier base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    /// Tier defaults.
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

impl QualityPreset {
    /// Scale a tier base by this preset.
    pub fn apply(&self, base: PerformanceBase) -> PerformanceBase {
        match self {
            QualityPreset::Auto | QualityPreset::High => base,
            QualityPreset::Medium => PerformanceBase {
                pixel_ratio: base.pixel_ratio.min(1.5),
                particle_intensity: base.particle_intensity * 0.8,
                bot_count: scale_count(base.bot_count, 0.8),
                food_count: scale_count(base.food_count, 0.8),
            },
            QualityPreset::Low => PerformanceBase {
                pixel_ratio: 1.0,
                particle_intensity: base.particle_intensity * 0.5,
                bot_count: scale_count(base.bot_count, 0.6),
                food_count: scale_count(base.food_count, 0.6),
            },
        }
    }
}

fn scale_count(count: u32, factor: f64) -> u32 {
    (count as f64 * factor).round() as u32
}

/// Governor configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub quality: QualityPreset,
    /// Frame intervals sampled for refresh-rate detection.
    pub refresh_sample_frames: usize,
    pub refresh_timeout_ms: u64,
    /// Period of the governor decision loop.
    pub decision_interval_ms: u64,
    /// Run the governor on non-touch hosts too.
    pub force_governor: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Auto,
            refresh_sample_frames: 30,
            refresh_timeout_ms: 2000,
            decision_interval_ms: 250,
            force_governor: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SAMPLE_FRAMES..=MAX_SAMPLE_FRAMES).contains(&self.refresh_sample_frames) {
            return Err(ConfigError::ValidationError(format!(
                "refresh_sample_frames ({}) must be between {} and {}",
                self.refresh_sample_frames, MIN_SAMPLE_FRAMES, MAX_SAMPLE_FRAMES
            )));
        }

        if self.refresh_timeout_ms < MIN_REFRESH_TIMEOUT_MS {
            return Err(ConfigError::ValidationError(format!(
                "refresh_timeout_ms ({}) must be at least {}ms",
                self.refresh_timeout_ms, MIN_REFRESH_TIMEOUT_MS
            )));
        }

        if !(MIN_DECISION_INTERVAL_MS..=MAX_DECISION_INTERVAL_MS)
            .contains(&self.decision_interval_ms)
        {
            return Err(ConfigError::ValidationError(format!(
                "decision_interval_ms ({}) must be between {} and {}",
                self.decision_interval_ms, MIN_DECISION_INTERVAL_MS, MAX_DECISION_INTERVAL_MS
            )));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level ({}) must be one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn decision_interval(&self) -> Duration {
        Duration::from_millis(self.decision_interval_ms)
    }
}

/// Configuration manager with file I/O.
pub struct ConfigManager {
    config: Config,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                ConfigError::ParseError(format!("Failed to read config file: {}", e))
            })?;

            let config: Config = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

            config.validate()?;
            config
        } else {
            Config::default()
        };

        Ok(Self {
            config,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling temp file, then rename over the target.
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Write the current configuration out if no file exists yet.
    ///
    /// Returns `true` when a file was written. An existing file is never
    /// touched, so hand edits survive restarts.
    pub fn save_if_missing(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Get current configuration.
    pub fn get(&self) -> Config {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default config path (`<config dir>/frame-governor/config.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("frame-governor")
            .join("config.json")
    }
}

impl Serialize for QualityPreset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            QualityPreset::Auto => "auto",
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for QualityPreset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "auto" => Ok(QualityPreset::Auto),
            "low" => Ok(QualityPreset::Low),
            "medium" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            _ => Err(serde::de::Error::custom(format!(
                "invalid quality preset: {}, expected one of: auto, low, medium, high",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn flagship_base() -> PerformanceBase {
        PerformanceBase {
            pixel_ratio: 2.0,
            particle_intensity: 1.0,
            bot_count: 18,
            food_count: 500,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.quality, QualityPreset::Auto);
        assert_eq!(config.refresh_sample_frames, 30);
        assert_eq!(config.refresh_timeout(), Duration::from_secs(2));
        assert_eq!(config.decision_interval(), Duration::from_millis(250));
        assert!(!config.force_governor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_manager_load_nonexistent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");

        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert_eq!(manager.get(), Config::default());
    }

    fn manager_with(path: &Path, config: Config) -> ConfigManager {
        ConfigManager {
            config,
            path: path.to_path_buf(),
        }
    }

    #[test]
    fn test_config_manager_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            quality: QualityPreset::Medium,
            decision_interval_ms: 500,
            force_governor: true,
            ..Config::default()
        };
        manager_with(&path, config.clone()).save().unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = ConfigManager::load_or_default(&path).unwrap();
        assert_eq!(reloaded.get(), config);
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let invalid = Config {
            refresh_timeout_ms: 10,
            ..Config::default()
        };
        let result = manager_with(&path, invalid).save();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_first_run_writes_defaults_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame-governor").join("config.json");

        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert!(manager.save_if_missing().unwrap());
        assert!(path.exists());
        assert_eq!(
            ConfigManager::load_or_default(&path).unwrap().get(),
            Config::default()
        );

        // A hand-edited file is left alone on the next start.
        fs::write(&path, r#"{"quality":"high"}"#).unwrap();
        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert!(!manager.save_if_missing().unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"quality":"high"}"#);
        assert_eq!(manager.get().quality, QualityPreset::High);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"quality":"low"}"#).unwrap();

        let config = ConfigManager::load_or_default(&path).unwrap().get();
        assert_eq!(config.quality, QualityPreset::Low);
        assert_eq!(config.refresh_sample_frames, 30);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let result = ConfigManager::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_quality_deserialization() {
        let json = r#"{"quality":"ultra"}"#;
        let err = serde_json::from_str::<Config>(json).unwrap_err().to_string();
        assert!(err.contains("invalid quality preset"));
    }

    #[test]
    fn test_log_level_validation() {
        let config = Config {
            log_level: "DEBUG".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            log_level: "verbose".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_scale_base() {
        let base = flagship_base();
        assert_eq!(QualityPreset::Auto.apply(base), base);
        assert_eq!(QualityPreset::High.apply(base), base);

        let medium = QualityPreset::Medium.apply(base);
        assert_eq!(medium.pixel_ratio, 1.5);
        assert!((medium.particle_intensity - 0.8).abs() < 1e-9);
        assert_eq!(medium.bot_count, 14);
        assert_eq!(medium.food_count, 400);

        let low = QualityPreset::Low.apply(base);
        assert_eq!(low.pixel_ratio, 1.0);
        assert_eq!(low.particle_intensity, 0.5);
        assert_eq!(low.bot_count, 11);
        assert_eq!(low.food_count, 300);
    }

    fn quality_strategy() -> impl Strategy<Value = QualityPreset> {
        prop_oneof![
            Just(QualityPreset::Auto),
            Just(QualityPreset::Low),
            Just(QualityPreset::Medium),
            Just(QualityPreset::High),
        ]
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            quality_strategy(),
            MIN_SAMPLE_FRAMES..=MAX_SAMPLE_FRAMES,
            MIN_REFRESH_TIMEOUT_MS..=10_000u64,
            MIN_DECISION_INTERVAL_MS..=MAX_DECISION_INTERVAL_MS,
            any::<bool>(),
            prop::sample::select(LOG_LEVELS.to_vec()),
        )
            .prop_map(
                |(quality, frames, timeout, interval, force_governor, level)| Config {
                    quality,
                    refresh_sample_frames: frames,
                    refresh_timeout_ms: timeout,
                    decision_interval_ms: interval,
                    force_governor,
                    log_level: level.to_string(),
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_file_round_trip(config in valid_config_strategy()) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("config.json");

            manager_with(&path, config.clone()).save().unwrap();

            let loaded = ConfigManager::load_or_default(&path).unwrap().get();
            prop_assert_eq!(config, loaded);
        }

        #[test]
        fn prop_config_validation_rejects_out_of_range_sample_frames(
            frames in prop_oneof![0usize..MIN_SAMPLE_FRAMES, (MAX_SAMPLE_FRAMES + 1)..1000usize],
        ) {
            let config = Config { refresh_sample_frames: frames, ..Config::default() };
            if let Err(ConfigError::ValidationError(msg)) = config.validate() {
                prop_assert!(msg.contains("refresh_sample_frames"));
            } else {
                prop_assert!(false, "Should be ValidationError");
            }
        }

        #[test]
        fn prop_config_validation_rejects_out_of_range_interval(
            interval in prop_oneof![0u64..MIN_DECISION_INTERVAL_MS, (MAX_DECISION_INTERVAL_MS + 1)..100_000u64],
        ) {
            let config = Config { decision_interval_ms: interval, ..Config::default() };
            if let Err(ConfigError::ValidationError(msg)) = config.validate() {
                prop_assert!(msg.contains("decision_interval_ms"));
            } else {
                prop_assert!(false, "Should be ValidationError");
            }
        }

        // Presets never raise any lever above the tier base.
        #[test]
        fn prop_presets_never_exceed_base(
            quality in quality_strategy(),
            pixel_ratio in 1.0f64..3.0,
            intensity in 0.0f64..=1.0,
            bots in 0u32..50,
            food in 0u32..1000,
        ) {
            let base = PerformanceBase {
                pixel_ratio,
                particle_intensity: intensity,
                bot_count: bots,
                food_count: food,
            };
            let scaled = quality.apply(base);
            prop_assert!(scaled.pixel_ratio <= base.pixel_ratio);
            prop_assert!(scaled.particle_intensity <= base.particle_intensity);
            prop_assert!(scaled.bot_count <= base.bot_count);
            prop_assert!(scaled.food_count <= base.food_count);
        }
    }
}
