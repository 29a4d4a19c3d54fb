//! Repeater configuration
//!
//! One explicit [`RepeaterConfig`] value is loaded at startup and each
//! component is constructed from its own section. Values outside their safe
//! range are never fatal: [`RepeaterConfig::sanitize`] replaces them with the
//! default and logs a warning, keeping the repeater on the air.

use crate::audio::sequence::{KENWOOD_TONES_HZ, PIP_FREQUENCY_HZ};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Allowed volume range
pub const VOLUME_RANGE: std::ops::RangeInclusive<f64> = 0.1..=1.0;

/// Allowed roger-beep duration range (ms)
pub const BEEP_DURATION_RANGE: std::ops::RangeInclusive<u32> = 50..=1000;

/// Allowed tone frequency range (Hz)
pub const TONE_FREQUENCY_RANGE: std::ops::RangeInclusive<f64> = 100.0..=4000.0;

/// Allowed sample rate range (Hz)
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8000..=192_000;

/// Allowed DTMF window size range (samples, power of two)
pub const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<usize> = 256..=8192;

/// Audio input settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz for capture and synthesis
    pub sample_rate: u32,
    /// Envelope level that marks an incoming carrier
    pub carrier_threshold: f32,
    /// Quiet time before the channel is considered free
    pub carrier_hang_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            carrier_threshold: 0.02,
            carrier_hang_ms: 1500,
        }
    }
}

/// DTMF decoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtmfConfig {
    /// Analysis window in samples
    pub window_size: usize,
    /// Peak magnitude threshold (normalized; peaks must exceed 1.5×)
    pub threshold: f32,
    /// Minimum window RMS before running the FFT
    pub min_signal_level: f32,
    /// Identical consecutive detections required to confirm
    pub required_count: u32,
    /// Minimum weaker/stronger tone magnitude ratio
    pub purity_ratio: f32,
    /// Suppress re-confirming the same digit within this time
    pub cooldown_ms: u64,
    /// Clear all state after this long without a tone
    pub cleanup_interval_ms: u64,
}

impl Default for DtmfConfig {
    fn default() -> Self {
        Self {
            window_size: crate::DEFAULT_WINDOW_SIZE,
            threshold: 0.02,
            min_signal_level: 0.01,
            required_count: 3,
            purity_ratio: 0.3,
            cooldown_ms: 800,
            cleanup_interval_ms: 2000,
        }
    }
}

/// Roger-beep feature settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RogerBeepConfig {
    pub enabled: bool,
    /// Volume (0.1 to 1.0)
    pub volume: f64,
    /// Total beep length in ms (50 to 1000)
    pub duration_ms: u32,
    /// Wait after the carrier drops before beeping
    pub delay_ms: u64,
    /// Three descending tones
    pub tones_hz: [f64; 3],
}

impl Default for RogerBeepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.7,
            duration_ms: 250,
            delay_ms: 0,
            tones_hz: KENWOOD_TONES_HZ,
        }
    }
}

/// Beacon feature settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalizaConfig {
    pub enabled: bool,
    /// Informational only: firing is always aligned to the top of the hour
    pub interval_minutes: u32,
    /// Pip tone frequency
    pub tone_hz: f64,
    /// Volume (0.1 to 1.0)
    pub volume: f64,
    /// Delay before retrying a firing that could not transmit
    pub retry_delay_secs: u64,
}

impl Default for BalizaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 60,
            tone_hz: PIP_FREQUENCY_HZ,
            volume: 0.7,
            retry_delay_secs: 30,
        }
    }
}

/// Channel gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// How often a waiting module re-checks the channel
    pub poll_interval_ms: u64,
    /// How long a module waits for the channel before giving up
    pub acquire_timeout_ms: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            acquire_timeout_ms: 30_000,
        }
    }
}

/// Complete repeater configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeaterConfig {
    pub audio: AudioConfig,
    pub dtmf: DtmfConfig,
    pub roger_beep: RogerBeepConfig,
    pub baliza: BalizaConfig,
    pub arbiter: ArbiterConfig,
}

/// A value that was out of range and replaced with its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCorrection {
    pub field: &'static str,
    pub value: String,
    pub replacement: String,
}

/// Collects corrections while sanitizing
#[derive(Default)]
struct Corrector {
    corrections: Vec<ConfigCorrection>,
}

impl Corrector {
    fn check<T>(&mut self, field: &'static str, value: &mut T, default: T, valid: bool)
    where
        T: std::fmt::Debug,
    {
        if valid {
            return;
        }
        tracing::warn!(
            field,
            value = ?value,
            replacement = ?default,
            "config_value_out_of_range"
        );
        self.corrections.push(ConfigCorrection {
            field,
            value: format!("{:?}", value),
            replacement: format!("{:?}", default),
        });
        *value = default;
    }
}

impl RogerBeepConfig {
    /// Replace out-of-range roger-beep values with their defaults
    pub fn sanitize(&mut self) -> Vec<ConfigCorrection> {
        let mut c = Corrector::default();

        let roger = RogerBeepConfig::default();
        let valid = VOLUME_RANGE.contains(&self.volume);
        c.check("roger_beep.volume", &mut self.volume, roger.volume, valid);
        let valid = BEEP_DURATION_RANGE.contains(&self.duration_ms);
        c.check(
            "roger_beep.duration_ms",
            &mut self.duration_ms,
            roger.duration_ms,
            valid,
        );
        let valid = self.delay_ms <= 5000;
        c.check("roger_beep.delay_ms", &mut self.delay_ms, roger.delay_ms, valid);
        let valid = self
            .tones_hz
            .iter()
            .all(|f| TONE_FREQUENCY_RANGE.contains(f));
        c.check("roger_beep.tones_hz", &mut self.tones_hz, roger.tones_hz, valid);

        c.corrections
    }
}

impl BalizaConfig {
    /// Replace out-of-range beacon values with their defaults
    pub fn sanitize(&mut self) -> Vec<ConfigCorrection> {
        let mut c = Corrector::default();

        let baliza = BalizaConfig::default();
        let valid = (1..=1440).contains(&self.interval_minutes);
        c.check(
            "baliza.interval_minutes",
            &mut self.interval_minutes,
            baliza.interval_minutes,
            valid,
        );
        let valid = TONE_FREQUENCY_RANGE.contains(&self.tone_hz);
        c.check("baliza.tone_hz", &mut self.tone_hz, baliza.tone_hz, valid);
        let valid = VOLUME_RANGE.contains(&self.volume);
        c.check("baliza.volume", &mut self.volume, baliza.volume, valid);
        let valid = (1..=3600).contains(&self.retry_delay_secs);
        c.check(
            "baliza.retry_delay_secs",
            &mut self.retry_delay_secs,
            baliza.retry_delay_secs,
            valid,
        );

        c.corrections
    }
}

impl RepeaterConfig {
    /// Load config from disk, falling back to defaults on any error
    ///
    /// The loaded value is sanitized before it is returned.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        };
        config.sanitize();
        config
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Replace every out-of-range value with its default
    ///
    /// Returns the corrections that were applied (each is also logged).
    pub fn sanitize(&mut self) -> Vec<ConfigCorrection> {
        let mut c = Corrector::default();

        let audio = AudioConfig::default();
        let valid = SAMPLE_RATE_RANGE.contains(&self.audio.sample_rate);
        c.check("audio.sample_rate", &mut self.audio.sample_rate, audio.sample_rate, valid);
        let valid = self.audio.carrier_threshold > 0.0 && self.audio.carrier_threshold <= 1.0;
        c.check(
            "audio.carrier_threshold",
            &mut self.audio.carrier_threshold,
            audio.carrier_threshold,
            valid,
        );
        let valid = self.audio.carrier_hang_ms <= 10_000;
        c.check(
            "audio.carrier_hang_ms",
            &mut self.audio.carrier_hang_ms,
            audio.carrier_hang_ms,
            valid,
        );

        let dtmf = DtmfConfig::default();
        let valid = WINDOW_SIZE_RANGE.contains(&self.dtmf.window_size)
            && self.dtmf.window_size.is_power_of_two();
        c.check("dtmf.window_size", &mut self.dtmf.window_size, dtmf.window_size, valid);
        let valid = self.dtmf.threshold > 0.0 && self.dtmf.threshold <= 1.0;
        c.check("dtmf.threshold", &mut self.dtmf.threshold, dtmf.threshold, valid);
        let valid = (0.0..1.0).contains(&self.dtmf.min_signal_level);
        c.check(
            "dtmf.min_signal_level",
            &mut self.dtmf.min_signal_level,
            dtmf.min_signal_level,
            valid,
        );
        let valid = (1..=10).contains(&self.dtmf.required_count);
        c.check(
            "dtmf.required_count",
            &mut self.dtmf.required_count,
            dtmf.required_count,
            valid,
        );
        let valid = self.dtmf.purity_ratio > 0.0 && self.dtmf.purity_ratio <= 1.0;
        c.check("dtmf.purity_ratio", &mut self.dtmf.purity_ratio, dtmf.purity_ratio, valid);
        let valid = self.dtmf.cooldown_ms <= 10_000;
        c.check("dtmf.cooldown_ms", &mut self.dtmf.cooldown_ms, dtmf.cooldown_ms, valid);
        let valid = (100..=60_000).contains(&self.dtmf.cleanup_interval_ms);
        c.check(
            "dtmf.cleanup_interval_ms",
            &mut self.dtmf.cleanup_interval_ms,
            dtmf.cleanup_interval_ms,
            valid,
        );

        c.corrections.extend(self.roger_beep.sanitize());
        c.corrections.extend(self.baliza.sanitize());

        let arbiter = ArbiterConfig::default();
        let valid = (10..=5000).contains(&self.arbiter.poll_interval_ms);
        c.check(
            "arbiter.poll_interval_ms",
            &mut self.arbiter.poll_interval_ms,
            arbiter.poll_interval_ms,
            valid,
        );
        let valid = self.arbiter.acquire_timeout_ms <= 600_000;
        c.check(
            "arbiter.acquire_timeout_ms",
            &mut self.arbiter.acquire_timeout_ms,
            arbiter.acquire_timeout_ms,
            valid,
        );

        c.corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepeaterConfig::default();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.dtmf.window_size, 2048);
        assert_eq!(config.dtmf.required_count, 3);
        assert_eq!(config.roger_beep.tones_hz, [1500.0, 1200.0, 1000.0]);
        assert_eq!(config.baliza.retry_delay_secs, 30);
        assert_eq!(config.arbiter.poll_interval_ms, 500);
    }

    #[test]
    fn test_defaults_need_no_correction() {
        let mut config = RepeaterConfig::default();
        assert!(config.sanitize().is_empty());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: RepeaterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RepeaterConfig::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"roger_beep": {"volume": 0.5}, "baliza": {"enabled": true}}"#;
        let config: RepeaterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.roger_beep.volume, 0.5);
        assert_eq!(config.roger_beep.duration_ms, 250);
        assert!(config.baliza.enabled);
        assert_eq!(config.baliza.tone_hz, 1000.0);
    }

    #[test]
    fn test_out_of_range_replaced_with_default() {
        let mut config = RepeaterConfig::default();
        config.roger_beep.volume = 3.0;
        config.roger_beep.duration_ms = 20;
        config.baliza.volume = 0.0;
        config.dtmf.window_size = 1000;

        let corrections = config.sanitize();
        let fields: Vec<&str> = corrections.iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec![
                "dtmf.window_size",
                "roger_beep.volume",
                "roger_beep.duration_ms",
                "baliza.volume"
            ]
        );
        assert_eq!(config.roger_beep.volume, 0.7);
        assert_eq!(config.roger_beep.duration_ms, 250);
        assert_eq!(config.baliza.volume, 0.7);
        assert_eq!(config.dtmf.window_size, 2048);
        assert_eq!(corrections[1].value, "3.0");
        assert_eq!(corrections[1].replacement, "0.7");
    }

    #[test]
    fn test_section_sanitize_stands_alone() {
        let mut roger = RogerBeepConfig {
            volume: 0.0,
            duration_ms: 9000,
            ..RogerBeepConfig::default()
        };
        let fields: Vec<&str> = roger.sanitize().iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["roger_beep.volume", "roger_beep.duration_ms"]);
        assert_eq!(roger, RogerBeepConfig::default());

        let mut baliza = BalizaConfig {
            enabled: true,
            tone_hz: 20.0,
            ..BalizaConfig::default()
        };
        assert_eq!(baliza.sanitize().len(), 1);
        assert_eq!(baliza.tone_hz, 1000.0);
        assert!(baliza.enabled);
    }

    #[test]
    fn test_bad_tone_resets_all_tones() {
        let mut config = RepeaterConfig::default();
        config.roger_beep.tones_hz = [1500.0, 20.0, 1000.0];
        config.sanitize();
        assert_eq!(config.roger_beep.tones_hz, KENWOOD_TONES_HZ);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("repeater.json");

        let mut config = RepeaterConfig::default();
        config.baliza.enabled = true;
        config.dtmf.required_count = 4;
        config.save(&path).unwrap();

        let loaded = RepeaterConfig::load(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repeater.json");
        std::fs::write(&path, r#"{"roger_beep": {"duration_ms": 5000}}"#).unwrap();

        let loaded = RepeaterConfig::load(&path);
        assert_eq!(loaded.roger_beep.duration_ms, 250);
    }

    #[test]
    fn test_load_missing_or_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            RepeaterConfig::load(&dir.path().join("absent.json")),
            RepeaterConfig::default()
        );

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(RepeaterConfig::load(&path), RepeaterConfig::default());
    }
}
