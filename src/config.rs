use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::montage::MontageError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rates must be positive (native {native} Hz, processing {processing} Hz)")]
    NonPositiveRate { native: f32, processing: f32 },
    #[error("processing rate {processing} Hz exceeds native rate {native} Hz")]
    RateOrder { native: f32, processing: f32 },
    #[error("target band [{lo}, {hi}] Hz must lie within [0, {nyquist}) Hz")]
    BandOutOfRange { lo: f32, hi: f32, nyquist: f32 },
    #[error("window length {win_len} must be in [1, ring length {ring_len}]")]
    WindowLength { win_len: usize, ring_len: usize },
    #[error("FFT size {n_fft} must be at least the window length {win_len}")]
    FftTooSmall { n_fft: usize, win_len: usize },
    #[error("minimum trigger interval must be positive, got {0} s")]
    NonPositiveInterval(f64),
    #[error("delay settings must be non-negative (delay {delay_ms} ms, tolerance {tolerance_ms} ms)")]
    NegativeDelay { delay_ms: f32, tolerance_ms: f32 },
    #[error(transparent)]
    Montage(#[from] MontageError),
}

/// Closed-loop engine parameters. Immutable after engine construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Channel count of the acquisition source. May be corrected once from
    /// the live source at startup.
    #[serde(default = "EngineConfig::default_channel_count")]
    pub channel_count: usize,
    /// Electrodes of interest. One entry selects a bipolar derivation
    /// against the last recorded channel; several select a local average
    /// reference.
    #[serde(default = "EngineConfig::default_electrodes")]
    pub electrodes: Vec<usize>,
    #[serde(default = "EngineConfig::default_native_rate_hz")]
    pub native_rate_hz: f32,
    #[serde(default = "EngineConfig::default_processing_rate_hz")]
    pub processing_rate_hz: f32,
    #[serde(default = "EngineConfig::default_band_lo_hz")]
    pub band_lo_hz: f32,
    #[serde(default = "EngineConfig::default_band_hi_hz")]
    pub band_hi_hz: f32,
    /// Oscillation phase the stimulus should land on, radians in (-pi, pi].
    #[serde(default)]
    pub desired_phase_rad: f32,
    /// Known output latency compensated by the trigger decision.
    #[serde(default = "EngineConfig::default_technical_delay_ms")]
    pub technical_delay_ms: f32,
    #[serde(default = "EngineConfig::default_delay_tolerance_ms")]
    pub delay_tolerance_ms: f32,
    #[serde(default = "EngineConfig::default_min_trigger_interval_s")]
    pub min_trigger_interval_s: f64,
    #[serde(default = "EngineConfig::default_n_fft")]
    pub n_fft: usize,
    /// Analysis window, in processing-rate samples. Half a second by
    /// default.
    #[serde(default = "EngineConfig::default_win_len")]
    pub win_len: usize,
    /// Ring capacity, in processing-rate samples.
    #[serde(default = "EngineConfig::default_ring_len")]
    pub ring_len: usize,
    #[serde(default = "EngineConfig::default_filter_taps")]
    pub filter_taps: usize,
    /// Bound on a single blocking pull from the acquisition source.
    #[serde(default = "EngineConfig::default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Abort when the source stays silent this long.
    #[serde(default = "EngineConfig::default_max_idle_s")]
    pub max_idle_s: f64,
}

impl EngineConfig {
    fn default_channel_count() -> usize {
        8
    }
    fn default_electrodes() -> Vec<usize> {
        vec![0]
    }
    fn default_native_rate_hz() -> f32 {
        500.0
    }
    fn default_processing_rate_hz() -> f32 {
        250.0
    }
    fn default_band_lo_hz() -> f32 {
        8.0
    }
    fn default_band_hi_hz() -> f32 {
        13.0
    }
    fn default_technical_delay_ms() -> f32 {
        8.0
    }
    fn default_delay_tolerance_ms() -> f32 {
        5.0
    }
    fn default_min_trigger_interval_s() -> f64 {
        3.0
    }
    fn default_n_fft() -> usize {
        1024
    }
    fn default_win_len() -> usize {
        125
    }
    fn default_ring_len() -> usize {
        250
    }
    fn default_filter_taps() -> usize {
        65
    }
    fn default_source_timeout_ms() -> u64 {
        100
    }
    fn default_max_idle_s() -> f64 {
        5.0
    }

    /// Integer downsampling factor between native and processing rates.
    pub fn downsample_factor(&self) -> u64 {
        (self.native_rate_hz / self.processing_rate_hz).floor() as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.native_rate_hz <= 0.0 || self.processing_rate_hz <= 0.0 {
            return Err(ConfigError::NonPositiveRate {
                native: self.native_rate_hz,
                processing: self.processing_rate_hz,
            });
        }
        if self.processing_rate_hz > self.native_rate_hz {
            return Err(ConfigError::RateOrder {
                native: self.native_rate_hz,
                processing: self.processing_rate_hz,
            });
        }
        let nyquist = self.processing_rate_hz / 2.0;
        if self.band_lo_hz < 0.0 || self.band_hi_hz <= self.band_lo_hz || self.band_hi_hz >= nyquist
        {
            return Err(ConfigError::BandOutOfRange {
                lo: self.band_lo_hz,
                hi: self.band_hi_hz,
                nyquist,
            });
        }
        if self.win_len == 0 || self.win_len > self.ring_len {
            return Err(ConfigError::WindowLength {
                win_len: self.win_len,
                ring_len: self.ring_len,
            });
        }
        if self.n_fft < self.win_len {
            return Err(ConfigError::FftTooSmall {
                n_fft: self.n_fft,
                win_len: self.win_len,
            });
        }
        if self.min_trigger_interval_s <= 0.0 {
            return Err(ConfigError::NonPositiveInterval(self.min_trigger_interval_s));
        }
        if self.technical_delay_ms < 0.0 || self.delay_tolerance_ms < 0.0 {
            return Err(ConfigError::NegativeDelay {
                delay_ms: self.technical_delay_ms,
                tolerance_ms: self.delay_tolerance_ms,
            });
        }
        // Electrode bounds; the montage constructor owns the policy.
        crate::core::montage::Montage::from_electrodes(&self.electrodes, self.channel_count)?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_count: Self::default_channel_count(),
            electrodes: Self::default_electrodes(),
            native_rate_hz: Self::default_native_rate_hz(),
            processing_rate_hz: Self::default_processing_rate_hz(),
            band_lo_hz: Self::default_band_lo_hz(),
            band_hi_hz: Self::default_band_hi_hz(),
            desired_phase_rad: 0.0,
            technical_delay_ms: Self::default_technical_delay_ms(),
            delay_tolerance_ms: Self::default_delay_tolerance_ms(),
            min_trigger_interval_s: Self::default_min_trigger_interval_s(),
            n_fft: Self::default_n_fft(),
            win_len: Self::default_win_len(),
            ring_len: Self::default_ring_len(),
            filter_taps: Self::default_filter_taps(),
            source_timeout_ms: Self::default_source_timeout_ms(),
            max_idle_s: Self::default_max_idle_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    #[serde(default = "StimulusConfig::default_carrier_hz")]
    pub carrier_hz: f32,
    #[serde(default = "StimulusConfig::default_beat_hz")]
    pub beat_hz: f32,
    #[serde(default = "StimulusConfig::default_duration_s")]
    pub duration_s: f32,
    #[serde(default = "StimulusConfig::default_amplitude")]
    pub amplitude: f32,
    #[serde(default = "StimulusConfig::default_ramp_ms")]
    pub ramp_ms: f32,
    #[serde(default = "StimulusConfig::default_latency_ms")]
    pub latency_ms: f32,
}

impl StimulusConfig {
    fn default_carrier_hz() -> f32 {
        200.0
    }
    fn default_beat_hz() -> f32 {
        10.0
    }
    fn default_duration_s() -> f32 {
        1.0
    }
    fn default_amplitude() -> f32 {
        0.25
    }
    fn default_ramp_ms() -> f32 {
        20.0
    }
    fn default_latency_ms() -> f32 {
        50.0
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            carrier_hz: Self::default_carrier_hz(),
            beat_hz: Self::default_beat_hz(),
            duration_s: Self::default_duration_s(),
            amplitude: Self::default_amplitude(),
            ramp_ms: Self::default_ramp_ms(),
            latency_ms: Self::default_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub stimulus: StimulusConfig,
}

impl AppConfig {
    /// Read the TOML config at `path`, or write a fully commented default
    /// file there and return defaults. Parse errors fall back to defaults
    /// with a warning rather than aborting a session over a typo.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => warn!("failed to parse config {path}: {err}; using defaults"),
                },
                Err(err) => warn!("failed to read config {path}: {err}; using defaults"),
            }
            return Self::default();
        }

        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                let commented: String = text
                    .lines()
                    .map(|line| {
                        let trimmed = line.trim();
                        if trimmed.is_empty() || trimmed.starts_with('[') {
                            format!("{line}\n")
                        } else {
                            format!("# {line}\n")
                        }
                    })
                    .collect();
                if let Err(err) = fs::write(path_obj, commented) {
                    warn!("failed to write default config to {path}: {err}");
                }
            }
            Err(err) => warn!("failed to serialize default config: {err}"),
        }
        default_cfg
    }
}
