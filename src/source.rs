//! source.rs — acquisition-side and marker-side interfaces, plus a synthetic
//! source for tests and offline runs.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Recoverable read failure; the loop logs it and keeps pulling.
    #[error("transient acquisition failure: {0}")]
    Transient(String),
    /// The source ended; the loop finishes normally.
    #[error("acquisition source closed")]
    Closed,
}

#[derive(Debug, Error)]
#[error("marker outlet failure: {0}")]
pub struct OutletError(pub String);

/// Pull-one-sample contract of the acquisition source. `Ok(None)` after the
/// timeout is a normal idle condition, not an error.
pub trait SampleSource {
    fn channel_count(&self) -> usize;
    fn pull(&mut self, timeout: Duration) -> Result<Option<(Vec<f32>, f64)>, SourceError>;
}

/// Optional inbound event-marker channel. Always non-blocking; absence of
/// markers is the common case.
pub trait MarkerSource {
    fn pull_available(&mut self) -> Vec<(String, f64)>;
}

/// Optional outbound marker channel. Best-effort: a failed push is logged by
/// the caller and never blocks stimulus delivery.
pub trait MarkerOutlet {
    fn push(&mut self, marker: &str) -> Result<(), OutletError>;
}

/// Marker outlet that keeps pushed markers in memory, for offline runs and
/// tests.
#[derive(Debug, Default)]
pub struct MemoryOutlet {
    markers: Vec<String>,
}

impl MemoryOutlet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl MarkerOutlet for MemoryOutlet {
    fn push(&mut self, marker: &str) -> Result<(), OutletError> {
        self.markers.push(marker.to_string());
        Ok(())
    }
}

/// Shared-handle form, so callers can keep inspecting an outlet they handed
/// to the engine.
impl<T: MarkerOutlet> MarkerOutlet for std::sync::Arc<std::sync::Mutex<T>> {
    fn push(&mut self, marker: &str) -> Result<(), OutletError> {
        self.lock()
            .map_err(|_| OutletError("marker outlet mutex poisoned".into()))?
            .push(marker)
    }
}

/// Marker source with nothing to say; behaviorally identical to an absent
/// source.
#[derive(Debug, Default)]
pub struct SilentMarkers;

impl MarkerSource for SilentMarkers {
    fn pull_available(&mut self) -> Vec<(String, f64)> {
        Vec::new()
    }
}

/// Deterministic multi-channel source carrying a pure sinusoid on channel 0,
/// optional white noise everywhere. Timestamps advance at the native rate
/// regardless of wall time; set `paced` for soft-realtime playback.
pub struct SineSource {
    channels: usize,
    native_rate_hz: f64,
    freq_hz: f64,
    phase0_rad: f64,
    amplitude: f32,
    noise_amplitude: f32,
    rng: StdRng,
    n: u64,
    limit: Option<u64>,
    paced: bool,
}

impl SineSource {
    pub fn new(channels: usize, native_rate_hz: f64, freq_hz: f64) -> Self {
        Self {
            channels,
            native_rate_hz,
            freq_hz,
            phase0_rad: 0.0,
            amplitude: 1.0,
            noise_amplitude: 0.0,
            rng: StdRng::seed_from_u64(0x5eed),
            n: 0,
            limit: None,
            paced: false,
        }
    }

    pub fn with_phase(mut self, phase0_rad: f64) -> Self {
        self.phase0_rad = phase0_rad;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_noise(mut self, noise_amplitude: f32, seed: u64) -> Self {
        self.noise_amplitude = noise_amplitude;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_duration_s(mut self, seconds: f64) -> Self {
        self.limit = Some((seconds * self.native_rate_hz) as u64);
        self
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

impl SampleSource for SineSource {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn pull(&mut self, _timeout: Duration) -> Result<Option<(Vec<f32>, f64)>, SourceError> {
        if let Some(limit) = self.limit {
            if self.n >= limit {
                return Err(SourceError::Closed);
            }
        }
        if self.paced {
            std::thread::sleep(Duration::from_secs_f64(1.0 / self.native_rate_hz));
        }
        let t = self.n as f64 / self.native_rate_hz;
        self.n += 1;

        let value = self.amplitude
            * (std::f64::consts::TAU * self.freq_hz * t + self.phase0_rad).cos() as f32;
        let mut frame = vec![0.0f32; self.channels];
        frame[0] = value;
        if self.noise_amplitude > 0.0 {
            for v in frame.iter_mut() {
                *v += self.noise_amplitude * (self.rng.gen::<f32>() - 0.5);
            }
        }
        Ok(Some((frame, t)))
    }
}
