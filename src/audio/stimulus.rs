//! audio/stimulus.rs — binaural-beat burst synthesis.
//!
//! Two pure tones, one per ear, offset by the beat frequency; the percept
//! beats at their difference. The burst is rendered once at startup and
//! reused verbatim for every trigger.

use std::f32::consts::TAU;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::buffer::AudioBuffer;
use crate::config::StimulusConfig;

/// Render the stereo burst at the output device rate. Raised-cosine ramps at
/// both ends keep the onset click-free without shifting burst timing.
pub fn render(cfg: &StimulusConfig, sample_rate: u32) -> AudioBuffer {
    let fs = sample_rate as f32;
    let n = (cfg.duration_s * fs) as usize;
    let ramp = ((cfg.ramp_ms * 1e-3 * fs) as usize).min(n / 2);

    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f32 / fs;
        let env = envelope(i, n, ramp) * cfg.amplitude;
        left.push(env * (TAU * cfg.carrier_hz * t).sin());
        right.push(env * (TAU * (cfg.carrier_hz + cfg.beat_hz) * t).sin());
    }
    AudioBuffer::stereo(left, right)
}

fn envelope(i: usize, n: usize, ramp: usize) -> f32 {
    if ramp == 0 {
        return 1.0;
    }
    let pos = if i < ramp {
        i as f32 / ramp as f32
    } else if i >= n - ramp {
        (n - 1 - i) as f32 / ramp as f32
    } else {
        return 1.0;
    };
    0.5 * (1.0 - (std::f32::consts::PI * pos).cos())
}

/// Dump the rendered burst to a 16-bit stereo WAV for offline inspection.
pub fn write_wav(buffer: &AudioBuffer, sample_rate: u32, path: &Path) -> hound::Result<()> {
    let spec = WavSpec {
        channels: buffer.channels as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in &buffer.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(v)?;
    }
    writer.finalize()
}
