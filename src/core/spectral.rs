//! core/spectral.rs — band-limited instantaneous frequency/phase estimation
//! over a fixed-length analysis window.

use std::sync::Arc;

use rustfft::{num_complex::Complex32, Fft, FftPlanner};

use crate::core::bandpass::BandpassFir;
use crate::core::phase::wrap_pm_pi;

/// Frequency and phase of the dominant in-band component, valid only for the
/// window instant it was computed from. `phase_rad` refers to the *end* of
/// the analysis window, i.e. the current instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralEstimate {
    pub freq_hz: f32,
    pub phase_rad: f32,
}

pub struct SpectralEstimator {
    fs: f32,
    win_len: usize,
    n_fft: usize,
    bin_lo: usize,
    bin_hi: usize,
    filter: BandpassFir,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralEstimator {
    pub fn new(
        fs: f32,
        win_len: usize,
        n_fft: usize,
        lo_hz: f32,
        hi_hz: f32,
        filter_taps: usize,
    ) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let bin_lo = (lo_hz * n_fft as f32 / fs).ceil() as usize;
        let bin_hi = ((hi_hz * n_fft as f32 / fs).floor() as usize).min(n_fft / 2);
        Self {
            fs,
            win_len,
            n_fft,
            bin_lo,
            bin_hi,
            filter: BandpassFir::new(lo_hz, hi_hz, fs, filter_taps),
            fft,
        }
    }

    /// FFT bin resolution in Hz: the smallest distinguishable frequency step.
    pub fn bin_width_hz(&self) -> f32 {
        self.fs / self.n_fft as f32
    }

    /// Estimate the dominant in-band frequency and the phase propagated to
    /// the end of the window. `None` means "estimate unavailable": a
    /// zero-energy window or a spectrum whose in-band peak sits at DC.
    /// Callers skip the trigger decision for that cycle.
    pub fn estimate(&self, series: &[f32]) -> Option<SpectralEstimate> {
        debug_assert_eq!(series.len(), self.win_len);

        let filtered = self.filter.filtfilt(series);
        let mut buf = vec![Complex32::new(0.0, 0.0); self.n_fft];
        for (slot, &v) in buf.iter_mut().zip(filtered.iter()) {
            slot.re = v;
        }
        self.fft.process(&mut buf);

        let mut peak_bin = 0usize;
        let mut peak_mag = 0.0f32;
        for k in self.bin_lo..=self.bin_hi {
            let mag = buf[k].norm();
            if mag > peak_mag {
                peak_mag = mag;
                peak_bin = k;
            }
        }
        if peak_mag <= 1e-6 || peak_bin == 0 {
            return None;
        }

        let freq_hz = peak_bin as f32 * self.fs / self.n_fft as f32;
        // The bin phase is the phase at the start of the window; propagate it
        // forward by win_len - 1 samples at the estimated frequency.
        let phase_at_bin = buf[peak_bin].im.atan2(buf[peak_bin].re);
        let advance = 2.0 * std::f32::consts::PI * freq_hz * (self.win_len - 1) as f32 / self.fs;
        let phase_rad = wrap_pm_pi(advance + phase_at_bin);

        Some(SpectralEstimate { freq_hz, phase_rad })
    }
}
