//! core/bandpass.rs — zero-phase FIR band-pass for the analysis window.
//!
//! The trigger path is lock-sensitive: a causal filter would delay the phase
//! estimate by its group delay and every downstream timing decision would
//! inherit that bias. The filter therefore runs forward-backward over the
//! window, which cancels the phase response and squares the magnitude
//! response.

use std::f32::consts::PI;

/// Windowed-sinc band-pass with symmetric (linear-phase) taps, applied
/// forward-backward.
#[derive(Clone, Debug)]
pub struct BandpassFir {
    taps: Vec<f32>,
}

impl BandpassFir {
    /// Design taps for the pass band [lo_hz, hi_hz] at sample rate `fs`.
    /// `n_taps` is forced odd so the taps have a well-defined center.
    pub fn new(lo_hz: f32, hi_hz: f32, fs: f32, n_taps: usize) -> Self {
        let n = if n_taps % 2 == 0 { n_taps + 1 } else { n_taps }.max(3);
        let m = (n - 1) as f32 / 2.0;
        let w_lo = 2.0 * PI * lo_hz / fs;
        let w_hi = 2.0 * PI * hi_hz / fs;

        let mut taps = Vec::with_capacity(n);
        for i in 0..n {
            let k = i as f32 - m;
            // Ideal band-pass impulse response, Hamming-windowed.
            let ideal = if k == 0.0 {
                (w_hi - w_lo) / PI
            } else {
                ((w_hi * k).sin() - (w_lo * k).sin()) / (PI * k)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
            taps.push(ideal * window);
        }

        // Unity gain at the band center; symmetric taps make the response
        // real there.
        let wc = 0.5 * (w_lo + w_hi);
        let gain: f32 = taps
            .iter()
            .enumerate()
            .map(|(i, &h)| h * (wc * (i as f32 - m)).cos())
            .sum();
        if gain.abs() > 1e-12 {
            let inv = 1.0 / gain;
            for h in taps.iter_mut() {
                *h *= inv;
            }
        }

        Self { taps }
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Forward-backward filtering with "same" output length. Net phase is
    /// zero; magnitude response is squared.
    pub fn filtfilt(&self, x: &[f32]) -> Vec<f32> {
        let mut y = conv_same(x, &self.taps);
        y.reverse();
        let mut z = conv_same(&y, &self.taps);
        z.reverse();
        z
    }
}

/// Direct linear convolution cropped to the "same" segment. Window and tap
/// counts here are small enough that the direct form beats an FFT round
/// trip.
fn conv_same(x: &[f32], h: &[f32]) -> Vec<f32> {
    let nx = x.len();
    let nh = h.len();
    if nx == 0 || nh == 0 {
        return Vec::new();
    }
    let n_full = nx + nh - 1;
    let mut full = vec![0.0f32; n_full];
    for i in 0..nx {
        let xi = x[i];
        for j in 0..nh {
            full[i + j] += xi * h[j];
        }
    }
    let start = (nh - 1) / 2;
    full[start..start + nx].to_vec()
}
