//! core/trigger.rs — refractory-gated phase-lock trigger decision.

use std::f32::consts::TAU;

use crate::core::spectral::SpectralEstimate;

/// Outcome of one evaluation cycle. `NotReady` also covers the cycles the
/// engine skips before the buffer fills or when no spectral estimate is
/// available; the gate itself only distinguishes the other three.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decision {
    NotReady,
    Refractory,
    /// Eligible but the predicted crossing is outside the dispatch window.
    /// Evaluation is memoryless: the next retained sample retries.
    Hold { delta_ms: f32 },
    Fire { delta_ms: f32 },
}

/// Stateful trigger gate. The only state carried across cycles is the
/// refractory timer; everything else is recomputed from the estimate.
#[derive(Clone, Debug)]
pub struct TriggerGate {
    desired_phase_rad: f32,
    technical_delay_ms: f32,
    delay_tolerance_ms: f32,
    min_interval_s: f64,
    last_trigger: Option<f64>,
}

impl TriggerGate {
    pub fn new(
        desired_phase_rad: f32,
        technical_delay_ms: f32,
        delay_tolerance_ms: f32,
        min_interval_s: f64,
    ) -> Self {
        Self {
            desired_phase_rad,
            technical_delay_ms,
            delay_tolerance_ms,
            min_interval_s,
            last_trigger: None,
        }
    }

    pub fn last_trigger_time(&self) -> Option<f64> {
        self.last_trigger
    }

    /// Predicted time in milliseconds until the signal reaches the desired
    /// phase, linearly extrapolating phase progression at `freq_hz`.
    pub fn predicted_delta_ms(&self, est: &SpectralEstimate) -> f32 {
        (self.desired_phase_rad - est.phase_rad) * (1000.0 / est.freq_hz) / TAU
    }

    /// One evaluation cycle at source time `now_s`. Fires iff the predicted
    /// crossing lands `technical_delay_ms` from now, within tolerance, and
    /// the refractory window has elapsed. On fire the refractory timer
    /// resets immediately, before stimulus playback even begins.
    pub fn evaluate(&mut self, now_s: f64, est: &SpectralEstimate) -> Decision {
        debug_assert!(est.freq_hz > 0.0, "estimator must filter out DC peaks");
        if let Some(t0) = self.last_trigger {
            if now_s - t0 <= self.min_interval_s {
                return Decision::Refractory;
            }
        }
        let delta_ms = self.predicted_delta_ms(est);
        if (delta_ms - self.technical_delay_ms).abs() <= self.delay_tolerance_ms {
            self.last_trigger = Some(now_s);
            Decision::Fire { delta_ms }
        } else {
            Decision::Hold { delta_ms }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phase::wrap_pm_pi;
    use std::f32::consts::TAU;

    fn est(freq_hz: f32, phase_rad: f32) -> SpectralEstimate {
        SpectralEstimate { freq_hz, phase_rad }
    }

    fn gate() -> TriggerGate {
        // 10 Hz rhythm: period 100 ms; fire window is delta in [3, 13] ms.
        TriggerGate::new(0.0, 8.0, 5.0, 3.0)
    }

    #[test]
    fn fires_inside_the_delay_window() {
        // delta_ms = -phase * 100 / TAU; phase -0.5 rad -> ~7.96 ms.
        let mut g = gate();
        match g.evaluate(0.0, &est(10.0, -0.5)) {
            Decision::Fire { delta_ms } => assert!((delta_ms - 7.96).abs() < 0.05),
            other => panic!("expected Fire, got {other:?}"),
        }
    }

    #[test]
    fn holds_outside_the_delay_window() {
        let mut g = gate();
        // Phase just past the target: negative delta never fires.
        assert!(matches!(
            g.evaluate(0.0, &est(10.0, 0.3)),
            Decision::Hold { .. }
        ));
        // Half a cycle away: delta ~50 ms, far beyond 8 +/- 5.
        assert!(matches!(
            g.evaluate(0.0, &est(10.0, -3.0)),
            Decision::Hold { .. }
        ));
        assert!(g.last_trigger_time().is_none());
    }

    #[test]
    fn refractory_blocks_until_min_interval_elapses() {
        let mut g = gate();
        let e = est(10.0, -0.5);
        assert!(matches!(g.evaluate(10.0, &e), Decision::Fire { .. }));
        assert_eq!(g.evaluate(10.5, &e), Decision::Refractory);
        assert_eq!(g.evaluate(13.0, &e), Decision::Refractory);
        // Strictly greater than min_interval is eligible again.
        assert!(matches!(g.evaluate(13.01, &e), Decision::Fire { .. }));
    }

    #[test]
    fn consecutive_fires_are_at_least_min_interval_apart() {
        let mut g = gate();
        let mut fire_times = Vec::new();
        let fs = 250.0f64;
        for n in 0..(10.0 * fs) as u64 {
            let t = n as f64 / fs;
            // Phase of a 10 Hz rhythm sweeping continuously.
            let phase = wrap_pm_pi((TAU * 10.0 * t as f32) + 0.8);
            if let Decision::Fire { .. } = g.evaluate(t, &est(10.0, phase)) {
                fire_times.push(t);
            }
        }
        assert!(fire_times.len() >= 2, "sweep should fire repeatedly");
        for pair in fire_times.windows(2) {
            assert!(
                pair[1] - pair[0] >= 3.0,
                "refractory violated: {:?}",
                pair
            );
        }
    }

    #[test]
    fn predicted_delta_is_linear_in_phase_distance() {
        let g = gate();
        let e = est(12.5, -1.0);
        // (0 - (-1)) * (1000 / 12.5) / TAU = 80 / TAU ~= 12.73 ms
        let delta = g.predicted_delta_ms(&e);
        assert!((delta - 80.0 / TAU).abs() < 1e-3);
    }
}
