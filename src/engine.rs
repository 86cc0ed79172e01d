//! engine.rs — the closed-loop control path: pull one sample, ingest,
//! maybe evaluate, maybe dispatch.
//!
//! Buffer, refractory timer and event log are explicit engine fields, and
//! every resource is released by Drop on all exit paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::StimulusChannel;
use crate::config::{ConfigError, EngineConfig};
use crate::core::montage::Montage;
use crate::core::ring::SampleRing;
use crate::core::spectral::SpectralEstimator;
use crate::core::trigger::{Decision, TriggerGate};
use crate::events::{trigger_marker, EventLog, TriggerEvent};
use crate::source::{MarkerOutlet, MarkerSource, SampleSource, SourceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("acquisition source stayed silent for {0:.1} s")]
    SourceSilent(f64),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    pub samples_pulled: u64,
    pub samples_retained: u64,
    pub triggers: usize,
    pub inbound_markers: u64,
}

pub struct ClosedLoopEngine {
    cfg: EngineConfig,
    ring: SampleRing,
    montage: Montage,
    estimator: SpectralEstimator,
    gate: TriggerGate,
    log: EventLog,
    sink: Option<Box<dyn StimulusChannel>>,
    outlet: Option<Box<dyn MarkerOutlet>>,
    session_start: Option<f64>,
    marker_failures: u64,
}

impl ClosedLoopEngine {
    /// Build the engine from a validated configuration. `sink` is `None`
    /// when the stimulus output is unavailable: the engine then runs
    /// degraded, logging "would trigger" events with identical timing.
    pub fn new(
        cfg: EngineConfig,
        sink: Option<Box<dyn StimulusChannel>>,
        outlet: Option<Box<dyn MarkerOutlet>>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let montage = Montage::from_electrodes(&cfg.electrodes, cfg.channel_count)?;
        let estimator = SpectralEstimator::new(
            cfg.processing_rate_hz,
            cfg.win_len,
            cfg.n_fft,
            cfg.band_lo_hz,
            cfg.band_hi_hz,
            cfg.filter_taps,
        );
        let gate = TriggerGate::new(
            cfg.desired_phase_rad,
            cfg.technical_delay_ms,
            cfg.delay_tolerance_ms,
            cfg.min_trigger_interval_s,
        );
        let ring = SampleRing::new(cfg.channel_count, cfg.ring_len, cfg.downsample_factor());
        Ok(Self {
            cfg,
            ring,
            montage,
            estimator,
            gate,
            log: EventLog::new(),
            sink,
            outlet,
            session_start: None,
            marker_failures: 0,
        })
    }

    pub fn audio_available(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Adopt the channel count reported by the live source. Valid only
    /// before the first sample is ingested; the montage is re-validated
    /// against the corrected count.
    fn correct_channel_count(&mut self, channels: usize) -> Result<(), ConfigError> {
        warn!(
            configured = self.cfg.channel_count,
            reported = channels,
            "correcting channel count from live source"
        );
        self.montage = Montage::from_electrodes(&self.cfg.electrodes, channels)?;
        self.ring = SampleRing::new(channels, self.cfg.ring_len, self.cfg.downsample_factor());
        self.cfg.channel_count = channels;
        Ok(())
    }

    /// Ingest one native-rate sample and run at most one evaluation cycle.
    /// Returns what that cycle decided; `NotReady` covers skipped cycles
    /// (sample not retained, window not yet full, estimate unavailable).
    pub fn ingest(&mut self, frame: &[f32], timestamp: f64) -> Decision {
        self.session_start.get_or_insert(timestamp);
        if !self.ring.push(frame, timestamp) {
            return Decision::NotReady;
        }
        let Some(window) = self.ring.window(self.cfg.win_len) else {
            return Decision::NotReady;
        };
        let series = self.montage.project(&window);
        let Some(est) = self.estimator.estimate(&series) else {
            // Degenerate spectrum: skip the decision this cycle.
            return Decision::NotReady;
        };
        let decision = self.gate.evaluate(timestamp, &est);
        if let Decision::Fire { delta_ms } = decision {
            self.fire(timestamp, est.phase_rad, est.freq_hz, delta_ms);
        }
        decision
    }

    fn fire(&mut self, time_s: f64, phase_rad: f32, freq_hz: f32, delta_ms: f32) {
        let dispatched = match self.sink.as_mut() {
            Some(sink) => sink.fire(),
            None => {
                info!(time_s, phase_rad, freq_hz, "audio unavailable; would trigger");
                false
            }
        };
        let index = self.log.len() as u64;
        self.log.append(TriggerEvent {
            index,
            time_s,
            phase_rad,
            freq_hz,
            dispatched,
        });
        info!(index, time_s, phase_rad, freq_hz, delta_ms, dispatched, "trigger");

        if let Some(outlet) = self.outlet.as_mut() {
            let elapsed = time_s - self.session_start.unwrap_or(time_s);
            let marker = trigger_marker(index, phase_rad, freq_hz, elapsed);
            if let Err(err) = outlet.push(&marker) {
                // Best-effort only: never blocks or fails stimulus delivery.
                self.marker_failures += 1;
                warn!("marker push failed: {err}");
            }
        }
    }

    /// Drive the acquisition loop until the stop flag is raised, the source
    /// closes, or the source stays silent past the configured bound.
    pub fn run(
        &mut self,
        source: &mut dyn SampleSource,
        mut markers: Option<&mut dyn MarkerSource>,
        stop: &AtomicBool,
    ) -> Result<RunSummary, EngineError> {
        let reported = source.channel_count();
        if reported != 0 && reported != self.cfg.channel_count {
            self.correct_channel_count(reported)?;
        }

        let timeout = Duration::from_millis(self.cfg.source_timeout_ms);
        let mut summary = RunSummary::default();
        let mut last_data = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if let Some(src) = &mut markers {
                for (marker, time_s) in src.pull_available() {
                    debug!(%marker, time_s, "inbound marker");
                    summary.inbound_markers += 1;
                }
            }

            match source.pull(timeout) {
                Ok(Some((frame, timestamp))) => {
                    last_data = Instant::now();
                    if frame.len() != self.ring.channels() {
                        warn!(
                            got = frame.len(),
                            expected = self.ring.channels(),
                            "dropping malformed frame"
                        );
                        continue;
                    }
                    summary.samples_pulled += 1;
                    self.ingest(&frame, timestamp);
                    summary.samples_retained = self.ring.retained();
                }
                Ok(None) => {
                    let idle = last_data.elapsed().as_secs_f64();
                    if idle > self.cfg.max_idle_s {
                        return Err(EngineError::SourceSilent(idle));
                    }
                }
                Err(SourceError::Transient(reason)) => {
                    warn!("transient source failure ({reason}); continuing");
                }
                Err(SourceError::Closed) => {
                    info!("acquisition source closed");
                    break;
                }
            }
        }

        summary.triggers = self.log.len();
        if self.marker_failures > 0 {
            warn!(failures = self.marker_failures, "marker pushes failed this session");
        }
        Ok(summary)
    }
}
