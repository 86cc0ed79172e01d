//! Acquisition-loop mechanics: idle handling, transient failures, shutdown
//! paths and startup channel-count correction.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use entrain::config::EngineConfig;
use entrain::engine::{ClosedLoopEngine, EngineError};
use entrain::source::{SampleSource, SineSource, SourceError};

fn config(channel_count: usize) -> EngineConfig {
    EngineConfig {
        channel_count,
        electrodes: vec![0],
        native_rate_hz: 500.0,
        processing_rate_hz: 250.0,
        ..EngineConfig::default()
    }
}

/// Source that fails transiently on every 50th pull.
struct FlakySource {
    inner: SineSource,
    pulls: u64,
}

impl SampleSource for FlakySource {
    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn pull(&mut self, timeout: Duration) -> Result<Option<(Vec<f32>, f64)>, SourceError> {
        self.pulls += 1;
        if self.pulls % 50 == 0 {
            return Err(SourceError::Transient("simulated read failure".into()));
        }
        self.inner.pull(timeout)
    }
}

/// Source that never produces a sample.
struct SilentSource;

impl SampleSource for SilentSource {
    fn channel_count(&self) -> usize {
        4
    }

    fn pull(&mut self, _timeout: Duration) -> Result<Option<(Vec<f32>, f64)>, SourceError> {
        Ok(None)
    }
}

#[test]
fn closed_source_ends_the_run_with_full_counts() {
    let mut engine = ClosedLoopEngine::new(config(4), None, None).unwrap();
    let mut source = SineSource::new(4, 500.0, 10.0).with_duration_s(2.0);
    let stop = AtomicBool::new(false);
    let summary = engine.run(&mut source, None, &stop).unwrap();
    assert_eq!(summary.samples_pulled, 1000);
    assert_eq!(summary.samples_retained, 500);
}

#[test]
fn transient_failures_do_not_stop_the_loop() {
    let mut engine = ClosedLoopEngine::new(config(4), None, None).unwrap();
    let mut source = FlakySource {
        inner: SineSource::new(4, 500.0, 10.0).with_duration_s(4.0),
        pulls: 0,
    };
    let stop = AtomicBool::new(false);
    let summary = engine.run(&mut source, None, &stop).unwrap();
    assert_eq!(summary.samples_pulled, 2000);
    assert!(summary.triggers >= 1, "flaky source should still trigger");
}

#[test]
fn persistent_silence_is_fatal() {
    let cfg = EngineConfig {
        source_timeout_ms: 1,
        max_idle_s: 0.05,
        ..config(4)
    };
    let mut engine = ClosedLoopEngine::new(cfg, None, None).unwrap();
    let stop = AtomicBool::new(false);
    let err = engine.run(&mut SilentSource, None, &stop).unwrap_err();
    assert!(matches!(err, EngineError::SourceSilent(_)), "got {err:?}");
}

#[test]
fn raised_stop_flag_exits_before_pulling() {
    let mut engine = ClosedLoopEngine::new(config(4), None, None).unwrap();
    let mut source = SineSource::new(4, 500.0, 10.0);
    let stop = AtomicBool::new(true);
    let summary = engine.run(&mut source, None, &stop).unwrap();
    assert_eq!(summary.samples_pulled, 0);
    assert_eq!(summary.triggers, 0);
}

#[test]
fn channel_count_is_corrected_from_the_live_source() {
    // Configured for 8 channels, but the source reports 4.
    let mut engine = ClosedLoopEngine::new(config(8), None, None).unwrap();
    let mut source = SineSource::new(4, 500.0, 10.0).with_duration_s(4.0);
    let stop = AtomicBool::new(false);
    let summary = engine.run(&mut source, None, &stop).unwrap();
    assert_eq!(engine.config().channel_count, 4);
    assert!(summary.triggers >= 1, "corrected engine should still trigger");
}

#[test]
fn correction_fails_when_electrodes_exceed_the_corrected_count() {
    let cfg = EngineConfig {
        electrodes: vec![5],
        ..config(8)
    };
    let mut engine = ClosedLoopEngine::new(cfg, None, None).unwrap();
    let mut source = SineSource::new(4, 500.0, 10.0).with_duration_s(1.0);
    let stop = AtomicBool::new(false);
    let err = engine.run(&mut source, None, &stop).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)), "got {err:?}");
}
