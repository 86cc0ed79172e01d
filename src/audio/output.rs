//! audio/output.rs — cpal output stream and the fire-and-forget stimulus
//! dispatch path.
//!
//! The control loop runs on millisecond cadence while a burst plays for
//! seconds, so dispatch is a bounded-channel handoff to a feeder thread that
//! trickles samples into the device ring. `fire` never blocks.

use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender, TrySendError};
use ringbuf::traits::*;
use ringbuf::{HeapProd, HeapRb};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::stimulus;
use crate::audio::StimulusChannel;
use crate::config::StimulusConfig;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("querying default output config failed: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("building output stream failed: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("starting output stream failed: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Owns the cpal stream. Dropping it stops playback and releases the device.
pub struct StimulusOutput {
    stream: Option<cpal::Stream>,
    pub config: cpal::StreamConfig,
}

impl StimulusOutput {
    /// Open the default output device as a stereo stream and return the
    /// producer half of its sample ring. The consumer half lives inside the
    /// audio callback; underruns play silence, which is the normal state
    /// between bursts.
    pub fn open(latency_ms: f32) -> Result<(Self, HeapProd<f32>), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let sample_rate = device.default_output_config()?.sample_rate();
        let channels: u16 = 2;

        let config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let latency_frames = (sample_rate.0 as f32 * latency_ms / 1000.0) as usize;
        let rb = HeapRb::<f32>::new(latency_frames.max(256) * channels as usize * 8);
        let (prod, mut cons) = rb.split();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    *slot = cons.try_pop().unwrap_or(0.0);
                }
            },
            |err| warn!("output stream error: {err}"),
            None,
        )?;
        stream.play()?;

        Ok((
            Self {
                stream: Some(stream),
                config,
            },
            prod,
        ))
    }
}

impl Drop for StimulusOutput {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            debug!("stimulus output stream closed");
        }
    }
}

/// Feed a whole burst into the producer, yielding briefly whenever the ring
/// is momentarily full.
fn push_all(prod: &mut HeapProd<f32>, samples: &[f32]) {
    let mut offset = 0;
    while offset < samples.len() {
        offset += prod.push_slice(&samples[offset..]);
        if offset < samples.len() {
            std::thread::sleep(std::time::Duration::from_micros(200));
        }
    }
}

/// Device-backed stimulus sink: renders the burst once at the device rate,
/// then replays it on every `fire` via the feeder thread.
pub struct StimulusSink {
    burst: Arc<[f32]>,
    tx: Option<Sender<Arc<[f32]>>>,
    feeder: Option<JoinHandle<()>>,
    _output: StimulusOutput,
}

impl StimulusSink {
    pub fn open(cfg: &StimulusConfig) -> Result<Self, AudioError> {
        let (output, mut prod) = StimulusOutput::open(cfg.latency_ms)?;
        let sample_rate = output.config.sample_rate.0;
        let burst = stimulus::render(cfg, sample_rate).into_shared();
        debug!(
            frames = burst.len() / 2,
            sample_rate, "stimulus burst rendered"
        );

        let (tx, rx) = bounded::<Arc<[f32]>>(2);
        let feeder = std::thread::Builder::new()
            .name("stimulus-feeder".into())
            .spawn(move || {
                while let Ok(burst) = rx.recv() {
                    push_all(&mut prod, &burst);
                }
            })
            .expect("spawn stimulus feeder");

        Ok(Self {
            burst,
            tx: Some(tx),
            feeder: Some(feeder),
            _output: output,
        })
    }
}

impl StimulusChannel for StimulusSink {
    fn fire(&mut self) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        match tx.try_send(self.burst.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("stimulus dispatch queue full; burst dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("stimulus feeder gone; burst dropped");
                false
            }
        }
    }
}

impl Drop for StimulusSink {
    fn drop(&mut self) {
        // Closing the channel lets the feeder drain and exit.
        self.tx.take();
        if let Some(handle) = self.feeder.take() {
            let _ = handle.join();
        }
    }
}
