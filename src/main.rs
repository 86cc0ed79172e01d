// Entry point: wires the CLI, config and synthetic source into the engine.
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use entrain::audio::{stimulus, StimulusChannel, StimulusSink};
use entrain::cli::Args;
use entrain::config::AppConfig;
use entrain::engine::ClosedLoopEngine;
use entrain::source::SineSource;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = AppConfig::load_or_default(&args.config);

    if let Some(path) = &args.wav {
        let rendered = stimulus::render(&cfg.stimulus, 48_000);
        stimulus::write_wav(&rendered, 48_000, Path::new(path))
            .with_context(|| format!("writing stimulus wav to {path}"))?;
        info!(%path, "stimulus burst written");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_ctrlc = stop.clone();
    ctrlc::set_handler(move || {
        stop_for_ctrlc.store(true, Ordering::SeqCst);
    })
    .context("setting Ctrl-C handler")?;

    let sink: Option<Box<dyn StimulusChannel>> = if args.no_audio {
        info!("audio disabled; running in would-trigger mode");
        None
    } else {
        match StimulusSink::open(&cfg.stimulus) {
            Ok(sink) => Some(Box::new(sink)),
            Err(err) => {
                warn!("stimulus output unavailable ({err}); running in would-trigger mode");
                None
            }
        }
    };

    let mut engine =
        ClosedLoopEngine::new(cfg.engine.clone(), sink, None).context("building engine")?;

    let mut source = SineSource::new(
        cfg.engine.channel_count,
        cfg.engine.native_rate_hz as f64,
        args.freq,
    )
    .with_noise(args.noise, 0x5eed)
    .with_duration_s(args.duration);
    if !args.unpaced {
        source = source.paced();
    }

    info!(
        duration_s = args.duration,
        freq_hz = args.freq,
        band_lo_hz = cfg.engine.band_lo_hz,
        band_hi_hz = cfg.engine.band_hi_hz,
        "session start"
    );
    let summary = engine.run(&mut source, None, &stop)?;
    info!(
        pulled = summary.samples_pulled,
        retained = summary.samples_retained,
        triggers = summary.triggers,
        "session complete"
    );

    if let Some(path) = &args.csv {
        engine
            .log()
            .export_csv(Path::new(path))
            .with_context(|| format!("exporting event log to {path}"))?;
        info!(%path, events = engine.log().len(), "event log exported");
    }

    Ok(())
}
