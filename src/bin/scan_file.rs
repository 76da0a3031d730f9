//! Offline trigger scan of a local recording.
//!
//! Runs the same segmentation and detection as a live session over a decoded
//! file, printing every hit. Never touches the network.
//!
//! Usage: scan_file <trigger> <recording> [--dump <dir>] [--config <json>]

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tunetag::audio::decode::{AudioDecoder, SymphoniaDecoder};
use tunetag::audio::resample::to_i16;
use tunetag::kernel::audio::WindowAssembler;
use tunetag::kernel::time::window_samples;
use tunetag::kernel::trigger::{
    AmplitudeMatcher, DetectorStep, TriggerDetector, TriggerFingerprint, TriggerHit, TriggerMatcher,
};
use tunetag::SessionConfig;

struct Args {
    trigger: PathBuf,
    recording: PathBuf,
    dump: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut dump = None;
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump" => dump = Some(PathBuf::from(args.next().context("--dump needs a directory")?)),
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a path")?)),
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let mut positional = positional.into_iter();
    match (positional.next(), positional.next()) {
        (Some(trigger), Some(recording)) => Ok(Args {
            trigger,
            recording,
            dump,
            config,
        }),
        _ => anyhow::bail!("usage: scan_file <trigger> <recording> [--dump <dir>] [--config <json>]"),
    }
}

fn decode_file(decoder: &SymphoniaDecoder, path: &Path) -> anyhow::Result<tunetag::kernel::audio::PcmBlock> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded = decoder
        .decode(&bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok(decoded.into_block())
}

fn dump_clip(dir: &Path, hit: &TriggerHit) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("tag_{:08}ms.wav", hit.data_position_ms()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: hit.segment.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for sample in to_i16(hit.segment.samples()) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    config.validate()?;
    if let Some(dir) = &args.dump {
        std::fs::create_dir_all(dir)?;
    }

    // 2. Reference envelope (no descriptor: extraction is a service call)
    let decoder = SymphoniaDecoder::new();
    let trigger = decode_file(&decoder, &args.trigger)?;
    anyhow::ensure!(trigger.len() >= 2, "trigger audio is too short");
    let reference = TriggerFingerprint::from_samples(
        trigger.samples(),
        trigger.sample_rate(),
        config.fingerprint_sample_rate,
    );
    println!(
        "Trigger: {} ({}ms)",
        args.trigger.display(),
        reference.duration_ms()
    );

    // 3. Segment and scan the recording
    let recording = decode_file(&decoder, &args.recording)?;
    let rate = recording.sample_rate();
    let matcher: Arc<dyn TriggerMatcher> = Arc::new(AmplitudeMatcher::new(
        config.fingerprint_sample_rate,
        config.match_hop,
        config.similarity_threshold,
    ));
    let mut detector = TriggerDetector::new(Arc::new(reference), matcher, config.extraction_ms);
    let mut assembler = WindowAssembler::new(window_samples(config.window_seconds, rate).max(1), rate);

    let mut hits = 0usize;
    for window in assembler.push(recording) {
        detector.push_window(window);
        loop {
            match detector.step() {
                DetectorStep::Waiting => break,
                DetectorStep::Extracted(hit) => {
                    hits += 1;
                    println!(
                        "Hit {}: {}ms (window {}, +{}ms, similarity {:.3})",
                        hits,
                        hit.data_position_ms(),
                        hit.index,
                        hit.trigger_offset_ms,
                        hit.matched.similarity
                    );
                    if let Some(dir) = &args.dump {
                        let path = dump_clip(dir, &hit)?;
                        println!("  wrote {}", path.display());
                    }
                }
                DetectorStep::Advanced | DetectorStep::Armed { .. } => {}
            }
        }
    }

    println!("{} hit(s) in {}", hits, args.recording.display());
    Ok(())
}
