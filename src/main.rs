use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tunetag::{Session, SessionConfig, SessionDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Load Config: optional JSON file, then TUNETAG_* overrides.
    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) => SessionConfig::from_json_file(&PathBuf::from(path))?,
        None => SessionConfig::default(),
    };
    config = config.with_env_overrides();
    if std::env::var("TUNETAG_PLAY").is_ok() {
        config.device_output = true;
    }
    config.validate()?;

    tracing::info!("TuneTag starting on {}", config.stream_url);

    // 3. Start Session (trigger bootstrap failures end here)
    let deps = SessionDeps::from_config(&config);
    let handle = Session::start(config, deps).await?;
    tracing::info!("Session {} active. Type 'pause', 'play', 'accept <tag>', 'decline <tag>', 'stop' or 'quit'. Ctrl+C to quit.", handle.id());

    // 4. Console Input
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if cmd_tx.send(line).is_err() {
                break;
            }
        }
    });

    // 5. Drive until the stream ends, the user stops, or Ctrl+C.
    let mut status = tokio::time::interval(std::time::Duration::from_secs(5));
    let stats = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, stopping");
                break handle.stop().await;
            }
            Some(cmd) = cmd_rx.recv() => match cmd.as_str() {
                "pause" => handle.pause(),
                "play" => handle.play(),
                "stop" => {
                    handle.stop_playback();
                    break handle.wait().await;
                }
                "quit" => break handle.stop().await,
                other => match other.split_once(' ') {
                    Some(("accept", tag)) => handle.respond(tag.trim(), true),
                    Some(("decline", tag)) => handle.respond(tag.trim(), false),
                    _ => println!("Unknown command '{}'", other),
                },
            },
            _ = status.tick() => {
                if !handle.is_active() {
                    break handle.wait().await;
                }
                let playback = handle.playback();
                tracing::debug!(
                    "Playback {:?} at {}ms ({}ms buffered)",
                    playback.status,
                    playback.position_ms,
                    playback.buffered_ms
                );
            }
        }
    };

    println!("--- Session Summary ---");
    println!("{:#?}", stats);
    Ok(())
}
