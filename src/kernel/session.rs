use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audio::assembler::WindowAssembler;
use super::audio::clock::PlaybackStatus;
use super::audio::player::{AudioStreamPlayer, PlayerSnapshot};
use super::audio::segment::{PcmBlock, RateLock, SegmentQueue, SegmentReceiver, SegmentSender, Window};
use super::bootstrap::bootstrap_trigger;
use super::event::PlayerCommand;
use super::scheduler::{TagEffect, TagScheduler};
use super::tags::{PendingTag, PendingTags};
use super::telemetry::{LifecycleEvent, PipelineStats, SharedTelemetry, TelemetryEvent};
use super::time::{samples_to_ms, window_samples};
use super::trigger::{AmplitudeMatcher, DetectorStep, TriggerDetector, TriggerMatcher};
use crate::audio::decode::{AudioDecoder, SymphoniaDecoder};
use crate::audio::fetch::{read_source, FetchSummary, StreamFetcher};
use crate::audio::resample::{Resample, RubatoResampler};
use crate::config::SessionConfig;
use crate::error::{FetchError, SessionError};
use crate::outputs::{HttpTagSink, InteractionAction, LoggingTagSink, TagSink};
use crate::resolver::{SelectionPolicy, TagResolver};
use crate::services::fingerprint::{FingerprintService, HttpFingerprintService};

/// Collaborators a session is wired to.
#[derive(Clone)]
pub struct SessionDeps {
    pub decoder: Arc<dyn AudioDecoder>,
    pub resampler: Arc<dyn Resample>,
    pub service: Arc<dyn FingerprintService>,
    /// Defaults to the amplitude matcher built from the config.
    pub matcher: Option<Arc<dyn TriggerMatcher>>,
    pub sink: Arc<dyn TagSink>,
}

impl SessionDeps {
    /// Production wiring: symphonia, rubato, HTTP services, logging UI.
    pub fn from_config(config: &SessionConfig) -> Self {
        let timeout = Duration::from_millis(config.service_timeout_ms);
        Self {
            decoder: Arc::new(SymphoniaDecoder::new()),
            resampler: Arc::new(RubatoResampler),
            service: Arc::new(HttpFingerprintService::new(
                config.extract_url.clone(),
                config.search_url.clone(),
                timeout,
            )),
            matcher: None,
            sink: Arc::new(HttpTagSink::new(LoggingTagSink, config.interaction_url.clone(), timeout)),
        }
    }
}

enum ByteSource {
    Url(String),
    Stream(BoxStream<'static, Result<Bytes, FetchError>>),
}

/// One active stream: fetch, segmentation, detection, playback and the tag
/// scheduler, each on its own task.
pub struct Session;

impl Session {
    /// Load the trigger, bootstrap it and start on `config.stream_url`.
    pub async fn start(config: SessionConfig, deps: SessionDeps) -> Result<SessionHandle, SessionError> {
        config.validate()?;
        let trigger = read_source(&config.trigger_source)
            .await
            .map_err(|e| SessionError::Bootstrap(format!("load {}: {}", config.trigger_source, e)))?;
        let url = config.stream_url.clone();
        Self::launch(config, deps, &trigger, ByteSource::Url(url)).await
    }

    /// Start on an already-open byte stream.
    pub async fn start_with_stream(
        config: SessionConfig,
        deps: SessionDeps,
        trigger: &[u8],
        stream: BoxStream<'static, Result<Bytes, FetchError>>,
    ) -> Result<SessionHandle, SessionError> {
        config.validate()?;
        Self::launch(config, deps, trigger, ByteSource::Stream(stream)).await
    }

    async fn launch(
        config: SessionConfig,
        deps: SessionDeps,
        trigger: &[u8],
        source: ByteSource,
    ) -> Result<SessionHandle, SessionError> {
        let reference = bootstrap_trigger(
            trigger,
            deps.decoder.as_ref(),
            deps.resampler.as_ref(),
            deps.service.as_ref(),
            config.fingerprint_sample_rate,
        )
        .await?;

        let id = Uuid::new_v4();
        let telemetry = SharedTelemetry::new();
        let cancel = CancellationToken::new();

        let (segment_tx, segment_rx) = SegmentQueue::channel();
        let (player_tx, player_rx) = mpsc::unbounded_channel::<PcmBlock>();
        let (window_tx, window_rx) = mpsc::unbounded_channel::<Window>();
        let (tag_tx, tag_rx) = mpsc::unbounded_channel::<PendingTag>();
        let (command_tx, command_rx) = mpsc::unbounded_channel::<PlayerCommand>();
        let (state_tx, state_rx) = watch::channel(AudioStreamPlayer::new(Duration::ZERO).snapshot());

        let matcher: Arc<dyn TriggerMatcher> = match deps.matcher.clone() {
            Some(matcher) => matcher,
            None => Arc::new(AmplitudeMatcher::new(
                config.fingerprint_sample_rate,
                config.match_hop,
                config.similarity_threshold,
            )),
        };
        let detector = TriggerDetector::new(Arc::new(reference), matcher, config.extraction_ms);
        let resolver = Arc::new(TagResolver::new(
            deps.service.clone(),
            deps.resampler.clone(),
            config.fingerprint_sample_rate,
            SelectionPolicy {
                threshold: config.threshold_for_stream(),
                actionable: config.actionable.clone(),
            },
            telemetry.clone(),
        ));
        let fetcher = StreamFetcher::new(deps.decoder.clone(), config.fetch_chunk_bytes(), telemetry.clone());

        telemetry.record(TelemetryEvent::Lifecycle(LifecycleEvent::SessionStarted));
        info!(
            "Session {}: started (window {}s, extraction {}ms, lead {}s)",
            id,
            config.window_seconds, config.extraction_ms, config.playback_lead_seconds
        );

        let tasks = vec![
            tokio::spawn(fetch_loop(fetcher, source, segment_tx, player_tx, cancel.clone(), telemetry.clone())),
            tokio::spawn(segmentation_loop(
                segment_rx,
                window_tx,
                config.window_seconds,
                cancel.clone(),
                telemetry.clone(),
            )),
            tokio::spawn(detection_loop(
                detector,
                window_rx,
                resolver,
                tag_tx,
                cancel.clone(),
                telemetry.clone(),
            )),
            tokio::spawn(playback_loop(
                AudioStreamPlayer::new(Duration::from_secs_f64(config.playback_lead_seconds)),
                player_rx,
                command_rx,
                state_tx,
                config.device_output,
                Duration::from_millis(config.playback_tick_ms),
                cancel.clone(),
                telemetry.clone(),
            )),
            tokio::spawn(scheduler_loop(
                TagScheduler::new(config.arrival_window_ms),
                tag_rx,
                state_rx.clone(),
                deps.sink.clone(),
                Duration::from_millis(config.scheduler_tick_ms),
                cancel.clone(),
                telemetry.clone(),
            )),
        ];

        Ok(SessionHandle {
            id,
            cancel,
            tasks,
            telemetry,
            playback: state_rx,
            commands: command_tx,
            sink: deps.sink,
        })
    }
}

pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    telemetry: SharedTelemetry,
    playback: watch::Receiver<PlayerSnapshot>,
    commands: mpsc::UnboundedSender<PlayerCommand>,
    sink: Arc<dyn TagSink>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stats(&self) -> PipelineStats {
        self.telemetry.snapshot()
    }

    pub fn playback(&self) -> PlayerSnapshot {
        *self.playback.borrow()
    }

    pub fn play(&self) {
        let _ = self.commands.send(PlayerCommand::Play);
    }

    pub fn pause(&self) {
        let _ = self.commands.send(PlayerCommand::Pause);
    }

    /// End playback now. The session winds down on the next scheduler tick;
    /// follow with `wait()`.
    pub fn stop_playback(&self) {
        let _ = self.commands.send(PlayerCommand::Stop);
    }

    /// Listener answered a prompt. Reported like any other interaction.
    pub fn respond(&self, tag_id: &str, accepted: bool) {
        let action = if accepted {
            InteractionAction::Accepted
        } else {
            InteractionAction::Declined
        };
        self.sink.report_interaction(tag_id, action);
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop every loop and wait for them. In-flight resolutions are discarded.
    pub async fn stop(self) -> PipelineStats {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the stream to end and playback to drain.
    pub async fn wait(self) -> PipelineStats {
        self.join().await
    }

    async fn join(mut self) -> PipelineStats {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Session: task failed: {}", e);
            }
        }
        self.cancel.cancel();
        self.telemetry.record(TelemetryEvent::Lifecycle(LifecycleEvent::SessionStopped));
        info!("Session {}: stopped", self.id);
        self.telemetry.snapshot()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn fetch_loop(
    fetcher: StreamFetcher,
    source: ByteSource,
    segments: SegmentSender,
    player: mpsc::UnboundedSender<PcmBlock>,
    cancel: CancellationToken,
    telemetry: SharedTelemetry,
) {
    let mut fanout = BlockFanout::new(player, segments);
    let hook = |block: PcmBlock| fanout.forward(block);

    let run = async {
        match source {
            ByteSource::Url(url) => fetcher.run(&url, hook, cancel.clone()).await,
            ByteSource::Stream(stream) => fetcher.run_stream(stream, hook, cancel.clone()).await,
        }
    };
    let result = tokio::select! {
        _ = cancel.cancelled() => Ok(FetchSummary::default()),
        result = run => result,
    };
    if let Err(e) = result {
        warn!("Session: stream fetch ended with error: {}", e);
    }
    telemetry.record(TelemetryEvent::Lifecycle(LifecycleEvent::StreamEnded));
    // Dropping the senders closes the segment and playback queues.
}

/// Hands each decoded block to both the player and the segmentation queue.
struct BlockFanout {
    rate: RateLock,
    player: mpsc::UnboundedSender<PcmBlock>,
    segments: SegmentSender,
}

impl BlockFanout {
    fn new(player: mpsc::UnboundedSender<PcmBlock>, segments: SegmentSender) -> Self {
        Self {
            rate: RateLock::new(),
            player,
            segments,
        }
    }

    /// Returns false once neither consumer is listening.
    fn forward(&mut self, block: PcmBlock) -> bool {
        if !self.rate.admit(&block) {
            warn!(
                "Session: dropping {} samples at {}Hz, stream is {}Hz",
                block.len(),
                block.sample_rate(),
                self.rate.rate().unwrap_or_default()
            );
            return true;
        }
        let playing = self.player.send(block.clone()).is_ok();
        let segmenting = self.segments.push(block);
        playing || segmenting
    }
}

async fn segmentation_loop(
    mut segments: SegmentReceiver,
    windows: mpsc::UnboundedSender<Window>,
    window_seconds: f64,
    cancel: CancellationToken,
    telemetry: SharedTelemetry,
) {
    let mut assembler: Option<WindowAssembler> = None;
    loop {
        let block = tokio::select! {
            _ = cancel.cancelled() => break,
            block = segments.pop() => match block {
                Some(block) => block,
                None => break,
            },
        };

        // Window length is fixed by the first decoded rate.
        let asm = assembler.get_or_insert_with(|| {
            let len = window_samples(window_seconds, block.sample_rate()).max(1);
            debug!("Segmentation: {} samples per window at {}Hz", len, block.sample_rate());
            WindowAssembler::new(len, block.sample_rate())
        });

        let emitted = asm.push(block);
        if !emitted.is_empty() {
            telemetry.record(TelemetryEvent::WindowEmitted { count: emitted.len() });
        }
        for window in emitted {
            if windows.send(window).is_err() {
                return;
            }
        }
    }
    debug!("Segmentation: finished");
}

async fn detection_loop(
    mut detector: TriggerDetector,
    mut windows: mpsc::UnboundedReceiver<Window>,
    resolver: Arc<TagResolver>,
    tags: mpsc::UnboundedSender<PendingTag>,
    cancel: CancellationToken,
    telemetry: SharedTelemetry,
) {
    loop {
        let window = tokio::select! {
            _ = cancel.cancelled() => break,
            window = windows.recv() => match window {
                Some(window) => window,
                None => break,
            },
        };
        detector.push_window(window);

        // Run until the detector needs more data.
        loop {
            let index = detector.index();
            match detector.step() {
                DetectorStep::Waiting => break,
                DetectorStep::Advanced => {
                    telemetry.record(TelemetryEvent::WindowSkipped { window_index: index });
                }
                DetectorStep::Armed { skip, offset_ms } => {
                    telemetry.record(TelemetryEvent::TriggerDetected {
                        window_index: index,
                        offset_ms,
                        skip,
                    });
                }
                DetectorStep::Extracted(hit) => {
                    telemetry.record(TelemetryEvent::SegmentExtracted {
                        data_position_ms: hit.data_position_ms(),
                        duration_ms: samples_to_ms(hit.segment.len(), hit.segment.sample_rate()),
                    });
                    resolver.dispatch(hit, tags.clone(), cancel.clone());
                }
            }
        }
    }
    debug!(
        "Detection: finished at window {} ({} buffered)",
        detector.index(),
        detector.buffered()
    );
}

async fn playback_loop(
    mut player: AudioStreamPlayer,
    mut blocks: mpsc::UnboundedReceiver<PcmBlock>,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
    state: watch::Sender<PlayerSnapshot>,
    device_output: bool,
    tick: Duration,
    cancel: CancellationToken,
    telemetry: SharedTelemetry,
) {
    let mut cadence = interval(tick);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Opened lazily at the first decoded rate.
    let mut device = DeviceSlot::new(device_output);
    let mut upstream_open = true;
    let mut commands_open = true;
    let mut last_status = PlaybackStatus::Stopped;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            block = blocks.recv(), if upstream_open => {
                let now = Instant::now().into_std();
                match block {
                    Some(block) => {
                        device.attach(&mut player, block.sample_rate());
                        player.enqueue(block, now);
                    }
                    None => {
                        upstream_open = false;
                        player.close_upstream(now);
                    }
                }
            }
            command = commands.recv(), if commands_open => {
                let now = Instant::now().into_std();
                match command {
                    Some(PlayerCommand::Play) => player.play(now),
                    Some(PlayerCommand::Pause) => player.pause(now),
                    Some(PlayerCommand::Stop) => player.stop(now),
                    None => commands_open = false,
                }
            }
            _ = cadence.tick() => {
                let snapshot = player.tick(Instant::now().into_std());
                if snapshot.status != last_status {
                    telemetry.record(TelemetryEvent::Playback {
                        from: last_status,
                        to: snapshot.status,
                        position_ms: snapshot.position_ms,
                    });
                    last_status = snapshot.status;
                }
                let _ = state.send(snapshot);
                if snapshot.ended {
                    break;
                }
            }
        }
    }
    debug!("Playback: finished at {}ms", player.snapshot().position_ms);
}

struct DeviceSlot {
    wanted: bool,
    #[cfg(feature = "device-output")]
    _output: Option<crate::audio::output::AudioOutput>,
}

impl DeviceSlot {
    fn new(wanted: bool) -> Self {
        Self {
            wanted,
            #[cfg(feature = "device-output")]
            _output: None,
        }
    }

    #[cfg(feature = "device-output")]
    fn attach(&mut self, player: &mut AudioStreamPlayer, sample_rate: u32) {
        if !self.wanted || player.has_output() {
            return;
        }
        self.wanted = false;
        match crate::audio::output::AudioOutput::spawn(sample_rate, 4.0) {
            Ok((output, producer)) => {
                player.attach_output(producer);
                self._output = Some(output);
            }
            Err(e) => warn!("Playback: output device unavailable, continuing silently: {}", e),
        }
    }

    #[cfg(not(feature = "device-output"))]
    fn attach(&mut self, _player: &mut AudioStreamPlayer, _sample_rate: u32) {
        if self.wanted {
            self.wanted = false;
            warn!("Playback: built without device-output, playing silently");
        }
    }
}

async fn scheduler_loop(
    scheduler: TagScheduler,
    mut incoming: mpsc::UnboundedReceiver<PendingTag>,
    playback: watch::Receiver<PlayerSnapshot>,
    sink: Arc<dyn TagSink>,
    tick: Duration,
    cancel: CancellationToken,
    telemetry: SharedTelemetry,
) {
    let mut pending = PendingTags::new();
    let mut cadence = interval(tick);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut incoming_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            tag = incoming.recv(), if incoming_open => match tag {
                Some(tag) => {
                    debug!("Scheduler: pending tag {} at {}ms", tag.id, tag.data_position);
                    pending.insert(tag);
                }
                None => incoming_open = false,
            },
            _ = cadence.tick() => {
                let snapshot = *playback.borrow();
                if snapshot.ended {
                    let dropped = pending.clear();
                    if dropped > 0 {
                        info!("Scheduler: stream ended, dropping {} pending tag(s)", dropped);
                    }
                    // Playback is over: wind down every other loop.
                    cancel.cancel();
                    break;
                }
                if snapshot.status != PlaybackStatus::Playing {
                    continue;
                }

                let outcome = scheduler.schedule(&mut pending, snapshot.position_ms);
                for tag in &outcome.missed {
                    debug!("Scheduler: missed tag {} at {}ms (now {}ms)", tag.id, tag.data_position, snapshot.position_ms);
                    telemetry.record(TelemetryEvent::TagMissed {
                        data_position_ms: tag.data_position,
                        lateness_ms: snapshot.position_ms.saturating_sub(tag.data_position),
                    });
                }
                if let Some(effect) = outcome.fired {
                    fire(&effect, sink.as_ref(), snapshot.position_ms, &telemetry);
                }
            }
        }
    }
    debug!("Scheduler: finished with {} pending", pending.len());
}

fn fire(effect: &TagEffect, sink: &dyn TagSink, now_ms: u64, telemetry: &SharedTelemetry) {
    let tag = effect.tag();
    let silent = matches!(effect, TagEffect::SilentCall(_));
    info!(
        "Scheduler: firing tag {} at {}ms (position {}ms)",
        tag.id, now_ms, tag.data_position
    );
    telemetry.record(TelemetryEvent::TagFired {
        data_position_ms: tag.data_position,
        lateness_ms: now_ms.saturating_sub(tag.data_position),
        silent,
    });
    sink.fire_tag(effect);
    let action = if silent {
        InteractionAction::Called
    } else {
        InteractionAction::Shown
    };
    sink.report_interaction(&tag.id, action);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_drops_off_rate_blocks_from_both_consumers() {
        let (player_tx, mut player_rx) = mpsc::unbounded_channel();
        let (segment_tx, mut segment_rx) = SegmentQueue::channel();
        let mut fanout = BlockFanout::new(player_tx, segment_tx);

        assert!(fanout.forward(PcmBlock::new(vec![0.1; 100], 8000)));
        assert!(fanout.forward(PcmBlock::new(vec![0.2; 50], 16000)));
        assert!(fanout.forward(PcmBlock::new(vec![0.3; 70], 8000)));

        let played: Vec<usize> = std::iter::from_fn(|| player_rx.try_recv().ok()).map(|b| b.len()).collect();
        let segmented: Vec<usize> = std::iter::from_fn(|| segment_rx.try_pop()).map(|b| b.len()).collect();
        assert_eq!(played, vec![100, 70]);
        assert_eq!(segmented, played);
    }

    #[test]
    fn fanout_reports_when_both_consumers_are_gone() {
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let (segment_tx, segment_rx) = SegmentQueue::channel();
        let mut fanout = BlockFanout::new(player_tx, segment_tx);

        drop(player_rx);
        assert!(fanout.forward(PcmBlock::new(vec![0.0; 10], 8000)));
        drop(segment_rx);
        assert!(!fanout.forward(PcmBlock::new(vec![0.0; 10], 8000)));
    }
}
