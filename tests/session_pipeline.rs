mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tunetag::kernel::audio::PlaybackStatus;
use tunetag::kernel::scheduler::TagEffect;
use tunetag::outputs::{InteractionAction, UiEvent};
use tunetag::{Session, SessionError};

fn fired(events: &[UiEvent]) -> Vec<TagEffect> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Fired(effect) => Some(effect.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_tag_fires_when_playback_reaches_trigger() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service.clone());

    // 1. 10s of noise with the trigger at 4.0s
    let stream = byte_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    // 2. Run to the natural end of playback
    let stats = handle.wait().await;

    // 3. Exactly one prompt, anchored at the trigger
    let events = drain(&mut ui);
    let effects = fired(&events);
    assert_eq!(effects.len(), 1, "events: {:?}", events);
    match &effects[0] {
        TagEffect::Prompt(tag) => {
            assert_eq!(tag.id, "42");
            assert_eq!(tag.data_position, 4000);
            assert_eq!(tag.index, 1);
            assert_eq!(tag.match_percentage, 80);
        }
        other => panic!("expected a prompt, got {:?}", other),
    }
    assert!(events.contains(&UiEvent::Interaction {
        tag_id: "42".into(),
        action: InteractionAction::Shown
    }));

    // 4. Pipeline accounting
    assert_eq!(stats.decode.blocks, 6, "two half-second reads are dropped as tail");
    assert_eq!(stats.decode.windows, 6);
    assert_eq!(stats.detection.triggers, 1);
    assert_eq!(stats.detection.extractions, 1);
    assert_eq!(stats.resolution.resolved, 1);
    assert_eq!(stats.scheduling.fired, 1);
    assert_eq!(stats.scheduling.missed, 0);
    assert!(stats.scheduling.avg_lateness_ms < 1000.0);
    assert!(stats.stream_ended);
    assert!(stats.playback.last_position_ms >= 8990 && stats.playback.last_position_ms <= 9010);

    // Bootstrap + one hit
    assert_eq!(service.extracts.load(Ordering::SeqCst), 2);
    assert_eq!(service.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_search_yields_no_tag() {
    let service = Arc::new(MockService::answering(serde_json::json!({
        "message": "No Matching fingerprint found"
    })));
    let (deps, mut ui) = test_deps(service);

    let stream = byte_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");
    let stats = handle.wait().await;

    assert!(drain(&mut ui).is_empty());
    assert_eq!(stats.detection.extractions, 1);
    assert_eq!(stats.resolution.empty, 1);
    assert_eq!(stats.scheduling.fired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_same_candidate_is_only_tagged_once() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service.clone());

    // Trigger twice; the search answers the same candidate both times.
    let stream = byte_stream(&broadcast(10.0, &[4.0, 7.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");
    let stats = handle.wait().await;

    assert_eq!(stats.detection.extractions, 2);
    assert_eq!(service.searches.load(Ordering::SeqCst), 2);
    assert_eq!(stats.resolution.resolved, 1);
    assert_eq!(stats.resolution.empty, 1);
    assert_eq!(fired(&drain(&mut ui)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_api_call_tags_fire_silently() {
    let service = Arc::new(MockService::answering(MockService::candidate("7", "API_call", 55)));
    let (deps, mut ui) = test_deps(service);

    let stream = byte_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");
    let stats = handle.wait().await;

    let events = drain(&mut ui);
    assert!(matches!(fired(&events).as_slice(), [TagEffect::SilentCall(tag)] if tag.id == "7"));
    assert!(events.contains(&UiEvent::Interaction {
        tag_id: "7".into(),
        action: InteractionAction::Called
    }));
    assert_eq!(stats.scheduling.silent_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_position_and_tag_waits_for_it() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "save_page", 90)));
    let (deps, mut ui) = test_deps(service);

    let stream = byte_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    // 1. Play one second, then pause for five
    tokio::time::sleep(Duration::from_millis(1000)).await;
    handle.pause();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = handle.playback();
    assert_eq!(snapshot.status, PlaybackStatus::Paused);
    assert!(
        snapshot.position_ms >= 990 && snapshot.position_ms <= 1010,
        "position {}",
        snapshot.position_ms
    );
    // Wall time passed the trigger; playback position did not.
    assert!(fired(&drain(&mut ui)).is_empty());

    // 2. Resume and let it finish
    handle.play();
    let stats = handle.wait().await;

    let effects = fired(&drain(&mut ui));
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].tag().data_position, 4000);
    assert_eq!(stats.playback.pauses, 1);
    assert_eq!(stats.scheduling.missed, 0);
    assert!(stats.scheduling.avg_lateness_ms < 1000.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_an_open_stream() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service);

    let stream = endless_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(handle.is_active());
    let stats = handle.stop().await;

    // Tag resolved but playback never reached it.
    assert_eq!(stats.resolution.resolved, 1);
    assert_eq!(stats.scheduling.fired, 0);
    assert!(stats.stream_ended);
    assert!(fired(&drain(&mut ui)).is_empty());
}

#[tokio::test]
async fn test_bootstrap_failure_is_fatal() {
    let service = Arc::new(MockService {
        fail_extract: true,
        ..MockService::answering(serde_json::json!([]))
    });
    let (deps, _ui) = test_deps(service);

    let stream = byte_stream(&broadcast(3.0, &[]));
    let result = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream).await;
    assert!(matches!(result, Err(SessionError::Bootstrap(_))));
}

#[tokio::test]
async fn test_undecodable_trigger_is_fatal() {
    let service = Arc::new(MockService::answering(serde_json::json!([])));
    let (deps, _ui) = test_deps(service.clone());

    let stream = byte_stream(&broadcast(3.0, &[]));
    let result = Session::start_with_stream(test_config(), deps, &[1, 2, 3], stream).await;
    assert!(matches!(result, Err(SessionError::Bootstrap(_))));
    assert_eq!(service.extracts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_bootstrap() {
    let service = Arc::new(MockService::answering(serde_json::json!([])));
    let (deps, _ui) = test_deps(service.clone());

    let config = tunetag::SessionConfig {
        window_seconds: 0.0,
        ..test_config()
    };
    let stream = byte_stream(&broadcast(3.0, &[]));
    let result = Session::start_with_stream(config, deps, &trigger_bytes(), stream).await;
    assert!(matches!(result, Err(SessionError::Config(_))));
    assert_eq!(service.extracts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stopping_playback_ends_the_session() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service);

    let stream = endless_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.stop_playback();

    // The scheduler notices the ended player and cancels every loop.
    let stats = handle.wait().await;
    assert_eq!(stats.scheduling.fired, 0);
    assert!(stats.playback.last_position_ms <= 2010);
    assert!(fired(&drain(&mut ui)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_cancels_the_session() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service);

    let stream = endless_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    tokio::time::sleep(Duration::from_secs(2)).await;
    drop(handle);

    // Every loop exits, releasing the last sender of the UI channel.
    let closed = tokio::time::timeout(Duration::from_secs(5), ui.recv()).await;
    assert!(matches!(closed, Ok(None)), "session kept running: {:?}", closed);
}

#[tokio::test(start_paused = true)]
async fn test_listener_responses_are_reported() {
    let service = Arc::new(MockService::answering(MockService::candidate("42", "open_page", 80)));
    let (deps, mut ui) = test_deps(service);

    let stream = byte_stream(&broadcast(10.0, &[4.0]));
    let handle = Session::start_with_stream(test_config(), deps, &trigger_bytes(), stream)
        .await
        .expect("bootstrap should succeed");

    // Past the trigger, while the prompt is up.
    tokio::time::sleep(Duration::from_secs(6)).await;
    handle.respond("42", true);
    handle.respond("42", false);
    handle.wait().await;

    let actions: Vec<InteractionAction> = drain(&mut ui)
        .into_iter()
        .filter_map(|e| match e {
            UiEvent::Interaction { tag_id, action } if tag_id == "42" => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(
        actions,
        vec![InteractionAction::Shown, InteractionAction::Accepted, InteractionAction::Declined]
    );
}
