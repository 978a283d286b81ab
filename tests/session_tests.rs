// Integration tests for the recording session lifecycle
//
// All time-dependent tests run on tokio's paused clock, so the 10 second
// ceiling and the ~60fps feed elapse instantly and deterministically.

mod fixtures;

use anyhow::Result;
use fixtures::{tone_buffer, MockBackend, MockControl, ObserverLog, RecordingObserver};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use voice_sampler::audio::EncodedChunk;
use voice_sampler::session::{
    NullObserver, RecorderHandle, RecordingSessionManager, SessionConfig, SessionError,
    SessionOutcome, SessionState, StopReason, RECORDING_CEILING_SECS,
};

struct Harness {
    recorder: RecorderHandle,
    task: JoinHandle<()>,
    control: MockControl,
    log: Arc<Mutex<ObserverLog>>,
}

fn spawn_session() -> Harness {
    let (backend, control) = MockBackend::new();
    let (observer, log) = RecordingObserver::new();
    let manager = RecordingSessionManager::new(
        Box::new(backend),
        Box::new(observer),
        SessionConfig::default(),
    );
    let (recorder, task) = manager.spawn();

    Harness {
        recorder,
        task,
        control,
        log,
    }
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_auto_stops_and_delivers_artifact() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    for _ in 0..5 {
        assert!(h.control.push_samples(&tone_buffer(440.0, 8000)));
    }

    sleep(Duration::from_secs(RECORDING_CEILING_SECS as u64 + 1)).await;

    let snapshot = h.recorder.snapshot().await?;
    assert_eq!(snapshot.state, SessionState::Finalized);
    assert_eq!(snapshot.last_stop, Some(StopReason::CeilingReached));
    assert_eq!(snapshot.remaining_secs, 0);
    assert!(!snapshot.input_active);
    assert!(!h.control.is_open());

    let log = h.log.lock().unwrap();
    assert_eq!(log.ticks, (1..=10).collect::<Vec<_>>());
    assert_eq!(log.completions.len(), 1);

    let completion = &log.completions[0];
    assert_eq!(completion.reason, StopReason::CeilingReached);
    let artifact = completion.artifact().expect("artifact delivered");
    assert_eq!(artifact.len(), 5 * 1600 * 2);
    assert_eq!(artifact.chunk_count(), 5);
    assert_eq!(snapshot.artifact.as_ref().map(|a| a.bytes), Some(artifact.len()));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_is_never_exceeded() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    sleep(Duration::from_secs(60)).await;

    let log = h.log.lock().unwrap();
    assert_eq!(log.ticks.last(), Some(&RECORDING_CEILING_SECS));
    assert_eq!(log.ticks.len(), RECORDING_CEILING_SECS as usize);
    assert_eq!(log.completions.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_at_three_seconds_ends_ticks_and_frames() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_samples(&tone_buffer(1000.0, 12000));

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(
        h.recorder.state().await?,
        SessionState::Recording { elapsed_secs: 3 }
    );
    assert_eq!(h.recorder.snapshot().await?.remaining_secs, 7);

    h.recorder.stop().await?;
    assert!(!h.control.is_open());

    let frames_at_stop = {
        let log = h.log.lock().unwrap();
        assert!(log.frames > 0, "frames are rendered while recording");
        assert_eq!(log.frames_at_completion, vec![log.frames]);
        log.frames
    };

    sleep(Duration::from_secs(5)).await;

    let log = h.log.lock().unwrap();
    assert_eq!(log.ticks, vec![1, 2, 3]);
    assert_eq!(log.frames, frames_at_stop, "no frames after stop");
    assert_eq!(log.completions.len(), 1);
    assert_eq!(log.completions[0].reason, StopReason::Manual);
    assert!(log.last_frame.iter().all(|m| (0.0..=1.0).contains(m)));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_while_recording_leaves_session_untouched() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    let first = h.recorder.snapshot().await?;

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        h.recorder.start().await,
        Err(SessionError::SessionAlreadyActive)
    );

    let second = h.recorder.snapshot().await?;
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.state, SessionState::Recording { elapsed_secs: 2 });
    assert_eq!(h.control.starts(), 1);
    assert!(h.control.is_open());

    sleep(Duration::from_secs(10)).await;

    let log = h.log.lock().unwrap();
    assert_eq!(log.ticks, (1..=10).collect::<Vec<_>>());
    assert_eq!(log.completions.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_while_finalized_is_rejected() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.recorder.stop().await?;

    assert_eq!(
        h.recorder.start().await,
        Err(SessionError::SessionAlreadyActive)
    );
    assert_eq!(h.recorder.state().await?, SessionState::Finalized);
    assert_eq!(h.control.starts(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_audio_reports_no_data() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_chunk(EncodedChunk::new(Vec::new()));
    h.recorder.stop().await?;

    let snapshot = h.recorder.snapshot().await?;
    assert_eq!(snapshot.state, SessionState::Finalized);
    assert!(snapshot.artifact.is_none());

    let log = h.log.lock().unwrap();
    assert_eq!(log.completions.len(), 1);
    assert!(log.completions[0].is_no_data());
    assert!(matches!(log.completions[0].outcome, SessionOutcome::NoData));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_queued_chunks_are_kept_on_stop() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    // Sizes chosen so the artifact length proves every chunk landed in order
    let sizes = [2usize, 6, 0, 10, 4];
    let mut expected = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let bytes = vec![i as u8; *size];
        expected.extend_from_slice(&bytes);
        h.control.push_chunk(EncodedChunk::new(bytes));
    }
    h.recorder.stop().await?;

    let log = h.log.lock().unwrap();
    let artifact = log.completions[0].artifact().expect("artifact delivered");
    assert_eq!(artifact.len(), sizes.iter().sum::<usize>());
    assert_eq!(artifact.chunk_count(), 4);
    assert_eq!(artifact.data().as_ref(), expected.as_slice());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stream_failure_finalizes_with_partial_artifact() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_samples(&tone_buffer(300.0, 4000));
    h.control.push_samples(&tone_buffer(300.0, 4000));
    h.control.fail("device unplugged");

    sleep(Duration::from_millis(100)).await;

    let snapshot = h.recorder.snapshot().await?;
    assert_eq!(snapshot.state, SessionState::Finalized);
    assert_eq!(
        snapshot.last_stop,
        Some(StopReason::StreamFailed("device unplugged".to_string()))
    );
    assert!(!snapshot.input_active);
    assert_eq!(h.control.stops(), 1);

    sleep(Duration::from_secs(15)).await;

    let log = h.log.lock().unwrap();
    assert_eq!(log.completions.len(), 1);
    assert!(log.completions[0].reason.is_fault());
    assert_eq!(
        log.completions[0].artifact().map(|a| a.len()),
        Some(2 * 1600 * 2)
    );
    assert!(log.ticks.is_empty(), "timer disarmed before its first pulse");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stream_hang_up_is_treated_as_failure() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.hang_up();
    sleep(Duration::from_millis(50)).await;

    let snapshot = h.recorder.snapshot().await?;
    assert_eq!(snapshot.state, SessionState::Finalized);
    assert!(matches!(snapshot.last_stop, Some(StopReason::StreamFailed(_))));
    assert!(!h.control.is_open());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_shuts_down_session() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_samples(&tone_buffer(500.0, 4000));

    drop(h.recorder);
    h.task.await?;

    assert!(!h.control.is_open());
    let log = h.log.lock().unwrap();
    assert_eq!(log.completions.len(), 1);
    assert_eq!(log.completions[0].reason, StopReason::Shutdown);
    assert!(log.completions[0].artifact().is_some());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_reset_from_invalid_states_are_noops() -> Result<()> {
    let h = spawn_session();

    h.recorder.stop().await?;
    h.recorder.reset().await?;
    assert_eq!(h.recorder.state().await?, SessionState::Idle);

    h.recorder.start().await?;
    h.recorder.reset().await?;
    assert!(h.recorder.state().await?.is_recording());
    assert!(h.control.is_open());

    h.recorder.stop().await?;
    h.recorder.stop().await?;
    assert_eq!(h.recorder.state().await?, SessionState::Finalized);

    let log = h.log.lock().unwrap();
    assert_eq!(log.completions.len(), 1);
    assert_eq!(log.cleared, 0);
    assert_eq!(h.control.stops(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_denied_device_stays_idle() -> Result<()> {
    let h = spawn_session();
    h.control.deny("permission denied");

    match h.recorder.start().await {
        Err(SessionError::DeviceUnavailable(reason)) => {
            assert!(reason.contains("permission denied"))
        }
        other => panic!("expected DeviceUnavailable, got {:?}", other),
    }

    let snapshot = h.recorder.snapshot().await?;
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(snapshot.session_id.is_none());
    assert!(!snapshot.input_active);

    sleep(Duration::from_secs(2)).await;
    assert!(h.log.lock().unwrap().ticks.is_empty());

    // No automatic retry; the caller tries again
    h.control.allow();
    h.recorder.start().await?;
    assert!(h.recorder.state().await?.is_recording());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_artifact_and_allows_new_session() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_samples(&tone_buffer(220.0, 4000));
    h.recorder.stop().await?;
    let first = h.recorder.snapshot().await?;
    assert!(first.held_artifact.is_some());

    h.recorder.reset().await?;
    let cleared = h.recorder.snapshot().await?;
    assert_eq!(cleared.state, SessionState::Idle);
    assert!(cleared.artifact.is_none());
    assert!(cleared.held_artifact.is_none());
    assert!(cleared.session_id.is_none());
    assert_eq!(h.log.lock().unwrap().cleared, 1);

    h.recorder.start().await?;
    let second = h.recorder.snapshot().await?;
    assert_ne!(second.session_id, first.session_id);
    assert_eq!(h.control.starts(), 2);

    Ok(())
}

/// xorshift64*, enough to make the operation sequence reproducible
struct SeededRng(u64);

impl SeededRng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[tokio::test(start_paused = true)]
async fn test_device_open_iff_recording_for_random_sequences() -> Result<()> {
    for seed in [1u64, 7, 42, 1234, 0xDEAD_BEEF] {
        let h = spawn_session();
        let mut rng = SeededRng(seed);

        for _ in 0..100 {
            match rng.below(6) {
                0 => {
                    let _ = h.recorder.start().await;
                }
                1 => h.recorder.stop().await?,
                2 => h.recorder.reset().await?,
                3 => {
                    h.control.push_samples(&tone_buffer(440.0, 2000));
                }
                4 => sleep(Duration::from_millis(rng.below(2500))).await,
                _ => {
                    h.control.fail("glitch");
                }
            }

            let snapshot = h.recorder.snapshot().await?;
            assert_eq!(
                snapshot.input_active,
                snapshot.state.is_recording(),
                "seed {}: device open must track Recording ({:?})",
                seed,
                snapshot.state
            );
            if let SessionState::Recording { elapsed_secs } = snapshot.state {
                assert!(elapsed_secs < RECORDING_CEILING_SECS);
            }
        }

        let log = h.log.lock().unwrap();
        assert_eq!(log.completions.len(), h.control.stops());
        assert!(h.control.starts() >= log.completions.len());
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_turn_drives_session_without_spawning() -> Result<()> {
    let (backend, control) = MockBackend::new();
    let mut manager = RecordingSessionManager::new(
        Box::new(backend),
        Box::new(NullObserver),
        SessionConfig::default(),
    );

    assert!(!manager.turn().await, "nothing to drive while idle");

    manager.start().await?;
    control.push_samples(&tone_buffer(440.0, 8000));

    let mut turns = 0;
    while manager.turn().await {
        turns += 1;
    }
    assert!(turns > RECORDING_CEILING_SECS as usize);

    assert_eq!(manager.state(), SessionState::Finalized);
    assert!(!control.is_open());

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.last_stop, Some(StopReason::CeilingReached));
    assert_eq!(snapshot.artifact.map(|a| a.bytes), Some(1600 * 2));
    assert!(!manager.turn().await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_buffers_are_reported() -> Result<()> {
    let h = spawn_session();

    h.recorder.start().await?;
    h.control.push_samples(&tone_buffer(440.0, 8000));
    h.control.drop_buffers(3);
    assert_eq!(h.recorder.snapshot().await?.dropped_buffers, 3);

    h.recorder.stop().await?;
    assert_eq!(h.recorder.snapshot().await?.dropped_buffers, 3);
    {
        let log = h.log.lock().unwrap();
        assert_eq!(log.completions.len(), 1);
        assert_eq!(log.completions[0].dropped_buffers, 3);
    }

    h.recorder.reset().await?;
    assert_eq!(h.recorder.snapshot().await?.dropped_buffers, 0);

    Ok(())
}
