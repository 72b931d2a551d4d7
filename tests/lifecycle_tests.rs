//! Integration tests for the playback lifecycle
//!
//! This test suite verifies:
//! - Idempotent start and double-stop behavior
//! - Pause/resume toggling and the Idle no-op
//! - Immediate vs deferred stop and listener detachment
//! - Initialization failure, recovery, and teardown

use core_audio_queue::{
    AudioQueue, AudioQueueError, EngineError, PacketDescriptor, PlaybackEngine, PlaybackState,
    QueueConfig, QueueDelegate,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type EngineResult<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Counting Engine
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    open: u32,
    close: u32,
    start: u32,
    pause: u32,
    resume: u32,
    flush: u32,
    stop: u32,
    last_stop_immediate: Option<bool>,
    fail_open_times: u32,
    position: Duration,
}

#[derive(Clone, Default)]
struct CountingEngine {
    counters: Arc<Mutex<Counters>>,
}

impl CountingEngine {
    fn new() -> Self {
        Self::default()
    }

    fn with_failing_open(self, times: u32) -> Self {
        self.counters.lock().unwrap().fail_open_times = times;
        self
    }

    fn with_position(self, position: Duration) -> Self {
        self.counters.lock().unwrap().position = position;
        self
    }

    fn counts(&self) -> (u32, u32, u32, u32, u32, u32, u32) {
        let c = self.counters.lock().unwrap();
        (c.open, c.close, c.start, c.pause, c.resume, c.flush, c.stop)
    }

    fn last_stop_immediate(&self) -> Option<bool> {
        self.counters.lock().unwrap().last_stop_immediate
    }
}

impl PlaybackEngine for CountingEngine {
    fn open(&mut self, _config: &QueueConfig) -> EngineResult<()> {
        let mut c = self.counters.lock().unwrap();
        c.open += 1;
        if c.fail_open_times > 0 {
            c.fail_open_times -= 1;
            return Err(EngineError::new(-50, "open"));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.counters.lock().unwrap().close += 1;
    }

    fn enqueue_buffer(
        &mut self,
        _index: usize,
        _data: &[u8],
        _descriptors: &[PacketDescriptor],
    ) -> EngineResult<()> {
        Ok(())
    }

    fn start(&mut self) -> EngineResult<()> {
        self.counters.lock().unwrap().start += 1;
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.counters.lock().unwrap().pause += 1;
        Ok(())
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.counters.lock().unwrap().resume += 1;
        Ok(())
    }

    fn flush(&mut self) -> EngineResult<()> {
        self.counters.lock().unwrap().flush += 1;
        Ok(())
    }

    fn stop(&mut self, immediate: bool) -> EngineResult<()> {
        let mut c = self.counters.lock().unwrap();
        c.stop += 1;
        c.last_stop_immediate = Some(immediate);
        Ok(())
    }

    fn playback_position(&mut self) -> EngineResult<Duration> {
        Ok(self.counters.lock().unwrap().position)
    }
}

// ============================================================================
// State-Recording Delegate
// ============================================================================

#[derive(Clone, Default)]
struct StateLog {
    states: Arc<Mutex<Vec<PlaybackState>>>,
    init_failures: Arc<Mutex<u32>>,
}

impl StateLog {
    fn states(&self) -> Vec<PlaybackState> {
        self.states.lock().unwrap().clone()
    }

    fn init_failures(&self) -> u32 {
        *self.init_failures.lock().unwrap()
    }
}

impl QueueDelegate for StateLog {
    fn playback_state_changed(&mut self, state: PlaybackState) {
        self.states.lock().unwrap().push(state);
    }

    fn initialization_failed(&mut self) {
        *self.init_failures.lock().unwrap() += 1;
    }
}

fn make_queue(engine: CountingEngine) -> (AudioQueue<CountingEngine>, StateLog) {
    let delegate = StateLog::default();
    let mut queue = AudioQueue::new(QueueConfig::default(), engine).unwrap();
    queue.set_delegate(Box::new(delegate.clone()));
    (queue, delegate)
}

// ============================================================================
// Start / Stop
// ============================================================================

#[test]
fn test_start_is_idempotent() {
    let engine = CountingEngine::new();
    let (mut queue, _delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();

    queue.start();
    queue.start();
    queue.start();

    let (_, _, starts, ..) = engine.counts();
    assert_eq!(starts, 1);
}

#[test]
fn test_stop_immediate_forces_idle_and_detaches_listener() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.start();
    queue.running_changed(true);
    assert_eq!(queue.state(), PlaybackState::Running);

    queue.stop(true);
    assert_eq!(queue.state(), PlaybackState::Idle);
    assert_eq!(engine.last_stop_immediate(), Some(true));
    let (_, _, _, _, _, flushes, stops) = engine.counts();
    assert_eq!(flushes, 1);
    assert_eq!(stops, 1);

    // A late running notification from the engine is ignored.
    queue.running_changed(true);
    assert_eq!(queue.state(), PlaybackState::Idle);
    assert_eq!(
        delegate.states(),
        vec![PlaybackState::Running, PlaybackState::Idle]
    );
}

#[test]
fn test_stop_deferred_waits_for_engine_notification() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.start();
    queue.running_changed(true);

    queue.stop(false);
    assert_eq!(engine.last_stop_immediate(), Some(false));
    // Queued audio is still draining; the engine has not gone quiet yet.
    assert_eq!(queue.state(), PlaybackState::Running);

    queue.running_changed(false);
    assert_eq!(queue.state(), PlaybackState::Idle);
    assert_eq!(
        delegate.states(),
        vec![PlaybackState::Running, PlaybackState::Idle]
    );
}

#[test]
fn test_double_stop_is_idempotent() {
    let engine = CountingEngine::new();
    let (mut queue, _delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.start();

    queue.stop(true);
    queue.stop(true);
    queue.stop(false);

    let (_, _, _, _, _, flushes, stops) = engine.counts();
    assert_eq!(flushes, 1);
    assert_eq!(stops, 1);
}

#[test]
fn test_stop_before_start_is_a_no_op() {
    let engine = CountingEngine::new();
    let (mut queue, _delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();

    queue.stop(true);
    let (_, _, _, _, _, flushes, stops) = engine.counts();
    assert_eq!(flushes, 0);
    assert_eq!(stops, 0);
}

// ============================================================================
// Pause / Resume
// ============================================================================

#[test]
fn test_pause_toggles_between_running_and_paused() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.running_changed(true);

    queue.pause();
    assert_eq!(queue.state(), PlaybackState::Paused);

    queue.pause();
    assert_eq!(queue.state(), PlaybackState::Running);

    let (_, _, _, pauses, resumes, ..) = engine.counts();
    assert_eq!(pauses, 1);
    assert_eq!(resumes, 1);
    assert_eq!(
        delegate.states(),
        vec![
            PlaybackState::Running,
            PlaybackState::Paused,
            PlaybackState::Running
        ]
    );
}

#[test]
fn test_pause_is_ignored_when_idle() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();

    queue.pause();
    assert_eq!(queue.state(), PlaybackState::Idle);
    let (_, _, _, pauses, resumes, ..) = engine.counts();
    assert_eq!(pauses, 0);
    assert_eq!(resumes, 0);
    assert!(delegate.states().is_empty());
}

// ============================================================================
// Running Notifications
// ============================================================================

#[test]
fn test_running_changed_is_idempotent() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine);
    queue.initialize().unwrap();

    queue.running_changed(true);
    queue.running_changed(true);
    queue.running_changed(true);
    assert_eq!(delegate.states(), vec![PlaybackState::Running]);

    queue.running_changed(false);
    queue.running_changed(false);
    assert_eq!(
        delegate.states(),
        vec![PlaybackState::Running, PlaybackState::Idle]
    );
}

#[test]
fn test_running_resumes_authority_after_pause() {
    let engine = CountingEngine::new();
    let (mut queue, _delegate) = make_queue(engine);
    queue.initialize().unwrap();
    queue.running_changed(true);
    queue.pause();
    assert_eq!(queue.state(), PlaybackState::Paused);

    // The engine reporting running again overrides the paused state.
    queue.running_changed(true);
    assert_eq!(queue.state(), PlaybackState::Running);
}

// ============================================================================
// Initialization & Teardown
// ============================================================================

#[test]
fn test_initialize_failure_then_recovery() {
    let engine = CountingEngine::new().with_failing_open(1);
    let (mut queue, delegate) = make_queue(engine.clone());

    let err = queue.initialize().unwrap_err();
    assert!(matches!(err, AudioQueueError::InitializationFailed(_)));
    assert!(!queue.is_initialized());
    assert_eq!(delegate.init_failures(), 1);

    // The failed attempt closed the engine best-effort.
    let (opens, closes, ..) = engine.counts();
    assert_eq!(opens, 1);
    assert_eq!(closes, 1);

    queue.initialize().unwrap();
    assert!(queue.is_initialized());
    assert!(queue.last_error().is_none());
}

#[test]
fn test_reinitialize_tears_down_live_queue_first() {
    let engine = CountingEngine::new();
    let (mut queue, _delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.start();

    queue.initialize().unwrap();
    let (opens, closes, ..) = engine.counts();
    assert_eq!(opens, 2);
    assert_eq!(closes, 1);

    // The started flag was reset, so playback can start again.
    queue.start();
    let (_, _, starts, ..) = engine.counts();
    assert_eq!(starts, 2);
}

#[test]
fn test_cleanup_stops_active_playback() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine.clone());
    queue.initialize().unwrap();
    queue.start();
    queue.running_changed(true);

    queue.cleanup();
    assert!(!queue.is_initialized());
    assert_eq!(queue.state(), PlaybackState::Idle);
    assert_eq!(engine.last_stop_immediate(), Some(true));
    let (_, closes, ..) = engine.counts();
    assert_eq!(closes, 1);
    assert_eq!(
        delegate.states(),
        vec![PlaybackState::Running, PlaybackState::Idle]
    );
}

#[test]
fn test_no_callbacks_after_delegate_cleared() {
    let engine = CountingEngine::new();
    let (mut queue, delegate) = make_queue(engine);
    queue.initialize().unwrap();
    queue.running_changed(true);
    assert_eq!(delegate.states(), vec![PlaybackState::Running]);

    let detached = queue.clear_delegate();
    assert!(detached.is_some());

    queue.running_changed(false);
    queue.pause();
    assert_eq!(delegate.states(), vec![PlaybackState::Running]);
}

#[test]
fn test_played_time_reports_engine_position() {
    let engine = CountingEngine::new().with_position(Duration::from_millis(1500));
    let (mut queue, _delegate) = make_queue(engine);

    // Uninitialized queues report zero without touching the engine.
    assert_eq!(queue.played_time(), Duration::ZERO);

    queue.initialize().unwrap();
    assert_eq!(queue.played_time(), Duration::from_millis(1500));
}
