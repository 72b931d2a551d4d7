//! # Audio Queue
//!
//! The buffer-fill / overflow / backpressure state machine.
//!
//! ## Data flow
//!
//! ```text
//! Demuxer → submit_packet_run()
//!                 ↓
//!          packet accumulator ──(buffer full / descriptor limit)──► engine
//!                 ↓ (all buffers busy)                                 │
//!          OverflowQueue (FIFO)                                        │
//!                 ▲                                                    │
//!                 └──── drain on buffer_reclaimed() ◄─────────────────┘
//! ```
//!
//! Buffers cycle round-robin, matching the FIFO order in which the engine
//! consumes and returns them, so packets reach the engine in exactly the
//! order they arrived. When the fill cursor lands on a buffer the engine
//! still owns, the queue enters the *waiting* condition: new packets are
//! copied into the overflow queue instead of being accumulated, and the
//! backlog is drained head-first as soon as the engine hands a buffer back.
//!
//! Nothing here blocks: an engine rejection is recorded in the error slot
//! and surfaced to the owner, and the affected packets are parked in the
//! backlog until a reclaim lets them through.

use crate::buffer::BufferPool;
use crate::config::{QueueConfig, QueueStats};
use crate::error::{AudioQueueError, EngineError, Result};
use crate::overflow::{OverflowQueue, QueuedPacket};
use crate::traits::{PacketDescriptor, PlaybackEngine, PlaybackState, QueueDelegate};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Outcome of attempting to place one packet into the pool.
enum PlaceOutcome {
    /// Copied into the fill buffer; live flow may continue.
    Accepted,
    /// Copied, but the buffer closed behind it and accumulation halted
    /// (busy successor or rejected hand-off). Subsequent packets must be
    /// queued.
    AcceptedHalted,
    /// Not copied: the fill cursor sits on an engine-owned buffer. The
    /// packet belongs in the overflow queue.
    Blocked,
    /// Not copied: the engine rejected the buffer hand-off.
    SubmissionFailed(EngineError),
    /// Not copied: the packet can never fit in any buffer. Dropped.
    Dropped,
}

/// Packet accumulation queue in front of a platform playback engine.
///
/// Owns a fixed pool of buffers, the overflow backlog, and the playback
/// lifecycle state. The engine is injected at construction; an optional
/// [`QueueDelegate`] observes transitions.
///
/// All methods take `&mut self`: the queue is a single-owner state machine
/// and the host must deliver the engine's completion notifications
/// ([`Self::buffer_reclaimed`], [`Self::running_changed`]) serialized with
/// its own calls.
pub struct AudioQueue<E: PlaybackEngine> {
    config: QueueConfig,
    engine: E,
    delegate: Option<Box<dyn QueueDelegate>>,

    pool: BufferPool,
    /// Descriptors recorded into the buffer currently being filled,
    /// offsets relative to that buffer's start. Bounded by
    /// `config.max_packets_per_buffer`.
    fill_descriptors: Vec<PacketDescriptor>,
    overflow: OverflowQueue,

    state: PlaybackState,
    initialized: bool,
    /// Set once the engine has been successfully started; makes `start`
    /// idempotent.
    started: bool,
    /// Cleared on immediate stop and teardown so late `running_changed`
    /// notifications are ignored.
    listening: bool,
    /// The fill cursor sits on an engine-owned buffer; packets divert to
    /// the overflow queue.
    waiting: bool,

    last_error: Option<EngineError>,
    stats: QueueStats,
}

impl<E: PlaybackEngine> AudioQueue<E> {
    /// Create a queue over `engine` with the given configuration.
    ///
    /// Allocates the buffer pool but does not touch the engine; call
    /// [`Self::initialize`] before submitting packets.
    pub fn new(config: QueueConfig, engine: E) -> Result<Self> {
        config.validate().map_err(AudioQueueError::InvalidConfig)?;

        let pool = BufferPool::new(config.buffer_count, config.buffer_capacity);
        let fill_descriptors = Vec::with_capacity(config.max_packets_per_buffer);

        Ok(Self {
            config,
            engine,
            delegate: None,
            pool,
            fill_descriptors,
            overflow: OverflowQueue::new(),
            state: PlaybackState::Idle,
            initialized: false,
            started: false,
            listening: false,
            waiting: false,
            last_error: None,
            stats: QueueStats::default(),
        })
    }

    /// Attach the delegate. Replaces any previous one.
    pub fn set_delegate(&mut self, delegate: Box<dyn QueueDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Detach and return the delegate. No callback fires after this.
    pub fn clear_delegate(&mut self) -> Option<Box<dyn QueueDelegate>> {
        self.delegate.take()
    }

    /// `true` once [`Self::initialize`] has succeeded and until
    /// [`Self::cleanup`].
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// `true` while packets divert to the overflow queue because every
    /// buffer is engine-owned.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Last engine failure, if the most recent engine interaction failed.
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    /// Configuration this queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Snapshot of counters and gauges.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            buffers_in_use: self.pool.buffers_used(),
            overflow_packets: self.overflow.len(),
            overflow_bytes: self.overflow.bytes(),
            current_fill_bytes: self.pool.fill_buffer().bytes_filled(),
            ..self.stats
        }
    }

    // ========================================================================
    // Initialization & Teardown
    // ========================================================================

    /// Open the engine and reset the queue to a pristine state.
    ///
    /// Safe to call again after a failure or on a live queue (a live queue
    /// is torn down first). On failure the queue stays uninitialized: the
    /// delegate is told once via `initialization_failed`, the error slot
    /// holds the engine status, and every other operation is a guarded
    /// no-op until a later `initialize` succeeds.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            self.cleanup();
        }

        if let Err(e) = self.engine.open(&self.config) {
            warn!(error = %e, "engine open failed; queue stays uninitialized");
            self.engine.close();
            self.last_error = Some(e.clone());
            self.notify(|d| d.initialization_failed());
            return Err(AudioQueueError::InitializationFailed(e));
        }

        self.pool.reset();
        self.fill_descriptors.clear();
        self.overflow.clear();
        self.stats = QueueStats::default();
        self.waiting = false;
        self.started = false;
        self.listening = true;
        self.initialized = true;
        self.last_error = None;

        info!(
            buffers = self.config.buffer_count,
            capacity = self.config.buffer_capacity,
            "audio queue initialized"
        );
        Ok(())
    }

    /// Tear down engine resources and reset all state. Idempotent, and
    /// callable from any lifecycle state, including failure paths.
    pub fn cleanup(&mut self) {
        if !self.initialized {
            debug!("cleanup on uninitialized audio queue; nothing to do");
            return;
        }

        if self.state != PlaybackState::Idle {
            debug!("cleanup while playing; forcing stop");
            self.listening = false;
            if let Err(e) = self.engine.stop(true) {
                warn!(error = %e, "engine stop failed during cleanup");
            }
            self.set_state(PlaybackState::Idle);
        }

        self.engine.close();

        self.pool.reset();
        self.fill_descriptors.clear();
        self.overflow.clear();
        self.stats = QueueStats::default();
        self.waiting = false;
        self.started = false;
        self.listening = false;
        self.initialized = false;
        self.last_error = None;

        debug!("audio queue cleaned up");
    }

    // ========================================================================
    // Packet Submission
    // ========================================================================

    /// Submit one packet. `packet` is the packet's bytes; the descriptor's
    /// `offset` is ignored (rewritten relative to the buffer it lands in).
    ///
    /// Never blocks: if no buffer has room the packet is copied into the
    /// overflow queue. An oversized packet is dropped with
    /// [`AudioQueueError::PacketTooLarge`]. If the engine rejects a buffer
    /// hand-off the packet is retained at the tail of the backlog and
    /// [`AudioQueueError::Submission`] surfaces so the owner knows
    /// accumulation has halted.
    pub fn submit_packet(&mut self, packet: &[u8], descriptor: &PacketDescriptor) -> Result<()> {
        if !self.initialized {
            return Err(AudioQueueError::NotInitialized);
        }
        debug_assert_eq!(
            packet.len(),
            descriptor.size as usize,
            "packet slice must match descriptor size"
        );

        if descriptor.size > self.config.buffer_capacity {
            self.stats.packets_dropped += 1;
            return Err(AudioQueueError::PacketTooLarge {
                size: descriptor.size,
                capacity: self.config.buffer_capacity,
            });
        }

        if self.waiting || !self.overflow.is_empty() {
            self.queue_packet(packet, descriptor);
            return Ok(());
        }

        match self.place_packet(packet, descriptor) {
            PlaceOutcome::Accepted | PlaceOutcome::AcceptedHalted => Ok(()),
            PlaceOutcome::Blocked => {
                self.queue_packet(packet, descriptor);
                Ok(())
            }
            PlaceOutcome::SubmissionFailed(e) => {
                self.queue_packet(packet, descriptor);
                Err(AudioQueueError::Submission(e))
            }
            // Unreachable: size was checked above.
            PlaceOutcome::Dropped => Err(AudioQueueError::PacketTooLarge {
                size: descriptor.size,
                capacity: self.config.buffer_capacity,
            }),
        }
    }

    /// Submit a contiguous run of packets from one arrival event.
    ///
    /// Each descriptor locates its packet inside `payload`. Always accepts:
    /// packets that cannot be placed right now are copied into the overflow
    /// queue in arrival order. While a backlog exists or a buffer is being
    /// awaited, the live path is bypassed entirely so backlogged and live
    /// packets never interleave.
    pub fn submit_packet_run(&mut self, payload: &[u8], descriptors: &[PacketDescriptor]) {
        if !self.initialized {
            warn!("packet run submitted to an uninitialized audio queue; dropped");
            return;
        }
        trace!(
            bytes = payload.len(),
            packets = descriptors.len(),
            "packet run received"
        );

        let total = descriptors.len();
        let mut next = 0;

        while next < total && !self.waiting && self.overflow.is_empty() {
            let descriptor = &descriptors[next];
            let Some(packet) = payload.get(descriptor.range()) else {
                warn!(
                    offset = descriptor.offset,
                    size = descriptor.size,
                    "descriptor outside payload; packet dropped"
                );
                self.stats.packets_dropped += 1;
                next += 1;
                continue;
            };

            match self.place_packet(packet, descriptor) {
                PlaceOutcome::Accepted | PlaceOutcome::Dropped => next += 1,
                PlaceOutcome::AcceptedHalted => {
                    next += 1;
                    break;
                }
                PlaceOutcome::Blocked | PlaceOutcome::SubmissionFailed(_) => break,
            }
        }

        for descriptor in &descriptors[next..] {
            if descriptor.size > self.config.buffer_capacity {
                warn!(
                    size = descriptor.size,
                    capacity = self.config.buffer_capacity,
                    "dropping packet larger than buffer capacity"
                );
                self.stats.packets_dropped += 1;
                continue;
            }
            let Some(packet) = payload.get(descriptor.range()) else {
                warn!(
                    offset = descriptor.offset,
                    size = descriptor.size,
                    "descriptor outside payload; packet dropped"
                );
                self.stats.packets_dropped += 1;
                continue;
            };
            self.queue_packet(packet, descriptor);
        }

        if next < total {
            trace!(queued = total - next, "diverted tail of packet run to overflow");
        }
    }

    /// Copy one packet into the overflow queue.
    fn queue_packet(&mut self, packet: &[u8], descriptor: &PacketDescriptor) {
        self.overflow
            .push_back(QueuedPacket::copy_from(packet, descriptor));
        self.stats.packets_overflowed += 1;
    }

    /// Try to place one packet into the fill buffer, closing out buffers as
    /// required. `packet` must fit within a buffer (caller checks size for
    /// public entry points; this method re-checks defensively).
    fn place_packet(&mut self, packet: &[u8], descriptor: &PacketDescriptor) -> PlaceOutcome {
        if descriptor.size > self.config.buffer_capacity {
            warn!(
                size = descriptor.size,
                capacity = self.config.buffer_capacity,
                "dropping packet larger than buffer capacity"
            );
            self.stats.packets_dropped += 1;
            return PlaceOutcome::Dropped;
        }

        // Buffers can be reclaimed out of order, so the fill cursor may sit
        // on an engine-owned buffer even after a reclaim. Never write into
        // one.
        if self.pool.fill_buffer_busy() {
            return PlaceOutcome::Blocked;
        }

        // A packet that exactly fits the remaining space goes into the
        // current buffer; only a shortfall closes it out.
        if self.pool.fill_buffer().remaining() < descriptor.size {
            match self.close_and_submit() {
                Ok(true) => {}
                Ok(false) => return PlaceOutcome::Blocked,
                Err(e) => return PlaceOutcome::SubmissionFailed(e),
            }
        }

        let offset = self.pool.fill_buffer_mut().append(packet);
        self.fill_descriptors.push(PacketDescriptor {
            offset: offset as u64,
            size: descriptor.size,
            variable_frames: descriptor.variable_frames,
        });
        self.stats.packets_accepted += 1;

        if self.fill_descriptors.len() >= self.config.max_packets_per_buffer {
            // Descriptor table full: commit regardless of remaining space.
            // The packet is already placed, so a halt here must not requeue it.
            match self.close_and_submit() {
                Ok(true) => PlaceOutcome::Accepted,
                Ok(false) | Err(_) => PlaceOutcome::AcceptedHalted,
            }
        } else {
            PlaceOutcome::Accepted
        }
    }

    /// Hand the current fill buffer to the engine and advance the cursor.
    ///
    /// Returns `Ok(true)` if the next buffer is free, `Ok(false)` if the
    /// queue entered the waiting condition, `Err` if the engine rejected
    /// the hand-off (in which case the buffer is *not* marked in use and
    /// the cursor does not move).
    fn close_and_submit(&mut self) -> std::result::Result<bool, EngineError> {
        debug_assert!(
            !self.fill_descriptors.is_empty(),
            "closing out an empty buffer"
        );

        let index = self.pool.fill_index();
        if let Err(e) = self.engine.enqueue_buffer(
            index,
            self.pool.fill_buffer().filled(),
            &self.fill_descriptors,
        ) {
            warn!(index, error = %e, "engine rejected buffer; accumulation halted");
            self.last_error = Some(e.clone());
            return Err(e);
        }
        self.last_error = None;

        debug!(
            index,
            bytes = self.pool.fill_buffer().bytes_filled(),
            packets = self.fill_descriptors.len(),
            "buffer submitted"
        );
        self.stats.buffers_submitted += 1;
        self.fill_descriptors.clear();
        self.pool.commit_and_advance();

        // First successful hand-off starts the engine; later calls no-op.
        self.start();

        if self.pool.fill_buffer_busy() {
            debug!(index = self.pool.fill_index(), "next buffer still in use; waiting");
            self.waiting = true;
            self.notify(|d| d.buffer_overflow());
            return Ok(false);
        }
        Ok(true)
    }

    // ========================================================================
    // Engine Notifications
    // ========================================================================

    /// The engine finished with buffer `index`; it is free for reuse.
    ///
    /// Reclaiming an out-of-range index or a buffer that is not in use
    /// violates the engine contract: asserted in debug builds, counted and
    /// ignored in release builds.
    pub fn buffer_reclaimed(&mut self, index: usize) {
        if !self.initialized {
            warn!(index, "buffer reclaim on uninitialized queue ignored");
            return;
        }

        if !self.pool.release(index) {
            debug_assert!(false, "reclaim of buffer {index} violates engine contract");
            error!(index, "spurious buffer reclaim ignored");
            self.stats.protocol_violations += 1;
            return;
        }
        self.stats.buffers_reclaimed += 1;

        if self.pool.buffers_used() == 0 && self.overflow.is_empty() {
            debug!("all buffers reclaimed with no backlog; playback drained");
            self.notify(|d| d.buffers_empty());
        } else if self.waiting || !self.overflow.is_empty() {
            // A backlog can outlive the waiting flag when buffers come back
            // out of order or a hand-off was rejected; every reclaim is a
            // chance to move it along.
            self.waiting = false;
            self.drain_overflow();
        }
    }

    /// Drain the overflow backlog head-first into the pool, stopping the
    /// moment placement blocks again. Fires `underflow_recovered` if the
    /// backlog is empty afterwards.
    fn drain_overflow(&mut self) {
        let mut drained = 0usize;

        loop {
            let (data, descriptor) = match self.overflow.front() {
                Some(packet) => (packet.data.clone(), packet.descriptor),
                None => break,
            };

            match self.place_packet(&data, &descriptor) {
                PlaceOutcome::Accepted => {
                    self.overflow.pop_front();
                    drained += 1;
                }
                PlaceOutcome::AcceptedHalted => {
                    self.overflow.pop_front();
                    drained += 1;
                    break;
                }
                PlaceOutcome::Blocked | PlaceOutcome::SubmissionFailed(_) => break,
                // Cannot normally occur: oversized packets are rejected at
                // ingress. Discard rather than wedge the queue head.
                PlaceOutcome::Dropped => {
                    self.overflow.pop_front();
                }
            }
        }

        if self.overflow.is_empty() {
            debug!(drained, "overflow backlog fully drained");
            self.notify(|d| d.underflow_recovered());
        } else {
            debug!(
                drained,
                remaining = self.overflow.len(),
                "partial overflow drain"
            );
        }
    }

    /// The engine's coarse running status changed.
    ///
    /// Authoritative for Running vs Idle outside of an explicit pause.
    /// Idempotent: re-observing the current state fires nothing. Ignored
    /// after an immediate stop or teardown detached the listener.
    pub fn running_changed(&mut self, is_running: bool) {
        if !self.listening {
            trace!(is_running, "running notification ignored; listener detached");
            return;
        }

        if is_running {
            self.set_state(PlaybackState::Running);
        } else {
            self.set_state(PlaybackState::Idle);
        }
    }

    // ========================================================================
    // Playback Lifecycle
    // ========================================================================

    /// Start the engine if it has not been started already.
    ///
    /// Engine failure is recorded in the error slot and logged, not
    /// propagated: playback start is retried implicitly by the next
    /// successful buffer submission.
    pub fn start(&mut self) {
        if !self.initialized {
            warn!("start on uninitialized audio queue ignored");
            return;
        }
        if self.started {
            return;
        }

        match self.engine.start() {
            Ok(()) => {
                self.started = true;
                self.last_error = None;
                info!("playback engine started");
            }
            Err(e) => {
                warn!(error = %e, "engine start failed");
                self.last_error = Some(e);
            }
        }
    }

    /// Toggle Running ↔ Paused. No-op when idle.
    pub fn pause(&mut self) {
        if !self.initialized {
            warn!("pause on uninitialized audio queue ignored");
            return;
        }

        match self.state {
            PlaybackState::Running => {
                if let Err(e) = self.engine.pause() {
                    warn!(error = %e, "engine pause failed");
                    self.last_error = Some(e);
                } else {
                    self.last_error = None;
                }
                self.set_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                if let Err(e) = self.engine.resume() {
                    warn!(error = %e, "engine resume failed");
                    self.last_error = Some(e);
                } else {
                    self.last_error = None;
                }
                self.set_state(PlaybackState::Running);
            }
            PlaybackState::Idle => {}
        }
    }

    /// Stop playback.
    ///
    /// Flushes pending engine work, then requests an engine stop. With
    /// `immediate` the running-state listener is detached and the local
    /// state forced to Idle synchronously; otherwise the Idle transition
    /// arrives later via [`Self::running_changed`]. A queue that was never
    /// started is left untouched, so calling this twice is safe.
    pub fn stop(&mut self, immediate: bool) {
        if !self.started {
            debug!("audio queue already stopped");
            return;
        }
        self.started = false;

        if let Err(e) = self.engine.flush() {
            warn!(error = %e, "engine flush failed");
            self.last_error = Some(e);
        }

        if immediate {
            self.listening = false;
        }

        if let Err(e) = self.engine.stop(immediate) {
            warn!(error = %e, "engine stop failed");
            self.last_error = Some(e);
        }

        if immediate {
            self.set_state(PlaybackState::Idle);
        }
    }

    /// Elapsed played time as reported by the engine, zero when the engine
    /// cannot say (or the queue is uninitialized).
    pub fn played_time(&mut self) -> Duration {
        if !self.initialized {
            return Duration::ZERO;
        }
        self.engine.playback_position().unwrap_or(Duration::ZERO)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "playback state changed");
        self.state = state;
        self.notify(|d| d.playback_state_changed(state));
    }

    fn notify<F: FnOnce(&mut dyn QueueDelegate)>(&mut self, f: F) {
        if let Some(delegate) = self.delegate.as_deref_mut() {
            f(delegate);
        }
    }
}

impl<E: PlaybackEngine> Drop for AudioQueue<E> {
    fn drop(&mut self) {
        self.stop(true);
        self.cleanup();
    }
}
