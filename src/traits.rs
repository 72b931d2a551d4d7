//! # Audio Queue Traits
//!
//! The two seams of the queue: the downstream [`PlaybackEngine`] it feeds
//! buffers to, and the [`QueueDelegate`] observer it reports transitions to.
//!
//! ## Notification model
//!
//! The engine consumes buffers at its own pace and later reports, through
//! the host, exactly one of two events: a specific buffer is free again, or
//! its coarse running status changed. The host delivers those reports as
//! plain method calls on [`AudioQueue`] (`buffer_reclaimed`,
//! `running_changed`), serialized with the owner's own calls. The trait
//! below therefore only covers the synchronous, engine-bound direction.
//!
//! [`AudioQueue`]: crate::AudioQueue

use crate::config::QueueConfig;
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Packet Descriptor
// ============================================================================

/// Describes one compressed audio packet within a byte range.
///
/// On input to the queue, `offset` locates the packet inside the caller's
/// payload slice. When recorded into a buffer, the queue rewrites `offset`
/// to be relative to that buffer's start, so `offset + size` never exceeds
/// the buffer capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketDescriptor {
    /// Byte offset of the packet's first byte.
    pub offset: u64,

    /// Packet size in bytes.
    pub size: u32,

    /// Variable-length-frame indicator from the upstream demuxer, passed
    /// through to the engine unchanged.
    pub variable_frames: u32,
}

impl PacketDescriptor {
    /// Create a descriptor with no variable-frame indicator.
    pub fn new(offset: u64, size: u32) -> Self {
        Self {
            offset,
            size,
            variable_frames: 0,
        }
    }

    /// Byte range this descriptor covers, for slicing a payload.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }
}

// ============================================================================
// Playback Lifecycle State
// ============================================================================

/// Playback lifecycle state.
///
/// Driven by explicit `start`/`pause`/`stop` calls and by the engine's
/// asynchronous running-status notification, which is authoritative for
/// Running vs Idle outside of an explicit pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No active engine usage.
    Idle,
    /// Engine actively playing.
    Running,
    /// Engine suspended, resumable.
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Running => write!(f, "running"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

// ============================================================================
// Playback Engine
// ============================================================================

/// Platform playback engine fed by the queue.
///
/// Implementations wrap the platform's audio output (a hardware queue, an
/// OS audio session, a test double). All methods are synchronous and must
/// not block for real-time work: `enqueue_buffer` is an accept/reject
/// hand-off, with actual consumption happening on the engine's own
/// schedule.
///
/// ## Contract
///
/// - `open` registers `config.buffer_count` buffers of
///   `config.buffer_capacity` bytes; on failure the queue stays
///   uninitialized and will call `close` best-effort.
/// - After a successful `enqueue_buffer(index, ..)` the engine owns buffer
///   `index` until the host reports it reclaimed. The engine must never be
///   handed a buffer it already owns.
/// - The engine may never return a buffer (resource exhaustion); the queue
///   tolerates this and simply keeps its backlog.
pub trait PlaybackEngine {
    /// Create the engine-side output and register the pool's buffers.
    fn open(&mut self, config: &QueueConfig) -> EngineResult<()>;

    /// Dispose all engine resources. Best-effort; called from teardown and
    /// from initialization failure paths.
    fn close(&mut self);

    /// Hand one filled buffer to the engine.
    ///
    /// `data` is the filled prefix of buffer `index`; `descriptors` are the
    /// packet boundaries within it, offsets relative to `data`. Returns
    /// synchronously whether the engine accepted the buffer.
    fn enqueue_buffer(
        &mut self,
        index: usize,
        data: &[u8],
        descriptors: &[PacketDescriptor],
    ) -> EngineResult<()>;

    /// Begin or restart playback.
    fn start(&mut self) -> EngineResult<()>;

    /// Suspend playback, resumable via [`Self::resume`].
    fn pause(&mut self) -> EngineResult<()>;

    /// Resume playback after a pause.
    fn resume(&mut self) -> EngineResult<()>;

    /// Flush any pending engine-side work.
    fn flush(&mut self) -> EngineResult<()>;

    /// Stop playback. With `immediate`, stop without draining queued audio.
    fn stop(&mut self, immediate: bool) -> EngineResult<()>;

    /// Elapsed played time reported by the engine.
    fn playback_position(&mut self) -> EngineResult<Duration>;
}

// ============================================================================
// Queue Delegate
// ============================================================================

/// Observer notified of queue transitions.
///
/// All notifications are best-effort: the queue consumes no return value
/// and keeps going regardless of what the delegate does with them.
///
/// Delegate implementations are read-only observers of the queue. They are
/// invoked while the queue is mid-mutation and hold no handle to it (every
/// queue entry point takes `&mut self`), so re-entering packet submission
/// from a callback is not expressible. Defer any follow-up work to the
/// owner's context.
pub trait QueueDelegate {
    /// Playback lifecycle transitioned to `state`. Fired once per actual
    /// transition, never for a re-observation of the current state.
    fn playback_state_changed(&mut self, state: PlaybackState) {
        let _ = state;
    }

    /// All buffers are busy and packets are now being diverted to the
    /// overflow queue. Fired once per transition into the waiting
    /// condition, not once per diverted packet.
    fn buffer_overflow(&mut self) {}

    /// The overflow backlog fully drained; live packet flow may resume.
    fn underflow_recovered(&mut self) {}

    /// Every buffer is back from the engine and no backlog exists:
    /// playback has fully drained.
    fn buffers_empty(&mut self) {}

    /// The engine could not be initialized. The queue stays idle until
    /// explicitly reinitialized.
    fn initialization_failed(&mut self) {}
}
