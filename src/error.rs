//! # Audio Queue Error Types
//!
//! Error taxonomy for queue construction, packet submission and engine
//! interaction.

use thiserror::Error;

/// Status returned by the platform playback engine for a failed operation.
///
/// The engine reports failures as opaque status codes (the platform's native
/// error domain). The most recent one is retained in the queue's error slot
/// and can be read back via [`AudioQueue::last_error`].
///
/// [`AudioQueue::last_error`]: crate::AudioQueue::last_error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine error {code} during {operation}")]
pub struct EngineError {
    /// Platform-native status code.
    pub code: i32,
    /// Engine operation that failed (e.g. "enqueue", "start").
    pub operation: &'static str,
}

impl EngineError {
    /// Create a new engine error for the given operation.
    pub fn new(code: i32, operation: &'static str) -> Self {
        Self { code, operation }
    }
}

/// Errors that can occur during audio queue operations.
#[derive(Error, Debug)]
pub enum AudioQueueError {
    // ========================================================================
    // Construction / Initialization
    // ========================================================================
    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine failed to allocate its output or buffers. The queue stays
    /// uninitialized; every subsequent operation reports [`Self::NotInitialized`]
    /// until `initialize()` succeeds.
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(EngineError),

    /// Operation attempted on an uninitialized queue.
    #[error("Audio queue not initialized")]
    NotInitialized,

    // ========================================================================
    // Packet Submission
    // ========================================================================
    /// Packet larger than a whole buffer. No buffer could ever hold it, so
    /// the packet is dropped rather than queued or retried.
    #[error("Packet of {size} bytes exceeds buffer capacity {capacity}")]
    PacketTooLarge { size: u32, capacity: u32 },

    /// The engine rejected a filled buffer. Accumulation halts until a
    /// buffer is reclaimed or the queue is reinitialized.
    #[error("Buffer submission rejected: {0}")]
    Submission(EngineError),
}

impl AudioQueueError {
    /// Returns `true` if this error originated in the playback engine.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            AudioQueueError::InitializationFailed(_) | AudioQueueError::Submission(_)
        )
    }

    /// Returns `true` if this error indicates malformed input rather than a
    /// queue or engine fault.
    pub fn is_format_error(&self) -> bool {
        matches!(self, AudioQueueError::PacketTooLarge { .. })
    }
}

/// Result type for audio queue operations.
pub type Result<T> = std::result::Result<T, AudioQueueError>;

/// Result type for engine-level operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
