//! # Queue Configuration
//!
//! Configuration and statistics types for the audio queue.

use serde::{Deserialize, Serialize};

fn default_buffer_count() -> usize {
    3
}

fn default_buffer_capacity() -> u32 {
    32768
}

fn default_max_packets_per_buffer() -> usize {
    512
}

/// Audio queue configuration.
///
/// All three values are fixed at construction and bound the queue's
/// worst-case pool memory: `buffer_count * buffer_capacity` bytes plus one
/// descriptor table of `max_packets_per_buffer` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of fixed-capacity buffers in the pool.
    ///
    /// Must be at least 2: with a single buffer the round-robin
    /// wait/backlog protocol could never make progress, since the buffer
    /// being waited on is also the only fill target.
    ///
    /// Default: 3.
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    /// Per-buffer capacity in bytes.
    ///
    /// Packets larger than this are rejected outright.
    ///
    /// Default: 32 KiB.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: u32,

    /// Maximum packet descriptors recorded per buffer.
    ///
    /// A buffer is closed out and handed to the engine when it reaches this
    /// many packets, regardless of remaining byte space.
    ///
    /// Default: 512.
    #[serde(default = "default_max_packets_per_buffer")]
    pub max_packets_per_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            buffer_capacity: default_buffer_capacity(),
            max_packets_per_buffer: default_max_packets_per_buffer(),
        }
    }
}

impl QueueConfig {
    /// Configuration optimized for low playback latency.
    ///
    /// - More, smaller buffers so the first hand-off happens sooner
    /// - Lower per-buffer descriptor limit
    pub fn low_latency() -> Self {
        Self {
            buffer_count: 4,
            buffer_capacity: 8192,
            max_packets_per_buffer: 128,
        }
    }

    /// Configuration optimized for throughput/stability.
    ///
    /// - Larger buffers, fewer engine hand-offs
    pub fn high_throughput() -> Self {
        Self {
            buffer_count: 3,
            buffer_capacity: 131072,
            max_packets_per_buffer: 2048,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_count < 2 {
            return Err("buffer_count must be at least 2".to_string());
        }

        if self.buffer_capacity == 0 {
            return Err("buffer_capacity must be > 0".to_string());
        }

        if self.max_packets_per_buffer == 0 {
            return Err("max_packets_per_buffer must be > 0".to_string());
        }

        Ok(())
    }

    /// Total pool memory in bytes for this configuration.
    pub fn pool_bytes(&self) -> usize {
        self.buffer_count * self.buffer_capacity as usize
    }
}

/// Runtime statistics for an audio queue.
///
/// Monotonic counters accumulate from initialization until `cleanup()`;
/// gauges reflect the state at the moment of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Packets copied into a pool buffer (live or drained from overflow).
    pub packets_accepted: u64,

    /// Packets diverted into the overflow queue.
    pub packets_overflowed: u64,

    /// Oversized packets dropped (format errors).
    pub packets_dropped: u64,

    /// Buffers handed to the engine.
    pub buffers_submitted: u64,

    /// Buffers returned by the engine.
    pub buffers_reclaimed: u64,

    /// Engine notifications that violated the reclamation contract
    /// (out-of-range index or double reclaim), ignored defensively.
    pub protocol_violations: u64,

    /// Buffers currently held by the engine.
    pub buffers_in_use: usize,

    /// Packets currently parked in the overflow queue.
    pub overflow_packets: usize,

    /// Payload bytes currently parked in the overflow queue.
    pub overflow_bytes: usize,

    /// Bytes accumulated in the buffer currently being filled.
    pub current_fill_bytes: u32,
}

impl QueueStats {
    /// Returns `true` if the engine holds no buffers and no backlog exists.
    pub fn is_quiescent(&self) -> bool {
        self.buffers_in_use == 0 && self.overflow_packets == 0
    }
}
