//! # Buffer Pool
//!
//! A fixed-size pool of fixed-capacity byte buffers cycled round-robin
//! between the packet accumulator and the playback engine.
//!
//! ## Design
//!
//! - **Capacity**: fixed at creation, never resized
//! - **Ordering**: buffers are filled and handed off strictly in index
//!   order 0, 1, ..., N-1, 0, ... — matching the FIFO order in which the
//!   engine consumes and returns them, so packet order is preserved
//!   without extra bookkeeping
//! - **Ownership**: the pool owns all buffer memory; the engine is lent a
//!   byte slice during the hand-off and identified by index afterwards

use tracing::trace;

/// One fixed-capacity accumulation buffer.
#[derive(Debug)]
pub struct AudioBuffer {
    data: Vec<u8>,
    bytes_filled: u32,
    in_use: bool,
}

impl AudioBuffer {
    fn new(capacity: u32) -> Self {
        Self {
            data: vec![0; capacity as usize],
            bytes_filled: 0,
            in_use: false,
        }
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    /// Bytes accumulated so far.
    pub fn bytes_filled(&self) -> u32 {
        self.bytes_filled
    }

    /// Remaining free space in bytes.
    pub fn remaining(&self) -> u32 {
        self.capacity() - self.bytes_filled
    }

    /// `true` while the engine owns this buffer.
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// The filled prefix, as handed to the engine.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.bytes_filled as usize]
    }

    /// Copy `payload` into the buffer at the current fill position.
    ///
    /// Returns the offset the payload was placed at. The caller must have
    /// checked `remaining()` first; overrun is a programming error.
    pub(crate) fn append(&mut self, payload: &[u8]) -> u32 {
        debug_assert!(payload.len() as u32 <= self.remaining());

        let offset = self.bytes_filled;
        let start = offset as usize;
        self.data[start..start + payload.len()].copy_from_slice(payload);
        self.bytes_filled += payload.len() as u32;
        offset
    }

    fn reset(&mut self) {
        self.bytes_filled = 0;
        self.in_use = false;
    }
}

/// Fixed array of [`AudioBuffer`]s with round-robin fill order.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<AudioBuffer>,
    fill_index: usize,
    buffers_used: usize,
}

impl BufferPool {
    /// Allocate `count` buffers of `capacity` bytes each.
    pub fn new(count: usize, capacity: u32) -> Self {
        Self {
            buffers: (0..count).map(|_| AudioBuffer::new(capacity)).collect(),
            fill_index: 0,
            buffers_used: 0,
        }
    }

    /// Number of buffers in the pool.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// `true` if the pool holds no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Index of the buffer currently being filled.
    pub fn fill_index(&self) -> usize {
        self.fill_index
    }

    /// Buffers currently held by the engine.
    pub fn buffers_used(&self) -> usize {
        self.buffers_used
    }

    /// The buffer currently being filled.
    pub fn fill_buffer(&self) -> &AudioBuffer {
        &self.buffers[self.fill_index]
    }

    /// Mutable access to the buffer currently being filled.
    pub(crate) fn fill_buffer_mut(&mut self) -> &mut AudioBuffer {
        &mut self.buffers[self.fill_index]
    }

    /// Mark the current fill buffer as owned by the engine and advance the
    /// fill cursor round-robin.
    ///
    /// Returns the index of the new fill target. The previous fill buffer
    /// keeps its contents until the engine returns it; the new target's
    /// fill count is reset.
    pub(crate) fn commit_and_advance(&mut self) -> usize {
        debug_assert!(!self.buffers[self.fill_index].in_use);

        self.buffers[self.fill_index].in_use = true;
        self.buffers_used += 1;

        self.fill_index = (self.fill_index + 1) % self.buffers.len();
        let next = &mut self.buffers[self.fill_index];
        next.bytes_filled = 0;

        trace!(
            fill_index = self.fill_index,
            buffers_used = self.buffers_used,
            "advanced fill cursor"
        );
        self.fill_index
    }

    /// `true` if the buffer the fill cursor points at is still engine-owned.
    pub fn fill_buffer_busy(&self) -> bool {
        self.buffers[self.fill_index].in_use
    }

    /// Mark buffer `index` as returned by the engine.
    ///
    /// Returns `false` without mutating anything if `index` is out of range
    /// or the buffer was not in use — the caller treats that as a protocol
    /// violation.
    pub(crate) fn release(&mut self, index: usize) -> bool {
        match self.buffers.get_mut(index) {
            Some(buffer) if buffer.in_use => {
                buffer.in_use = false;
                self.buffers_used -= 1;
                trace!(index, buffers_used = self.buffers_used, "buffer reclaimed");
                true
            }
            _ => false,
        }
    }

    /// Reset every buffer and the fill cursor to the freshly-allocated state.
    pub(crate) fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.reset();
        }
        self.fill_index = 0;
        self.buffers_used = 0;
    }
}
