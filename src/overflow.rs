//! # Overflow Queue
//!
//! FIFO backlog of packets that arrived while no pool buffer had room.
//! Each entry owns an independent copy of its payload, so the caller's
//! slice can be reused the moment submission returns.

use crate::traits::PacketDescriptor;
use bytes::Bytes;
use std::collections::VecDeque;

/// One packet parked in the overflow queue.
#[derive(Debug, Clone)]
pub struct QueuedPacket {
    /// Descriptor with its offset zeroed: the payload below starts at the
    /// packet's first byte.
    pub descriptor: PacketDescriptor,

    /// Owned copy of the packet payload.
    pub data: Bytes,
}

impl QueuedPacket {
    /// Own a copy of `packet` (the packet's bytes, not a larger payload),
    /// rebasing the descriptor to offset 0.
    pub fn copy_from(packet: &[u8], descriptor: &PacketDescriptor) -> Self {
        Self {
            descriptor: PacketDescriptor {
                offset: 0,
                size: descriptor.size,
                variable_frames: descriptor.variable_frames,
            },
            data: Bytes::copy_from_slice(packet),
        }
    }
}

/// Ordered backlog: head is the oldest packet, tail the newest.
#[derive(Debug, Default)]
pub struct OverflowQueue {
    packets: VecDeque<QueuedPacket>,
    bytes: usize,
}

impl OverflowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets queued.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// `true` when no backlog exists.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Total payload bytes queued.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Append a packet at the tail.
    pub fn push_back(&mut self, packet: QueuedPacket) {
        self.bytes += packet.data.len();
        self.packets.push_back(packet);
    }

    /// The oldest packet, if any.
    pub fn front(&self) -> Option<&QueuedPacket> {
        self.packets.front()
    }

    /// Remove and return the oldest packet.
    pub fn pop_front(&mut self) -> Option<QueuedPacket> {
        let packet = self.packets.pop_front();
        if let Some(ref p) = packet {
            self.bytes -= p.data.len();
        }
        packet
    }

    /// Drop the entire backlog.
    pub fn clear(&mut self) {
        self.packets.clear();
        self.bytes = 0;
    }
}
