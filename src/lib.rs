//! # Audio Queue Core
//!
//! Buffer-fill, overflow and backpressure state machine for streaming audio
//! playback.
//!
//! ## Overview
//!
//! Compressed audio packets arrive in irregular bursts from a demuxer, while
//! the platform playback engine consumes fixed-capacity buffers at real-time
//! pace. This crate sits between the two:
//!
//! - accumulates variable-size packets into a small pool of fixed-capacity
//!   buffers and hands filled buffers to the engine in order;
//! - absorbs backpressure by diverting packets into an ordered overflow
//!   queue instead of blocking the caller;
//! - drains the backlog head-first the moment the engine returns a buffer;
//! - tracks the Idle/Running/Paused playback lifecycle against the engine's
//!   asynchronous status notifications.
//!
//! The demuxer, the decoder, and the engine itself are external
//! collaborators. The engine is injected via the [`PlaybackEngine`] trait
//! and observed through the [`QueueDelegate`] callback set.
//!
//! ## Threading Model
//!
//! The queue is a synchronous, single-owner state machine. All entry points
//! take `&mut self`, including the engine's completion notifications
//! ([`AudioQueue::buffer_reclaimed`], [`AudioQueue::running_changed`]),
//! which the host must deliver serialized on the owner's context. Nothing
//! in this crate blocks or takes a lock.

pub mod buffer;
pub mod config;
pub mod error;
pub mod overflow;
pub mod queue;
pub mod traits;

pub use config::{QueueConfig, QueueStats};
pub use error::{AudioQueueError, EngineError, Result};
pub use queue::AudioQueue;
pub use traits::{PacketDescriptor, PlaybackEngine, PlaybackState, QueueDelegate};
