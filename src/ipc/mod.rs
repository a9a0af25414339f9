//! Inter-process communication transports.
//!
//! Two implementations of the same [`IpcTransport`] capability, both keyed
//! by an ordered `(sender_id, receiver_id)` pair: a bounded
//! [`message_queue::MessageQueueTransport`] (per-channel FIFO) and a
//! single-slot [`shared_memory::SharedMemoryTransport`] rendezvous.

pub mod message_queue;
pub mod shared_memory;

pub use message_queue::MessageQueueTransport;
pub use shared_memory::SharedMemoryTransport;

use alloc::vec::Vec;

use crate::host::PrintSink;

/// Channel/region identifiers are handed back across the same boundary the
/// rest of the core uses for addresses and status codes: a small integer,
/// `-1` on failure.
pub type ChannelId = i32;

/// Fixed IPC envelope. `payload` stands in for the wire format's
/// fixed-size `data[4096]` array — bounded by [`MAX_PAYLOAD_SIZE`] at
/// construction, but backed by an owned `Vec` rather than an inline array so
/// a `Message` never carries more bytes around than it needs to.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender_id: u32,
    pub receiver_id: u32,
    pub message_id: u32,
    pub kind: u32,
    pub payload: Vec<u8>,
    pub timestamp: u32,
    pub flags: u32,
}

/// Largest payload the generic wire envelope admits.
pub const MAX_PAYLOAD_SIZE: usize = 4096;

impl Default for Message {
    fn default() -> Self {
        Message {
            sender_id: 0,
            receiver_id: 0,
            message_id: 0,
            kind: 0,
            payload: Vec::new(),
            timestamp: 0,
            flags: 0,
        }
    }
}

impl Message {
    pub fn new(sender_id: u32, receiver_id: u32, message_id: u32, kind: u32, payload: Vec<u8>) -> Self {
        Message {
            sender_id,
            receiver_id,
            message_id,
            kind,
            payload,
            timestamp: 0,
            flags: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// The uniform capability every IPC transport implementation exposes
/// through the registry.
pub trait IpcTransport {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    fn init(&mut self) -> i32;
    fn shutdown(&mut self);

    /// Returns the existing channel if `(sender_id, receiver_id)` already
    /// has one, otherwise allocates a new one. `-1` if no channel slots
    /// remain.
    fn create_channel(&mut self, sender_id: u32, receiver_id: u32) -> ChannelId;
    fn destroy_channel(&mut self, channel_id: ChannelId);

    /// `0` on success, `-1` on failure (unknown channel, full queue,
    /// exhausted pool, or — shared memory only — missing write
    /// permission).
    fn send_message(&mut self, channel_id: ChannelId, msg: Message) -> i32;

    /// `0` and fills `out` on success, `-1` (leaving `out` untouched) if
    /// the channel is unknown or empty.
    fn receive_message(&mut self, channel_id: ChannelId, out: &mut Message) -> i32;

    /// Non-blocking; identical to `receive_message` in both built-in
    /// transports.
    fn try_receive(&mut self, channel_id: ChannelId, out: &mut Message) -> i32;

    fn can_send(&self, channel_id: ChannelId) -> bool;
    fn has_messages(&self, channel_id: ChannelId) -> bool;
    fn get_queue_size(&self, channel_id: ChannelId) -> usize;

    /// Security stub: always `true` in the core.
    fn check_permission(&self, sender_id: u32, receiver_id: u32) -> bool;
    fn grant_capability(&mut self, grantor: u32, grantee: u32, rights: u32);

    fn tick(&mut self);

    fn print_stats(&self, sink: &mut dyn PrintSink);
}
