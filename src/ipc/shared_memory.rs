//! Single-slot shared-memory rendezvous IPC.
//!
//! Each region is a 4 KiB buffer shared between a bounded set of
//! participants, with a single pending-message slot: a sender succeeds only
//! while the slot is empty, and a receiver drains it in one call. The C
//! reference tracks this with two booleans (`has_data`, and a per-message
//! `valid` flag); both collapse naturally into one `Option<Message>` here.

use alloc::vec::Vec;
use bitflags::bitflags;

use super::{ChannelId, IpcTransport, Message};
use crate::host::PrintSink;

pub const MAX_SHARED_REGIONS: usize = 64;
pub const MAX_PROCESSES_PER_REGION: usize = 8;
pub const SHARED_REGION_SIZE: usize = 4096;
pub const MAX_MESSAGE_SIZE: usize = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionPermissions: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
    }
}

/// Permissions a region's creator starts with: a creator can always send
/// into and read its own region without an explicit `grant_capability`.
const DEFAULT_PERMISSIONS: RegionPermissions = RegionPermissions::READ.union(RegionPermissions::WRITE);

struct Region {
    region_id: u32,
    creator_id: u32,
    participants: heapless::Vec<u32, MAX_PROCESSES_PER_REGION>,
    permissions: RegionPermissions,
    pending: Option<Message>,
    sent: u32,
    received: u32,
}

impl Region {
    fn has_participant(&self, pid: u32) -> bool {
        self.participants.iter().any(|&p| p == pid)
    }
}

pub struct SharedMemoryTransport {
    regions: Vec<Option<Region>>,
    next_region_id: u32,
    total_sent: u32,
    total_received: u32,
    initialized: bool,
    /// Single documented site a multiprocessor port would replace with a
    /// real mutual-exclusion primitive; the core is single-threaded and
    /// this never actually contends, but every critical section below goes
    /// through it so the seam is in one place.
    locked: bool,
}

impl Default for SharedMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryTransport {
    pub fn new() -> Self {
        SharedMemoryTransport {
            regions: (0..MAX_SHARED_REGIONS).map(|_| None).collect(),
            next_region_id: 1,
            total_sent: 0,
            total_received: 0,
            initialized: false,
            locked: false,
        }
    }

    fn with_lock<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.locked = true;
        let result = f(self);
        self.locked = false;
        result
    }

    fn find_slot_by_id(&self, region_id: ChannelId) -> Option<usize> {
        if region_id < 0 {
            return None;
        }
        self.regions.iter().position(|slot| {
            slot.as_ref().is_some_and(|r| r.region_id == region_id as u32)
        })
    }

    fn find_slot_by_participants(&self, a: u32, b: u32) -> Option<usize> {
        self.regions.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|r| r.has_participant(a) && r.has_participant(b))
        })
    }

    fn check_region_permission(&self, slot: usize, pid: u32, required: RegionPermissions) -> bool {
        let region = self.regions[slot].as_ref().unwrap();
        region.has_participant(pid) && region.permissions.contains(required)
    }
}

impl IpcTransport for SharedMemoryTransport {
    fn name(&self) -> &'static str {
        "shared_memory"
    }

    fn description(&self) -> &'static str {
        "Zero-copy shared memory regions with single-slot message handoff"
    }

    fn init(&mut self) -> i32 {
        if self.initialized {
            return 0;
        }
        *self = SharedMemoryTransport {
            initialized: true,
            ..SharedMemoryTransport::new()
        };
        0
    }

    fn shutdown(&mut self) {
        for slot in &mut self.regions {
            *slot = None;
        }
        self.initialized = false;
    }

    fn create_channel(&mut self, sender_id: u32, receiver_id: u32) -> ChannelId {
        self.with_lock(|this| {
            if let Some(slot) = this.find_slot_by_participants(sender_id, receiver_id) {
                return this.regions[slot].as_ref().unwrap().region_id as ChannelId;
            }

            let slot = match this.regions.iter().position(|r| r.is_none()) {
                Some(slot) => slot,
                None => return -1,
            };

            let region_id = this.next_region_id;
            this.next_region_id += 1;

            let mut participants = heapless::Vec::new();
            let _ = participants.push(sender_id);
            if receiver_id != sender_id {
                let _ = participants.push(receiver_id);
            }

            this.regions[slot] = Some(Region {
                region_id,
                creator_id: sender_id,
                participants,
                permissions: DEFAULT_PERMISSIONS,
                pending: None,
                sent: 0,
                received: 0,
            });
            region_id as ChannelId
        })
    }

    fn destroy_channel(&mut self, channel_id: ChannelId) {
        // Region ids are single-use: the slot is reclaimed but next_region_id
        // only ever increases, so a destroyed id is never reissued.
        if let Some(slot) = self.find_slot_by_id(channel_id) {
            self.regions[slot] = None;
        }
    }

    fn send_message(&mut self, channel_id: ChannelId, mut msg: Message) -> i32 {
        let slot = match self.find_slot_by_id(channel_id) {
            Some(slot) => slot,
            None => return -1,
        };

        self.with_lock(|this| {
            if !this.check_region_permission(slot, msg.sender_id, RegionPermissions::WRITE) {
                return -1;
            }

            let region = this.regions[slot].as_mut().unwrap();
            if region.pending.is_some() {
                return -1;
            }

            if msg.payload.len() > MAX_MESSAGE_SIZE {
                msg.payload.truncate(MAX_MESSAGE_SIZE);
            }
            region.pending = Some(msg);
            region.sent += 1;
            this.total_sent += 1;
            0
        })
    }

    fn receive_message(&mut self, channel_id: ChannelId, out: &mut Message) -> i32 {
        let slot = match self.find_slot_by_id(channel_id) {
            Some(slot) => slot,
            None => return -1,
        };

        self.with_lock(|this| {
            let region = this.regions[slot].as_mut().unwrap();
            match region.pending.take() {
                Some(msg) => {
                    region.received += 1;
                    this.total_received += 1;
                    *out = msg;
                    0
                }
                None => -1,
            }
        })
    }

    fn try_receive(&mut self, channel_id: ChannelId, out: &mut Message) -> i32 {
        self.receive_message(channel_id, out)
    }

    fn can_send(&self, channel_id: ChannelId) -> bool {
        match self.find_slot_by_id(channel_id) {
            Some(slot) => self.regions[slot].as_ref().unwrap().pending.is_none(),
            None => false,
        }
    }

    fn has_messages(&self, channel_id: ChannelId) -> bool {
        match self.find_slot_by_id(channel_id) {
            Some(slot) => self.regions[slot].as_ref().unwrap().pending.is_some(),
            None => false,
        }
    }

    fn get_queue_size(&self, channel_id: ChannelId) -> usize {
        match self.find_slot_by_id(channel_id) {
            Some(slot) => usize::from(self.regions[slot].as_ref().unwrap().pending.is_some()),
            None => 0,
        }
    }

    fn check_permission(&self, _sender_id: u32, _receiver_id: u32) -> bool {
        true
    }

    fn grant_capability(&mut self, grantor: u32, grantee: u32, rights: u32) {
        self.with_lock(|this| {
            for slot in this.regions.iter_mut().flatten() {
                if slot.creator_id != grantor {
                    continue;
                }
                if slot.has_participant(grantee) {
                    continue;
                }
                if slot.participants.len() >= MAX_PROCESSES_PER_REGION {
                    continue;
                }
                let _ = slot.participants.push(grantee);
                slot.permissions |= RegionPermissions::from_bits_truncate(rights);
            }
        });
    }

    fn tick(&mut self) {}

    fn print_stats(&self, sink: &mut dyn PrintSink) {
        let active: Vec<&Region> = self.regions.iter().flatten().collect();

        sink.print_line("SHARED MEMORY IPC STATISTICS:");
        sink.print_line(&alloc::format!("  Active regions: {}", active.len()));
        sink.print_line(&alloc::format!("  Total messages sent: {}", self.total_sent));
        sink.print_line(&alloc::format!(
            "  Total messages received: {}",
            self.total_received
        ));

        sink.print_line("  Active regions:");
        for region in active {
            sink.print_line(&alloc::format!(
                "    Region {}: creator {}, {} participants, {} bytes, pending: {}",
                region.region_id,
                region.creator_id,
                region.participants.len(),
                SHARED_REGION_SIZE,
                region.pending.is_some()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn msg(sender: u32, receiver: u32, payload_len: usize) -> Message {
        Message::new(sender, receiver, 1, 0, vec![0xAB; payload_len])
    }

    #[test]
    fn create_channel_deduplicates_on_participants() {
        let mut transport = SharedMemoryTransport::new();
        transport.init();
        let a = transport.create_channel(1, 2);
        let b = transport.create_channel(2, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_payload_is_clamped_not_rejected() {
        let mut transport = SharedMemoryTransport::new();
        transport.init();
        let region = transport.create_channel(1, 2);
        assert_eq!(transport.send_message(region, msg(1, 2, MAX_MESSAGE_SIZE + 500)), 0);

        let mut out = Message::default();
        assert_eq!(transport.receive_message(region, &mut out), 0);
        assert_eq!(out.payload.len(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn grant_capability_only_touches_creators_own_regions() {
        let mut transport = SharedMemoryTransport::new();
        transport.init();
        let region = transport.create_channel(1, 2);

        // 99 didn't create any region; this must be a no-op.
        transport.grant_capability(99, 3, DEFAULT_PERMISSIONS.bits());
        assert_eq!(transport.send_message(region, msg(3, 1, 4)), -1);

        // 1 created `region`; granting to 3 should let 3 write into it.
        transport.grant_capability(1, 3, DEFAULT_PERMISSIONS.bits());
        assert_eq!(transport.send_message(region, msg(3, 1, 4)), 0);
    }

    #[test]
    fn scenario_s6_shared_memory_handoff() {
        // S6: region between 1,2; send from 1; second send fails until 2
        // drains; invariant sent == received + has_data holds throughout.
        let mut transport = SharedMemoryTransport::new();
        transport.init();
        let region = transport.create_channel(1, 2);

        assert_eq!(transport.send_message(region, msg(1, 2, 16)), 0);
        assert_eq!(transport.send_message(region, msg(1, 2, 16)), -1);
        assert!(transport.has_messages(region));

        let mut out = Message::default();
        assert_eq!(transport.receive_message(region, &mut out), 0);
        assert!(!transport.has_messages(region));

        assert_eq!(transport.send_message(region, msg(1, 2, 16)), 0);
        assert_eq!(transport.receive_message(region, &mut out), 0);

        assert_eq!(transport.total_sent, 2);
        assert_eq!(transport.total_received, 2);
    }

    #[test]
    fn destroy_channel_never_reissues_region_id() {
        let mut transport = SharedMemoryTransport::new();
        transport.init();
        let first = transport.create_channel(1, 2);
        transport.destroy_channel(first);
        let second = transport.create_channel(1, 2);
        assert_ne!(first, second);
    }
}
