use crate::{logging::*, Completion, Endpoint, TransferStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Free for the fill side
    Empty,
    /// Owned by an outstanding wire transfer
    Busy,
    /// Holds data nobody has consumed yet: OUT data waiting for storage, or
    /// IN data waiting for the wire
    Full,
}

pub(crate) struct BufferSlot {
    pub state: SlotState,
    /// Empty while the buffer is out with a wire transfer
    pub buf: Vec<u8>,
    /// Valid bytes in `buf`
    pub length: usize,
    /// OUT only: how much of the request we actually wanted
    pub intended: usize,
    pub status: TransferStatus,
    /// Endpoint of the transfer in flight, if any
    pub ep: Option<Endpoint>,
}

/// Fixed ring of transfer buffers. The fill and drain cursors walk the ring
/// independently and never skip a slot.
pub(crate) struct BufferPool {
    slots: Vec<BufferSlot>,
    next_fill: usize,
    next_drain: usize,
    buffer_bytes: usize,
    /// Most slots ever Busy at once
    high_water: usize,
}

impl BufferPool {
    pub fn new(count: usize, buffer_bytes: usize) -> Self {
        let slots = (0..count)
            .map(|_| BufferSlot {
                state: SlotState::Empty,
                buf: vec![0u8; buffer_bytes],
                length: 0,
                intended: 0,
                status: TransferStatus::Complete,
                ep: None,
            })
            .collect();
        BufferPool { slots, next_fill: 0, next_drain: 0, buffer_bytes, high_water: 0 }
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub fn fill_index(&self) -> usize {
        self.next_fill
    }

    pub fn drain_index(&self) -> usize {
        self.next_drain
    }

    pub fn advance_fill(&mut self) {
        self.next_fill = (self.next_fill + 1) % self.slots.len();
    }

    pub fn advance_drain(&mut self) {
        self.next_drain = (self.next_drain + 1) % self.slots.len();
    }

    /// The drain side starts wherever the fill side is about to write
    pub fn sync_drain_to_fill(&mut self) {
        self.next_drain = self.next_fill;
    }

    pub fn slot(&self, index: usize) -> &BufferSlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut BufferSlot {
        &mut self.slots[index]
    }

    pub fn state(&self, index: usize) -> SlotState {
        self.slots[index].state
    }

    pub fn release_as_full(&mut self, index: usize, length: usize) {
        let slot = &mut self.slots[index];
        slot.length = length;
        slot.state = SlotState::Full;
    }

    pub fn release_as_empty(&mut self, index: usize) {
        self.slots[index].state = SlotState::Empty;
    }

    /// Hand the buffer of `index` to a wire transfer
    pub fn take_for_transfer(&mut self, index: usize, ep: Endpoint) -> Vec<u8> {
        let slot = &mut self.slots[index];
        debug_assert!(slot.state != SlotState::Busy, "slot {} already has a transfer", index);
        slot.state = SlotState::Busy;
        slot.ep = Some(ep);
        slot.status = TransferStatus::Complete;
        let buf = std::mem::take(&mut slot.buf);
        self.high_water = self.high_water.max(self.busy_count());
        buf
    }

    /// Land a wire completion: IN slots become Empty, OUT slots Full. Returns
    /// false for a completion that doesn't match an outstanding transfer.
    pub fn complete(&mut self, completion: Completion) -> bool {
        let Some(slot) = self.slots.get_mut(completion.slot) else {
            log::warn!("completion for unknown slot {}", completion.slot);
            return false;
        };
        if slot.state != SlotState::Busy || slot.ep != Some(completion.ep) {
            log::warn!("stray completion for slot {} ({:?})", completion.slot, slot.state);
            return false;
        }
        slot.buf = completion.buf;
        slot.status = completion.status;
        slot.ep = None;
        match completion.ep {
            Endpoint::BulkIn => {
                slot.state = SlotState::Empty;
            }
            Endpoint::BulkOut => {
                slot.length = completion.actual.min(slot.buf.len());
                slot.state = SlotState::Full;
            }
        }
        trace_pipeline!(
            "BUFFER> slot {} {:?} done, {} bytes, {:?}",
            completion.slot,
            completion.ep,
            completion.actual,
            completion.status
        );
        true
    }

    /// Slots with a transfer outstanding, and the endpoint it went to
    pub fn busy(&self) -> impl Iterator<Item = (usize, Endpoint)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| match (s.state, s.ep) {
            (SlotState::Busy, Some(ep)) => Some((i, ep)),
            _ => None,
        })
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Busy).count()
    }

    pub fn all_empty(&self) -> bool {
        self.slots.iter().all(|s| s.state == SlotState::Empty)
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Every slot back to Empty and both cursors to the start. Only valid once
    /// no transfer is outstanding.
    pub fn reset(&mut self) {
        debug_assert_eq!(self.busy_count(), 0);
        for slot in self.slots.iter_mut() {
            slot.state = SlotState::Empty;
            slot.length = 0;
            slot.intended = 0;
            slot.ep = None;
            if slot.buf.len() != self.buffer_bytes {
                slot.buf.resize(self.buffer_bytes, 0);
            }
        }
        self.next_fill = 0;
        self.next_drain = 0;
    }

    /// Drop the buffers at unbind
    pub fn release_memory(&mut self) {
        self.slots.clear();
        self.next_fill = 0;
        self.next_drain = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
