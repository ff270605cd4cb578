//! Interrupt requests and priority arbitration.
//!
//! Devices raise requests through an [`InterruptLine`] handed to them at
//! install time; the bus drains the shared channel into a pending table
//! keyed by `(level, slot)` and grants the highest level first, lowest
//! slot within a level. Re-raising a pending `(level, slot)` is idempotent.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::warn;

/// One prioritized interrupt request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InterruptRequest {
    /// Instance name of the requesting device.
    pub device: String,
    /// Vector delivered to the host.
    pub vector: u16,
    /// Priority level, 1..=7.
    pub level: u8,
    /// Backplane slot; lower slots win within a level.
    pub slot: u8,
}

/// Device-side handle for raising interrupts.
///
/// Cloneable and cheap; safe to call from a register-access callback since
/// the send never blocks.
#[derive(Debug, Clone)]
pub struct InterruptLine {
    sender: Sender<InterruptRequest>,
}

impl InterruptLine {
    pub(crate) fn new(sender: Sender<InterruptRequest>) -> Self {
        Self { sender }
    }

    /// Raises a request. A request that cannot be delivered (bus torn down)
    /// is dropped with a warning.
    pub fn request(&self, request: InterruptRequest) {
        if let Err(TrySendError::Disconnected(request)) = self.sender.try_send(request) {
            warn!(
                target: "bus",
                "interrupt {:03o}/{} from {} dropped, bus is gone",
                request.vector, request.level, request.device
            );
        }
    }
}

/// Pending-request table with `(level, slot)` arbitration.
#[derive(Debug, Default)]
pub(crate) struct PendingInterrupts {
    table: BTreeMap<(Reverse<u8>, u8), InterruptRequest>,
}

impl PendingInterrupts {
    /// Drains newly raised requests into the table. A `(level, slot)` pair
    /// already pending keeps its original request.
    pub(crate) fn absorb(&mut self, channel: &Receiver<InterruptRequest>) {
        while let Ok(request) = channel.try_recv() {
            self.table
                .entry((Reverse(request.level), request.slot))
                .or_insert(request);
        }
    }

    /// Grants the winning request: highest level, then lowest slot.
    pub(crate) fn grant(&mut self) -> Option<InterruptRequest> {
        self.table.pop_first().map(|(_, request)| request)
    }

    /// Discards every pending request from the named device.
    pub(crate) fn cancel_device(&mut self, device: &str) {
        self.table.retain(|_, request| request.device != device);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.len()
    }
}
