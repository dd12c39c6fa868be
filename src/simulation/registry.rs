//! Ordered set of (device, transducer) attachments of one channel.
//!
//! Attachment order is preserved and is the order receivers are visited in
//! on every transmission. Entries are only appended during normal operation;
//! the whole registry is emptied at once by the channel's teardown.

use crate::error::{ChannelError, Result};

use super::device::{DeviceHandle, TransducerHandle};

/// One attachment: the node-facing device and its channel-facing transducer.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub device: DeviceHandle,
    pub transducer: TransducerHandle,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: Vec<DeviceEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attachment and return its index.
    ///
    /// Attaching a transducer that is already present is accepted; the
    /// transducer then receives every transmission once per attachment.
    pub fn attach(&mut self, device: DeviceHandle, transducer: TransducerHandle) -> usize {
        if self.contains(&transducer) {
            log::warn!(
                "Transducer of {} attached more than once; it will receive duplicate deliveries",
                device.address()
            );
        }
        log::debug!("Adding dev/trans pair number {}", self.entries.len());
        self.entries.push(DeviceEntry { device, transducer });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checked indexed access.
    pub fn entry(&self, index: usize) -> Result<&DeviceEntry> {
        self.entries.get(index).ok_or(ChannelError::DeviceIndexOutOfRange {
            index,
            count: self.entries.len(),
        })
    }

    pub fn device_at(&self, index: usize) -> Result<&DeviceHandle> {
        self.entry(index).map(|e| &e.device)
    }

    pub fn transducer_at(&self, index: usize) -> Result<&TransducerHandle> {
        self.entry(index).map(|e| &e.transducer)
    }

    /// First attachment whose transducer is `sender`, with its index.
    pub fn find_by_sender(&self, sender: &TransducerHandle) -> Option<(usize, &DeviceEntry)> {
        self.entries.iter().enumerate().find(|(_, e)| e.transducer.same(sender))
    }

    pub fn contains(&self, transducer: &TransducerHandle) -> bool {
        self.find_by_sender(transducer).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &DeviceEntry)> {
        self.entries.iter().enumerate()
    }

    /// Remove and return every attachment, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<DeviceEntry> {
        std::mem::take(&mut self.entries)
    }
}
