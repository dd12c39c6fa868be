//! Shared broadcast channel connecting every attached transducer.
//!
//! A transmission is fanned out to every other attachment: for each receiver
//! the propagation model yields a delay, a path loss and a power-delay
//! profile, the packet is copied, and a delivery is scheduled at
//! `now + delay` in the receiving node's context. Either all deliveries of a
//! transmission are scheduled or, on a setup error, none is.
//!
//! The channel also owns the teardown step that breaks the reference cycle
//! with its devices: [`Channel::clear`] calls every device's and transducer's
//! own `clear()` so they drop their back-reference, then forgets them and
//! releases the models.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

use super::device::{DeviceHandle, TransducerHandle};
use super::geometry::distance;
use super::noise::NoiseModel;
use super::propagation::PropagationModel;
use super::registry::ChannelRegistry;
use super::scheduler::Scheduler;
use super::types::{NodeId, Packet, Pdp, TxMode};

/// Shared handle to a channel. Devices only keep `Weak` references to it.
pub type ChannelHandle = Rc<RefCell<Channel>>;

/// Running counters of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Successful `transmit` calls.
    pub transmissions: u64,
    /// Deliveries scheduled by those transmissions.
    pub scheduled_deliveries: u64,
    /// Deliveries handed to a receiving transducer.
    pub delivered: u64,
    /// Deliveries that fired after the channel was cleared.
    pub discarded: u64,
}

/// Physics of one receiver, computed before anything is scheduled.
struct PendingDelivery {
    index: usize,
    node_id: NodeId,
    delay: Duration,
    rx_power_db: f64,
    pdp: Pdp,
    packet: Packet,
}

pub struct Channel {
    self_ref: Weak<RefCell<Channel>>,
    scheduler: Option<Rc<dyn Scheduler>>,
    registry: ChannelRegistry,
    propagation: Option<Arc<dyn PropagationModel>>,
    noise: Option<Arc<dyn NoiseModel>>,
    cleared: bool,
    disposed: bool,
    // Bumped by every clear; deliveries scheduled before it are discarded
    generation: u64,
    stats: Cell<ChannelStats>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("devices", &self.registry.len())
            .field("propagation", &self.propagation.as_ref().map(|m| m.name()))
            .field("noise", &self.noise.as_ref().map(|m| m.name()))
            .field("cleared", &self.cleared)
            .field("disposed", &self.disposed)
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl Channel {
    /// Create an unconfigured channel. Models must be set before the first transmission.
    pub fn new(scheduler: Rc<dyn Scheduler>) -> ChannelHandle {
        Rc::new_cyclic(|self_ref| {
            RefCell::new(Channel {
                self_ref: self_ref.clone(),
                scheduler: Some(scheduler),
                registry: ChannelRegistry::new(),
                propagation: None,
                noise: None,
                cleared: false,
                disposed: false,
                generation: 0,
                stats: Cell::new(ChannelStats::default()),
            })
        })
    }

    /// Create a channel with the models selected by `config`.
    pub fn from_config(scheduler: Rc<dyn Scheduler>, config: &ChannelConfig) -> Result<ChannelHandle> {
        let propagation = config.build_propagation_model()?;
        let noise = config.build_noise_model()?;
        let channel = Channel::new(scheduler);
        {
            let mut ch = channel.borrow_mut();
            ch.set_propagation_model(propagation);
            ch.set_noise_model(noise);
        }
        Ok(channel)
    }

    pub fn set_propagation_model(&mut self, model: Arc<dyn PropagationModel>) {
        log::debug!("Set propagation model {}", model.name());
        self.propagation = Some(model);
    }

    pub fn set_noise_model(&mut self, model: Arc<dyn NoiseModel>) {
        log::debug!("Set noise model {}", model.name());
        self.noise = Some(model);
    }

    pub fn propagation_model(&self) -> Option<&Arc<dyn PropagationModel>> {
        self.propagation.as_ref()
    }

    pub fn noise_model(&self) -> Option<&Arc<dyn NoiseModel>> {
        self.noise.as_ref()
    }

    /// Attach a device/transducer pair and hand both a back-reference to this channel.
    ///
    /// Attachment is a setup step; attaching after transmissions started is
    /// accepted but logged, since transmissions already in flight do not reach
    /// the new receiver.
    pub fn attach(&mut self, device: DeviceHandle, transducer: TransducerHandle) -> Result<usize> {
        if self.disposed {
            return Err(ChannelError::Disposed);
        }
        if self.stats.get().transmissions > 0 {
            log::warn!("Device {} attached after transmissions started", device.address());
        }
        if self.cleared {
            log::info!("Reattaching devices to a cleared channel");
            self.cleared = false;
        }
        device.borrow_mut().attach_channel(self.self_ref.clone());
        transducer.borrow_mut().attach_channel(self.self_ref.clone());
        Ok(self.registry.attach(device, transducer))
    }

    pub fn device_count(&self) -> usize {
        self.registry.len()
    }

    pub fn device_at(&self, index: usize) -> Result<DeviceHandle> {
        self.registry.device_at(index).cloned()
    }

    pub fn transducer_at(&self, index: usize) -> Result<TransducerHandle> {
        self.registry.transducer_at(index).cloned()
    }

    /// Noise PSD (dB/Hz) of the configured noise model at `f_khz`.
    pub fn noise_db_hz(&self, f_khz: f64) -> Result<f64> {
        let noise = self
            .noise
            .as_ref()
            .ok_or_else(|| ChannelError::Configuration("noise model not set".to_string()))?;
        Ok(noise.noise_db_hz(f_khz))
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.get()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Broadcast `packet` from `source` to every other attached transducer.
    ///
    /// Returns the number of deliveries scheduled (attachments minus the
    /// sender's). Fails without scheduling anything if the propagation model
    /// is missing or `source` is not attached to this channel.
    pub fn transmit(&self, source: &TransducerHandle, packet: &Packet, tx_power_db: f64, mode: &TxMode) -> Result<usize> {
        let scheduler = self.scheduler.as_ref().ok_or(ChannelError::Disposed)?;
        let propagation = self
            .propagation
            .as_ref()
            .ok_or_else(|| ChannelError::Configuration("propagation model not set".to_string()))?;
        let (_, sender) = self.registry.find_by_sender(source).ok_or(ChannelError::UnknownTransducer)?;
        let sender_position = sender.device.node().position();

        log::debug!("Channel scheduling");
        let mut deliveries = Vec::with_capacity(self.registry.len().saturating_sub(1));
        for (index, entry) in self.registry.iter() {
            if entry.transducer.same(source) {
                continue;
            }
            let receiver = entry.device.node();
            let receiver_position = receiver.position();
            let delay = propagation.delay(&sender_position, &receiver_position, mode);
            let pdp = propagation.pdp(&sender_position, &receiver_position, mode);
            let rx_power_db = tx_power_db - propagation.path_loss_db(&sender_position, &receiver_position, mode);

            log::debug!(
                "Scheduling {}: txPowerDb={}dB, rxPowerDb={}dB, distance={}m, delay={:?}",
                entry.device.address(),
                tx_power_db,
                rx_power_db,
                distance(&sender_position, &receiver_position),
                delay
            );

            deliveries.push(PendingDelivery {
                index,
                node_id: receiver.id(),
                delay,
                rx_power_db,
                pdp,
                packet: packet.copy(),
            });
        }

        let count = deliveries.len();
        for delivery in deliveries {
            let channel = self.self_ref.clone();
            let generation = self.generation;
            let mode = mode.clone();
            let PendingDelivery {
                index,
                node_id,
                delay,
                rx_power_db,
                pdp,
                packet,
            } = delivery;
            scheduler.schedule_with_context(
                node_id,
                delay,
                Box::new(move || Channel::send_up(&channel, generation, index, packet, rx_power_db, mode, pdp)),
            );
        }

        let mut stats = self.stats.get();
        stats.transmissions += 1;
        stats.scheduled_deliveries += count as u64;
        self.stats.set(stats);
        Ok(count)
    }

    /// Delivery callback: hand the copy to the transducer at `index`.
    fn send_up(channel: &Weak<RefCell<Channel>>, generation: u64, index: usize, packet: Packet, rx_power_db: f64, mode: TxMode, pdp: Pdp) {
        let Some(channel) = channel.upgrade() else {
            log::debug!("Channel dropped before delivery of packet uid={}", packet.uid());
            return;
        };
        let transducer = {
            let ch = channel.borrow();
            let mut stats = ch.stats.get();
            let target = if ch.generation == generation { ch.registry.transducer_at(index).ok().cloned() } else { None };
            match target {
                Some(t) => {
                    stats.delivered += 1;
                    ch.stats.set(stats);
                    t
                }
                None => {
                    stats.discarded += 1;
                    ch.stats.set(stats);
                    log::debug!("Discarding delivery of packet uid={} to cleared attachment {}", packet.uid(), index);
                    return;
                }
            }
        };
        log::debug!("Channel: in sendup");
        transducer.borrow_mut().receive(packet, rx_power_db, mode, pdp);
    }

    /// Break the channel/device reference cycle. Idempotent.
    ///
    /// Calls `clear()` on every attached device and transducer, empties the
    /// registry and releases the propagation and noise models. Deliveries
    /// already scheduled are discarded when they fire.
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }
        self.cleared = true;
        self.generation += 1;

        let entries = self.registry.drain();
        let count = entries.len();
        for entry in entries {
            match entry.device.try_borrow_mut() {
                Some(mut device) => device.clear(),
                None => log::warn!("Device busy during channel clear; back-reference left to expire"),
            }
            match entry.transducer.try_borrow_mut() {
                Some(mut transducer) => transducer.clear(),
                None => log::warn!("Transducer busy during channel clear; back-reference left to expire"),
            }
        }
        self.propagation = None;
        self.noise = None;
        log::info!("Channel cleared ({} attachments released)", count);
    }

    /// Clear the channel, then release the scheduler. The channel cannot be used afterwards.
    pub fn dispose(&mut self) {
        self.clear();
        self.scheduler = None;
        self.disposed = true;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.clear();
    }
}
