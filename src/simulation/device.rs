//! Device-side endpoints attached to a channel.
//!
//! A device is the node-facing half of an attachment and answers "where is
//! the owning node"; its transducer is the channel-facing half that receives
//! deliveries. The transducer reference is the identity of an attachment.
//!
//! Both halves hold only a `Weak` back-reference to the channel. The channel
//! hands it out on attach and takes it back through `clear()`.

use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use super::channel::{Channel, ChannelHandle};
use super::geometry::distance;
use super::scheduler::{Scheduler, current_context};
use super::types::{NodeId, Packet, Pdp, Point, SimTime, TxMode};

/// A simulated node with a constant-position mobility model.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    position: Cell<Point>,
}

impl Node {
    pub fn new(id: NodeId, position: Point) -> Rc<Self> {
        Rc::new(Self {
            id,
            position: Cell::new(position),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position.get()
    }

    pub fn set_position(&self, position: Point) {
        self.position.set(position);
    }

    pub fn distance_from(&self, other: &Node) -> f64 {
        distance(&self.position(), &other.position())
    }
}

/// Capability contract of the node-facing half of an attachment.
pub trait NetDevice {
    /// Node owning this device; its position feeds the propagation model.
    fn node(&self) -> Rc<Node>;

    /// Store the back-reference handed out by the channel on attach.
    fn attach_channel(&mut self, channel: Weak<RefCell<Channel>>);

    /// Release the back-reference to the channel. Must be idempotent.
    fn clear(&mut self);

    /// Human readable address for logging.
    fn address(&self) -> String {
        format!("node-{}", self.node().id())
    }
}

/// Capability contract of the channel-facing half of an attachment.
pub trait Transducer {
    /// Delivery entry point, invoked by the scheduler at the arrival time.
    fn receive(&mut self, packet: Packet, rx_power_db: f64, mode: TxMode, pdp: Pdp);

    /// Store the back-reference handed out by the channel on attach.
    fn attach_channel(&mut self, channel: Weak<RefCell<Channel>>);

    /// Release the back-reference to the channel. Must be idempotent.
    fn clear(&mut self);
}

/// Shared handle to an attached device.
#[derive(Clone)]
pub struct DeviceHandle(Rc<RefCell<dyn NetDevice>>);

impl DeviceHandle {
    pub fn new<D: NetDevice + 'static>(device: D) -> Self {
        Self(Rc::new(RefCell::new(device)))
    }

    /// Wrap an existing typed handle, keeping the caller's typed access.
    pub fn from_rc<D: NetDevice + 'static>(device: Rc<RefCell<D>>) -> Self {
        Self(device)
    }

    pub fn node(&self) -> Rc<Node> {
        self.0.borrow().node()
    }

    pub fn address(&self) -> String {
        self.0.borrow().address()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn NetDevice + 'static> {
        self.0.borrow_mut()
    }

    pub(crate) fn try_borrow_mut(&self) -> Option<RefMut<'_, dyn NetDevice + 'static>> {
        self.0.try_borrow_mut().ok()
    }

    pub fn same(&self, other: &DeviceHandle) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceHandle({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Shared handle to an attached transducer. Equality is reference identity.
#[derive(Clone)]
pub struct TransducerHandle(Rc<RefCell<dyn Transducer>>);

impl TransducerHandle {
    pub fn new<T: Transducer + 'static>(transducer: T) -> Self {
        Self(Rc::new(RefCell::new(transducer)))
    }

    /// Wrap an existing typed handle, keeping the caller's typed access.
    pub fn from_rc<T: Transducer + 'static>(transducer: Rc<RefCell<T>>) -> Self {
        Self(transducer)
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Transducer + 'static> {
        self.0.borrow_mut()
    }

    pub(crate) fn try_borrow_mut(&self) -> Option<RefMut<'_, dyn Transducer + 'static>> {
        self.0.try_borrow_mut().ok()
    }

    pub fn same(&self, other: &TransducerHandle) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl PartialEq for TransducerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for TransducerHandle {}

impl fmt::Debug for TransducerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransducerHandle({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Plain device: a node plus the channel back-reference.
#[derive(Debug)]
pub struct BasicNetDevice {
    node: Rc<Node>,
    channel: Option<Weak<RefCell<Channel>>>,
}

impl BasicNetDevice {
    pub fn new(node: Rc<Node>) -> Self {
        Self { node, channel: None }
    }

    /// Channel this device is attached to, while both are alive and attached.
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel.as_ref().and_then(Weak::upgrade)
    }
}

impl NetDevice for BasicNetDevice {
    fn node(&self) -> Rc<Node> {
        self.node.clone()
    }

    fn attach_channel(&mut self, channel: Weak<RefCell<Channel>>) {
        self.channel = Some(channel);
    }

    fn clear(&mut self) {
        self.channel = None;
    }
}

/// One delivery observed by a [`RecordingTransducer`].
#[derive(Debug)]
pub struct Reception {
    pub packet: Packet,
    pub rx_power_db: f64,
    pub mode: TxMode,
    pub pdp: Pdp,
    /// Simulated arrival time.
    pub at: SimTime,
    /// Scheduler context the delivery executed in.
    pub context: Option<NodeId>,
}

/// Transducer that keeps every delivery it receives.
pub struct RecordingTransducer {
    node_id: NodeId,
    clock: Rc<dyn Scheduler>,
    channel: Option<Weak<RefCell<Channel>>>,
    receptions: Vec<Reception>,
}

impl RecordingTransducer {
    pub fn new(node_id: NodeId, clock: Rc<dyn Scheduler>) -> Self {
        Self {
            node_id,
            clock,
            channel: None,
            receptions: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Channel this transducer transmits on, while attached.
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel.as_ref().and_then(Weak::upgrade)
    }

    pub fn receptions(&self) -> &[Reception] {
        &self.receptions
    }

    pub fn receptions_mut(&mut self) -> &mut [Reception] {
        &mut self.receptions
    }
}

impl fmt::Debug for RecordingTransducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTransducer")
            .field("node_id", &self.node_id)
            .field("attached", &self.channel.is_some())
            .field("receptions", &self.receptions.len())
            .finish()
    }
}

impl Transducer for RecordingTransducer {
    fn receive(&mut self, packet: Packet, rx_power_db: f64, mode: TxMode, pdp: Pdp) {
        log::debug!(
            "[{}] received packet uid={} size={} rxPowerDb={:.2} mode={}",
            self.node_id,
            packet.uid(),
            packet.len(),
            rx_power_db,
            mode.name
        );
        self.receptions.push(Reception {
            packet,
            rx_power_db,
            mode,
            pdp,
            at: self.clock.now(),
            context: current_context().map(|(node, _)| node),
        });
    }

    fn attach_channel(&mut self, channel: Weak<RefCell<Channel>>) {
        self.channel = Some(channel);
    }

    fn clear(&mut self) {
        self.channel = None;
    }
}
