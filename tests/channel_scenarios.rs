use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use shared_channel_simulator::config::ChannelConfig;
use shared_channel_simulator::error::ChannelError;
use shared_channel_simulator::scene::parse_scene;
use shared_channel_simulator::simulation::noise::ConstantNoiseModel;
use shared_channel_simulator::simulation::{
    BasicNetDevice, Channel, ChannelHandle, DeviceHandle, EventQueue, Node, Packet, Pdp, Point, PropagationModel, RecordingTransducer, Scheduler,
    SimTime, Transducer, TransducerHandle, TxMode,
};

/// Fixed per-receiver link table keyed by the receiver's x coordinate.
#[derive(Debug)]
struct TableModel {
    links: Vec<(f64, Duration, f64)>,
}

impl TableModel {
    fn link(&self, rx: &Point) -> (Duration, f64) {
        self.links
            .iter()
            .find(|(x, _, _)| *x == rx.x)
            .map(|(_, delay, loss)| (*delay, *loss))
            .unwrap_or((Duration::ZERO, 0.0))
    }
}

impl PropagationModel for TableModel {
    fn name(&self) -> &'static str {
        "table"
    }

    fn delay(&self, _tx: &Point, rx: &Point, _mode: &TxMode) -> Duration {
        self.link(rx).0
    }

    fn path_loss_db(&self, _tx: &Point, rx: &Point, _mode: &TxMode) -> f64 {
        self.link(rx).1
    }

    fn pdp(&self, _tx: &Point, _rx: &Point, _mode: &TxMode) -> Pdp {
        Pdp::impulse()
    }
}

struct Bench {
    queue: Rc<EventQueue>,
    clock: Rc<dyn Scheduler>,
    channel: ChannelHandle,
    transducers: Vec<Rc<RefCell<RecordingTransducer>>>,
    handles: Vec<TransducerHandle>,
}

impl Bench {
    fn new(model: Arc<dyn PropagationModel>) -> Self {
        let queue = Rc::new(EventQueue::new());
        let clock: Rc<dyn Scheduler> = queue.clone();
        let channel = Channel::new(clock.clone());
        channel.borrow_mut().set_propagation_model(model);
        channel.borrow_mut().set_noise_model(Arc::new(ConstantNoiseModel::new(40.0)));
        Self {
            queue,
            clock,
            channel,
            transducers: Vec::new(),
            handles: Vec::new(),
        }
    }

    fn attach(&mut self, id: u32, x: f64) -> usize {
        let transducer = Rc::new(RefCell::new(RecordingTransducer::new(id, self.clock.clone())));
        let handle = TransducerHandle::from_rc(transducer.clone());
        let device = DeviceHandle::new(BasicNetDevice::new(Node::new(id, Point::new(x, 0.0, 0.0))));
        self.channel.borrow_mut().attach(device, handle.clone()).unwrap();
        self.transducers.push(transducer);
        self.handles.push(handle);
        self.handles.len() - 1
    }

    fn transmit_at(&self, at: SimTime, sender: usize, packet: Packet, tx_power_db: f64) {
        let channel = self.channel.clone();
        let handle = self.handles[sender].clone();
        self.queue.schedule_at(
            at,
            Box::new(move || {
                channel.borrow().transmit(&handle, &packet, tx_power_db, &TxMode::default()).unwrap();
            }),
        );
    }
}

fn sender_and_two_receivers() -> Bench {
    let model = TableModel {
        links: vec![(1.0, Duration::from_millis(10), 2.0), (2.0, Duration::from_millis(20), 3.0)],
    };
    let mut bench = Bench::new(Arc::new(model));
    bench.attach(0, 0.0);
    bench.attach(1, 1.0);
    bench.attach(2, 2.0);
    bench
}

#[test]
fn deliveries_follow_per_link_delay_and_loss() {
    let bench = sender_and_two_receivers();
    bench.transmit_at(SimTime::from_millis(5000), 0, Packet::with_size(16), 10.0);
    bench.queue.run();

    assert!(bench.transducers[0].borrow().receptions().is_empty());

    let r1 = bench.transducers[1].borrow();
    assert_eq!(r1.receptions().len(), 1);
    assert_eq!(r1.receptions()[0].at, SimTime::from_millis(5010));
    assert_eq!(r1.receptions()[0].rx_power_db, 8.0);
    assert_eq!(r1.receptions()[0].context, Some(1));

    let r2 = bench.transducers[2].borrow();
    assert_eq!(r2.receptions().len(), 1);
    assert_eq!(r2.receptions()[0].at, SimTime::from_millis(5020));
    assert_eq!(r2.receptions()[0].rx_power_db, 7.0);
    assert_eq!(r2.receptions()[0].context, Some(2));
}

#[test]
fn one_transmission_reaches_every_other_device() {
    let mut bench = Bench::new(Arc::new(TableModel { links: Vec::new() }));
    for id in 0..6 {
        bench.attach(id, id as f64 * 100.0);
    }
    let scheduled = bench
        .channel
        .borrow()
        .transmit(&bench.handles[3], &Packet::with_size(4), 0.0, &TxMode::default())
        .unwrap();
    assert_eq!(scheduled, 5);
    assert_eq!(bench.queue.pending_count(), 5);
    bench.queue.run();
    for (i, t) in bench.transducers.iter().enumerate() {
        let expected = if i == 3 { 0 } else { 1 };
        assert_eq!(t.borrow().receptions().len(), expected, "device {}", i);
    }
}

#[test]
fn delivered_copies_are_independent() {
    let bench = sender_and_two_receivers();
    let original = Packet::new(vec![1, 2, 3, 4]);
    bench.channel.borrow().transmit(&bench.handles[0], &original, 0.0, &TxMode::default()).unwrap();
    bench.queue.run();

    bench.transducers[1].borrow_mut().receptions_mut()[0].packet.data_mut()[0] = 0xff;

    assert_eq!(bench.transducers[1].borrow().receptions()[0].packet.data(), &[0xff, 2, 3, 4]);
    assert_eq!(bench.transducers[2].borrow().receptions()[0].packet.data(), &[1, 2, 3, 4]);
    assert_eq!(original.data(), &[1, 2, 3, 4]);
    assert_eq!(bench.transducers[2].borrow().receptions()[0].packet.uid(), original.uid());
}

#[test]
fn unattached_sender_schedules_nothing() {
    let bench = sender_and_two_receivers();
    let stranger = TransducerHandle::new(RecordingTransducer::new(42, bench.clock.clone()));
    let err = bench
        .channel
        .borrow()
        .transmit(&stranger, &Packet::with_size(1), 10.0, &TxMode::default())
        .unwrap_err();
    assert_eq!(err, ChannelError::UnknownTransducer);
    assert!(err.is_fatal());
    assert_eq!(bench.queue.pending_count(), 0);
    bench.queue.run();
    assert_eq!(bench.queue.executed_count(), 0);
}

#[test]
fn clear_empties_channel_and_blocks_transmission() {
    let bench = sender_and_two_receivers();
    bench.channel.borrow_mut().clear();
    assert_eq!(bench.channel.borrow().device_count(), 0);
    bench.channel.borrow_mut().clear();
    assert_eq!(bench.channel.borrow().device_count(), 0);

    let err = bench
        .channel
        .borrow()
        .transmit(&bench.handles[0], &Packet::with_size(1), 10.0, &TxMode::default())
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(bench.queue.pending_count(), 0);
    for t in &bench.transducers {
        assert!(t.borrow().channel().is_none());
    }
}

#[test]
fn duplicate_attachment_delivers_twice() {
    let mut bench = Bench::new(Arc::new(TableModel { links: Vec::new() }));
    bench.attach(0, 0.0);
    bench.attach(1, 1.0);
    let again = DeviceHandle::new(BasicNetDevice::new(Node::new(1, Point::new(1.0, 0.0, 0.0))));
    bench.channel.borrow_mut().attach(again, bench.handles[1].clone()).unwrap();

    assert_eq!(bench.channel.borrow().device_count(), 3);
    let scheduled = bench
        .channel
        .borrow()
        .transmit(&bench.handles[0], &Packet::with_size(1), 0.0, &TxMode::default())
        .unwrap();
    assert_eq!(scheduled, 2);
    bench.queue.run();
    assert_eq!(bench.transducers[1].borrow().receptions().len(), 2);

    // Both attachments of the sender are skipped
    let scheduled = bench
        .channel
        .borrow()
        .transmit(&bench.handles[1], &Packet::with_size(1), 0.0, &TxMode::default())
        .unwrap();
    assert_eq!(scheduled, 1);
}

/// Transducer appending its node id to a shared arrival log.
struct ArrivalLog {
    node_id: u32,
    arrivals: Rc<RefCell<Vec<u32>>>,
}

impl Transducer for ArrivalLog {
    fn receive(&mut self, _packet: Packet, _rx_power_db: f64, _mode: TxMode, _pdp: Pdp) {
        self.arrivals.borrow_mut().push(self.node_id);
    }

    fn attach_channel(&mut self, _channel: Weak<RefCell<Channel>>) {}

    fn clear(&mut self) {}
}

#[test]
fn equal_delays_fire_in_attachment_order() {
    let bench = Bench::new(Arc::new(TableModel {
        links: vec![(5.0, Duration::from_millis(3), 0.0)],
    }));
    let arrivals = Rc::new(RefCell::new(Vec::new()));
    let mut handles = Vec::new();
    for id in [9, 4, 7] {
        let handle = TransducerHandle::new(ArrivalLog {
            node_id: id,
            arrivals: arrivals.clone(),
        });
        let device = DeviceHandle::new(BasicNetDevice::new(Node::new(id, Point::new(5.0, 0.0, 0.0))));
        bench.channel.borrow_mut().attach(device, handle.clone()).unwrap();
        handles.push(handle);
    }
    let sender = TransducerHandle::new(ArrivalLog {
        node_id: 0,
        arrivals: arrivals.clone(),
    });
    let device = DeviceHandle::new(BasicNetDevice::new(Node::new(0, Point::default())));
    bench.channel.borrow_mut().attach(device, sender.clone()).unwrap();

    bench.channel.borrow().transmit(&sender, &Packet::with_size(1), 0.0, &TxMode::default()).unwrap();
    bench.queue.run();
    assert_eq!(*arrivals.borrow(), vec![9, 4, 7]);
    assert_eq!(bench.queue.now(), SimTime::from_millis(3));
}

#[test]
fn configured_channel_runs_scene() {
    let scene = parse_scene(
        r#"{
            "nodes": [
                { "node_id": 1, "position": { "x": 0, "y": 0, "z": 20 }, "tx_power_db": 180 },
                { "node_id": 2, "position": { "x": 1500, "y": 0, "z": 20 }, "tx_power_db": 180 },
                { "node_id": 3, "position": { "x": 3000, "y": 0, "z": 20 }, "tx_power_db": 180 }
            ],
            "transmissions": [ { "at_ms": 100, "node_id": 2, "payload_size": 8 } ]
        }"#,
    )
    .unwrap();
    let config = ChannelConfig::from_toml_str("[propagation]\nmodel = \"thorp\"\n").unwrap();

    let queue = Rc::new(EventQueue::new());
    let clock: Rc<dyn Scheduler> = queue.clone();
    let channel = Channel::from_config(clock.clone(), &config).unwrap();
    let mut transducers = Vec::new();
    for node in &scene.nodes {
        let transducer = Rc::new(RefCell::new(RecordingTransducer::new(node.node_id, clock.clone())));
        let device = DeviceHandle::new(BasicNetDevice::new(Node::new(node.node_id, node.position)));
        channel
            .borrow_mut()
            .attach(device, TransducerHandle::from_rc(transducer.clone()))
            .unwrap();
        transducers.push(transducer);
    }

    let tx = &scene.transmissions[0];
    let sender = transducers[1].clone();
    let power = scene.node(tx.node_id).unwrap().tx_power_db;
    let size = tx.payload_size;
    queue.schedule_at(
        SimTime::from_millis(tx.at_ms),
        Box::new(move || {
            let channel = sender.borrow().channel().unwrap();
            let handle = TransducerHandle::from_rc(sender.clone());
            channel.borrow().transmit(&handle, &Packet::with_size(size), power, &TxMode::default()).unwrap();
        }),
    );
    queue.run();

    // 1500 m at 1500 m/s
    for i in [0, 2] {
        let t = transducers[i].borrow();
        let rx = &t.receptions()[0];
        assert_eq!(rx.at, SimTime::from_millis(1100));
        assert!(rx.rx_power_db < power);
    }
    assert!(transducers[1].borrow().receptions().is_empty());
    let loss_1 = power - transducers[0].borrow().receptions()[0].rx_power_db;
    let loss_3 = power - transducers[2].borrow().receptions()[0].rx_power_db;
    assert!((loss_1 - loss_3).abs() < 1e-9);

    channel.borrow_mut().dispose();
    assert!(transducers[0].borrow().channel().is_none());
}
