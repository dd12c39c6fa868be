//! Headless scenario runner.
//!
//! Usage: `shared-channel-simulator <scene.json> [channel.toml]`
//!
//! Loads the scene, builds a channel with the configured models, attaches one
//! device/transducer pair per node, replays the scripted transmissions on the
//! event queue and prints what every node received.

use anyhow::{Context, bail};
use env_logger::Builder;
use log::{LevelFilter, error, info};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use shared_channel_simulator::config::ChannelConfig;
use shared_channel_simulator::scene::{Scene, load_scene};
use shared_channel_simulator::simulation::log_capture::{TeeLogger, drain_captured_logs, init_log_capture};
use shared_channel_simulator::simulation::{
    BasicNetDevice, Channel, ChannelHandle, DeviceHandle, EventQueue, Node, Packet, RecordingTransducer, Scheduler, SimTime, TransducerHandle,
};

struct Attached {
    node_id: u32,
    transducer: Rc<RefCell<RecordingTransducer>>,
    handle: TransducerHandle,
}

fn init_logging() -> anyhow::Result<()> {
    let env_logger = Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("shared_channel_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .build();
    let logger = TeeLogger::new(env_logger);
    let max_level = logger.filter();
    log::set_boxed_logger(Box::new(logger)).context("Failed to install logger")?;
    log::set_max_level(max_level);
    init_log_capture();
    Ok(())
}

fn attach_nodes(scene: &Scene, channel: &ChannelHandle, clock: &Rc<dyn Scheduler>) -> anyhow::Result<Vec<Attached>> {
    let mut attached = Vec::with_capacity(scene.nodes.len());
    for scene_node in &scene.nodes {
        let node = Node::new(scene_node.node_id, scene_node.position);
        let transducer = Rc::new(RefCell::new(RecordingTransducer::new(scene_node.node_id, clock.clone())));
        let handle = TransducerHandle::from_rc(transducer.clone());
        channel
            .borrow_mut()
            .attach(DeviceHandle::new(BasicNetDevice::new(node)), handle.clone())
            .with_context(|| format!("Failed to attach node {}", scene_node.node_id))?;
        attached.push(Attached {
            node_id: scene_node.node_id,
            transducer,
            handle,
        });
    }
    Ok(attached)
}

/// Put every scripted transmission on the queue.
///
/// Each transmission goes through the transducer's own back-reference to the
/// channel, as a node stack would.
fn schedule_transmissions(scene: &Scene, queue: &EventQueue, attached: &[Attached]) {
    for (seq, tx) in scene.transmissions.iter().enumerate() {
        let Some(sender) = attached.iter().find(|a| a.node_id == tx.node_id) else {
            continue;
        };
        let Some(scene_node) = scene.node(tx.node_id) else {
            continue;
        };
        let transducer = sender.transducer.clone();
        let handle = sender.handle.clone();
        let tx_power_db = scene_node.tx_power_db;
        let mode = scene.tx_mode.clone();
        let payload: Vec<u8> = (0..tx.payload_size).map(|i| (seq + i) as u8).collect();
        let node_id = tx.node_id;

        queue.schedule_at(
            SimTime::from_millis(tx.at_ms),
            Box::new(move || {
                let channel = transducer.borrow().channel();
                let Some(channel) = channel else {
                    error!("Node {} is not attached to a channel", node_id);
                    return;
                };
                let packet = Packet::new(payload);
                info!("Node {} transmitting packet uid={} ({} bytes, {:.1} dB)", node_id, packet.uid(), packet.len(), tx_power_db);
                if let Err(e) = channel.borrow().transmit(&handle, &packet, tx_power_db, &mode) {
                    error!("Transmission from node {} failed: {}", node_id, e);
                }
            }),
        );
    }
}

fn print_summary(channel: &ChannelHandle, queue: &EventQueue, attached: &[Attached]) {
    let stats = channel.borrow().stats();
    println!(
        "Simulation finished at {}: {} events, {} transmissions, {} deliveries scheduled, {} delivered, {} discarded",
        queue.now(),
        queue.executed_count(),
        stats.transmissions,
        stats.scheduled_deliveries,
        stats.delivered,
        stats.discarded
    );

    for a in attached {
        let transducer = a.transducer.borrow();
        println!("Node {}: {} receptions", a.node_id, transducer.receptions().len());
        for rx in transducer.receptions() {
            println!(
                "  {} uid={} size={} rx_power={:.2} dB taps={}",
                rx.at,
                rx.packet.uid(),
                rx.packet.len(),
                rx.rx_power_db,
                rx.pdp.taps().len()
            );
        }
    }

    let logs = drain_captured_logs();
    if !logs.is_empty() {
        println!("Captured {} node log entries", logs.len());
        for entry in logs {
            println!("  [{}] {} {:?} {}", entry.node_id, entry.timestamp, entry.level, entry.content);
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let Some(scene_path) = args.next() else {
        bail!("Usage: shared-channel-simulator <scene.json> [channel.toml]");
    };

    info!("Starting up");
    let scene = load_scene(&scene_path)?;
    // An explicit config path must exist; the implicit one next to the scene is optional
    let config = match args.next().map(PathBuf::from) {
        Some(config_path) => ChannelConfig::load(&config_path)?,
        None => ChannelConfig::load_or_default(&ChannelConfig::config_path_from_scene(&scene_path))?,
    };
    info!("Loaded scene with {} nodes and {} transmissions", scene.nodes.len(), scene.transmissions.len());

    let queue = Rc::new(EventQueue::new());
    let clock: Rc<dyn Scheduler> = queue.clone();
    let channel = Channel::from_config(clock.clone(), &config)?;
    {
        let ch = channel.borrow();
        let noise = ch.noise_db_hz(scene.tx_mode.center_frequency_khz())?;
        info!("Ambient noise at {:.1} kHz: {:.2} dB re uPa^2/Hz", scene.tx_mode.center_frequency_khz(), noise);
    }

    let attached = attach_nodes(&scene, &channel, &clock)?;
    schedule_transmissions(&scene, &queue, &attached);
    queue.run();

    print_summary(&channel, &queue, &attached);
    channel.borrow_mut().dispose();
    Ok(())
}
