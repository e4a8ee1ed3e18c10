//! Single-node runtime: wires a `Mote` to the embassy executor the way the
//! simulator's `main.rs` wires up its executor thread and logger, minus the
//! GUI — there is no UI here, only the cooperative event loop described in
//! §4.8 and §5.
//!
//! The real radio device and (for the root) the real serial port are out of
//! scope per `spec.md` §1 ("assumed as given services"); this binary
//! accepts packets and serial lines through `embassy_sync` channels so a
//! concrete hardware binding can be dropped in without touching the Mote
//! logic itself. Lacking real hardware, `main` here only demonstrates the
//! wiring and runs the root role against stdin/stdout for the gateway line.

use aqmesh_mote::config::MoteConfig;
use aqmesh_mote::gateway::{self, GatewayCommand};
use aqmesh_mote::mote::{Mote, MoteEvent};
use aqmesh_mote::node::{NodeId, Role};
use aqmesh_mote::transport::{ChannelTransport, OutgoingQueue, QueuedPacket};
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use log::{error, info};
use std::sync::mpsc;

/// A packet arriving from the radio HAL (out of scope; see module docs).
enum IncomingPacket {
    Broadcast { from: NodeId, payload: Vec<u8>, rss: i8 },
    Unicast { from: NodeId, payload: Vec<u8> },
}

const INCOMING_QUEUE_SIZE: usize = 16;
type IncomingQueue = Channel<NoopRawMutex, IncomingPacket, INCOMING_QUEUE_SIZE>;

#[embassy_executor::task]
async fn mote_task(
    addr: NodeId,
    role: Role,
    config: MoteConfig,
    outgoing: &'static OutgoingQueue,
    incoming: &'static IncomingQueue,
    gateway_commands: mpsc::Receiver<GatewayCommand>,
) {
    let mut mote = if role == Role::Root { Mote::new_root(addr, config) } else { Mote::new_non_root(addr, role, config) };
    let mut transport = ChannelTransport::new(outgoing.sender());
    let mut rng = rand::thread_rng();

    mote.start(Instant::now());
    info!("[{addr:?}] started as {role:?}");

    loop {
        // Drain any gateway commands without blocking the radio path.
        while let Ok(cmd) = gateway_commands.try_recv() {
            match cmd {
                GatewayCommand::Open { dst_addr } => mote.send_open(dst_addr, &mut transport),
            }
        }

        let now = Instant::now();
        let sleep_for = mote
            .scheduler
            .next_deadline()
            .map(|d| Duration::from_ticks(d.as_ticks().saturating_sub(now.as_ticks())))
            .unwrap_or(Duration::from_secs(1));

        match embassy_futures::select::select(Timer::after(sleep_for), incoming.receive()).await {
            embassy_futures::select::Either::First(_) => {
                let now = Instant::now();
                if let Some(kind) = mote.scheduler.pop_due(now) {
                    mote.on_timer(kind, now, &mut transport, &mut rng);
                }
            }
            embassy_futures::select::Either::Second(packet) => {
                let now = Instant::now();
                match packet {
                    IncomingPacket::Broadcast { from, payload, rss } => {
                        mote.on_broadcast_recv(from, &payload, aqmesh_mote::node::RssSample(rss), now, &mut transport, &mut rng);
                    }
                    IncomingPacket::Unicast { from, payload } => {
                        if let Some(MoteEvent::DataForGateway { src_addr, value }) =
                            mote.on_unicast_recv(from, &payload, now, &mut transport, &mut rng)
                        {
                            let mut stdout = std::io::stdout();
                            if let Err(e) = gateway::write_data_event(&mut stdout, src_addr, value) {
                                error!("failed to write gateway event: {e}");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[embassy_executor::task]
async fn radio_drain_task(outgoing: &'static OutgoingQueue) {
    // Placeholder for the real radio binding: every packet the Mote wants
    // to send lands here. A deployment swaps this task for one that hands
    // `QueuedPacket`s to actual radio hardware.
    loop {
        let packet = outgoing.receive().await;
        match packet {
            QueuedPacket::Broadcast { payload } => log::debug!("TX broadcast ({} bytes)", payload.len()),
            QueuedPacket::Unicast { dest, payload, .. } => log::debug!("TX unicast to {dest:?} ({} bytes)", payload.len()),
        }
    }
}

fn spawn_gateway_reader() -> mpsc::Receiver<GatewayCommand> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut reader = stdin.lock();
        while let Ok(Some(cmd)) = gateway::read_command(&mut reader) {
            if tx.send(cmd).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() {
    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();

    let mut args = std::env::args().skip(1);
    let role = match args.next().as_deref() {
        Some("root") => Role::Root,
        Some("sensor") => Role::Sensor,
        Some("compute") => Role::Compute,
        _ => {
            eprintln!("usage: node <root|sensor|compute> <node-id> [config.toml]");
            std::process::exit(2);
        }
    };
    let addr: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("usage: node <root|sensor|compute> <node-id> [config.toml]");
        std::process::exit(2);
    });
    let config = args
        .next()
        .map(|path| MoteConfig::load(std::path::Path::new(&path)).unwrap_or_else(|e| {
            error!("failed to load config: {e:#}");
            std::process::exit(1);
        }))
        .unwrap_or_default();

    let gateway_commands = spawn_gateway_reader();

    let outgoing: &'static OutgoingQueue = Box::leak(Box::new(OutgoingQueue::new()));
    let incoming: &'static IncomingQueue = Box::leak(Box::new(IncomingQueue::new()));

    let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
    executor.run(|spawner: Spawner| {
        let _ = spawner.spawn(radio_drain_task(outgoing));
        let _ = spawner.spawn(mote_task(NodeId(addr), role, config, outgoing, incoming, gateway_commands));
    });
}
