//! Drives the fixed-rate server tick loop: drains transport events, steps
//! the simulation once per tick, and broadcasts the resulting snapshot
//! (spec.md §4.13, §5).
//!
//! Grounded on `lightyear/src/server/plugin.rs` and `systems.rs`'s staged
//! per-tick system ordering (drain incoming → step → snapshot →
//! broadcast), translated from Bevy system sets into a single `tick()`
//! method performing the same stages in order.

use crate::server::input_queue::{ActionQueue, InputMessage, InputQueue};
use crate::server::lag_compensation::LagCompensator;
use crate::server::tick_processor::TickProcessor;
use crate::shared::clock_sync::{ClockSample, ClockSyncServer};
use crate::shared::config::EngineConfig;
use crate::shared::game::Simulation;
use crate::shared::id::ClientId;
use crate::shared::snapshot::{Snapshot, SnapshotBuffer};
use crate::shared::tick::Tick;
use crate::shared::transport::{Message, ServerEvent, ServerTransport};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Ties together every server-side component behind one `tick()` entry
/// point. Single-threaded: the embedder owns the timer loop and calls
/// `tick()` at `config.tick_rate` Hz, feeding it the current wall-clock
/// time in milliseconds (spec.md §5).
pub struct ServerOrchestrator<S: Simulation, T> {
    sim: S,
    config: EngineConfig,
    world: S::World,
    tick: Tick,
    connected: IndexMap<ClientId, ()>,
    input_queue: InputQueue<S::Input>,
    action_queue: ActionQueue,
    snapshot_buffer: SnapshotBuffer<S::World>,
    clock_sync: ClockSyncServer,
    acks: IndexMap<ClientId, u32>,
    tick_processor: TickProcessor,
    lag_compensator: LagCompensator,
    transport: T,
    ticks_since_timing: u32,
}

impl<S, T> ServerOrchestrator<S, T>
where
    S: Simulation,
    T: ServerTransport<S::World, S::Input, S::Action>,
{
    /// Fails if `sim.init()` fails; the orchestrator is never constructed
    /// with an unready plug-in.
    pub fn new(
        mut sim: S,
        config: EngineConfig,
        initial_world: S::World,
        transport: T,
    ) -> Result<Self, crate::shared::error::EngineError> {
        sim.init()?;
        let lag_compensator = LagCompensator::new(config.lag_compensation);
        let snapshot_buffer = SnapshotBuffer::new(config.snapshot_history_size);
        let action_queue = ActionQueue::new(config.max_action_history);
        Ok(Self {
            sim,
            config,
            world: initial_world,
            tick: Tick::ZERO,
            connected: IndexMap::new(),
            input_queue: InputQueue::new(),
            action_queue,
            snapshot_buffer,
            clock_sync: ClockSyncServer::new(),
            acks: IndexMap::new(),
            tick_processor: TickProcessor::new(),
            lag_compensator,
            transport,
            ticks_since_timing: 0,
        })
    }

    pub fn world(&self) -> &S::World {
        &self.world
    }

    pub fn tick_number(&self) -> Tick {
        self.tick
    }

    pub fn connected_clients(&self) -> impl Iterator<Item = &ClientId> {
        self.connected.keys()
    }

    /// Run one fixed-rate tick: drain incoming transport events, advance
    /// the simulation, broadcast the new snapshot. `now_ms` is the
    /// server's own wall clock.
    pub fn tick(&mut self, now_ms: f64) {
        self.drain_transport(now_ms);

        self.connected.sort_keys();
        let connected_ids: Vec<ClientId> = self.connected.keys().cloned().collect();
        let pending = self.input_queue.get_all_pending_inputs_batched();
        let dt_ms = self.config.tick_interval().as_secs_f64() * 1000.0;

        let (new_world, new_acks) =
            self.tick_processor
                .step(&self.sim, &self.world, &connected_ids, &pending, dt_ms);
        self.world = new_world;

        for (client, seq) in new_acks.iter() {
            self.acks.insert(client.clone(), *seq);
            self.input_queue.acknowledge(client, *seq);
        }
        self.acks.sort_keys();

        self.tick = self.tick + 1;
        let snapshot = Snapshot {
            tick: self.tick,
            timestamp: now_ms,
            state: self.world.clone(),
            input_acks: self.acks.clone(),
        };
        self.snapshot_buffer.add(snapshot.clone());
        self.transport.broadcast(Message::Snapshot(snapshot));

        self.ticks_since_timing += 1;
        if self.ticks_since_timing >= self.config.tick_rate {
            self.ticks_since_timing = 0;
            self.transport.broadcast(Message::ServerTiming {
                server_tick: self.tick.0 as u32,
                server_time: now_ms,
            });
        }
    }

    fn drain_transport(&mut self, now_ms: f64) {
        for event in self.transport.drain_events() {
            match event {
                ServerEvent::Connect(id) => self.on_connect(id),
                ServerEvent::Disconnect(id) => self.on_disconnect(&id),
                ServerEvent::Message(from, msg) => self.on_message(from, msg, now_ms),
            }
        }
    }

    fn on_connect(&mut self, id: ClientId) {
        info!(%id, "client connected");
        self.world = self.sim.add_player(&self.world, &id);
        self.connected.insert(id.clone(), ());
        self.connected.sort_keys();
        self.acks.insert(id.clone(), 0);

        self.transport.send(
            &id,
            Message::Config {
                tick_rate: self.config.tick_rate,
                tick_interval_ms: self.config.tick_interval().as_millis() as u32,
                interpolation_delay_ms: self.config.interpolation_delay_ms,
            },
        );
        self.transport.broadcast(Message::Join { player_id: id });
    }

    fn on_disconnect(&mut self, id: &ClientId) {
        if !self.connected.contains_key(id) {
            return;
        }
        info!(%id, "client disconnected");
        self.world = self.sim.remove_player(&self.world, id);
        self.connected.shift_remove(id);
        self.acks.shift_remove(id);
        self.input_queue.remove_client(id);
        self.action_queue.remove_client(id);
        self.clock_sync.remove_client(id);
        self.transport.broadcast(Message::Leave {
            player_id: id.clone(),
        });
    }

    fn on_message(&mut self, from: ClientId, msg: Message<S::World, S::Input, S::Action>, now_ms: f64) {
        if !self.connected.contains_key(&from) {
            debug!(%from, "dropping message from unknown/disconnected client");
            return;
        }
        match msg {
            Message::Input { seq, input, timestamp } => {
                self.input_queue
                    .enqueue(from, InputMessage { seq, input, timestamp });
            }
            Message::Action { seq, action, client_timestamp } => {
                self.handle_action(from, seq, action, client_timestamp, now_ms);
            }
            Message::Ping(ping) => {
                let pong = self.clock_sync.respond(ping, now_ms);
                self.transport.send(&from, Message::Pong(pong));
            }
            Message::ClockReport { offset_ms, rtt_ms } => {
                self.clock_sync
                    .record_report(from, ClockSample { offset_ms, rtt_ms });
            }
            other => {
                warn!(%from, variant = %other.kind(), "unexpected client-to-server message variant");
            }
        }
    }

    fn handle_action(
        &mut self,
        from: ClientId,
        seq: u32,
        action: S::Action,
        client_timestamp: f64,
        now_ms: f64,
    ) {
        if !self.action_queue.try_accept(&from, seq) {
            return;
        }
        let clock = self.clock_sync.get(&from);
        let interpolation_delay_ms = self.config.interpolation_delay_ms as f64;

        let (success, result) = match self.lag_compensator.rewind(
            &self.sim,
            &self.snapshot_buffer,
            client_timestamp,
            clock,
            interpolation_delay_ms,
            now_ms,
        ) {
            Some(rewound) => self.sim.validate_action(&rewound.state, &action, &from),
            None => (false, Some("no snapshot history to rewind to".to_string())),
        };

        self.transport.send(
            &from,
            Message::ActionResult {
                seq,
                success,
                result,
                server_timestamp: now_ms,
            },
        );
    }
}
