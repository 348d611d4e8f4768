//! Binds transport, prediction, reconciliation and interpolation behind
//! one connection state machine (spec.md §4.13).
//!
//! Grounded on `lightyear_connection/src/client.rs`'s `ClientState` enum
//! (`Connecting`/`Connected`/`Disconnected`), extended with
//! `AwaitingConfig`/`Disconnecting` for the handshake and teardown steps
//! spec.md §4.13 calls out explicitly.

use crate::client::input_buffer::InputBuffer;
use crate::client::interpolator::Interpolator;
use crate::client::predictor::Predictor;
use crate::client::reconciler::{ReplayedInput, Reconciler};
use crate::shared::clock_sync::ClockSyncClient;
use crate::shared::config::EngineConfig;
use crate::shared::error::{EngineError, HandshakeError};
use crate::shared::game::PredictionScope;
use crate::shared::id::ClientId;
use crate::shared::snapshot::Snapshot;
use crate::shared::tick::Tick;
use crate::shared::transport::{ClientEvent, ClientTransport, Message};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport-level connection established; waiting for the server's
    /// one-time `Config` message.
    AwaitingConfig,
    Ready,
    Disconnecting,
}

/// Server-originated events the orchestrator itself doesn't act on, but
/// surfaces for the embedding application to react to.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Joined(ClientId),
    Left(ClientId),
    ActionResult {
        seq: u32,
        success: bool,
        result: Option<String>,
        server_timestamp: f64,
    },
}

pub struct ClientOrchestrator<S: PredictionScope, T> {
    sim: S,
    config: EngineConfig,
    local_id: Option<ClientId>,
    state: ConnectionState,
    transport: T,
    server_tick_rate: Option<u32>,
    interpolation_delay_ms: f64,
    input_buffer: InputBuffer<S::Input>,
    predictor: Predictor<S>,
    reconciler: Reconciler,
    interpolator: Interpolator<S::World>,
    clock: ClockSyncClient,
    last_replay: Vec<ReplayedInput<S::Predicted>>,
    notifications: Vec<OrchestratorEvent>,
    /// Tick of the last snapshot actually applied to prediction state, used
    /// to detect a server reset (spec.md §4.14).
    last_applied_tick: Option<Tick>,
    /// Time spent in `AwaitingConfig` since the transport connected, for
    /// the handshake timeout (spec.md §4.14/§5).
    awaiting_config_elapsed: Duration,
}

const INTERPOLATOR_CAPACITY: usize = 20;

impl<S, T> ClientOrchestrator<S, T>
where
    S: PredictionScope,
    T: ClientTransport<S::World, S::Input, S::Action>,
{
    /// Fails if `sim.init()` fails; the orchestrator is never constructed
    /// with an unready plug-in.
    pub fn new(mut sim: S, config: EngineConfig, transport: T) -> Result<Self, EngineError> {
        sim.init()?;
        Ok(Self {
            sim,
            config,
            local_id: None,
            state: ConnectionState::Disconnected,
            transport,
            server_tick_rate: None,
            interpolation_delay_ms: 0.0,
            input_buffer: InputBuffer::new(0),
            predictor: Predictor::new(),
            reconciler: Reconciler::new(),
            interpolator: Interpolator::new(INTERPOLATOR_CAPACITY),
            clock: ClockSyncClient::new(Duration::from_millis(1000), Duration::from_secs(4)),
            last_replay: Vec::new(),
            notifications: Vec::new(),
            last_applied_tick: None,
            awaiting_config_elapsed: Duration::ZERO,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn local_id(&self) -> Option<&ClientId> {
        self.local_id.as_ref()
    }

    /// Begin connecting as `local_id`. The actual transport-level
    /// handshake is the transport's job; this only starts the engine's
    /// own state machine.
    pub fn connect(&mut self, local_id: ClientId) {
        self.local_id = Some(local_id);
        self.state = ConnectionState::Connecting;
        self.input_buffer = InputBuffer::new(self.config.max_input_buffer_size);
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnecting;
    }

    /// Drain every event the client's notification queue up to this
    /// point.
    pub fn drain_notifications(&mut self) -> Vec<OrchestratorEvent> {
        std::mem::take(&mut self.notifications)
    }

    /// Everything a reconciliation replay touched since the last call;
    /// feed these to an owner-mode [`crate::client::tick_smoother::TickSmoother`]
    /// if the embedder wants tick-smoothed presentation of the local
    /// player.
    pub fn take_replay_trace(&mut self) -> Vec<ReplayedInput<S::Predicted>> {
        std::mem::take(&mut self.last_replay)
    }

    /// Advance the clock-sync ping timer and send a ping if due. Also
    /// advances the handshake timeout while [`ConnectionState::AwaitingConfig`];
    /// returns `Err` and drops the session to [`ConnectionState::Disconnected`]
    /// if the server's `Config` never arrives within
    /// `config.handshake_timeout_ms` (spec.md §4.14/§5).
    pub fn advance_clock(&mut self, dt: Duration, client_now_ms: f64) -> Result<(), EngineError> {
        self.clock.advance(dt);
        if let Some(ping) = self.clock.maybe_prepare_ping(client_now_ms) {
            self.transport.send(Message::Ping(ping));
        }
        if self.state == ConnectionState::AwaitingConfig {
            self.awaiting_config_elapsed += dt;
            let timeout = Duration::from_millis(self.config.handshake_timeout_ms as u64);
            if self.awaiting_config_elapsed >= timeout {
                warn!(?timeout, "config handshake timed out, treating transport as closed");
                self.state = ConnectionState::Disconnected;
                self.local_id = None;
                return Err(EngineError::Handshake(HandshakeError::Timeout(timeout)));
            }
        }
        Ok(())
    }

    /// Drain and process transport events. `client_now_ms` is this
    /// client's own wall clock at the time of the call.
    pub fn receive(&mut self, client_now_ms: f64) -> Result<(), EngineError> {
        for event in self.transport.drain_events() {
            match event {
                ClientEvent::Connected => {
                    self.state = ConnectionState::AwaitingConfig;
                    self.awaiting_config_elapsed = Duration::ZERO;
                }
                ClientEvent::Disconnected => {
                    info!("transport reported disconnect");
                    self.state = ConnectionState::Disconnected;
                    self.local_id = None;
                    self.awaiting_config_elapsed = Duration::ZERO;
                }
                ClientEvent::Message(msg) => self.handle_message(msg, client_now_ms)?,
            }
        }
        Ok(())
    }

    fn handle_message(
        &mut self,
        msg: Message<S::World, S::Input, S::Action>,
        client_now_ms: f64,
    ) -> Result<(), EngineError> {
        match msg {
            Message::Config { tick_rate, tick_interval_ms, interpolation_delay_ms } => {
                let expected_ms = self.config.tick_interval().as_millis() as u32;
                if expected_ms != tick_interval_ms {
                    return Err(EngineError::Handshake(HandshakeError::TickIntervalMismatch {
                        server_ms: tick_interval_ms,
                        client_ms: expected_ms,
                    }));
                }
                self.server_tick_rate = Some(tick_rate);
                self.interpolation_delay_ms = interpolation_delay_ms as f64;
                self.state = ConnectionState::Ready;
            }
            Message::Snapshot(snapshot) => self.handle_snapshot(snapshot),
            Message::ServerTiming { .. } => {}
            Message::Pong(pong) => {
                if let Some(sample) = self.clock.process_pong(pong, client_now_ms) {
                    self.transport.send(Message::ClockReport {
                        offset_ms: sample.offset_ms,
                        rtt_ms: sample.rtt_ms,
                    });
                }
            }
            Message::Join { player_id } => self.notifications.push(OrchestratorEvent::Joined(player_id)),
            Message::Leave { player_id } => self.notifications.push(OrchestratorEvent::Left(player_id)),
            Message::ActionResult { seq, success, result, server_timestamp } => {
                self.notifications.push(OrchestratorEvent::ActionResult {
                    seq,
                    success,
                    result,
                    server_timestamp,
                });
            }
            other => {
                warn!(variant = %other.kind(), "unexpected server-to-client message variant");
            }
        }
        Ok(())
    }

    fn handle_snapshot(&mut self, snapshot: Snapshot<S::World>) {
        if let Some(last) = self.last_applied_tick {
            let regression = last - snapshot.tick;
            if regression > self.config.snapshot_history_size as i16 {
                warn!(
                    last_applied = ?last,
                    incoming = ?snapshot.tick,
                    "large backward tick regression, treating as server reset"
                );
                self.interpolator = Interpolator::new(INTERPOLATOR_CAPACITY);
                self.predictor = Predictor::new();
                self.input_buffer = InputBuffer::new(self.config.max_input_buffer_size);
                self.last_applied_tick = None;
            }
        }
        self.last_applied_tick = Some(snapshot.tick);

        let Some(local) = self.local_id.clone() else {
            self.interpolator.push(snapshot);
            return;
        };
        let acked_seq = snapshot.input_acks.get(&local).copied();
        self.interpolator.push(snapshot.clone());

        if let Some(acked_seq) = acked_seq {
            let server_predicted = self.sim.extract_predictable(&snapshot.state, &local);
            let buffered: Vec<_> = self.input_buffer.pending().cloned().collect();
            let dt_ms = self.server_tick_interval_ms();
            let (new_predicted, new_tick, replay) = self.reconciler.reconcile(
                &self.sim,
                snapshot.tick,
                server_predicted,
                acked_seq,
                &buffered,
                dt_ms,
                &local,
            );
            self.predictor.set_base(new_predicted, new_tick);
            self.input_buffer.acknowledge(acked_seq);
            self.last_replay = replay;
        } else {
            debug!(%local, "snapshot carried no ack for local client yet");
        }
    }

    /// Capture one local input, predict it forward, and send it to the
    /// server. Returns the assigned input seq, or `None` if not
    /// [`ConnectionState::Ready`].
    pub fn frame(&mut self, input: S::Input, timestamp_ms: f64) -> Option<u32> {
        if self.state != ConnectionState::Ready {
            return None;
        }
        let local = self.local_id.clone()?;
        let tick = self.predictor.tick() + 1;
        let seq = self.input_buffer.push(tick, input.clone(), timestamp_ms);
        let dt_ms = self.server_tick_interval_ms();
        self.predictor.predict_tick(&self.sim, &input, dt_ms, &local);
        self.transport.send(Message::Input { seq, input, timestamp: timestamp_ms });
        Some(seq)
    }

    /// Send a discrete action to the server for lag-compensated
    /// validation.
    pub fn send_action(&mut self, seq: u32, action: S::Action, client_timestamp: f64) {
        self.transport.send(Message::Action { seq, action, client_timestamp });
    }

    /// Render the world at `client_now_ms`, blending the interpolated
    /// remote state with the locally predicted slice.
    pub fn render(&self, client_now_ms: f64) -> Option<S::World> {
        let local = self.local_id.as_ref()?;
        let render_ts = client_now_ms - self.interpolation_delay_ms;
        let remote = self.interpolator.sample(&self.sim, render_ts)?;
        let predicted = self.predictor.current()?;
        Some(self.sim.merge_prediction(&remote, predicted, local))
    }

    fn server_tick_interval_ms(&self) -> f64 {
        self.server_tick_rate
            .map(|rate| 1000.0 / rate as f64)
            .unwrap_or_else(|| self.config.tick_interval().as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::game::{Action as ActionTrait, Simulation};
    use crate::shared::transport::channel;
    use indexmap::IndexMap;

    #[derive(Clone)]
    struct Accum;

    #[derive(Clone, Debug, PartialEq)]
    struct NoopAction;
    impl ActionTrait for NoopAction {
        fn client_timestamp(&self) -> f64 {
            0.0
        }
    }

    impl Simulation for Accum {
        type World = i32;
        type Input = i32;
        type Action = NoopAction;
        fn simulate(&self, world: &i32, inputs: &IndexMap<ClientId, i32>, _dt_ms: f64) -> i32 {
            world + inputs.values().sum::<i32>()
        }
        fn interpolate(&self, from: &i32, _to: &i32, _alpha: f32) -> i32 {
            *from
        }
        fn add_player(&self, world: &i32, _id: &ClientId) -> i32 {
            *world
        }
        fn remove_player(&self, world: &i32, _id: &ClientId) -> i32 {
            *world
        }
        fn create_idle_input(&self) -> i32 {
            0
        }
    }

    impl PredictionScope for Accum {
        type Predicted = i32;
        fn extract_predictable(&self, world: &i32, _local_id: &ClientId) -> i32 {
            *world
        }
        fn simulate_predicted(&self, predicted: &i32, input: &i32, _dt_ms: f64, _local_id: &ClientId) -> i32 {
            predicted + input
        }
        fn merge_prediction(&self, _server_world: &i32, predicted: &i32, _local_id: &ClientId) -> i32 {
            *predicted
        }
    }

    #[test]
    fn handshake_rejects_tick_interval_mismatch() {
        let mut server: channel::ChannelServer<i32, i32, NoopAction> = channel::ChannelServer::new();
        let client_side = server.connect(ClientId::new("p1"));
        let mut config = EngineConfig::default();
        config.tick_rate = 60;
        let mut orch = ClientOrchestrator::new(Accum, config, client_side).unwrap();
        orch.connect(ClientId::new("p1"));
        let err = orch
            .handle_message(
                Message::Config { tick_rate: 30, tick_interval_ms: 33, interpolation_delay_ms: 50 },
                0.0,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Handshake(HandshakeError::TickIntervalMismatch { .. })));
    }

    #[test]
    fn large_backward_regression_resets_client_state() {
        let mut server: channel::ChannelServer<i32, i32, NoopAction> = channel::ChannelServer::new();
        let client_side = server.connect(ClientId::new("p1"));
        let mut config = EngineConfig::default();
        config.snapshot_history_size = 5;
        let mut orch = ClientOrchestrator::new(Accum, config, client_side).unwrap();
        orch.connect(ClientId::new("p1"));
        orch.predictor.set_base(7, Tick(100));
        assert!(orch.predictor.current().is_some());

        orch.handle_snapshot(Snapshot {
            tick: Tick(100),
            timestamp: 0.0,
            state: 0,
            input_acks: IndexMap::new(),
        });
        assert_eq!(orch.last_applied_tick, Some(Tick(100)));

        // server appears to have reset far behind what we last applied:
        // 100 - 10 = 90, which exceeds the 5-snapshot history window.
        orch.handle_snapshot(Snapshot {
            tick: Tick(10),
            timestamp: 0.0,
            state: 0,
            input_acks: IndexMap::new(),
        });
        assert_eq!(orch.last_applied_tick, Some(Tick(10)));
        // predictor was re-bootstrapped, losing the stale baseline.
        assert!(orch.predictor.current().is_none());
    }

    #[test]
    fn handshake_timeout_drops_to_disconnected() {
        let mut server: channel::ChannelServer<i32, i32, NoopAction> = channel::ChannelServer::new();
        let client_side = server.connect(ClientId::new("p1"));
        let mut config = EngineConfig::default();
        config.handshake_timeout_ms = 1000;
        let mut orch = ClientOrchestrator::new(Accum, config, client_side).unwrap();
        orch.connect(ClientId::new("p1"));
        orch.receive(0.0).unwrap();
        assert_eq!(orch.state(), ConnectionState::AwaitingConfig);

        orch.advance_clock(Duration::from_millis(500), 500.0).unwrap();
        assert_eq!(orch.state(), ConnectionState::AwaitingConfig);

        let err = orch.advance_clock(Duration::from_millis(600), 1100.0).unwrap_err();
        assert!(matches!(err, EngineError::Handshake(HandshakeError::Timeout(_))));
        assert_eq!(orch.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn config_moves_state_to_ready() {
        let mut server: channel::ChannelServer<i32, i32, NoopAction> = channel::ChannelServer::new();
        let client_side = server.connect(ClientId::new("p1"));
        let config = EngineConfig::default();
        let tick_interval_ms = config.tick_interval().as_millis() as u32;
        let mut orch = ClientOrchestrator::new(Accum, config, client_side).unwrap();
        orch.connect(ClientId::new("p1"));
        assert_eq!(orch.state(), ConnectionState::Connecting);
        orch.handle_message(
            Message::Config { tick_rate: 60, tick_interval_ms, interpolation_delay_ms: 50 },
            0.0,
        )
        .unwrap();
        assert_eq!(orch.state(), ConnectionState::Ready);
    }
}
